use super::packet::IpLayer;
use serde::Serialize;
use std::cmp::Ordering;
use std::net::IpAddr;

/// Direction agnostic identity of a flow.
///
/// The address pair is ordered by the textual form of the addresses (so `10.0.0.10`
/// comes before `10.0.0.2`). Direction of every packet in the flow is derived from
/// that order, see [`FlowKey::is_forward`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct FlowKey {
    pub addresses: (IpAddr, IpAddr),
    pub ports: (u16, u16),
    pub protocol: u8,
}

fn textual_cmp(a: &IpAddr, b: &IpAddr) -> Ordering {
    a.to_string().cmp(&b.to_string())
}

impl FlowKey {
    pub fn new(ip: &IpLayer) -> Self {
        let addresses = match textual_cmp(&ip.src, &ip.dst) {
            Ordering::Greater => (ip.dst, ip.src),
            _ => (ip.src, ip.dst),
        };
        let ports = if ip.src_port <= ip.dst_port {
            (ip.src_port, ip.dst_port)
        } else {
            (ip.dst_port, ip.src_port)
        };

        Self {
            addresses,
            ports,
            protocol: ip.protocol,
        }
    }

    pub fn smaller(&self) -> IpAddr {
        self.addresses.0
    }

    pub fn larger(&self) -> IpAddr {
        self.addresses.1
    }

    /// Forward traffic is whatever the smaller address sent. This is not necessarily
    /// the side that opened the session.
    pub fn is_forward(&self, ip: &IpLayer) -> bool {
        ip.src == self.smaller()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    fn layer(src: &str, dst: &str, src_port: u16, dst_port: u16, protocol: u8) -> IpLayer {
        IpLayer {
            src: src.parse().unwrap(),
            dst: dst.parse().unwrap(),
            protocol,
            src_port,
            dst_port,
            tcp_flags: 0,
        }
    }

    #[test_case("10.0.0.1", "10.0.0.2", 1234, 80 ; "ordered")]
    #[test_case("192.168.1.20", "10.1.1.1", 443, 51000 ; "reversed")]
    #[test_case("10.0.0.10", "10.0.0.2", 53, 53 ; "textual order differs from numeric")]
    fn test_key_is_symmetric(a: &str, b: &str, a_port: u16, b_port: u16) {
        let there = FlowKey::new(&layer(a, b, a_port, b_port, 6));
        let back = FlowKey::new(&layer(b, a, b_port, a_port, 6));

        assert_eq!(there, back);
    }

    #[test]
    fn test_addresses_sorted_as_text() {
        let key = FlowKey::new(&layer("10.0.0.2", "10.0.0.10", 0, 0, 17));

        assert_eq!(key.smaller(), "10.0.0.10".parse::<IpAddr>().unwrap());
        assert_eq!(key.larger(), "10.0.0.2".parse::<IpAddr>().unwrap());
        assert!(!key.is_forward(&layer("10.0.0.2", "10.0.0.10", 0, 0, 17)));
        assert!(key.is_forward(&layer("10.0.0.10", "10.0.0.2", 0, 0, 17)));
    }

    #[test]
    fn test_protocol_separates_flows() {
        let tcp = FlowKey::new(&layer("10.0.0.1", "10.0.0.2", 0, 0, 6));
        let udp = FlowKey::new(&layer("10.0.0.1", "10.0.0.2", 0, 0, 17));
        assert_ne!(tcp, udp);
    }
}
