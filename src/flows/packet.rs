use etherparse::{NetSlice, SlicedPacket, TransportSlice};
use std::net::IpAddr;

/// TCP control bits as they appear in the flags byte of the header.
pub mod tcp_flags {
    pub const FIN: u8 = 0x01;
    pub const SYN: u8 = 0x02;
    pub const RST: u8 = 0x04;
    pub const PSH: u8 = 0x08;
    pub const ACK: u8 = 0x10;
    pub const URG: u8 = 0x20;
    pub const ECE: u8 = 0x40;
    pub const CWR: u8 = 0x80;
}

/// Link layer of a capture, taken from the global header of the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkLayer {
    Ethernet,
    RawIp,
    /// BSD loopback, 4 byte address family header in front of the IP header
    Null,
    /// Linux cooked capture v1, 16 byte pseudo header
    LinuxSll,
    /// Linux cooked capture v2, 20 byte pseudo header. Recent tcpdump writes
    /// this for the `any` device.
    LinuxSll2,
}

impl LinkLayer {
    fn header_len(&self) -> usize {
        match self {
            Self::Ethernet | Self::RawIp => 0,
            Self::Null => 4,
            Self::LinuxSll => 16,
            Self::LinuxSll2 => 20,
        }
    }
}

/// Header fields of the IP layer the feature schema relies on.
///
/// Ports and flags are only filled for TCP segments, everything else carries zeros.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IpLayer {
    pub src: IpAddr,
    pub dst: IpAddr,
    pub protocol: u8,
    pub src_port: u16,
    pub dst_port: u16,
    pub tcp_flags: u8,
}

/// Single captured frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Packet {
    /// Arrival time in nanoseconds since the unix epoch
    pub timestamp_ns: u64,
    /// Captured length of the whole frame
    pub length: u32,
    pub ip: Option<IpLayer>,
}

impl Packet {
    pub fn decode(timestamp_ns: u64, frame: &[u8], link: LinkLayer, include_ipv6: bool) -> Self {
        let sliced = match link {
            LinkLayer::Ethernet => SlicedPacket::from_ethernet(frame).ok(),
            _ => frame
                .get(link.header_len()..)
                .and_then(|ip| SlicedPacket::from_ip(ip).ok()),
        };

        Self {
            timestamp_ns,
            length: frame.len() as u32,
            ip: sliced.and_then(|s| ip_layer(&s, include_ipv6)),
        }
    }
}

fn ip_layer(sliced: &SlicedPacket<'_>, include_ipv6: bool) -> Option<IpLayer> {
    let (src, dst, protocol) = match &sliced.net {
        Some(NetSlice::Ipv4(ipv4)) => {
            let header = ipv4.header();
            (
                IpAddr::from(header.source_addr()),
                IpAddr::from(header.destination_addr()),
                header.protocol().0,
            )
        }
        Some(NetSlice::Ipv6(ipv6)) if include_ipv6 => {
            let header = ipv6.header();
            (
                IpAddr::from(header.source_addr()),
                IpAddr::from(header.destination_addr()),
                ipv6.payload().ip_number.0,
            )
        }
        // ARP and friends
        _ => return None,
    };

    let (src_port, dst_port, tcp_flags) = match &sliced.transport {
        Some(TransportSlice::Tcp(tcp)) => {
            let flags = [
                (tcp.fin(), tcp_flags::FIN),
                (tcp.syn(), tcp_flags::SYN),
                (tcp.rst(), tcp_flags::RST),
                (tcp.psh(), tcp_flags::PSH),
                (tcp.ack(), tcp_flags::ACK),
                (tcp.urg(), tcp_flags::URG),
                (tcp.ece(), tcp_flags::ECE),
                (tcp.cwr(), tcp_flags::CWR),
            ]
            .iter()
            .filter(|(set, _)| *set)
            .fold(0u8, |acc, (_, bit)| acc | bit);

            (tcp.source_port(), tcp.destination_port(), flags)
        }
        _ => (0, 0, 0),
    };

    Some(IpLayer {
        src,
        dst,
        protocol,
        src_port,
        dst_port,
        tcp_flags,
    })
}
