pub mod errors;
pub mod key;
pub mod packet;
pub mod reader;

pub use errors::CaptureError;
pub use key::FlowKey;
pub use packet::{IpLayer, LinkLayer, Packet};
pub use reader::read_capture;

use std::collections::HashMap;

/// Packet that made it into a flow, the IP layer is guaranteed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlowPacket {
    pub timestamp_ns: u64,
    pub length: u32,
    pub ip: IpLayer,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Flow {
    pub key: FlowKey,
    /// In arrival order
    pub packets: Vec<FlowPacket>,
}

/// Flows of one capture file together with the number of frames the file held.
#[derive(Debug, Default)]
pub struct ReconstructedFlows {
    flows: Vec<Flow>,
    index: HashMap<FlowKey, usize>,
    total_packets: usize,
}

impl ReconstructedFlows {
    /// Flows in the order their first packet arrived.
    pub fn flows(&self) -> &[Flow] {
        &self.flows
    }

    pub fn len(&self) -> usize {
        self.flows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flows.is_empty()
    }

    /// Every frame of the file, including those without an IP layer.
    pub fn total_packets(&self) -> usize {
        self.total_packets
    }
}

/// Groups packets into bidirectional flows.
pub fn reconstruct<I>(packets: I) -> ReconstructedFlows
where
    I: IntoIterator<Item = Packet>,
{
    let mut reconstructed = ReconstructedFlows::default();

    for packet in packets {
        reconstructed.total_packets += 1;

        let ip = match packet.ip {
            Some(ip) => ip,
            None => continue,
        };
        let key = FlowKey::new(&ip);
        let flow_packet = FlowPacket {
            timestamp_ns: packet.timestamp_ns,
            length: packet.length,
            ip,
        };

        match reconstructed.index.get(&key) {
            Some(&i) => reconstructed.flows[i].packets.push(flow_packet),
            None => {
                reconstructed.index.insert(key, reconstructed.flows.len());
                reconstructed.flows.push(Flow {
                    key,
                    packets: vec![flow_packet],
                });
            }
        }
    }

    reconstructed
}
