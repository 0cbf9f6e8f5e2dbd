//! Statistical summary of a flow, the only input the classifier ever sees.
//!
//! Field order is fixed by the trained model and must not change.

use crate::flows::packet::tcp_flags;
use crate::flows::{FlowKey, FlowPacket, ReconstructedFlows};
use serde::Serialize;

pub const FEATURE_COUNT: usize = 23;

/// Durations of zero are reported as this many microseconds.
pub const MIN_DURATION_MICROS: u64 = 10;

/// Positions of the fields inside a [`FeatureVector`].
pub mod index {
    pub const PROTOCOL: usize = 0;
    pub const DURATION_MICROS: usize = 1;
    pub const FWD_PACKETS: usize = 2;
    pub const BWD_PACKETS: usize = 3;
    pub const FWD_BYTES: usize = 4;
    pub const BWD_BYTES: usize = 5;
    pub const FWD_LEN_MAX: usize = 6;
    pub const FWD_LEN_MIN: usize = 7;
    pub const FWD_LEN_MEAN: usize = 8;
    pub const BWD_LEN_MAX: usize = 9;
    pub const BWD_LEN_MIN: usize = 10;
    pub const BWD_LEN_MEAN: usize = 11;
    pub const BYTES_PER_MICRO: usize = 12;
    pub const PACKETS_PER_MICRO: usize = 13;
    pub const LEN_MEAN: usize = 14;
    pub const FIN_COUNT: usize = 15;
    pub const SYN_COUNT: usize = 16;
    pub const RST_COUNT: usize = 17;
    pub const PSH_COUNT: usize = 18;
    pub const ACK_COUNT: usize = 19;
    pub const URG_COUNT: usize = 20;
    pub const CWR_COUNT: usize = 21;
    pub const ECE_COUNT: usize = 22;
}

/// Flag counters in feature order.
const FLAG_FEATURES: [(usize, u8); 8] = [
    (index::FIN_COUNT, tcp_flags::FIN),
    (index::SYN_COUNT, tcp_flags::SYN),
    (index::RST_COUNT, tcp_flags::RST),
    (index::PSH_COUNT, tcp_flags::PSH),
    (index::ACK_COUNT, tcp_flags::ACK),
    (index::URG_COUNT, tcp_flags::URG),
    (index::CWR_COUNT, tcp_flags::CWR),
    (index::ECE_COUNT, tcp_flags::ECE),
];

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FeatureVector([f64; FEATURE_COUNT]);

impl FeatureVector {
    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    pub fn get(&self, idx: usize) -> f64 {
        self.0[idx]
    }
}

impl From<[f64; FEATURE_COUNT]> for FeatureVector {
    fn from(values: [f64; FEATURE_COUNT]) -> Self {
        Self(values)
    }
}

#[derive(Debug, Default, PartialEq)]
struct DirectionStats {
    packets: usize,
    bytes: u64,
    max: u32,
    min: u32,
    mean: f64,
}

impl DirectionStats {
    fn from_lengths(lengths: &[u32]) -> Self {
        if lengths.is_empty() {
            return Self::default();
        }

        let bytes = lengths.iter().map(|&l| l as u64).sum::<u64>();
        Self {
            packets: lengths.len(),
            bytes,
            max: lengths.iter().copied().max().unwrap_or(0),
            min: lengths.iter().copied().min().unwrap_or(0),
            mean: bytes as f64 / lengths.len() as f64,
        }
    }
}

fn duration_micros(packets: &[FlowPacket]) -> u64 {
    let first = packets.iter().map(|p| p.timestamp_ns).min();
    let last = packets.iter().map(|p| p.timestamp_ns).max();

    let micros = match (first, last) {
        (Some(first), Some(last)) => (last - first) / 1_000,
        _ => 0,
    };

    if micros == 0 {
        MIN_DURATION_MICROS
    } else {
        micros
    }
}

/// Builds the feature vector of one flow from its packets in arrival order.
pub fn extract(packets: &[FlowPacket], key: &FlowKey) -> FeatureVector {
    let mut features = [0f64; FEATURE_COUNT];

    let (forward, backward): (Vec<&FlowPacket>, Vec<&FlowPacket>) =
        packets.iter().partition(|p| key.is_forward(&p.ip));
    let forward =
        DirectionStats::from_lengths(&forward.iter().map(|p| p.length).collect::<Vec<_>>());
    let backward =
        DirectionStats::from_lengths(&backward.iter().map(|p| p.length).collect::<Vec<_>>());

    let duration = duration_micros(packets) as f64;
    let total_bytes = forward.bytes + backward.bytes;

    features[index::PROTOCOL] = packets.first().map(|p| p.ip.protocol as f64).unwrap_or(0.0);
    features[index::DURATION_MICROS] = duration;

    features[index::FWD_PACKETS] = forward.packets as f64;
    features[index::BWD_PACKETS] = backward.packets as f64;
    features[index::FWD_BYTES] = forward.bytes as f64;
    features[index::BWD_BYTES] = backward.bytes as f64;
    features[index::FWD_LEN_MAX] = forward.max as f64;
    features[index::FWD_LEN_MIN] = forward.min as f64;
    features[index::FWD_LEN_MEAN] = forward.mean;
    features[index::BWD_LEN_MAX] = backward.max as f64;
    features[index::BWD_LEN_MIN] = backward.min as f64;
    features[index::BWD_LEN_MEAN] = backward.mean;

    features[index::BYTES_PER_MICRO] = total_bytes as f64 / duration;
    features[index::PACKETS_PER_MICRO] = packets.len() as f64 / duration;
    features[index::LEN_MEAN] = if packets.is_empty() {
        0.0
    } else {
        total_bytes as f64 / packets.len() as f64
    };

    for (idx, bit) in FLAG_FEATURES {
        features[idx] = packets.iter().filter(|p| p.ip.tcp_flags & bit != 0).count() as f64;
    }

    FeatureVector(features)
}

/// One vector per flow, in flow order.
pub fn extract_all(flows: &ReconstructedFlows) -> Vec<FeatureVector> {
    flows
        .flows()
        .iter()
        .map(|flow| extract(&flow.packets, &flow.key))
        .collect()
}
