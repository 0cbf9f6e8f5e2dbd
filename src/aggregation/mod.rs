use chrono::{DateTime, Timelike, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Traffic classes the classifier was trained on. Anything else the encoder emits
/// lands in `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Label {
    Benign,
    Ldap,
    Mssql,
    Syn,
    Udp,
    Other(String),
}

impl Label {
    pub fn is_attack(&self) -> bool {
        matches!(self, Self::Ldap | Self::Mssql | Self::Syn | Self::Udp)
    }
}

impl From<&str> for Label {
    fn from(label: &str) -> Self {
        match label {
            "BENIGN" => Self::Benign,
            "LDAP" => Self::Ldap,
            "MSSQL" => Self::Mssql,
            "SYN" => Self::Syn,
            "UDP" => Self::Udp,
            other => Self::Other(other.to_owned()),
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            Self::Benign => "BENIGN",
            Self::Ldap => "LDAP",
            Self::Mssql => "MSSQL",
            Self::Syn => "SYN",
            Self::Udp => "UDP",
            Self::Other(name) => name,
        };
        write!(f, "{}", name)
    }
}

/// Outcome of one capture file, written once and never touched again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PredictionRecord {
    pub timestamp: DateTime<Utc>,
    pub benign: u64,
    pub ldap: u64,
    pub mssql: u64,
    pub syn: u64,
    pub udp: u64,
    pub total_packets: u64,
    pub attack: bool,
    /// Labels outside the persisted columns, kept for diagnostics only
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub unrecognized: BTreeMap<String, u64>,
}

/// Occurrences of every label, in label order.
pub fn count_labels<S: AsRef<str>>(labels: &[S]) -> BTreeMap<Label, u64> {
    let mut counts = BTreeMap::new();
    for label in labels {
        *counts.entry(Label::from(label.as_ref())).or_insert(0) += 1;
    }
    counts
}

pub fn aggregate<S: AsRef<str>>(
    labels: &[S],
    total_packets: usize,
    finished_at: DateTime<Utc>,
) -> PredictionRecord {
    let counts = count_labels(labels);
    let count = |label: &Label| counts.get(label).copied().unwrap_or(0);

    let unrecognized = counts
        .iter()
        .filter_map(|(label, n)| match label {
            Label::Other(name) => Some((name.clone(), *n)),
            _ => None,
        })
        .collect();

    PredictionRecord {
        timestamp: finished_at.with_nanosecond(0).unwrap_or(finished_at),
        benign: count(&Label::Benign),
        ldap: count(&Label::Ldap),
        mssql: count(&Label::Mssql),
        syn: count(&Label::Syn),
        udp: count(&Label::Udp),
        total_packets: total_packets as u64,
        attack: counts.iter().any(|(label, &n)| label.is_attack() && n > 0),
        unrecognized,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    fn at() -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 987_654_321).unwrap()
    }

    #[test]
    fn test_aggregate_mixed_file() {
        let record = aggregate(&["SYN", "SYN", "BENIGN", "UDP"], 500, at());

        assert_eq!(
            record,
            PredictionRecord {
                timestamp: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
                benign: 1,
                ldap: 0,
                mssql: 0,
                syn: 2,
                udp: 1,
                total_packets: 500,
                attack: true,
                unrecognized: BTreeMap::new(),
            }
        );
    }

    #[test_case(&["BENIGN", "BENIGN"], false ; "benign only")]
    #[test_case(&["BENIGN", "LDAP"], true ; "ldap")]
    #[test_case(&["MSSQL"], true ; "mssql")]
    #[test_case(&["PORTSCAN"], false ; "unknown labels are not attacks")]
    fn test_attack_flag(labels: &[&str], attack: bool) {
        assert_eq!(aggregate(labels, 10, at()).attack, attack);
    }

    #[test]
    fn test_unknown_labels_are_kept_aside() {
        let record = aggregate(&["PORTSCAN", "BENIGN", "PORTSCAN", "benign"], 4, at());

        assert_eq!(record.benign, 1);
        assert_eq!(
            record.unrecognized,
            BTreeMap::from([("PORTSCAN".to_owned(), 2), ("benign".to_owned(), 1)])
        );
    }

    #[test]
    fn test_label_round_trips_through_display() {
        for name in ["BENIGN", "LDAP", "MSSQL", "SYN", "UDP", "DNS"] {
            assert_eq!(Label::from(name).to_string(), name);
        }
    }
}
