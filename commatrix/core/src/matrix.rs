use ahash::AHashSet;
use serde::{Deserialize, Deserializer, Serialize};
use std::{fmt, str::FromStr};

/// A single row of a communication matrix.
///
/// The field order is fixed: `direction, protocol, port, nodeRole, serviceName, required`.
/// `port` and `protocol` are strings because a row built from an EndpointSlice carries all of
/// the slice's ports (comma-joined, in declaration order).
#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComDetail {
    pub direction: Direction,
    pub protocol: String,
    pub port: String,
    pub node_role: String,
    pub service_name: String,
    #[serde(deserialize_with = "bool_or_string")]
    pub required: bool,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    Ingress,
}

/// A transport protocol as reported by socket dumps.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Protocol {
    Tcp,
    Udp,
}

#[derive(Debug, thiserror::Error)]
#[error("unsupported protocol: {0}")]
pub struct InvalidProtocol(String);

/// The role a node plays in the cluster, as derived from its role labels.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum NodeRole {
    Worker,
    Master,
    MasterWorker,
}

/// An ordered, deduplicated list of [`ComDetail`] rows.
///
/// A matrix never holds two rows with the same `(nodeRole, port, protocol)` key. Once built it
/// is not modified; comparisons produce new collections.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ComMatrix(Vec<ComDetail>);

/// Removes rows whose `(nodeRole, port, protocol)` key was already seen.
///
/// The first row for each key wins and the relative order of the surviving rows is preserved,
/// so deduplicating an already-deduplicated list returns it unchanged.
pub fn dedup(rows: impl IntoIterator<Item = ComDetail>) -> Vec<ComDetail> {
    let mut seen = AHashSet::new();
    rows.into_iter()
        .filter(|row| {
            let key = row.key();
            if seen.contains(&key) {
                tracing::trace!(%key, "Discarding duplicate row");
                return false;
            }
            seen.insert(key);
            true
        })
        .collect()
}

// === impl ComDetail ===

impl ComDetail {
    pub fn ingress(
        protocol: impl ToString,
        port: impl ToString,
        node_role: impl ToString,
        service_name: impl ToString,
        required: bool,
    ) -> Self {
        Self {
            direction: Direction::Ingress,
            protocol: protocol.to_string(),
            port: port.to_string(),
            node_role: node_role.to_string(),
            service_name: service_name.to_string(),
            required,
        }
    }

    /// The canonical identity of a row within a matrix.
    pub fn key(&self) -> String {
        format!("{}-{}-{}", self.node_role, self.port, self.protocol)
    }
}

impl fmt::Display for ComDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{},{},{},{},{},{}",
            self.direction,
            self.protocol,
            self.port,
            self.node_role,
            self.service_name,
            self.required
        )
    }
}

fn bool_or_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum BoolOrString {
        Bool(bool),
        String(String),
    }

    match BoolOrString::deserialize(deserializer)? {
        BoolOrString::Bool(b) => Ok(b),
        BoolOrString::String(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

// === impl Direction ===

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ingress => "ingress",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// === impl Protocol ===

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Tcp => "TCP",
            Self::Udp => "UDP",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Protocol {
    type Err = InvalidProtocol;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("tcp") {
            Ok(Self::Tcp)
        } else if s.eq_ignore_ascii_case("udp") {
            Ok(Self::Udp)
        } else {
            Err(InvalidProtocol(s.to_string()))
        }
    }
}

// === impl NodeRole ===

impl NodeRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Worker => "worker",
            Self::Master => "master",
            Self::MasterWorker => "master-worker",
        }
    }
}

impl fmt::Display for NodeRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// === impl ComMatrix ===

impl ComMatrix {
    pub fn new(rows: impl IntoIterator<Item = ComDetail>) -> Self {
        Self(dedup(rows))
    }

    pub fn rows(&self) -> &[ComDetail] {
        &self.0
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ComDetail> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<ComDetail> for ComMatrix {
    fn from_iter<T: IntoIterator<Item = ComDetail>>(iter: T) -> Self {
        Self::new(iter)
    }
}

impl<'a> IntoIterator for &'a ComMatrix {
    type Item = &'a ComDetail;
    type IntoIter = std::slice::Iter<'a, ComDetail>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl<'de> Deserialize<'de> for ComMatrix {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Vec::<ComDetail>::deserialize(deserializer).map(Self::new)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quickcheck::{quickcheck, Arbitrary, Gen};

    impl Arbitrary for ComDetail {
        fn arbitrary(g: &mut Gen) -> Self {
            // Small pools so that generated lists repeat keys.
            let protocol = *g.choose(&["TCP", "UDP"]).unwrap();
            let port = *g.choose(&["22", "53", "443", "6443", "9100"]).unwrap();
            let role = *g.choose(&["", "worker", "master"]).unwrap();
            let service = *g.choose(&["sshd", "dns", "kube-apiserver"]).unwrap();
            ComDetail::ingress(protocol, port, role, service, bool::arbitrary(g))
        }
    }

    fn row(role: &str, port: &str, protocol: &str, service: &str) -> ComDetail {
        ComDetail::ingress(protocol, port, role, service, true)
    }

    #[test]
    fn dedup_keeps_first_row_per_key() {
        let rows = vec![
            row("worker", "22", "TCP", "sshd"),
            row("master", "22", "TCP", "sshd"),
            row("worker", "22", "TCP", "other"),
            row("worker", "22", "UDP", "sshd"),
            row("worker", "80", "TCP", "nginx"),
        ];
        let deduped = dedup(rows.clone());
        assert_eq!(
            deduped,
            vec![
                rows[0].clone(),
                rows[1].clone(),
                rows[3].clone(),
                rows[4].clone(),
            ]
        );
    }

    quickcheck! {
        fn dedup_is_idempotent(rows: Vec<ComDetail>) -> bool {
            let once = dedup(rows);
            dedup(once.clone()) == once
        }

        fn dedup_leaves_unique_keys(rows: Vec<ComDetail>) -> bool {
            let deduped = dedup(rows);
            let keys = deduped.iter().map(ComDetail::key).collect::<AHashSet<_>>();
            keys.len() == deduped.len()
        }

        fn dedup_keeps_every_key(rows: Vec<ComDetail>) -> bool {
            let keys = rows.iter().map(ComDetail::key).collect::<AHashSet<_>>();
            let deduped = dedup(rows).iter().map(ComDetail::key).collect::<AHashSet<_>>();
            keys == deduped
        }
    }

    #[test]
    fn dedup_empty() {
        assert!(dedup(Vec::new()).is_empty());
    }

    #[test]
    fn key_format() {
        assert_eq!(row("master", "443", "TCP", "x").key(), "master-443-TCP");
        assert_eq!(row("", "53,53", "UDP,TCP", "dns").key(), "-53,53-UDP,TCP");
    }

    #[test]
    fn display_in_field_order() {
        let cd = ComDetail::ingress("TCP", "22", "worker", "sshd", false);
        assert_eq!(cd.to_string(), "ingress,TCP,22,worker,sshd,false");
    }

    #[test]
    fn deserializes_fixture_rows() {
        let json = r#"[
            {"direction": "ingress", "protocol": "TCP", "port": "22", "nodeRole": "master",
             "serviceName": "sshd", "required": "false"},
            {"direction": "ingress", "protocol": "UDP", "port": "111", "nodeRole": "worker",
             "serviceName": "rpcbind", "required": true},
            {"direction": "ingress", "protocol": "TCP", "port": "22", "nodeRole": "master",
             "serviceName": "dup", "required": true}
        ]"#;

        let rows: Vec<ComDetail> = serde_json::from_str(json).unwrap();
        assert_eq!(rows.len(), 3);
        assert!(!rows[0].required);
        assert!(rows[1].required);

        let matrix: ComMatrix = serde_json::from_str(json).unwrap();
        assert_eq!(matrix.len(), 2, "matrices are deduplicated on load");
        assert_eq!(matrix.rows()[0].service_name, "sshd");
    }

    #[test]
    fn serializes_camel_case() {
        let cd = ComDetail::ingress("TCP", "22", "worker", "sshd", true);
        let json = serde_json::to_value(&cd).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "direction": "ingress",
                "protocol": "TCP",
                "port": "22",
                "nodeRole": "worker",
                "serviceName": "sshd",
                "required": true,
            })
        );
    }

    #[test]
    fn parse_protocol() {
        assert_eq!("TCP".parse::<Protocol>().unwrap(), Protocol::Tcp);
        assert_eq!("udp".parse::<Protocol>().unwrap(), Protocol::Udp);
        assert!("SCTP".parse::<Protocol>().is_err());
    }
}
