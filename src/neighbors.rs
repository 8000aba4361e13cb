//! LLDP neighbor records and topology normalization.
//!
//! Drivers report neighbors with `hostname`/`port` keys. The external
//! schema is stable on `neighbor`/`neighbor_interface` instead, so the
//! engine constructs typed [`NeighborRecord`]s directly from the raw
//! driver shape rather than renaming keys in a loose map.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// A neighbor entry as drivers report it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawNeighbor {
    /// Remote system name.
    pub hostname: String,

    /// Remote port identifier.
    pub port: String,
}

/// Raw driver output: local interface -> neighbors seen on it.
pub type RawNeighbors = IndexMap<String, Vec<RawNeighbor>>;

/// A normalized adjacency entry: the directly connected peer of one
/// local interface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NeighborRecord {
    /// Remote system name.
    pub neighbor: String,

    /// Remote port identifier.
    pub neighbor_interface: String,
}

impl From<RawNeighbor> for NeighborRecord {
    fn from(raw: RawNeighbor) -> Self {
        Self {
            neighbor: raw.hostname,
            neighbor_interface: raw.port,
        }
    }
}

/// Normalized neighbors of one device, grouped per local interface.
pub type NeighborTable = IndexMap<String, Vec<NeighborRecord>>;

/// Convert raw driver output into the stable schema, preserving the
/// per-interface grouping and ordering.
pub fn normalize(raw: RawNeighbors) -> NeighborTable {
    raw.into_iter()
        .map(|(interface, neighbors)| {
            let records = neighbors.into_iter().map(NeighborRecord::from).collect();
            (interface, records)
        })
        .collect()
}

/// Aggregated neighbor topology across a whole run, keyed by device
/// name. This is the shape of the `lldp_neighbors.json` document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Topology {
    devices: IndexMap<String, NeighborTable>,
}

impl Topology {
    /// Create an empty topology.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one device's neighbor table.
    pub fn insert(&mut self, device_name: impl Into<String>, table: NeighborTable) {
        self.devices.insert(device_name.into(), table);
    }

    /// Look up a device's neighbor table.
    pub fn get(&self, device_name: &str) -> Option<&NeighborTable> {
        self.devices.get(device_name)
    }

    /// Number of devices recorded.
    pub fn len(&self) -> usize {
        self.devices.len()
    }

    /// True when no devices have been recorded.
    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Iterate device entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &NeighborTable)> {
        self.devices.iter().map(|(name, table)| (name.as_str(), table))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw_sample() -> RawNeighbors {
        let mut raw = RawNeighbors::new();
        raw.insert(
            "Gi0/0".to_string(),
            vec![RawNeighbor {
                hostname: "sw1".to_string(),
                port: "Gi0/1".to_string(),
            }],
        );
        raw.insert(
            "Gi0/1".to_string(),
            vec![
                RawNeighbor {
                    hostname: "sw2".to_string(),
                    port: "Eth1/1".to_string(),
                },
                RawNeighbor {
                    hostname: "sw3".to_string(),
                    port: "Eth1/2".to_string(),
                },
            ],
        );
        raw
    }

    #[test]
    fn test_normalize_renames_fields() {
        let table = normalize(raw_sample());

        let records = table.get("Gi0/0").unwrap();
        assert_eq!(
            records,
            &vec![NeighborRecord {
                neighbor: "sw1".to_string(),
                neighbor_interface: "Gi0/1".to_string(),
            }]
        );
    }

    #[test]
    fn test_normalize_preserves_grouping() {
        let table = normalize(raw_sample());
        let interfaces: Vec<&String> = table.keys().collect();
        assert_eq!(interfaces, vec!["Gi0/0", "Gi0/1"]);
        assert_eq!(table.get("Gi0/1").unwrap().len(), 2);
    }

    #[test]
    fn test_serialized_schema_has_no_raw_keys() {
        let mut topology = Topology::new();
        topology.insert("r1", normalize(raw_sample()));

        let json = serde_json::to_string(&topology).unwrap();
        assert!(json.contains("\"neighbor\""));
        assert!(json.contains("\"neighbor_interface\""));
        assert!(!json.contains("\"hostname\""));
        assert!(!json.contains("\"port\""));
    }

    #[test]
    fn test_topology_document_shape() {
        let mut topology = Topology::new();
        topology.insert("r1", normalize(raw_sample()));

        let value: serde_json::Value = serde_json::to_value(&topology).unwrap();
        assert_eq!(
            value["r1"]["Gi0/0"][0]["neighbor"],
            serde_json::Value::String("sw1".to_string())
        );
    }

    #[test]
    fn test_normalize_empty_input() {
        assert!(normalize(RawNeighbors::new()).is_empty());
    }
}
