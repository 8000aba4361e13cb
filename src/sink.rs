//! Result persistence: per-device backup files and the aggregated
//! neighbor topology document.

use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, error, info};

use crate::error::PersistError;
use crate::neighbors::Topology;
use crate::runner::RunReport;
use crate::task::TaskOutput;

/// Persists run results durably and idempotently.
///
/// Each device owns exactly one backup file derived from its name, so
/// concurrent runs over disjoint devices never contend; repeated runs
/// overwrite rather than accumulate.
pub struct ResultSink {
    backup_dir: PathBuf,
    write_empty_on_failure: bool,
}

impl ResultSink {
    /// Sink writing backup files under the given directory.
    pub fn new(backup_dir: impl Into<PathBuf>) -> Self {
        Self {
            backup_dir: backup_dir.into(),
            write_empty_on_failure: false,
        }
    }

    /// Write an empty backup file for failed devices instead of
    /// skipping them. Off by default; exists for parity with legacy
    /// scripts that always wrote the file.
    pub fn write_empty_on_failure(mut self, enabled: bool) -> Self {
        self.write_empty_on_failure = enabled;
        self
    }

    /// The backup file path for a device.
    pub fn backup_path(&self, device_name: &str) -> PathBuf {
        self.backup_dir.join(format!("{device_name}.cfg"))
    }

    /// Write one device's backup text. Creates the backup directory if
    /// absent; overwrites any previous file.
    pub fn write_backup(&self, device_name: &str, text: &str) -> Result<PathBuf, PersistError> {
        ensure_dir(&self.backup_dir)?;
        let path = self.backup_path(device_name);
        debug!("writing backup for {device_name} to {}", path.display());
        fs::write(&path, text).map_err(|source| PersistError::WriteFile {
            path: path.clone(),
            source,
        })?;
        Ok(path)
    }

    /// Persist every backup result in the report.
    ///
    /// One device's write failure is logged and collected but never
    /// stops the remaining writes. Failed tasks are skipped unless
    /// [`write_empty_on_failure`](Self::write_empty_on_failure) is set.
    pub fn persist_backups(&self, report: &RunReport) -> Vec<PersistError> {
        let mut errors = Vec::new();
        for result in report.iter() {
            let text = match (&result.output, result.is_success()) {
                (Some(TaskOutput::Text(text)), true) => text.as_str(),
                (_, false) if self.write_empty_on_failure => "",
                (_, false) => {
                    debug!("skipping backup write for failed device {}", result.device_name);
                    continue;
                }
                _ => continue,
            };
            if let Err(err) = self.write_backup(&result.device_name, text) {
                error!("backup for {} not persisted: {err}", result.device_name);
                errors.push(err);
            }
        }
        errors
    }
}

/// Collect the run's neighbor tables into one topology document.
///
/// Every device in the report is keyed in the document; devices that
/// failed (or produced no neighbor output) get an empty table, keeping
/// the document shape stable across partial failures.
pub fn collect_topology(report: &RunReport) -> Topology {
    let mut topology = Topology::new();
    for result in report.iter() {
        let table = result
            .output
            .as_ref()
            .and_then(TaskOutput::as_neighbors)
            .cloned()
            .unwrap_or_default();
        topology.insert(result.device_name.clone(), table);
    }
    topology
}

/// Write the topology document as JSON, atomically.
///
/// The document is staged in a sibling temp file and renamed into
/// place, so a crash mid-write never leaves a truncated document.
pub fn write_topology(path: impl AsRef<Path>, topology: &Topology) -> Result<(), PersistError> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            ensure_dir(parent)?;
        }
    }

    let json = serde_json::to_vec_pretty(topology)?;

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    fs::write(&tmp, &json).map_err(|source| PersistError::WriteFile {
        path: tmp.clone(),
        source,
    })?;
    fs::rename(&tmp, path).map_err(|source| PersistError::WriteFile {
        path: path.to_path_buf(),
        source,
    })?;

    info!("wrote topology for {} devices to {}", topology.len(), path.display());
    Ok(())
}

/// Idempotent directory creation; a concurrent create by another
/// worker is not an error.
fn ensure_dir(dir: &Path) -> Result<(), PersistError> {
    match fs::create_dir_all(dir) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => Ok(()),
        Err(source) => Err(PersistError::CreateDir {
            path: dir.to_path_buf(),
            source,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::neighbors::{NeighborRecord, NeighborTable};

    #[test]
    fn test_backup_write_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let sink = ResultSink::new(dir.path().join("backup"));

        let first = sink.write_backup("r1", "interface Gi0/0\n").unwrap();
        let second = sink.write_backup("r1", "interface Gi0/0\n").unwrap();

        assert_eq!(first, second);
        assert_eq!(fs::read_to_string(&first).unwrap(), "interface Gi0/0\n");

        // no duplicate files accumulate
        let entries = fs::read_dir(dir.path().join("backup")).unwrap().count();
        assert_eq!(entries, 1);
    }

    #[test]
    fn test_backup_path_derivation() {
        let sink = ResultSink::new("backup");
        assert_eq!(sink.backup_path("r1"), PathBuf::from("backup/r1.cfg"));
    }

    #[test]
    fn test_write_topology_atomic_output() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lldp_neighbors.json");

        let mut table = NeighborTable::new();
        table.insert(
            "Gi0/0".to_string(),
            vec![NeighborRecord {
                neighbor: "sw1".to_string(),
                neighbor_interface: "Gi0/1".to_string(),
            }],
        );
        let mut topology = Topology::new();
        topology.insert("r1", table);

        write_topology(&path, &topology).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["r1"]["Gi0/0"][0]["neighbor"], "sw1");

        // nothing staged is left behind
        let names: Vec<String> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["lldp_neighbors.json"]);
    }

    #[test]
    fn test_write_topology_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lldp_neighbors.json");

        let mut topology = Topology::new();
        topology.insert("r1", NeighborTable::new());
        write_topology(&path, &topology).unwrap();
        write_topology(&path, &topology).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert!(value.get("r1").is_some());
    }

    #[test]
    fn test_ensure_dir_tolerates_existing() {
        let dir = tempfile::tempdir().unwrap();
        ensure_dir(dir.path()).unwrap();
        ensure_dir(dir.path()).unwrap();
    }
}
