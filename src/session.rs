//! Device session capability: the seam between the engine and the
//! actual transport.
//!
//! netherd does not implement SSH/NETCONF/SNMP itself. The embedding
//! application supplies a [`SessionFactory`] that knows how to open an
//! authenticated channel to a [`Device`]; the engine only cares that a
//! session can run commands, answer driver-specific queries, apply
//! configuration, and be closed on every exit path.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{ConnectError, ExecutionError};
use crate::inventory::Device;
use crate::neighbors::RawNeighbors;
use crate::snmp::SnmpState;

/// Outcome of applying a candidate configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffResult {
    /// Rendered diff between running and candidate config. Empty when
    /// the candidate changed nothing.
    pub diff: String,

    /// Whether a commit actually happened.
    pub changed: bool,
}

impl DiffResult {
    /// A diff that committed changes.
    pub fn changed(diff: impl Into<String>) -> Self {
        Self {
            diff: diff.into(),
            changed: true,
        }
    }

    /// A no-op diff: the candidate matched the running config.
    pub fn unchanged() -> Self {
        Self::default()
    }
}

/// An open, authenticated channel to one device.
///
/// Within a session operations are strictly sequential. `close`
/// consumes the session; the executor guarantees it is called on every
/// exit path, success or failure.
#[async_trait]
pub trait DeviceSession: Send {
    /// Run one operational command and return its raw output.
    async fn run(&mut self, command: &str) -> Result<String, ExecutionError>;

    /// Query the device's LLDP neighbor table in the driver's raw shape.
    async fn get_neighbors(&mut self) -> Result<RawNeighbors, ExecutionError>;

    /// Read the device's current SNMP configuration.
    async fn get_snmp(&mut self) -> Result<SnmpState, ExecutionError>;

    /// Merge a candidate configuration and commit it if it changes
    /// anything.
    async fn apply_config(&mut self, config: &str) -> Result<DiffResult, ExecutionError>;

    /// Close the channel.
    async fn close(self: Box<Self>) -> Result<(), ExecutionError>;
}

/// Opens sessions to devices. Implemented by the embedding application
/// (real transports) and by the test suite (simulated devices).
#[async_trait]
pub trait SessionFactory: Send + Sync {
    /// Open an authenticated session to the device.
    async fn open(&self, device: &Device) -> Result<Box<dyn DeviceSession>, ConnectError>;
}

/// A factory that refuses every connection.
///
/// The shipped binary has no transport linked in; it uses this factory
/// so runs still exercise inventory loading, fan-out, and persistence
/// with a clear per-device error.
#[derive(Debug, Clone, Default)]
pub struct UnavailableFactory;

#[async_trait]
impl SessionFactory for UnavailableFactory {
    async fn open(&self, device: &Device) -> Result<Box<dyn DeviceSession>, ConnectError> {
        Err(ConnectError::Unreachable {
            host: device.host.clone(),
            message: "no device transport is linked into this build".to_string(),
        })
    }
}
