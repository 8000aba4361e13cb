//! # Netherd
//!
//! Concurrent task-execution engine for network device fleets.
//!
//! Netherd loads a YAML device inventory, fans one operation out across
//! every device with bounded concurrency, and persists the per-device
//! results. It deliberately does not implement any device transport:
//! the embedding application supplies a [`SessionFactory`] and netherd
//! supplies everything around it — inventory validation, per-device
//! retry and timeout, partial-failure isolation, and durable result
//! persistence.
//!
//! ## Features
//!
//! - Typed inventory loaded from `hosts.yaml`, validated up front
//! - Backup, LLDP neighbor-gather, and SNMP config-push operations
//! - Bounded-concurrency fan-out; one device's failure never stops the rest
//! - Connect retry with backoff, never re-running a started operation
//! - Idempotent backup files, atomic topology documents
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use netherd::{
//!     CommandTable, Credentials, FanOut, Inventory, Operation, ResultSink,
//!     TaskExecutor, UnavailableFactory,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), netherd::Error> {
//!     let credentials = Credentials::new("admin", "secret");
//!     let inventory = Inventory::load("hosts.yaml", &credentials)?;
//!
//!     // A real deployment plugs in its own SessionFactory here.
//!     let executor = TaskExecutor::new(Arc::new(UnavailableFactory));
//!     let commands = CommandTable::default();
//!
//!     let report = FanOut::new(executor)
//!         .concurrency(10)
//!         .run(&inventory, |device| {
//!             Operation::backup(commands.command_for(device.device_type))
//!         })
//!         .await;
//!
//!     ResultSink::new("backup").persist_backups(&report);
//!     println!("{}", report.summary());
//!     Ok(())
//! }
//! ```

pub mod commands;
pub mod error;
pub mod inventory;
pub mod neighbors;
pub mod runner;
pub mod session;
pub mod sink;
pub mod snmp;
pub mod task;

// Re-export main types for convenience
pub use commands::{CommandTable, DEFAULT_BACKUP_COMMAND};
pub use error::{
    ConnectError, Error, ExecutionError, InventoryError, PersistError, RenderError,
};
pub use inventory::{Credentials, Device, DeviceType, Inventory};
pub use neighbors::{NeighborRecord, NeighborTable, RawNeighbor, RawNeighbors, Topology};
pub use runner::{FanOut, RunReport};
pub use session::{DeviceSession, DiffResult, SessionFactory, UnavailableFactory};
pub use sink::{ResultSink, collect_topology, write_topology};
pub use snmp::{CommunityMode, CommunityString, SnmpPlan, SnmpState};
pub use task::{
    ErrorInfo, ErrorKind, Operation, RetryPolicy, TaskExecutor, TaskOutput, TaskRequest,
    TaskResult, TaskState, TaskStatus,
};
