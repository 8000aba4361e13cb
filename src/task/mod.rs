//! Per-device task execution.
//!
//! A task is one operation against one device. The executor turns every
//! possible failure into a [`TaskResult`] with `Failure` status instead
//! of propagating, so a bad device can never take down a run.

mod executor;

pub use executor::{RetryPolicy, TaskExecutor};

use std::time::Duration;

use serde::Serialize;

use crate::error::{ConnectError, ExecutionError};
use crate::inventory::Device;
use crate::neighbors::NeighborTable;
use crate::session::DiffResult;
use crate::snmp::SnmpPlan;

/// The operation a task performs.
#[derive(Debug, Clone)]
pub enum Operation {
    /// Run one operational command and capture its output.
    Backup {
        /// The command to run, usually resolved from a
        /// [`CommandTable`](crate::commands::CommandTable).
        command: String,
    },

    /// Fetch and normalize the device's LLDP neighbor table.
    GetNeighbors,

    /// Apply an SNMP configuration plan.
    PushConfig(SnmpPlan),
}

impl Operation {
    /// A backup operation for the given command.
    pub fn backup(command: impl Into<String>) -> Self {
        Self::Backup {
            command: command.into(),
        }
    }

    /// Short label for logging.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Backup { .. } => "backup",
            Self::GetNeighbors => "get-neighbors",
            Self::PushConfig(_) => "push-config",
        }
    }
}

/// One operation bound to one device.
#[derive(Debug, Clone)]
pub struct TaskRequest {
    /// Target device.
    pub device: Device,

    /// Operation to perform.
    pub operation: Operation,
}

impl TaskRequest {
    /// Bind an operation to a device.
    pub fn new(device: Device, operation: Operation) -> Self {
        Self { device, operation }
    }
}

/// Task lifecycle states.
///
/// `Idle → Connecting → { Connected → Executing → { Completed |
/// ExecutionFailed } } | ConnectFailed`. The three terminal states all
/// map onto a [`TaskResult`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    /// Not yet dispatched.
    Idle,
    /// Opening the session.
    Connecting,
    /// Session open, operation not yet dispatched.
    Connected,
    /// Operation in flight.
    Executing,
    /// Operation finished successfully.
    Completed,
    /// Operation failed on an open session.
    ExecutionFailed,
    /// Session could not be opened.
    ConnectFailed,
}

impl TaskState {
    /// Whether the state maps onto a final [`TaskResult`].
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Completed | Self::ExecutionFailed | Self::ConnectFailed
        )
    }
}

/// Success or failure of one task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    /// Operation completed and produced output.
    Success,
    /// Connect, execution, or cancellation failure.
    Failure,
}

/// What a successful task produced.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum TaskOutput {
    /// Raw command output (backup).
    Text(String),

    /// Normalized neighbor table (get-neighbors).
    Neighbors(NeighborTable),

    /// Config diff (push-config).
    Diff(DiffResult),
}

impl TaskOutput {
    /// Text output, if this is a backup result.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Neighbor table, if this is a get-neighbors result.
    pub fn as_neighbors(&self) -> Option<&NeighborTable> {
        match self {
            Self::Neighbors(table) => Some(table),
            _ => None,
        }
    }

    /// Diff, if this is a push-config result.
    pub fn as_diff(&self) -> Option<&DiffResult> {
        match self {
            Self::Diff(diff) => Some(diff),
            _ => None,
        }
    }
}

/// Classified failure cause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Connect attempt timed out.
    Timeout,
    /// Device rejected the credentials.
    AuthFailure,
    /// Device could not be reached.
    Unreachable,
    /// Command rejected or failed on an open session.
    CommandFailed,
    /// Candidate configuration rejected.
    ConfigRejected,
    /// Session dropped mid-operation.
    SessionClosed,
    /// Task never dispatched before the run was cancelled.
    Cancelled,
    /// Task died without producing a result (driver panic).
    Aborted,
}

/// Failure detail carried by a failed [`TaskResult`].
#[derive(Debug, Clone, Serialize)]
pub struct ErrorInfo {
    /// Classified cause.
    pub kind: ErrorKind,

    /// Human-readable detail.
    pub message: String,
}

impl ErrorInfo {
    /// Build error info from a kind and message.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl From<&ConnectError> for ErrorInfo {
    fn from(err: &ConnectError) -> Self {
        let kind = match err {
            ConnectError::Timeout { .. } => ErrorKind::Timeout,
            ConnectError::AuthFailure { .. } => ErrorKind::AuthFailure,
            ConnectError::Unreachable { .. } => ErrorKind::Unreachable,
        };
        Self::new(kind, err.to_string())
    }
}

impl From<&ExecutionError> for ErrorInfo {
    fn from(err: &ExecutionError) -> Self {
        let kind = match err {
            ExecutionError::CommandFailed { .. } => ErrorKind::CommandFailed,
            ExecutionError::ConfigRejected { .. } => ErrorKind::ConfigRejected,
            ExecutionError::SessionClosed => ErrorKind::SessionClosed,
        };
        Self::new(kind, err.to_string())
    }
}

/// Outcome of one operation against one device.
///
/// Exactly one is produced per [`TaskRequest`], success or failure.
#[derive(Debug, Clone, Serialize)]
pub struct TaskResult {
    /// Name of the device the task ran against.
    pub device_name: String,

    /// Success or failure.
    pub status: TaskStatus,

    /// Output, present on success.
    pub output: Option<TaskOutput>,

    /// Failure detail, present on failure.
    pub error: Option<ErrorInfo>,

    /// Wall-clock time the task took.
    pub duration: Duration,
}

impl TaskResult {
    /// A successful result.
    pub fn success(device_name: impl Into<String>, output: TaskOutput, duration: Duration) -> Self {
        Self {
            device_name: device_name.into(),
            status: TaskStatus::Success,
            output: Some(output),
            error: None,
            duration,
        }
    }

    /// A failed result.
    pub fn failure(device_name: impl Into<String>, error: ErrorInfo, duration: Duration) -> Self {
        Self {
            device_name: device_name.into(),
            status: TaskStatus::Failure,
            output: None,
            error: Some(error),
            duration,
        }
    }

    /// Whether the task succeeded.
    pub fn is_success(&self) -> bool {
        self.status == TaskStatus::Success
    }
}
