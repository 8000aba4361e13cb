//! Error types for netherd.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for netherd operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Inventory loading/validation errors (fatal for a run)
    #[error("Inventory error: {0}")]
    Inventory(#[from] InventoryError),

    /// Session establishment errors (per-device, non-fatal)
    #[error("Connect error: {0}")]
    Connect(#[from] ConnectError),

    /// Operation execution errors (per-device, non-fatal)
    #[error("Execution error: {0}")]
    Execution(#[from] ExecutionError),

    /// Result persistence errors (per-device, non-fatal)
    #[error("Persist error: {0}")]
    Persist(#[from] PersistError),

    /// Config template rendering errors
    #[error("Render error: {0}")]
    Render(#[from] RenderError),
}

/// Inventory layer errors (document parsing, validation).
///
/// These are the only errors that abort an entire run: without a valid
/// device list there is nothing to fan out over.
#[derive(Error, Debug)]
pub enum InventoryError {
    /// The inventory document could not be read
    #[error("Cannot read inventory {path}: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The inventory document is not valid YAML or has the wrong shape
    #[error("Malformed inventory: {message}")]
    MalformedSource { message: String },

    /// Two devices share the same name
    #[error("Duplicate device name '{name}'")]
    DuplicateDeviceName { name: String },

    /// A device references a driver kind this engine does not know
    #[error("Unknown device type '{device_type}' for device '{name}'")]
    UnknownDeviceType { name: String, device_type: String },
}

/// Session establishment errors.
///
/// Produced by a `SessionFactory` when a device cannot be reached or
/// authenticated. Subject to the executor's retry policy.
#[derive(Error, Debug, Clone)]
pub enum ConnectError {
    /// Connection attempt exceeded the connect timeout
    #[error("Connection to {host} timed out after {timeout:?}")]
    Timeout {
        host: String,
        timeout: std::time::Duration,
    },

    /// The device rejected the supplied credentials
    #[error("Authentication failed for user '{user}' on {host}")]
    AuthFailure { host: String, user: String },

    /// The device could not be reached at all
    #[error("Device {host} unreachable: {message}")]
    Unreachable { host: String, message: String },
}

/// Operation execution errors on an established session.
///
/// Never retried: the session may have partially applied the operation,
/// and re-running it could double-commit config changes.
#[derive(Error, Debug)]
pub enum ExecutionError {
    /// A command was rejected or produced a driver-level failure
    #[error("Command '{command}' failed: {message}")]
    CommandFailed { command: String, message: String },

    /// The device rejected a candidate configuration
    #[error("Configuration rejected: {message}")]
    ConfigRejected { message: String },

    /// The session dropped mid-operation
    #[error("Session closed unexpectedly")]
    SessionClosed,
}

/// Result persistence errors (backup files, topology documents).
#[derive(Error, Debug)]
pub enum PersistError {
    /// The output directory could not be created
    #[error("Cannot create directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A per-device output file could not be written
    #[error("Cannot write {path}: {source}")]
    WriteFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The aggregated document could not be serialized
    #[error("Cannot serialize results: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Config template rendering errors.
#[derive(Error, Debug)]
pub enum RenderError {
    /// The template itself is invalid or rendering failed
    #[error("Template error: {0}")]
    Template(#[from] minijinja::Error),
}

/// Result type alias using netherd's Error.
pub type Result<T> = std::result::Result<T, Error>;
