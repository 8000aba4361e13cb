//! Executes one task against one device.

use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, error, warn};

use super::{ErrorInfo, Operation, TaskOutput, TaskRequest, TaskResult, TaskState};
use crate::error::{ConnectError, ExecutionError, RenderError};
use crate::inventory::Device;
use crate::neighbors;
use crate::session::{DeviceSession, SessionFactory};
use crate::snmp::{render_snmp_config, render_snmp_teardown};

/// Connect retry policy.
///
/// Only session establishment is ever retried. Once a session is open
/// the operation runs at most once: re-running a partially applied
/// config push could commit the same change twice.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total connect attempts, including the first (default 1, i.e.
    /// no retry).
    pub max_connect_attempts: u32,

    /// Base delay between attempts; doubles after each failure.
    pub backoff_base: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_connect_attempts: 1,
            backoff_base: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    /// Delay before the given (1-based) retry attempt.
    fn backoff_for(&self, completed_attempts: u32) -> Duration {
        self.backoff_base * 2u32.saturating_pow(completed_attempts.saturating_sub(1))
    }
}

/// Runs one [`TaskRequest`] against one device.
///
/// All failures surface as a `Failure` [`TaskResult`]; nothing
/// propagates past [`execute`](TaskExecutor::execute). The session is
/// closed on every exit path.
pub struct TaskExecutor {
    factory: Arc<dyn SessionFactory>,
    connect_timeout: Duration,
    retry: RetryPolicy,
}

impl TaskExecutor {
    /// Create an executor over a session factory with default timeout
    /// and retry policy.
    pub fn new(factory: Arc<dyn SessionFactory>) -> Self {
        Self {
            factory,
            connect_timeout: Duration::from_secs(30),
            retry: RetryPolicy::default(),
        }
    }

    /// Set the per-attempt connect timeout (default: 30s).
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the connect retry policy.
    pub fn retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Execute the request, producing exactly one result.
    pub async fn execute(&self, request: &TaskRequest) -> TaskResult {
        let device = &request.device;
        let op = request.operation.label();
        let start = Instant::now();

        self.transition(device, op, TaskState::Idle, TaskState::Connecting);
        let mut session = match self.connect(device).await {
            Ok(session) => session,
            Err(err) => {
                self.transition(device, op, TaskState::Connecting, TaskState::ConnectFailed);
                error!("{op} on {}: {err}", device.name);
                return TaskResult::failure(&device.name, ErrorInfo::from(&err), start.elapsed());
            }
        };
        self.transition(device, op, TaskState::Connecting, TaskState::Connected);

        self.transition(device, op, TaskState::Connected, TaskState::Executing);
        let outcome = dispatch(session.as_mut(), &request.operation).await;

        // Close before reporting, success or not.
        if let Err(close_err) = session.close().await {
            warn!("{op} on {}: session close failed: {close_err}", device.name);
        }

        match outcome {
            Ok(output) => {
                self.transition(device, op, TaskState::Executing, TaskState::Completed);
                TaskResult::success(&device.name, output, start.elapsed())
            }
            Err(err) => {
                self.transition(device, op, TaskState::Executing, TaskState::ExecutionFailed);
                error!("{op} on {}: {err}", device.name);
                TaskResult::failure(&device.name, ErrorInfo::from(&err), start.elapsed())
            }
        }
    }

    /// Open a session, retrying per policy with exponential backoff.
    async fn connect(&self, device: &Device) -> Result<Box<dyn DeviceSession>, ConnectError> {
        let mut attempt = 1u32;
        loop {
            let result = tokio::time::timeout(self.connect_timeout, self.factory.open(device))
                .await
                .unwrap_or_else(|_| {
                    Err(ConnectError::Timeout {
                        host: device.host.clone(),
                        timeout: self.connect_timeout,
                    })
                });

            match result {
                Ok(session) => return Ok(session),
                Err(err) if attempt < self.retry.max_connect_attempts => {
                    let backoff = self.retry.backoff_for(attempt);
                    debug!(
                        "connect to {} failed (attempt {attempt}): {err}; retrying in {backoff:?}",
                        device.name
                    );
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    fn transition(&self, device: &Device, op: &str, from: TaskState, to: TaskState) {
        debug!("{op} on {}: {from:?} -> {to:?}", device.name);
    }
}

/// Run the operation on an open session.
async fn dispatch(
    session: &mut dyn DeviceSession,
    operation: &Operation,
) -> Result<TaskOutput, ExecutionError> {
    match operation {
        Operation::Backup { command } => session.run(command).await.map(TaskOutput::Text),

        Operation::GetNeighbors => {
            let raw = session.get_neighbors().await?;
            Ok(TaskOutput::Neighbors(neighbors::normalize(raw)))
        }

        Operation::PushConfig(plan) => {
            if plan.replace {
                let current = session.get_snmp().await?;
                let teardown = render_snmp_teardown(&current).map_err(render_failure)?;
                session.apply_config(&teardown).await?;
            }
            let target = render_snmp_config(plan).map_err(render_failure)?;
            let diff = session.apply_config(&target).await?;
            Ok(TaskOutput::Diff(diff))
        }
    }
}

/// A plan that cannot be rendered never reaches the device; report it
/// as a rejected configuration.
fn render_failure(err: RenderError) -> ExecutionError {
    ExecutionError::ConfigRejected {
        message: err.to_string(),
    }
}
