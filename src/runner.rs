//! Fan-out coordinator: one task per inventory device, bounded
//! concurrency, partial-failure isolation.

use std::sync::Arc;
use std::time::Duration;

use indexmap::IndexMap;
use log::{debug, info, warn};
use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::inventory::{Device, Inventory};
use crate::task::{ErrorInfo, ErrorKind, Operation, TaskExecutor, TaskRequest, TaskResult};

/// Aggregated results of one run: exactly one [`TaskResult`] per
/// inventory device, in inventory order.
#[derive(Debug, Serialize)]
pub struct RunReport {
    results: IndexMap<String, TaskResult>,
}

impl RunReport {
    /// Number of devices in the report.
    pub fn len(&self) -> usize {
        self.results.len()
    }

    /// True when the report covers no devices.
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Look up a device's result.
    pub fn get(&self, device_name: &str) -> Option<&TaskResult> {
        self.results.get(device_name)
    }

    /// Iterate results in inventory order.
    pub fn iter(&self) -> impl Iterator<Item = &TaskResult> {
        self.results.values()
    }

    /// Count of successful tasks.
    pub fn succeeded(&self) -> usize {
        self.results.values().filter(|r| r.is_success()).count()
    }

    /// Count of failed tasks.
    pub fn failed(&self) -> usize {
        self.results.len() - self.succeeded()
    }

    /// One-line human summary.
    pub fn summary(&self) -> String {
        format!("{} succeeded, {} failed", self.succeeded(), self.failed())
    }
}

/// Runs an operation across a whole inventory with bounded concurrency.
///
/// The central invariant: one device's failure never cancels or blocks
/// the others, and the report always holds one entry per device.
pub struct FanOut {
    executor: Arc<TaskExecutor>,
    concurrency: usize,
    run_timeout: Option<Duration>,
}

impl FanOut {
    /// Coordinator over an executor with the default worker limit (10).
    pub fn new(executor: TaskExecutor) -> Self {
        Self {
            executor: Arc::new(executor),
            concurrency: 10,
            run_timeout: None,
        }
    }

    /// Set the worker limit (minimum 1).
    pub fn concurrency(mut self, limit: usize) -> Self {
        self.concurrency = limit.max(1);
        self
    }

    /// Set a run-wide timeout. When it fires, no new tasks are
    /// dispatched; in-flight tasks run to completion under their own
    /// timeouts.
    pub fn run_timeout(mut self, timeout: Duration) -> Self {
        self.run_timeout = Some(timeout);
        self
    }

    /// Run `resolve`'s operation against every device in the inventory.
    pub async fn run<F>(&self, inventory: &Inventory, resolve: F) -> RunReport
    where
        F: Fn(&Device) -> Operation,
    {
        self.run_with_cancel(inventory, resolve, CancellationToken::new())
            .await
    }

    /// Like [`run`](Self::run), with an externally controlled
    /// cancellation token. Cancellation stops dispatch; it never kills
    /// a task mid-operation.
    pub async fn run_with_cancel<F>(
        &self,
        inventory: &Inventory,
        resolve: F,
        cancel: CancellationToken,
    ) -> RunReport
    where
        F: Fn(&Device) -> Operation,
    {
        let watchdog = self.run_timeout.map(|timeout| {
            let token = cancel.clone();
            tokio::spawn(async move {
                tokio::time::sleep(timeout).await;
                debug!("run timeout of {timeout:?} reached, cancelling dispatch");
                token.cancel();
            })
        });

        // Pre-seed one slot per device so the report size is fixed up
        // front, whatever happens to the individual tasks.
        let mut slots: IndexMap<String, Option<TaskResult>> = inventory
            .names()
            .map(|name| (name.to_string(), None))
            .collect();

        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut tasks = JoinSet::new();

        for device in inventory.iter() {
            if cancel.is_cancelled() {
                slots.insert(device.name.clone(), Some(cancelled_result(&device.name)));
                continue;
            }

            let request = TaskRequest::new(device.clone(), resolve(device));
            let executor = self.executor.clone();
            let semaphore = semaphore.clone();
            let cancel = cancel.clone();

            tasks.spawn(async move {
                // Wait for a worker slot, unless the run is cancelled
                // first. A task that never got a slot was never
                // dispatched and must not touch the device.
                let permit = tokio::select! {
                    biased;
                    () = cancel.cancelled() => None,
                    permit = semaphore.acquire_owned() => permit.ok(),
                };

                let name = request.device.name.clone();
                let result = match permit {
                    Some(_permit) => executor.execute(&request).await,
                    None => cancelled_result(&name),
                };
                (name, result)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((name, result)) => {
                    slots.insert(name, Some(result));
                }
                Err(join_err) => {
                    // Name is lost on panic; the slot fill below
                    // keeps the per-device invariant.
                    warn!("device task aborted: {join_err}");
                }
            }
        }

        if let Some(handle) = watchdog {
            handle.abort();
        }

        let results: IndexMap<String, TaskResult> = slots
            .into_iter()
            .map(|(name, slot)| {
                let result = slot.unwrap_or_else(|| {
                    TaskResult::failure(
                        &name,
                        ErrorInfo::new(
                            ErrorKind::Aborted,
                            "device task died without producing a result",
                        ),
                        Duration::ZERO,
                    )
                });
                (name, result)
            })
            .collect();

        let report = RunReport { results };
        info!("run complete: {}", report.summary());
        report
    }
}

fn cancelled_result(name: &str) -> TaskResult {
    TaskResult::failure(
        name,
        ErrorInfo::new(ErrorKind::Cancelled, "run cancelled before dispatch"),
        Duration::ZERO,
    )
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicI32, Ordering};

    use async_trait::async_trait;
    use indexmap::IndexMap;

    use super::*;
    use crate::error::{ConnectError, ExecutionError};
    use crate::inventory::{Credentials, DeviceType};
    use crate::neighbors::RawNeighbors;
    use crate::session::{DeviceSession, DiffResult, SessionFactory};
    use crate::snmp::SnmpState;
    use crate::task::TaskStatus;

    fn inventory(names: &[&str]) -> Inventory {
        let creds = Credentials::new("admin", "secret");
        let devices = names.iter().map(|name| Device {
            name: (*name).to_string(),
            device_type: DeviceType::Ios,
            host: format!("{name}.lab"),
            credentials: creds.clone(),
            extra: IndexMap::new(),
        });
        Inventory::from_devices(devices).unwrap()
    }

    struct EchoSession {
        output: String,
        gauge: Arc<Gauge>,
    }

    #[async_trait]
    impl DeviceSession for EchoSession {
        async fn run(&mut self, _command: &str) -> Result<String, ExecutionError> {
            tokio::time::sleep(Duration::from_millis(10)).await;
            Ok(self.output.clone())
        }

        async fn get_neighbors(&mut self) -> Result<RawNeighbors, ExecutionError> {
            Ok(RawNeighbors::new())
        }

        async fn get_snmp(&mut self) -> Result<SnmpState, ExecutionError> {
            Ok(SnmpState::default())
        }

        async fn apply_config(&mut self, _config: &str) -> Result<DiffResult, ExecutionError> {
            Ok(DiffResult::unchanged())
        }

        async fn close(self: Box<Self>) -> Result<(), ExecutionError> {
            self.gauge.dec();
            Ok(())
        }
    }

    /// Tracks how many sessions are open at once.
    #[derive(Default)]
    struct Gauge {
        current: AtomicI32,
        peak: Mutex<i32>,
    }

    impl Gauge {
        fn inc(&self) {
            let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
            let mut peak = self.peak.lock().unwrap();
            *peak = (*peak).max(now);
        }

        fn dec(&self) {
            self.current.fetch_sub(1, Ordering::SeqCst);
        }

        fn peak(&self) -> i32 {
            *self.peak.lock().unwrap()
        }
    }

    /// Connects everything except devices whose name starts with "bad",
    /// optionally slowing each open down.
    struct LabFactory {
        gauge: Arc<Gauge>,
        open_delay: Duration,
    }

    impl LabFactory {
        fn new() -> Self {
            Self {
                gauge: Arc::new(Gauge::default()),
                open_delay: Duration::ZERO,
            }
        }
    }

    #[async_trait]
    impl SessionFactory for LabFactory {
        async fn open(&self, device: &Device) -> Result<Box<dyn DeviceSession>, ConnectError> {
            tokio::time::sleep(self.open_delay).await;
            if device.name.starts_with("bad") {
                return Err(ConnectError::Unreachable {
                    host: device.host.clone(),
                    message: "simulated".to_string(),
                });
            }
            if device.name.starts_with("panic") {
                panic!("simulated driver bug");
            }
            self.gauge.inc();
            Ok(Box::new(EchoSession {
                output: format!("config of {}", device.name),
                gauge: self.gauge.clone(),
            }))
        }
    }

    fn fan_out(factory: LabFactory) -> FanOut {
        FanOut::new(TaskExecutor::new(Arc::new(factory)))
    }

    #[tokio::test]
    async fn test_one_result_per_device_in_inventory_order() {
        let inventory = inventory(&["r1", "bad1", "r2", "bad2", "r3"]);
        let report = fan_out(LabFactory::new())
            .run(&inventory, |_| Operation::backup("show running-config"))
            .await;

        assert_eq!(report.len(), 5);
        let names: Vec<&str> = report.iter().map(|r| r.device_name.as_str()).collect();
        assert_eq!(names, vec!["r1", "bad1", "r2", "bad2", "r3"]);
    }

    #[tokio::test]
    async fn test_failures_do_not_block_other_devices() {
        let inventory = inventory(&["bad1", "r1"]);
        let report = fan_out(LabFactory::new())
            .run(&inventory, |_| Operation::backup("show running-config"))
            .await;

        assert_eq!(report.get("bad1").unwrap().status, TaskStatus::Failure);
        let r1 = report.get("r1").unwrap();
        assert_eq!(r1.status, TaskStatus::Success);
        assert_eq!(
            r1.output.as_ref().unwrap().as_text(),
            Some("config of r1")
        );
        assert_eq!(report.summary(), "1 succeeded, 1 failed");
    }

    #[tokio::test]
    async fn test_concurrency_is_bounded() {
        let factory = LabFactory::new();
        let gauge = factory.gauge.clone();
        let inventory = inventory(&["r1", "r2", "r3", "r4", "r5", "r6"]);

        let report = fan_out(factory)
            .concurrency(2)
            .run(&inventory, |_| Operation::backup("show version"))
            .await;

        assert_eq!(report.succeeded(), 6);
        assert!(gauge.peak() <= 2, "peak was {}", gauge.peak());
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_timeout_cancels_undispatched_tasks() {
        let mut factory = LabFactory::new();
        factory.open_delay = Duration::from_millis(200);
        let inventory = inventory(&["r1", "r2", "r3"]);

        let report = fan_out(factory)
            .concurrency(1)
            .run_timeout(Duration::from_millis(50))
            .run(&inventory, |_| Operation::backup("show version"))
            .await;

        // every device still gets a result
        assert_eq!(report.len(), 3);
        // the single in-flight task was allowed to finish
        assert_eq!(report.succeeded(), 1);
        // the rest were never dispatched
        let cancelled = report
            .iter()
            .filter(|r| {
                r.error
                    .as_ref()
                    .is_some_and(|e| e.kind == ErrorKind::Cancelled)
            })
            .count();
        assert_eq!(cancelled, 2);
    }

    #[tokio::test]
    async fn test_panicking_task_still_yields_a_result() {
        let inventory = inventory(&["r1", "panic1"]);
        let report = fan_out(LabFactory::new())
            .run(&inventory, |_| Operation::backup("show version"))
            .await;

        assert_eq!(report.len(), 2);
        assert_eq!(report.get("r1").unwrap().status, TaskStatus::Success);
        let panicked = report.get("panic1").unwrap();
        assert_eq!(panicked.status, TaskStatus::Failure);
        // a panic is reported as an abort, not a command failure
        assert_eq!(panicked.error.as_ref().unwrap().kind, ErrorKind::Aborted);
    }

    #[tokio::test]
    async fn test_resolver_sees_each_device() {
        let inventory = inventory(&["r1", "r2"]);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();

        fan_out(LabFactory::new())
            .run(&inventory, move |device| {
                seen_clone.lock().unwrap().push(device.name.clone());
                Operation::backup("show running-config")
            })
            .await;

        let mut names = seen.lock().unwrap().clone();
        names.sort();
        assert_eq!(names, vec!["r1", "r2"]);
    }
}
