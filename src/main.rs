//! netherd CLI: run one operation across every device in an inventory.
//!
//! Exit-code policy: a broken inventory or missing credentials aborts
//! with a non-zero exit; per-device failures are reported in the
//! summary and still exit zero.

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use log::{error, warn};

use netherd::{
    CommandTable, Credentials, FanOut, Inventory, Operation, ResultSink, RetryPolicy,
    SnmpPlan, TaskExecutor, TaskResult, UnavailableFactory, collect_topology, write_topology,
};

#[derive(Parser)]
#[command(
    name = "netherd",
    version,
    about = "Concurrent task runner for network device fleets"
)]
struct Cli {
    /// Inventory document.
    #[arg(long, global = true, default_value = "hosts.yaml")]
    inventory: PathBuf,

    /// Login username for all devices.
    #[arg(long, env = "NETHERD_USERNAME")]
    username: String,

    /// Login password for all devices.
    #[arg(long, env = "NETHERD_PASSWORD", hide_env_values = true)]
    password: String,

    /// Worker limit for concurrent devices.
    #[arg(long, global = true, default_value_t = 10)]
    concurrency: usize,

    /// Per-attempt connect timeout, seconds.
    #[arg(long, global = true, default_value_t = 30)]
    connect_timeout: u64,

    /// Total connect attempts per device (1 = no retry).
    #[arg(long, global = true, default_value_t = 1)]
    connect_attempts: u32,

    /// Optional run-wide timeout, seconds. Stops dispatching new
    /// devices when it fires; in-flight devices finish.
    #[arg(long, global = true)]
    run_timeout: Option<u64>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Back up running configuration, one file per device.
    Backup {
        /// Directory for the per-device `.cfg` files.
        #[arg(long, default_value = "backup")]
        backup_dir: PathBuf,

        /// Write an empty file for failed devices (legacy behavior).
        #[arg(long)]
        write_empty_on_failure: bool,
    },

    /// Gather LLDP neighbors into a JSON topology document.
    Neighbors {
        /// Output document path.
        #[arg(long, default_value = "lldp_neighbors.json")]
        output: PathBuf,
    },

    /// Push SNMP configuration from a plan document.
    Snmp {
        /// YAML plan with communities, contact, and location.
        #[arg(long)]
        plan: PathBuf,

        /// Tear down current SNMP config before applying the plan.
        #[arg(long)]
        replace: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let credentials = Credentials::new(cli.username, cli.password);
    let inventory = Inventory::load(&cli.inventory, &credentials)?;

    let executor = TaskExecutor::new(Arc::new(UnavailableFactory))
        .connect_timeout(Duration::from_secs(cli.connect_timeout))
        .retry_policy(RetryPolicy {
            max_connect_attempts: cli.connect_attempts.max(1),
            ..RetryPolicy::default()
        });

    let mut fan_out = FanOut::new(executor).concurrency(cli.concurrency);
    if let Some(secs) = cli.run_timeout {
        fan_out = fan_out.run_timeout(Duration::from_secs(secs));
    }

    let command = cli.command.unwrap_or(Command::Backup {
        backup_dir: PathBuf::from("backup"),
        write_empty_on_failure: false,
    });

    match command {
        Command::Backup {
            backup_dir,
            write_empty_on_failure,
        } => {
            let commands = CommandTable::default();
            let report = fan_out
                .run(&inventory, |device| {
                    Operation::backup(commands.command_for(device.device_type))
                })
                .await;

            let sink = ResultSink::new(backup_dir).write_empty_on_failure(write_empty_on_failure);
            let persist_errors = sink.persist_backups(&report);
            if !persist_errors.is_empty() {
                warn!("{} backup file(s) could not be written", persist_errors.len());
            }
            println!("{}", report.summary());
        }

        Command::Neighbors { output } => {
            let report = fan_out.run(&inventory, |_| Operation::GetNeighbors).await;
            let topology = collect_topology(&report);

            println!("{}", serde_json::to_string_pretty(&topology)?);
            if let Err(err) = write_topology(&output, &topology) {
                error!("topology document not written: {err}");
            }
            println!("{}", report.summary());
        }

        Command::Snmp { plan, replace } => {
            let mut plan: SnmpPlan = serde_yaml::from_str(&fs::read_to_string(&plan)?)?;
            if replace {
                plan.replace = true;
            }

            let report = fan_out
                .run(&inventory, |_| Operation::PushConfig(plan.clone()))
                .await;
            for result in report.iter() {
                if let Some(changes) = describe_config_changes(result) {
                    println!("{changes}");
                }
            }
            println!("{}", report.summary());
        }
    }

    Ok(())
}

/// Per-device config-change report for a push result, `None` for
/// failed devices and non-push results.
fn describe_config_changes(result: &TaskResult) -> Option<String> {
    let diff = result.output.as_ref()?.as_diff()?;
    if diff.changed {
        Some(format!("{}: changed\n{}", result.device_name, diff.diff))
    } else {
        Some(format!("{}: no changes", result.device_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use netherd::{DiffResult, ErrorInfo, ErrorKind, TaskOutput};

    #[test]
    fn test_describe_config_changes_with_diff() {
        let result = TaskResult::success(
            "r1",
            TaskOutput::Diff(DiffResult::changed("+snmp-server community public RO")),
            Duration::ZERO,
        );
        let changes = describe_config_changes(&result).unwrap();
        assert!(changes.starts_with("r1: changed"));
        assert!(changes.contains("+snmp-server community public RO"));
    }

    #[test]
    fn test_describe_config_changes_without_diff() {
        let result = TaskResult::success(
            "r1",
            TaskOutput::Diff(DiffResult::unchanged()),
            Duration::ZERO,
        );
        assert_eq!(
            describe_config_changes(&result).as_deref(),
            Some("r1: no changes")
        );
    }

    #[test]
    fn test_describe_config_changes_skips_failures() {
        let result = TaskResult::failure(
            "r2",
            ErrorInfo::new(ErrorKind::Timeout, "timed out"),
            Duration::ZERO,
        );
        assert!(describe_config_changes(&result).is_none());
    }
}
