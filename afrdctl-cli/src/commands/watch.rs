//! `afrdctl watch` — foreground supervisor.

use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use afrdctl_daemon::paths::POLL_INTERVAL;
use afrdctl_daemon::{start_blocking, ControlPaths, ProcessController, RestartReason, Supervisor};

#[derive(Args, Debug)]
pub struct WatchArgs {
    /// Seconds between polls of the status region.
    #[arg(long, default_value_t = POLL_INTERVAL.as_secs())]
    pub interval_secs: u64,

    /// Restart the daemon whenever it reports a different version.
    #[arg(long, value_name = "VERSION")]
    pub expect_version: Option<String>,

    /// Print every report as a JSON line instead of text.
    #[arg(long)]
    pub json: bool,
}

impl WatchArgs {
    pub fn run(self, paths: &ControlPaths) -> Result<()> {
        let interval = Duration::from_secs(self.interval_secs.max(1));
        let controller = ProcessController::new(paths.clone());
        let mut supervisor = Supervisor::new(controller, self.expect_version);
        let json = self.json;

        start_blocking(&mut supervisor, interval, |report| {
            if json {
                match serde_json::to_string(report) {
                    Ok(line) => println!("{line}"),
                    Err(err) => tracing::warn!(error = %err, "cannot serialize tick report"),
                }
                return;
            }
            if let Some(reason) = &report.restarted {
                println!("{} {}", "restarted".yellow().bold(), describe(reason));
            }
            if let Some(hz) = report.rate_change {
                println!("{} {hz} Hz", "rate".green().bold());
            }
        })
        .context("supervisor exited with error")
    }
}

fn describe(reason: &RestartReason) -> String {
    match reason {
        RestartReason::FirstRun => "daemon was not publishing status".to_string(),
        RestartReason::VersionMismatch { running, expected } => {
            format!("daemon {running} replaced by {expected}")
        }
        RestartReason::StatusUnavailable => "status region stayed unavailable".to_string(),
        RestartReason::NotRunning => "daemon process was gone".to_string(),
    }
}
