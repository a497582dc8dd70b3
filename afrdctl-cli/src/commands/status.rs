//! `afrdctl status` — daemon liveness and published state.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use afrdctl_daemon::{ControlPaths, ProcessController, StatusChannel, StatusSnapshot};

/// Arguments for `afrdctl status`.
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

impl StatusArgs {
    pub fn run(self, paths: &ControlPaths) -> Result<()> {
        let report = build_report(paths);
        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&report).context("failed to serialize status JSON")?
            );
            return Ok(());
        }
        print_table(&report);
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct StatusReport {
    running: bool,
    pid: Option<u32>,
    status_region: String,
    status: Option<SnapshotJson>,
}

#[derive(Debug, Serialize)]
struct SnapshotJson {
    stamp: u32,
    version: String,
    build_date: String,
    enabled: bool,
    modified: bool,
    blackened: bool,
    current_hz: String,
    original_hz: String,
}

impl From<&StatusSnapshot> for SnapshotJson {
    fn from(snap: &StatusSnapshot) -> Self {
        Self {
            stamp: snap.change_stamp,
            version: snap.version(),
            build_date: snap.build_date.clone(),
            enabled: snap.enabled,
            modified: snap.modified,
            blackened: snap.blackened,
            current_hz: snap.current_hz.to_string(),
            original_hz: snap.original_hz.to_string(),
        }
    }
}

#[derive(Tabled)]
struct StatusRow {
    #[tabled(rename = "field")]
    field: &'static str,
    #[tabled(rename = "value")]
    value: String,
}

fn build_report(paths: &ControlPaths) -> StatusReport {
    let controller = ProcessController::new(paths.clone());
    let pid = controller.running_pid().ok().flatten();

    let mut channel = StatusChannel::new(&paths.status_region);
    let status = if channel.open() && channel.refresh() {
        channel.snapshot().map(SnapshotJson::from)
    } else {
        None
    };

    StatusReport {
        running: pid.is_some(),
        pid,
        status_region: paths.status_region.display().to_string(),
        status,
    }
}

fn flag(value: bool) -> String {
    if value {
        "yes".green().to_string()
    } else {
        "no".bright_black().to_string()
    }
}

fn print_table(report: &StatusReport) {
    let daemon = match report.pid {
        Some(pid) => format!("{} (pid {pid})", "running".green().bold()),
        None => "not running".red().bold().to_string(),
    };
    println!("afrd: {daemon}");

    let Some(status) = &report.status else {
        println!("no status published at {}", report.status_region);
        return;
    };

    let rows = vec![
        StatusRow {
            field: "version",
            value: status.version.clone(),
        },
        StatusRow {
            field: "build date",
            value: status.build_date.clone(),
        },
        StatusRow {
            field: "enabled",
            value: flag(status.enabled),
        },
        StatusRow {
            field: "config modified",
            value: flag(status.modified),
        },
        StatusRow {
            field: "screen blackened",
            value: flag(status.blackened),
        },
        StatusRow {
            field: "current rate",
            value: format!("{} Hz", status.current_hz),
        },
        StatusRow {
            field: "original rate",
            value: format!("{} Hz", status.original_hz),
        },
    ];
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");
}
