//! afrdctl — control the afrd auto frame rate daemon.
//!
//! # Usage
//!
//! ```text
//! afrdctl status [--json]
//! afrdctl restart | stop | reload
//! afrdctl config list | get <key> | set <key> <value> | unset <key>
//! afrdctl config import <prefs.json> | export <prefs.json>
//! afrdctl watch [--interval-secs N] [--expect-version V]
//! afrdctl logs [--lines N]
//! ```

mod commands;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};

use afrdctl_daemon::paths::{DEFAULT_PROC_ROOT, DEFAULT_RUN_DIR};
use afrdctl_daemon::{default_cache_dir, init_tracing, ControlPaths};

use commands::{config::ConfigCommand, logs::LogsArgs, status::StatusArgs, watch::WatchArgs};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "afrdctl",
    version,
    about = "Control the afrd auto frame rate daemon",
    long_about = None,
)]
struct Cli {
    #[command(flatten)]
    locations: Locations,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show whether the daemon runs and what it publishes.
    Status(StatusArgs),

    /// Kill the daemon and start it again with the current config.
    Restart,

    /// Kill the daemon.
    Stop,

    /// Ask the running daemon to re-read its config.
    Reload,

    /// Inspect and edit afrd.ini.
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },

    /// Keep the daemon alive and report refresh rate switches.
    Watch(WatchArgs),

    /// Print the tail of the daemon log.
    Logs(LogsArgs),
}

/// Where the daemon, its config and its runtime files live.
#[derive(Args, Debug, Clone)]
pub struct Locations {
    /// Directory holding the daemon binary, afrd.ini and preferences.json.
    #[arg(long, global = true, env = "AFRDCTL_CACHE_DIR", value_name = "DIR")]
    pub cache_dir: Option<PathBuf>,

    /// Directory where the daemon writes its PID file and status region.
    #[arg(
        long,
        global = true,
        env = "AFRDCTL_RUN_DIR",
        value_name = "DIR",
        default_value = DEFAULT_RUN_DIR
    )]
    pub run_dir: PathBuf,

    /// Root of the process table used for liveness checks.
    #[arg(
        long,
        global = true,
        env = "AFRDCTL_PROC_ROOT",
        value_name = "DIR",
        default_value = DEFAULT_PROC_ROOT
    )]
    pub proc_root: PathBuf,
}

impl Locations {
    pub fn paths(&self) -> Result<ControlPaths> {
        let cache_dir = match &self.cache_dir {
            Some(dir) => dir.clone(),
            None => default_cache_dir().context("could not determine cache directory")?,
        };
        Ok(ControlPaths::new(&cache_dir, &self.run_dir).with_proc_root(&self.proc_root))
    }
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let paths = cli.locations.paths()?;
    match cli.command {
        Commands::Status(args) => args.run(&paths),
        Commands::Restart => commands::control::restart(&paths),
        Commands::Stop => commands::control::stop(&paths),
        Commands::Reload => commands::control::reload(&paths),
        Commands::Config { command } => commands::config::run(command, &paths),
        Commands::Watch(args) => args.run(&paths),
        Commands::Logs(args) => args.run(&paths),
    }
}
