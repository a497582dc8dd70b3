//! `afrdctl logs` — tail of the file afrd logs to.

use std::collections::VecDeque;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use anyhow::{Context, Result};
use clap::Args;

use afrdctl_core::ConfigStore;
use afrdctl_daemon::ControlPaths;

/// Config key naming the daemon log file.
const LOG_FILE_KEY: &str = "log.file";

#[derive(Args, Debug)]
pub struct LogsArgs {
    /// Number of trailing lines to show.
    #[arg(long, default_value_t = 100)]
    pub lines: usize,
}

impl LogsArgs {
    pub fn run(self, paths: &ControlPaths) -> Result<()> {
        let mut store = ConfigStore::new();
        if paths.config.exists() {
            store
                .load(&paths.config)
                .with_context(|| format!("failed to load {}", paths.config.display()))?;
        }

        let log_file = store.get_string(LOG_FILE_KEY, "");
        if log_file.is_empty() {
            println!("{LOG_FILE_KEY} is not set in {}", paths.config.display());
            return Ok(());
        }
        if !store.get_bool("log.enable", false) {
            println!("note: log.enable is off, the log may be stale");
        }
        print_tail(Path::new(&log_file), self.lines)
    }
}

fn print_tail(path: &Path, lines: usize) -> Result<()> {
    if !path.exists() {
        println!("log file not found: {}", path.display());
        return Ok(());
    }

    let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let reader = BufReader::new(file);

    let mut tail = VecDeque::<String>::with_capacity(lines);
    for line in reader.lines() {
        let line = line.with_context(|| format!("read {}", path.display()))?;
        if lines == 0 {
            continue;
        }
        if tail.len() == lines {
            tail.pop_front();
        }
        tail.push_back(line);
    }

    println!("==> {} <==", path.display());
    for line in tail {
        println!("{line}");
    }
    Ok(())
}
