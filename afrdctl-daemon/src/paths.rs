use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ControlError;

pub const CONFIG_FILE: &str = "afrd.ini";
pub const DAEMON_BINARY: &str = "afrd";
pub const PREFERENCES_FILE: &str = "preferences.json";
pub const PID_FILE: &str = "afrd.pid";
pub const STATUS_REGION: &str = "afrd.ipc";

pub const DEFAULT_RUN_DIR: &str = "/dev/run";
pub const DEFAULT_PROC_ROOT: &str = "/proc";
pub const POLL_INTERVAL: Duration = Duration::from_secs(3);

/// `<cache>/afrdctl`, where the daemon binary and its config live.
pub fn default_cache_dir() -> Result<PathBuf, ControlError> {
    dirs::cache_dir()
        .map(|dir| dir.join("afrdctl"))
        .ok_or(ControlError::CacheDirNotFound)
}

/// Every filesystem location the controller touches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlPaths {
    pub config: PathBuf,
    pub daemon: PathBuf,
    pub preferences: PathBuf,
    pub pid_file: PathBuf,
    pub status_region: PathBuf,
    pub proc_root: PathBuf,
}

impl ControlPaths {
    /// Lay out files under `cache_dir` (ours) and `run_dir` (the daemon's).
    pub fn new(cache_dir: &Path, run_dir: &Path) -> Self {
        Self {
            config: cache_dir.join(CONFIG_FILE),
            daemon: cache_dir.join(DAEMON_BINARY),
            preferences: cache_dir.join(PREFERENCES_FILE),
            pid_file: run_dir.join(PID_FILE),
            status_region: run_dir.join(STATUS_REGION),
            proc_root: PathBuf::from(DEFAULT_PROC_ROOT),
        }
    }

    pub fn with_proc_root(mut self, proc_root: impl Into<PathBuf>) -> Self {
        self.proc_root = proc_root.into();
        self
    }

    /// `<proc_root>/<pid>/cmdline`
    pub fn cmdline_path(&self, pid: u32) -> PathBuf {
        self.proc_root.join(pid.to_string()).join("cmdline")
    }
}
