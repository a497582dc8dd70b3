//! Daemon-facing half of afrdctl: status region reader, process control and
//! the supervisor poll loop.

mod error;
pub mod layout;
pub mod paths;
mod process;
mod runtime;
mod status;

pub use error::ControlError;
pub use layout::{Hz, RecordFault, StatusSnapshot};
pub use paths::{default_cache_dir, ControlPaths};
pub use process::{parse_pid, PrivilegedShell, ProcessController, SuShell};
pub use runtime::{
    init_tracing, start_blocking, RestartReason, Supervisor, TickReport, RESTART_GRACE,
};
pub use status::{StatusChannel, STATUS_OPERATION};
