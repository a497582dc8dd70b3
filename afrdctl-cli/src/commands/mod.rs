pub mod config;
pub mod control;
pub mod logs;
pub mod status;
pub mod watch;
