use std::path::PathBuf;

use thiserror::Error;

/// Error surface for status-channel, process-control and supervisor operations.
#[derive(Debug, Error)]
pub enum ControlError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("config error: {0}")]
    Config(#[from] afrdctl_core::ConfigError),

    #[error("cannot determine cache directory; pass --cache-dir")]
    CacheDirNotFound,

    #[error("privileged command failed to start: {command}: {source}")]
    Privileged {
        command: String,
        #[source]
        source: std::io::Error,
    },
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> ControlError {
    ControlError::Io {
        path: path.into(),
        source,
    }
}
