//! Error types for afrdctl-core.

use std::num::ParseIntError;
use std::path::PathBuf;

use thiserror::Error;

/// All errors that can arise from config and preference operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Underlying I/O failure, annotated with the file involved.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// An integer-typed key holds text that is not a base-10 integer.
    #[error("invalid integer for '{key}': '{value}': {source}")]
    InvalidInt {
        key: String,
        value: String,
        #[source]
        source: ParseIntError,
    },

    /// Preferences JSON could not be parsed or serialized.
    #[error("failed to parse preferences at {path}: {source}")]
    Preferences {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Convenience constructor for [`ConfigError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> ConfigError {
    ConfigError::Io {
        path: path.into(),
        source,
    }
}
