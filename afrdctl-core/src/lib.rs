//! afrdctl core library: config store, failure detection, errors.
//!
//! Public API surface:
//! - [`types`]: schema, [`ValueType`] and [`ConfigValue`]
//! - [`error`]: [`ConfigError`]
//! - [`config`]: format-preserving [`ConfigStore`]
//! - [`failure`]: [`FailureDetector`] circuit breaker
//! - [`preferences`]: underscore-keyed override layer

pub mod config;
pub mod error;
pub mod failure;
pub mod preferences;
pub mod types;

pub use config::{ConfigStore, RawLine};
pub use error::ConfigError;
pub use failure::FailureDetector;
pub use preferences::{PrefValue, Preferences};
pub use types::{ConfigValue, ValueType, SCHEMA};
