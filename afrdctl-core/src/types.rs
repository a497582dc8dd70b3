//! Domain types for the daemon configuration file.
//!
//! Every known key has a declared [`ValueType`]; values of unknown keys are
//! kept as opaque strings. Textual rendering (`Display`) is what decides
//! whether a `put` modified the store.

use std::fmt;

use crate::error::ConfigError;

// ---------------------------------------------------------------------------
// Schema
// ---------------------------------------------------------------------------

/// Declared type of a schema key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    Bool,
    Int,
    String,
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ValueType::Bool => "bool",
            ValueType::Int => "int",
            ValueType::String => "string",
        };
        f.write_str(s)
    }
}

/// Keys understood by the daemon, in the order its documentation lists them.
pub const SCHEMA: &[(&str, ValueType)] = &[
    ("enable", ValueType::Bool),
    ("log.enable", ValueType::Bool),
    ("log.file", ValueType::String),
    ("mode.prefer.exact", ValueType::Bool),
    ("mode.use.fract", ValueType::String),
    ("mode.blacklist.rates", ValueType::String),
    ("mode.extra", ValueType::String),
    ("cs.select", ValueType::String),
    ("switch.delay.on", ValueType::Int),
    ("switch.delay.off", ValueType::Int),
    ("switch.delay.retry", ValueType::Int),
    ("switch.timeout", ValueType::Int),
    ("switch.blackout", ValueType::Int),
];

/// Declared type of `key`, or `None` for keys outside the schema.
pub fn value_type(key: &str) -> Option<ValueType> {
    SCHEMA
        .iter()
        .find(|(name, _)| *name == key)
        .map(|(_, ty)| *ty)
}

/// Schema keys in declaration order.
pub fn keys() -> impl Iterator<Item = &'static str> {
    SCHEMA.iter().map(|(name, _)| *name)
}

/// `true` if `key` is part of the schema.
pub fn is_schema_key(key: &str) -> bool {
    value_type(key).is_some()
}

// ---------------------------------------------------------------------------
// Values
// ---------------------------------------------------------------------------

/// A typed configuration value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigValue {
    Bool(bool),
    Int(i32),
    Str(String),
}

impl ConfigValue {
    /// Coerce `text` to `ty`.
    ///
    /// Bool: `0`, `false` and `no` (any case, trimmed) are false, anything
    /// else is true. Int: base-10, surrounding whitespace ignored. String:
    /// trimmed.
    pub fn parse_as(ty: ValueType, key: &str, text: &str) -> Result<Self, ConfigError> {
        let text = text.trim();
        match ty {
            ValueType::Bool => Ok(ConfigValue::Bool(parse_bool(text))),
            ValueType::Int => text
                .parse::<i32>()
                .map(ConfigValue::Int)
                .map_err(|source| ConfigError::InvalidInt {
                    key: key.to_string(),
                    value: text.to_string(),
                    source,
                }),
            ValueType::String => Ok(ConfigValue::Str(text.to_string())),
        }
    }

    /// Coerce `text` per the schema type of `key`; unknown keys stay strings.
    pub fn parse_for_key(key: &str, text: &str) -> Result<Self, ConfigError> {
        Self::parse_as(value_type(key).unwrap_or(ValueType::String), key, text)
    }

    /// The form written to the config file: booleans become `1`/`0`.
    pub fn to_file_text(&self) -> String {
        match self {
            ConfigValue::Bool(true) => "1".to_string(),
            ConfigValue::Bool(false) => "0".to_string(),
            other => other.to_string(),
        }
    }

    pub fn as_bool(&self) -> bool {
        match self {
            ConfigValue::Bool(b) => *b,
            other => parse_bool(&other.to_string()),
        }
    }

    /// Integer view; `None` when the textual form is not an integer.
    pub fn as_int(&self) -> Option<i32> {
        match self {
            ConfigValue::Int(n) => Some(*n),
            other => other.to_string().trim().parse().ok(),
        }
    }
}

impl fmt::Display for ConfigValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigValue::Bool(b) => b.fmt(f),
            ConfigValue::Int(n) => n.fmt(f),
            ConfigValue::Str(s) => s.fmt(f),
        }
    }
}

impl From<bool> for ConfigValue {
    fn from(b: bool) -> Self {
        ConfigValue::Bool(b)
    }
}

impl From<i32> for ConfigValue {
    fn from(n: i32) -> Self {
        ConfigValue::Int(n)
    }
}

impl From<&str> for ConfigValue {
    fn from(s: &str) -> Self {
        ConfigValue::Str(s.to_owned())
    }
}

impl From<String> for ConfigValue {
    fn from(s: String) -> Self {
        ConfigValue::Str(s)
    }
}

/// Boolean text rule shared by the config file and preferences.
pub fn parse_bool(text: &str) -> bool {
    let text = text.trim().to_ascii_lowercase();
    !matches!(text.as_str(), "0" | "false" | "no")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_lookup() {
        assert_eq!(value_type("enable"), Some(ValueType::Bool));
        assert_eq!(value_type("switch.delay.on"), Some(ValueType::Int));
        assert_eq!(value_type("log.file"), Some(ValueType::String));
        assert_eq!(value_type("no.such.key"), None);
        assert_eq!(keys().next(), Some("enable"));
        assert_eq!(keys().count(), SCHEMA.len());
    }

    #[test]
    fn bool_text_rule() {
        for falsy in ["0", "false", " FALSE ", "No", "no"] {
            assert!(!parse_bool(falsy), "{falsy:?} must be false");
        }
        for truthy in ["1", "true", "yes", "", "off"] {
            assert!(parse_bool(truthy), "{truthy:?} must be true");
        }
    }

    #[test]
    fn int_parse_error_names_key() {
        let err = ConfigValue::parse_as(ValueType::Int, "switch.timeout", "12x").unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("switch.timeout"), "got: {msg}");
        assert!(msg.contains("12x"), "got: {msg}");
    }

    #[test]
    fn file_text_renders_bools_as_digits() {
        assert_eq!(ConfigValue::Bool(true).to_file_text(), "1");
        assert_eq!(ConfigValue::Bool(false).to_file_text(), "0");
        assert_eq!(ConfigValue::Bool(true).to_string(), "true");
        assert_eq!(ConfigValue::Int(-5).to_file_text(), "-5");
    }

    #[test]
    fn cross_type_views_use_text() {
        assert!(!ConfigValue::Int(0).as_bool());
        assert!(ConfigValue::Str("yes".into()).as_bool());
        assert_eq!(ConfigValue::Str(" 42 ".into()).as_int(), Some(42));
        assert_eq!(ConfigValue::Str("abc".into()).as_int(), None);
        assert_eq!(ConfigValue::Bool(true).as_int(), None);
    }
}
