//! Underscore-keyed override layer kept by front ends.
//!
//! Persists a flat JSON object at `<cache-dir>/preferences.json`:
//!
//! ```json
//! { "enable": true, "switch_delay_on": "500", "mode_extra": "" }
//! ```
//!
//! Keys are config keys with `.` replaced by `_`. Writes use the same
//! `.tmp` + rename pattern as the config file.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::config::ConfigStore;
use crate::error::{io_err, ConfigError};
use crate::types::{parse_bool, value_type, ConfigValue, ValueType, SCHEMA};

/// One stored preference value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PrefValue {
    Bool(bool),
    Int(i64),
    Text(String),
}

impl PrefValue {
    /// Coerce to `ty`; `None` when the value cannot represent it.
    fn coerce(&self, ty: ValueType) -> Option<ConfigValue> {
        match (ty, self) {
            (ValueType::Bool, PrefValue::Bool(b)) => Some(ConfigValue::Bool(*b)),
            (ValueType::Bool, PrefValue::Text(s)) => Some(ConfigValue::Bool(parse_bool(s))),
            (ValueType::Bool, PrefValue::Int(n)) => Some(ConfigValue::Bool(*n != 0)),
            (ValueType::Int, PrefValue::Int(n)) => i32::try_from(*n).ok().map(ConfigValue::Int),
            (ValueType::Int, PrefValue::Text(s)) => s.trim().parse().ok().map(ConfigValue::Int),
            (ValueType::Int, PrefValue::Bool(_)) => None,
            (ValueType::String, PrefValue::Text(s)) => Some(ConfigValue::Str(s.clone())),
            (ValueType::String, PrefValue::Int(n)) => Some(ConfigValue::Str(n.to_string())),
            (ValueType::String, PrefValue::Bool(b)) => Some(ConfigValue::Str(b.to_string())),
        }
    }
}

/// Flat map of underscore-keyed preference values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Preferences {
    pub entries: BTreeMap<String, PrefValue>,
}

/// `switch.delay.on` → `switch_delay_on`
pub fn pref_key(config_key: &str) -> String {
    config_key.replace('.', "_")
}

/// `switch_delay_on` → `switch.delay.on`
pub fn config_key(pref_key: &str) -> String {
    pref_key.replace('_', ".")
}

impl Preferences {
    /// Load preferences from `path`; a missing file yields an empty set.
    pub fn load_at(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(path).map_err(|e| io_err(path, e))?;
        serde_json::from_str(&contents).map_err(|source| ConfigError::Preferences {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Atomically write preferences to `path`.
    pub fn save_at(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
            }
        }
        let json = serde_json::to_string_pretty(self).map_err(|source| {
            ConfigError::Preferences {
                path: path.to_path_buf(),
                source,
            }
        })?;
        let tmp = PathBuf::from(format!("{}.tmp", path.display()));
        fs::write(&tmp, json).map_err(|e| io_err(&tmp, e))?;
        if let Err(e) = fs::rename(&tmp, path) {
            let _ = fs::remove_file(&tmp);
            return Err(io_err(path, e));
        }
        Ok(())
    }

    pub fn insert(&mut self, key: impl Into<String>, value: PrefValue) {
        self.entries.insert(key.into(), value);
    }

    pub fn get(&self, key: &str) -> Option<&PrefValue> {
        self.entries.get(key)
    }
}

impl ConfigStore {
    /// Merge `prefs` on top of the store.
    ///
    /// Entries outside the schema are ignored; entries whose value cannot be
    /// coerced to the declared type are skipped without aborting the merge.
    /// Returns the number of entries applied.
    pub fn apply_preferences(&mut self, prefs: &Preferences) -> usize {
        let mut applied = 0;
        for (key, value) in &prefs.entries {
            let key = config_key(key);
            let Some(ty) = value_type(&key) else {
                continue;
            };
            match value.coerce(ty) {
                Some(value) => {
                    self.put(key, Some(value));
                    applied += 1;
                }
                None => {
                    tracing::debug!(key = %key, value = ?value, "skipping unusable preference");
                }
            }
        }
        applied
    }

    /// Export schema keys present in the store as preferences.
    ///
    /// Booleans stay booleans, integers become decimal text.
    pub fn to_preferences(&self) -> Preferences {
        let mut prefs = Preferences::default();
        for (key, ty) in SCHEMA {
            if self.get(key).is_none() {
                continue;
            }
            let value = match ty {
                ValueType::Bool => PrefValue::Bool(self.get_bool(key, false)),
                ValueType::Int => PrefValue::Text(self.get_int(key, 0).to_string()),
                ValueType::String => PrefValue::Text(self.get_string(key, "")),
            };
            prefs.insert(pref_key(key), value);
        }
        prefs
    }
}
