//! Format-preserving key/value store over the daemon's `afrd.ini`.
//!
//! # File format
//!
//! ```text
//! # comment
//! enable=1
//! #switch.delay.on=500     <- disabled key: a comment that names a known key
//! switch.delay.off=2000
//! ```
//!
//! # Save protocol
//!
//! `save` re-reads the file as it is on disk *now* (the daemon or a human may
//! have touched it since `load`) and replays it line by line:
//!
//! 1. Blank lines and plain comments are copied verbatim.
//! 2. An active or disabled line whose key is still pending is rewritten with
//!    the in-memory value; a key explicitly set to `None` is written disabled
//!    (`#key=<value in file>`) instead of being dropped.
//! 3. Lines naming keys that are not pending are copied verbatim, and so are
//!    disabled lines of a key that also has an active line: only the active
//!    line carries the value.
//! 4. Pending keys never seen in the file are appended in map order.
//! 5. Output goes to `<path>~`, which is then renamed over `<path>`.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::error::{io_err, ConfigError};
use crate::types::{is_schema_key, ConfigValue};

// ---------------------------------------------------------------------------
// 1. Raw line model
// ---------------------------------------------------------------------------

/// One physical line of the config file, classified for the save replay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawLine<'a> {
    Blank(&'a str),
    Comment(&'a str),
    Active {
        key: &'a str,
        value: &'a str,
        text: &'a str,
    },
    Disabled {
        key: &'a str,
        value: &'a str,
        text: &'a str,
    },
}

impl<'a> RawLine<'a> {
    /// Classify `text`. A `#key=value` comment counts as a disabled key only
    /// when `is_known(key)` holds; otherwise it stays a plain comment.
    pub fn parse(text: &'a str, is_known: impl Fn(&str) -> bool) -> Self {
        let line = text.trim();
        if line.is_empty() {
            return RawLine::Blank(text);
        }

        if let Some(rest) = line.strip_prefix('#') {
            if let Some((key, value)) = rest.split_once('=') {
                let key = key.trim();
                if !key.is_empty() && is_known(key) {
                    return RawLine::Disabled {
                        key,
                        value: value.trim(),
                        text,
                    };
                }
            }
            return RawLine::Comment(text);
        }

        let (key, value) = split_pair(line);
        RawLine::Active { key, value, text }
    }

    /// The line exactly as it appeared in the file.
    pub fn text(&self) -> &'a str {
        match *self {
            RawLine::Blank(text) | RawLine::Comment(text) => text,
            RawLine::Active { text, .. } | RawLine::Disabled { text, .. } => text,
        }
    }
}

/// Split on the first `=`; a line without one is a key with an empty value.
fn split_pair(line: &str) -> (&str, &str) {
    match line.split_once('=') {
        Some((key, value)) => (key.trim(), value.trim()),
        None => (line, ""),
    }
}

// ---------------------------------------------------------------------------
// 2. Store
// ---------------------------------------------------------------------------

/// Typed view of the config file with dirty tracking.
///
/// A key mapped to `None` is *disabled*: getters treat it as absent and
/// `save` comments its line out.
#[derive(Debug, Clone, Default)]
pub struct ConfigStore {
    items: BTreeMap<String, Option<ConfigValue>>,
    modified: bool,
}

impl ConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace all items with the contents of `path`.
    ///
    /// On error the previous contents are kept untouched.
    pub fn load(&mut self, path: &Path) -> Result<(), ConfigError> {
        let contents = fs::read_to_string(path).map_err(|e| io_err(path, e))?;
        self.load_str(&contents)
    }

    /// Replace all items with the parsed `contents`.
    pub fn load_str(&mut self, contents: &str) -> Result<(), ConfigError> {
        let mut items = BTreeMap::new();
        for line in contents.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let (key, value) = split_pair(line);
            let value = ConfigValue::parse_for_key(key, value)?;
            items.insert(key.to_string(), Some(value));
        }

        self.items = items;
        self.modified = false;
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&ConfigValue> {
        self.items.get(key).and_then(Option::as_ref)
    }

    pub fn get_bool(&self, key: &str, default: bool) -> bool {
        self.get(key).map(ConfigValue::as_bool).unwrap_or(default)
    }

    /// Integer value of `key`; `default` when absent or not an integer.
    pub fn get_int(&self, key: &str, default: i32) -> i32 {
        self.get(key).and_then(ConfigValue::as_int).unwrap_or(default)
    }

    pub fn get_string(&self, key: &str, default: &str) -> String {
        self.get(key)
            .map(ToString::to_string)
            .unwrap_or_else(|| default.to_string())
    }

    /// Store `value` under `key`; `None` disables the key.
    ///
    /// The store becomes modified only if the textual form changes.
    pub fn put(&mut self, key: impl Into<String>, value: Option<ConfigValue>) {
        let key = key.into();
        let old = self.get(&key).map(ToString::to_string);
        let new = value.as_ref().map(ToString::to_string);
        if old != new {
            self.modified = true;
        }
        self.items.insert(key, value);
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<ConfigValue>) {
        self.put(key, Some(value.into()));
    }

    pub fn disable(&mut self, key: impl Into<String>) {
        self.put(key, None);
    }

    pub fn is_modified(&self) -> bool {
        self.modified
    }

    /// All keys with their values, disabled ones as `None`, in map order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&ConfigValue>)> {
        self.items.iter().map(|(k, v)| (k.as_str(), v.as_ref()))
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// `save` only when something changed since the last load/save.
    pub fn cond_save(&mut self, path: &Path) -> Result<(), ConfigError> {
        if !self.modified {
            return Ok(());
        }
        self.save(path)
    }

    /// Write the store back to `path`, preserving comments, order and
    /// disabled keys of the file currently on disk.
    ///
    /// A missing file is treated as empty. If the final rename fails the
    /// temporary `<path>~` is removed on a best-effort basis.
    pub fn save(&mut self, path: &Path) -> Result<(), ConfigError> {
        let existing = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == ErrorKind::NotFound => String::new(),
            Err(err) => return Err(io_err(path, err)),
        };

        let rendered = self.render(&existing);

        let tmp = tmp_path(path);
        fs::write(&tmp, rendered).map_err(|e| io_err(&tmp, e))?;
        if let Err(e) = fs::rename(&tmp, path) {
            let _ = fs::remove_file(&tmp);
            return Err(io_err(path, e));
        }

        tracing::debug!(path = %path.display(), "config saved");
        self.modified = false;
        Ok(())
    }

    /// Replay `existing` against the in-memory items (see module docs).
    pub fn render(&self, existing: &str) -> String {
        let mut pending: BTreeMap<&str, Option<&ConfigValue>> = self
            .items
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_ref()))
            .collect();
        let lines: Vec<RawLine<'_>> = existing
            .lines()
            .map(|text| {
                RawLine::parse(text, |key| {
                    self.items.contains_key(key) || is_schema_key(key)
                })
            })
            .collect();
        // A key with an active line keeps its commented-out alternates as they are.
        let active: BTreeSet<&str> = lines
            .iter()
            .filter_map(|line| match line {
                RawLine::Active { key, .. } => Some(*key),
                _ => None,
            })
            .collect();
        let mut out = String::with_capacity(existing.len() + 64);

        for line in lines {
            match line {
                RawLine::Disabled { key, .. } if active.contains(key) => out.push_str(line.text()),
                RawLine::Active { key, value, .. } | RawLine::Disabled { key, value, .. } => {
                    match pending.remove(key) {
                        Some(Some(current)) => {
                            push_pair(&mut out, false, key, &current.to_file_text());
                        }
                        Some(None) => push_pair(&mut out, true, key, value),
                        None => out.push_str(line.text()),
                    }
                }
                RawLine::Blank(_) | RawLine::Comment(_) => out.push_str(line.text()),
            }
            out.push('\n');
        }

        for (key, value) in pending {
            if let Some(value) = value {
                push_pair(&mut out, false, key, &value.to_file_text());
                out.push('\n');
            }
        }
        out
    }
}

fn push_pair(out: &mut String, disabled: bool, key: &str, value: &str) {
    if disabled {
        out.push('#');
    }
    out.push_str(key);
    out.push('=');
    out.push_str(value);
}

/// `<path>~`, the sibling temp file used by [`ConfigStore::save`].
pub fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push("~");
    PathBuf::from(name)
}
