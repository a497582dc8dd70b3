//! `afrdctl config` — typed access to afrd.ini.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Args, Subcommand};
use tabled::{settings::Style, Table, Tabled};

use afrdctl_core::types::{is_schema_key, keys, value_type};
use afrdctl_core::{ConfigStore, ConfigValue, Preferences, SCHEMA};
use afrdctl_daemon::{ControlPaths, ProcessController};

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// List every known key with its current value.
    List,

    /// Print the value of one key.
    Get { key: String },

    /// Set a key, then ask the daemon to reload.
    Set { key: String, value: String },

    /// Comment a key out so the daemon falls back to its default.
    Unset { key: String },

    /// Merge a preferences JSON file into afrd.ini.
    Import(PrefsFileArgs),

    /// Write afrd.ini values as a preferences JSON file.
    Export(PrefsFileArgs),
}

#[derive(Args, Debug)]
pub struct PrefsFileArgs {
    /// Preferences file; defaults to preferences.json in the cache directory.
    pub file: Option<PathBuf>,
}

impl PrefsFileArgs {
    fn path(&self, paths: &ControlPaths) -> PathBuf {
        self.file.clone().unwrap_or_else(|| paths.preferences.clone())
    }
}

#[derive(Tabled)]
struct ConfigRow {
    #[tabled(rename = "key")]
    key: String,
    #[tabled(rename = "type")]
    kind: String,
    #[tabled(rename = "value")]
    value: String,
}

pub fn run(command: ConfigCommand, paths: &ControlPaths) -> Result<()> {
    let mut store = load_store(paths)?;

    match command {
        ConfigCommand::List => list(&store),
        ConfigCommand::Get { key } => match store.get(&key) {
            Some(value) => println!("{value}"),
            None if is_schema_key(&key) => {
                bail!("{key} is not set in {}", paths.config.display())
            }
            None => bail!(
                "{key} is not set and not a known key; known keys: {}",
                keys().collect::<Vec<_>>().join(", ")
            ),
        },
        ConfigCommand::Set { key, value } => {
            if !is_schema_key(&key) {
                tracing::warn!(%key, "key is not known to afrd, storing as text");
            }
            let value = ConfigValue::parse_for_key(&key, &value)
                .with_context(|| format!("invalid value for {key}"))?;
            store.put(key, Some(value));
            persist(&mut store, paths)?;
        }
        ConfigCommand::Unset { key } => {
            if store.get(&key).is_none() {
                println!("{key} is not set");
                return Ok(());
            }
            store.disable(key);
            persist(&mut store, paths)?;
        }
        ConfigCommand::Import(args) => {
            let path = args.path(paths);
            let prefs = Preferences::load_at(&path)
                .with_context(|| format!("failed to read preferences {}", path.display()))?;
            let applied = store.apply_preferences(&prefs);
            println!("applied {applied} of {} preferences", prefs.entries.len());
            persist(&mut store, paths)?;
        }
        ConfigCommand::Export(args) => {
            let path = args.path(paths);
            store
                .to_preferences()
                .save_at(&path)
                .with_context(|| format!("failed to write preferences {}", path.display()))?;
            println!("exported {}", path.display());
        }
    }

    Ok(())
}

fn load_store(paths: &ControlPaths) -> Result<ConfigStore> {
    let mut store = ConfigStore::new();
    if paths.config.exists() {
        store
            .load(&paths.config)
            .with_context(|| format!("failed to load {}", paths.config.display()))?;
    }
    Ok(store)
}

/// Save if anything changed and nudge the daemon to pick it up.
fn persist(store: &mut ConfigStore, paths: &ControlPaths) -> Result<()> {
    if !store.is_modified() {
        println!("no changes");
        return Ok(());
    }
    store
        .cond_save(&paths.config)
        .with_context(|| format!("failed to save {}", paths.config.display()))?;
    ProcessController::new(paths.clone()).reload();
    println!("saved {}", paths.config.display());
    Ok(())
}

fn list(store: &ConfigStore) {
    let mut rows: Vec<ConfigRow> = SCHEMA
        .iter()
        .map(|(key, ty)| ConfigRow {
            key: key.to_string(),
            kind: ty.to_string(),
            value: store
                .get(key)
                .map_or_else(|| "(default)".to_string(), ToString::to_string),
        })
        .collect();

    rows.extend(
        store
            .iter()
            .filter(|(key, _)| value_type(key).is_none())
            .filter_map(|(key, value)| {
                value.map(|value| ConfigRow {
                    key: key.to_string(),
                    kind: "unknown".to_string(),
                    value: value.to_string(),
                })
            }),
    );

    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");
}
