//! Preferences persistence and merge tests.

use afrdctl_core::{ConfigError, ConfigStore, PrefValue, Preferences};
use assert_fs::prelude::*;

#[test]
fn missing_preferences_file_is_empty() {
    let dir = assert_fs::TempDir::new().expect("tempdir");
    let prefs = Preferences::load_at(&dir.path().join("preferences.json")).expect("load");
    assert!(prefs.entries.is_empty());
}

#[test]
fn corrupt_preferences_file_reports_path() {
    let dir = assert_fs::TempDir::new().expect("tempdir");
    let file = dir.child("preferences.json");
    file.write_str("{ not json").expect("write");

    let err = Preferences::load_at(file.path()).unwrap_err();
    assert!(matches!(err, ConfigError::Preferences { .. }), "got: {err}");
    assert!(err.to_string().contains("preferences.json"));
}

#[test]
fn export_then_import_restores_values() {
    let dir = assert_fs::TempDir::new().expect("tempdir");
    let file = dir.child("nested").child("preferences.json");

    let mut source = ConfigStore::new();
    source
        .load_str("enable=0\nswitch.delay.on=500\nmode.extra=1080p50hz\n")
        .expect("load");
    source.to_preferences().save_at(file.path()).expect("save prefs");
    assert!(!dir.child("nested").child("preferences.json.tmp").exists());

    let prefs = Preferences::load_at(file.path()).expect("load prefs");
    let mut target = ConfigStore::new();
    target.load_str("enable=1\n").expect("load");
    let applied = target.apply_preferences(&prefs);

    assert_eq!(applied, 3);
    assert!(!target.get_bool("enable", true));
    assert_eq!(target.get_int("switch.delay.on", 0), 500);
    assert_eq!(target.get_string("mode.extra", ""), "1080p50hz");
}

#[test]
fn numeric_json_values_are_accepted() {
    let dir = assert_fs::TempDir::new().expect("tempdir");
    let file = dir.child("preferences.json");
    file.write_str(r#"{"switch_timeout": 30, "enable": "no", "cs_select": 2}"#)
        .expect("write");

    let prefs = Preferences::load_at(file.path()).expect("load");
    assert_eq!(prefs.get("switch_timeout"), Some(&PrefValue::Int(30)));

    let mut store = ConfigStore::new();
    store.apply_preferences(&prefs);
    assert_eq!(store.get_int("switch.timeout", 0), 30);
    assert!(!store.get_bool("enable", true));
    assert_eq!(store.get_string("cs.select", ""), "2");
}
