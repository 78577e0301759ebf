use std::fs;

use serde_json::Value;
use tempfile::tempdir;
use textpad_settings::{ConfigStore, EditorConfig, RecentFiles, Theme};

#[test]
fn load_missing_file_returns_defaults() {
    let temp = tempdir().expect("tempdir");
    let store = ConfigStore::new(temp.path().join("never-created"));

    let config = store.load();
    assert_eq!(config, EditorConfig::default());
    assert_eq!(config.font_family, "monospace");
    assert!(!store.dir().exists());
}

#[test]
fn malformed_or_non_object_config_returns_defaults() {
    let temp = tempdir().expect("tempdir");
    let store = ConfigStore::new(temp.path());

    for payload in ["{ not json", "[1, 2, 3]", "\"dark\"", ""] {
        fs::write(store.config_path(), payload).expect("write config");
        assert_eq!(store.load(), EditorConfig::default(), "payload {payload:?}");
    }
}

#[test]
fn save_and_reload_roundtrip() {
    let temp = tempdir().expect("tempdir");
    let store = ConfigStore::new(temp.path().join("nested").join("textpad"));

    let config = EditorConfig {
        theme: Theme::Dark,
        font_family: "Courier".to_string(),
        font_size: 14,
        autosave_enabled: false,
        autosave_interval: 45,
        recent_files: RecentFiles::from_entries(["/tmp/a.txt"]),
    };
    store.save(&config).expect("save");

    assert_eq!(store.load(), config);

    let raw = fs::read_to_string(store.config_path()).expect("read config");
    let value: Value = serde_json::from_str(&raw).expect("valid json");
    assert_eq!(value["theme"], "dark");
    assert_eq!(value["recent_files"], serde_json::json!(["/tmp/a.txt"]));
}

#[test]
fn save_sanitizes_before_writing() {
    let temp = tempdir().expect("tempdir");
    let store = ConfigStore::new(temp.path());

    let mut config = EditorConfig::default();
    config.font_size = 0;
    config.font_family = "  ".to_string();
    store.save(&config).expect("save");

    let reloaded = store.load();
    assert_eq!(reloaded.font_size, 12);
    assert_eq!(reloaded.font_family, "monospace");
}

#[test]
fn partially_valid_config_keeps_good_fields() {
    let temp = tempdir().expect("tempdir");
    let store = ConfigStore::new(temp.path());
    fs::write(
        store.config_path(),
        r#"{"theme": "dark", "font_size": "huge", "recent_files": ["/x", "/x", 3, "/y"]}"#,
    )
    .expect("write config");

    let config = store.load();
    assert_eq!(config.theme, Theme::Dark);
    assert_eq!(config.font_size, 12);
    assert_eq!(config.recent_files.iter().collect::<Vec<_>>(), vec!["/x", "/y"]);
}

#[test]
fn recent_files_are_capped_on_load() {
    let temp = tempdir().expect("tempdir");
    let store = ConfigStore::new(temp.path());
    let entries: Vec<String> = (0..15).map(|i| format!("/f{i}")).collect();
    fs::write(
        store.config_path(),
        serde_json::json!({ "recent_files": entries }).to_string(),
    )
    .expect("write config");

    let config = store.load();
    assert_eq!(config.recent_files.len(), 10);
    assert_eq!(config.recent_files.get(0), Some("/f0"));
    assert_eq!(config.recent_files.get(9), Some("/f9"));
}

#[test]
fn save_leaves_no_temporary_files() {
    let temp = tempdir().expect("tempdir");
    let store = ConfigStore::new(temp.path());
    store.save(&EditorConfig::default()).expect("first save");
    store.save(&EditorConfig::default()).expect("second save");

    let names: Vec<String> = fs::read_dir(temp.path())
        .expect("read dir")
        .map(|entry| entry.expect("entry").file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec!["config.json".to_string()]);
}
