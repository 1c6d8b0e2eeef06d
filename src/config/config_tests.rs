use super::*;
use std::time::Duration;
use tempfile::tempdir;

#[test]
fn test_default_config() {
    let config = Config::default();
    assert_eq!(config.modifier_only_enabled, DEFAULT_MODIFIER_ONLY_ENABLED);
    assert_eq!(config.modifier_only_threshold_ms, None);
    assert_eq!(config.modifier_keys.len(), DEFAULT_MODIFIER_KEYS.len());
    assert_eq!(config.shortcuts_path, None);
}

#[test]
fn test_threshold_getter_falls_back_to_default() {
    let mut config = Config::default();
    assert_eq!(
        config.modifier_only_threshold(),
        Duration::from_millis(DEFAULT_MODIFIER_ONLY_THRESHOLD_MS)
    );
    config.modifier_only_threshold_ms = Some(250);
    assert_eq!(config.modifier_only_threshold(), Duration::from_millis(250));
}

#[test]
fn test_shortcuts_path_is_tilde_expanded() {
    let config = Config::default();
    let path = config.shortcuts_path();
    assert!(!path.to_string_lossy().starts_with('~'));
    assert!(path.ends_with("global-accel/shortcuts.json"));

    let config = Config {
        shortcuts_path: Some("/tmp/custom.json".to_string()),
        ..Config::default()
    };
    assert_eq!(config.shortcuts_path().to_string_lossy(), "/tmp/custom.json");
}

#[test]
fn test_config_serialization() {
    let config = Config {
        modifier_only_enabled: false,
        modifier_only_threshold_ms: Some(300),
        modifier_keys: [("CapsLock".to_string(), "ctrl".to_string())]
            .into_iter()
            .collect(),
        shortcuts_path: Some("~/shortcuts.json".to_string()),
    };

    let json = serde_json::to_string(&config).unwrap();
    assert!(json.contains("\"modifierOnlyThresholdMs\":300"));
    assert!(json.contains("\"modifierKeys\""));
    let deserialized: Config = serde_json::from_str(&json).unwrap();
    assert_eq!(deserialized, config);
}

#[test]
fn test_empty_object_uses_defaults() {
    let config: Config = serde_json::from_str("{}").unwrap();
    assert_eq!(config, Config::default());
}

#[test]
fn test_load_config_from_missing_file() {
    let dir = tempdir().unwrap();
    let config = load_config_from(&dir.path().join("config.json"));
    assert_eq!(config, Config::default());
}

#[test]
fn test_load_config_from_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.json");
    std::fs::write(
        &path,
        r#"{"modifierOnlyThresholdMs": 120, "modifierOnlyEnabled": false}"#,
    )
    .unwrap();

    let config = load_config_from(&path);
    assert_eq!(config.modifier_only_threshold(), Duration::from_millis(120));
    assert!(!config.modifier_only_enabled);
    // Unspecified fields keep their defaults
    assert_eq!(config.modifier_keys.len(), DEFAULT_MODIFIER_KEYS.len());
}

#[test]
fn test_invalid_config_falls_back_to_defaults() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.json");
    std::fs::write(&path, r#"{"modifierOnlyThresholdMs": "soon"}"#).unwrap();

    assert_eq!(load_config_from(&path), Config::default());
}

#[test]
fn test_default_config_path_is_under_config_dir() {
    assert!(DEFAULT_CONFIG_PATH.starts_with("~/.config/global-accel/"));
}
