use albie_config::AppConfig;

#[test]
fn test_load_creates_default_config_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("albie.json");
    assert!(!path.exists());

    let config = AppConfig::load_or_create(&path);
    assert!(path.exists());
    assert_eq!(config.max_history, 50);

    // File should contain valid JSON
    let contents = std::fs::read_to_string(&path).unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&contents).unwrap();
    assert!(parsed.is_object());
    assert_eq!(parsed["persist_history"], serde_json::json!(true));
}

#[test]
fn test_load_existing_config() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("albie.json");
    let json = r#"{
        "max_history": 120,
        "persist_history": false,
        "data_dir": "/tmp/albie",
        "log_filter": "albie=debug"
    }"#;
    std::fs::write(&path, json).unwrap();

    let config = AppConfig::load_or_create(&path);
    assert_eq!(config.max_history, 120);
    assert!(!config.persist_history);
    assert_eq!(config.data_dir, "/tmp/albie");
    assert_eq!(config.log_filter, "albie=debug");
}

#[test]
fn test_broken_json_returns_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("albie.json");
    std::fs::write(&path, "{ this is not valid json }}}").unwrap();

    let config = AppConfig::load_or_create(&path);
    assert_eq!(config.max_history, 50);

    // Broken file is left alone
    let contents = std::fs::read_to_string(&path).unwrap();
    assert_eq!(contents, "{ this is not valid json }}}");
}

#[test]
fn test_loaded_config_is_sanitized() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("albie.json");
    std::fs::write(&path, r#"{"max_history": 0, "log_filter": ""}"#).unwrap();

    let config = AppConfig::load_or_create(&path);
    assert_eq!(config.max_history, 1);
    assert_eq!(config.log_filter, "info");
}

#[test]
fn test_save_and_reload() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("albie.json");

    let config = AppConfig {
        max_history: 75,
        ..AppConfig::default()
    };
    config.save(&path).unwrap();

    let loaded = AppConfig::load_or_create(&path);
    assert_eq!(loaded.max_history, 75);
}
