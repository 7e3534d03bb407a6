//! Configuration Loading Tests
//!
//! Layered YAML loading through `ConfigManager` with an explicit environment,
//! so no process-wide variables are touched.

use cms_core::config::{ConfigManager, LogFormat};
use std::fs;
use tempfile::TempDir;

#[test]
fn environment_file_overrides_base_file() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("cms.yaml"),
        r#"
database:
  host: db.internal
  database: cms
modules:
  search_paths: ["modules", "vendor/modules"]
  bootstrap_modules: ["core"]
schema:
  allow_auto_create_fields: true
logging:
  level: debug
"#,
    )
    .unwrap();
    fs::write(
        dir.path().join("cms.production.yaml"),
        r#"
schema:
  allow_auto_create_fields: false
logging:
  format: json
"#,
    )
    .unwrap();

    let production =
        ConfigManager::load_from_directory_with_env(Some(dir.path().to_path_buf()), "production")
            .unwrap();
    let config = production.config();
    assert_eq!(config.database.host, "db.internal");
    assert_eq!(config.modules.search_paths.len(), 2);
    assert_eq!(config.modules.bootstrap_modules, vec!["core"]);
    assert!(!config.schema.allow_auto_create_fields);
    assert_eq!(config.logging.level, "debug");
    assert_eq!(config.logging.format, LogFormat::Json);

    let staging =
        ConfigManager::load_from_directory_with_env(Some(dir.path().to_path_buf()), "staging")
            .unwrap();
    assert!(staging.config().schema.allow_auto_create_fields);
    assert_eq!(staging.config().logging.format, LogFormat::Pretty);
}

#[test]
fn invalid_values_are_rejected() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("cms.yaml"),
        "database:\n  max_connections: 0\n",
    )
    .unwrap();

    let result = ConfigManager::load_from_directory_with_env(Some(dir.path().to_path_buf()), "test");
    assert!(result.is_err());
}

#[test]
fn debug_config_hides_database_password() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("cms.yaml"),
        "database:\n  password: hunter2\n",
    )
    .unwrap();

    let manager =
        ConfigManager::load_from_directory_with_env(Some(dir.path().to_path_buf()), "test")
            .unwrap();
    assert_eq!(manager.config().database.password, "hunter2");
    assert!(!manager.debug_config().to_string().contains("hunter2"));
}
