use super::*;
use std::fs;
use tempfile::TempDir;

#[test]
fn config_file_persistence() {
    let temp_dir = TempDir::new().expect("should create TempDir successfully");
    let config_path = temp_dir.path().join("config.toml");

    let mut original_config = Config::default();
    original_config.postgres.host = "test-host".to_string();
    original_config.postgres.port = 6543;
    original_config.embedding.model = "test-model".to_string();
    original_config.embedding.batch_size = 32;

    let toml_content = toml::to_string_pretty(&original_config)
        .expect("config should convert to toml string successfully");
    fs::write(&config_path, toml_content).expect("should write to config_path successfully");

    let loaded_config = Config::load(temp_dir.path()).expect("should load config successfully");

    assert_eq!(loaded_config.postgres, original_config.postgres);
    assert_eq!(loaded_config.embedding, original_config.embedding);
}

#[test]
fn invalid_toml_handling() {
    let temp_dir = TempDir::new().expect("should create TempDir successfully");
    fs::write(
        temp_dir.path().join("config.toml"),
        r#"
            [postgres
            host = "localhost"
            port = "invalid_port"
        "#,
    )
    .expect("should write to config_path successfully");

    assert!(Config::load(temp_dir.path()).is_err());
}

#[test]
fn config_dir_is_named_after_crate() {
    if let Ok(dir) = get_config_dir() {
        let name = dir
            .file_name()
            .and_then(|n| n.to_str())
            .expect("config dir should have a name");
        assert!(name == ".uingest" || name == "uingest");
    }
}
