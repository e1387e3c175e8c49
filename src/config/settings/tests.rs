use super::*;
use std::collections::HashMap;
use tempfile::TempDir;

fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect();
    move |name| map.get(name).cloned()
}

#[test]
fn default_config() {
    let config = Config::default();
    assert_eq!(config.postgres.host, "localhost");
    assert_eq!(config.postgres.port, 5432);
    assert_eq!(config.postgres.table, "crawled_pages");
    assert_eq!(config.embedding.model, "text-embedding-ada-002");
    assert_eq!(config.embedding.dimension, 1536);
    assert_eq!(config.embedding.batch_size, 20);
    assert!(config.embedding.api_key.is_none());
    assert!(config.validate().is_ok());
}

#[test]
fn config_validation() {
    let config = Config::default();

    let mut invalid_config = config.clone();
    invalid_config.postgres.port = 0;
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config.clone();
    invalid_config.postgres.table = "  ".to_string();
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config.clone();
    invalid_config.postgres.query_timeout_seconds = 0;
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config.clone();
    invalid_config.embedding.model = String::new();
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config.clone();
    invalid_config.embedding.batch_size = 0;
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config.clone();
    invalid_config.embedding.batch_size = 2049;
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config.clone();
    invalid_config.embedding.dimension = 0;
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config;
    invalid_config.embedding.base_url = "ftp://example.com".to_string();
    assert!(matches!(
        invalid_config.validate(),
        Err(ConfigError::InvalidProtocol(_))
    ));
}

#[test]
fn endpoint_url_generation() {
    let mut config = EmbeddingConfig::default();
    let url = config
        .endpoint_url()
        .expect("should generate endpoint url successfully");
    assert_eq!(url.as_str(), "https://api.openai.com/v1/embeddings");

    config.base_url = "http://localhost:11434/v1/".to_string();
    let url = config
        .endpoint_url()
        .expect("should generate endpoint url successfully");
    assert_eq!(url.as_str(), "http://localhost:11434/v1/embeddings");
}

#[test]
fn env_overrides() {
    let mut config = Config::default();
    config
        .apply_env(env_from(&[
            ("POSTGRES_HOST", "db.internal"),
            ("POSTGRES_PORT", "6543"),
            ("POSTGRES_DB", "rag"),
            ("POSTGRES_USER", "ingest"),
            ("POSTGRES_PASSWORD", "secret"),
            ("EMBEDDING_MODEL_NAME", "text-embedding-3-small"),
            ("OPENAI_API_KEY", "sk-test"),
            ("OPENAI_BASE_URL", "http://localhost:8080/v1"),
        ]))
        .expect("env overrides should apply");

    assert_eq!(config.postgres.host, "db.internal");
    assert_eq!(config.postgres.port, 6543);
    assert_eq!(config.postgres.database, "rag");
    assert_eq!(config.postgres.user, "ingest");
    assert_eq!(config.postgres.password.as_deref(), Some("secret"));
    assert_eq!(config.embedding.model, "text-embedding-3-small");
    assert_eq!(config.embedding.api_key.as_deref(), Some("sk-test"));
    assert_eq!(config.embedding.base_url, "http://localhost:8080/v1");
    // Untouched values keep their defaults
    assert_eq!(config.postgres.table, "crawled_pages");
    assert_eq!(config.embedding.dimension, 1536);
}

#[test]
fn env_override_rejects_bad_port() {
    let mut config = Config::default();
    let result = config.apply_env(env_from(&[("POSTGRES_PORT", "not-a-port")]));
    assert!(matches!(
        result,
        Err(ConfigError::InvalidEnvValue { ref name, .. }) if name == "POSTGRES_PORT"
    ));
}

#[test]
fn toml_serialization() {
    let config = Config::default();
    let toml_str = toml::to_string(&config).expect("should serialize toml correctly");
    let parsed_config: Config = toml::from_str(&toml_str).expect("should parse toml correctly");
    assert_eq!(config, parsed_config);
}

#[test]
fn partial_toml_uses_defaults() {
    let toml_str = r#"
        [embedding]
        model = "nomic-embed-text"
        dimension = 768
    "#;
    let config: Config = toml::from_str(toml_str).expect("should parse toml correctly");
    assert_eq!(config.embedding.model, "nomic-embed-text");
    assert_eq!(config.embedding.dimension, 768);
    assert_eq!(config.embedding.batch_size, 20);
    assert_eq!(config.postgres, PostgresConfig::default());
}

#[test]
fn load_missing_file_returns_defaults() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config = Config::load(temp_dir.path()).expect("should load defaults");
    assert_eq!(config.postgres, PostgresConfig::default());
    assert_eq!(config.get_base_dir(), temp_dir.path());
}

#[test]
fn save_and_load() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let mut config = Config {
        base_dir: temp_dir.path().join("nested"),
        ..Config::default()
    };
    config.postgres.table = "pages".to_string();
    config.embedding.dimension = 768;

    config.save().expect("should save config");
    let loaded = Config::load(temp_dir.path().join("nested")).expect("should load config");
    assert_eq!(config, loaded);
}

#[test]
fn setter_validation() {
    let mut postgres = PostgresConfig::default();
    assert!(postgres.set_port(6543).is_ok());
    assert!(postgres.set_port(0).is_err());
    assert!(postgres.set_table("chunks".to_string()).is_ok());
    assert!(postgres.set_table(String::new()).is_err());

    let mut embedding = EmbeddingConfig::default();
    assert!(embedding.set_model("new-model".to_string()).is_ok());
    assert!(embedding.set_model(String::new()).is_err());
    assert!(embedding.set_batch_size(128).is_ok());
    assert!(embedding.set_batch_size(0).is_err());
    assert!(embedding.set_batch_size(4096).is_err());
    assert!(embedding.set_dimension(3).is_ok());
    assert!(embedding.set_dimension(0).is_err());
}

#[test]
fn config_error_converts_to_ingest_error() {
    let error: IngestError = ConfigError::InvalidPort(0).into();
    assert_eq!(error.kind(), crate::ErrorKind::Config);
}

#[test]
fn environment_secrets_are_not_saved() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let mut config = Config {
        base_dir: temp_dir.path().to_path_buf(),
        ..Config::default()
    };
    config.postgres.password = Some("file-password".to_string());
    config
        .apply_env(env_from(&[
            ("POSTGRES_PASSWORD", "env-password"),
            ("OPENAI_API_KEY", "sk-from-env"),
            ("POSTGRES_HOST", "db.internal"),
        ]))
        .expect("env overrides should apply");

    // The effective configuration uses the environment values
    assert_eq!(config.postgres.password.as_deref(), Some("env-password"));
    assert_eq!(config.embedding.api_key.as_deref(), Some("sk-from-env"));

    config.save().expect("should save config");
    let written = std::fs::read_to_string(config.config_file_path()).expect("should read file");
    assert!(!written.contains("env-password"));
    assert!(!written.contains("sk-from-env"));

    let loaded = Config::load(temp_dir.path()).expect("should load config");
    assert_eq!(loaded.postgres.password.as_deref(), Some("file-password"));
    assert_eq!(loaded.embedding.api_key, None);
    // Non-secret overrides are persisted
    assert_eq!(loaded.postgres.host, "db.internal");
}
