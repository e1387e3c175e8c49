#[cfg(test)]
mod tests;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use url::Url;

use crate::IngestError;

pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-ada-002";
pub const DEFAULT_EMBEDDING_DIMENSION: u32 = 1536;
pub const DEFAULT_TABLE_NAME: &str = "crawled_pages";

/// Upper bound on inputs per request accepted by OpenAI-compatible endpoints.
pub const MAX_EMBEDDING_BATCH_SIZE: u32 = 2048;
/// pgvector refuses `VECTOR(n)` columns wider than this.
const MAX_EMBEDDING_DIMENSION: u32 = 16000;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Config {
    #[serde(default)]
    pub postgres: PostgresConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(skip)]
    pub base_dir: PathBuf,
    #[serde(skip)]
    env_secrets: EnvSecrets,
}

/// File values of secrets that environment overrides replaced. `Some` means
/// the secret came from the environment and must not be written back.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct EnvSecrets {
    postgres_password: Option<Option<String>>,
    api_key: Option<Option<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PostgresConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: String,
    pub password: Option<String>,
    pub table: String,
    pub max_connections: u32,
    pub acquire_timeout_seconds: u64,
    pub query_timeout_seconds: u64,
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            database: "postgres".to_string(),
            user: "postgres".to_string(),
            password: None,
            table: DEFAULT_TABLE_NAME.to_string(),
            max_connections: 5,
            acquire_timeout_seconds: 10,
            query_timeout_seconds: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub batch_size: u32,
    pub dimension: u32,
    pub timeout_seconds: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: None,
            model: DEFAULT_EMBEDDING_MODEL.to_string(),
            batch_size: 20,
            dimension: DEFAULT_EMBEDDING_DIMENSION,
            timeout_seconds: 30,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration directory not found or could not be created")]
    DirectoryError,
    #[error("Invalid URL format: {0}")]
    InvalidUrl(String),
    #[error("Invalid protocol: {0} (must be 'http' or 'https')")]
    InvalidProtocol(String),
    #[error("Invalid port: {0} (must be between 1 and 65535)")]
    InvalidPort(u16),
    #[error("Invalid value for {name}: {value}")]
    InvalidEnvValue { name: String, value: String },
    #[error("Invalid host: {0} (cannot be empty)")]
    InvalidHost(String),
    #[error("Invalid database name: {0} (cannot be empty)")]
    InvalidDatabase(String),
    #[error("Invalid table name: {0} (cannot be empty)")]
    InvalidTable(String),
    #[error("Invalid max connections: {0} (must be between 1 and 100)")]
    InvalidMaxConnections(u32),
    #[error("Invalid model name: {0} (cannot be empty)")]
    InvalidModel(String),
    #[error("Invalid batch size: {0} (must be between 1 and 2048)")]
    InvalidBatchSize(u32),
    #[error("Invalid embedding dimension: {0} (must be between 1 and 16000)")]
    InvalidEmbeddingDimension(u32),
    #[error("Invalid timeout for {0}: must be between 1 and 600 seconds")]
    InvalidTimeout(&'static str),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

impl From<ConfigError> for IngestError {
    #[inline]
    fn from(error: ConfigError) -> Self {
        Self::Config(error.to_string())
    }
}

impl Config {
    /// Default configuration directory: `~/.uingest`
    #[inline]
    pub fn config_dir() -> Result<PathBuf, ConfigError> {
        dirs::home_dir()
            .map(|home| home.join(".uingest"))
            .or_else(|| dirs::data_dir().map(|data| data.join("uingest")))
            .ok_or(ConfigError::DirectoryError)
    }

    /// Load `config.toml` from `config_dir`, falling back to defaults when the
    /// file is absent. Validation is deferred to component construction.
    #[inline]
    pub fn load<P: AsRef<Path>>(config_dir: P) -> Result<Self> {
        let config_path = config_dir.as_ref().join("config.toml");

        if !config_path.exists() {
            return Ok(Self {
                base_dir: config_dir.as_ref().to_path_buf(),
                ..Self::default()
            });
        }

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let mut config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", config_path.display()))?;
        config.base_dir = config_dir.as_ref().to_path_buf();

        Ok(config)
    }

    /// Load from the default directory and apply process environment overrides.
    #[inline]
    pub fn load_with_env() -> Result<Self> {
        let config_dir = Self::config_dir().context("Failed to determine config directory")?;
        let mut config = Self::load(config_dir)?;
        config
            .apply_env(|name| std::env::var(name).ok())
            .context("Invalid configuration in environment")?;
        Ok(config)
    }

    /// Override settings from environment-style variables. `lookup` is usually
    /// `std::env::var`; tests pass a map.
    #[inline]
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let postgres = &mut self.postgres;
        if let Some(host) = lookup("POSTGRES_HOST") {
            postgres.host = host;
        }
        if let Some(port) = lookup("POSTGRES_PORT") {
            postgres.port = parse_env("POSTGRES_PORT", &port)?;
        }
        if let Some(database) = lookup("POSTGRES_DB") {
            postgres.database = database;
        }
        if let Some(user) = lookup("POSTGRES_USER") {
            postgres.user = user;
        }
        if let Some(password) = lookup("POSTGRES_PASSWORD") {
            let file_value = postgres.password.replace(password);
            self.env_secrets.postgres_password.get_or_insert(file_value);
        }
        if let Some(table) = lookup("POSTGRES_TABLE") {
            postgres.table = table;
        }

        let embedding = &mut self.embedding;
        if let Some(model) = lookup("EMBEDDING_MODEL_NAME") {
            embedding.model = model;
        }
        if let Some(dimension) = lookup("EMBEDDING_DIMENSION") {
            embedding.dimension = parse_env("EMBEDDING_DIMENSION", &dimension)?;
        }
        if let Some(api_key) = lookup("OPENAI_API_KEY") {
            let file_value = embedding.api_key.replace(api_key);
            self.env_secrets.api_key.get_or_insert(file_value);
        }
        if let Some(base_url) = lookup("OPENAI_BASE_URL") {
            embedding.base_url = base_url;
        }

        Ok(())
    }

    #[inline]
    pub fn save(&self) -> Result<()> {
        self.validate()
            .context("Configuration validation failed before saving")?;

        let config_dir = self.get_base_dir();
        fs::create_dir_all(config_dir).with_context(|| {
            format!(
                "Failed to create config directory: {}",
                config_dir.display()
            )
        })?;

        let config_path = self.config_file_path();
        let content = toml::to_string_pretty(&self.without_env_secrets())
            .context("Failed to serialize config to TOML")?;

        fs::write(&config_path, content)
            .with_context(|| format!("Failed to write config file: {}", config_path.display()))?;

        Ok(())
    }

    /// Copy of this configuration with environment-supplied secrets reset to
    /// their file values.
    fn without_env_secrets(&self) -> Self {
        let mut persisted = self.clone();
        if let Some(ref password) = self.env_secrets.postgres_password {
            persisted.postgres.password.clone_from(password);
        }
        if let Some(ref api_key) = self.env_secrets.api_key {
            persisted.embedding.api_key.clone_from(api_key);
        }
        persisted.env_secrets = EnvSecrets::default();
        persisted
    }

    #[inline]
    pub fn get_base_dir(&self) -> &Path {
        &self.base_dir
    }

    #[inline]
    pub fn config_file_path(&self) -> PathBuf {
        self.get_base_dir().join("config.toml")
    }

    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.postgres.validate()?;
        self.embedding.validate()?;
        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(name: &str, value: &str) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidEnvValue {
            name: name.to_string(),
            value: value.to_string(),
        })
}

fn validate_timeout(seconds: u64, name: &'static str) -> Result<(), ConfigError> {
    if !(1..=600).contains(&seconds) {
        return Err(ConfigError::InvalidTimeout(name));
    }
    Ok(())
}

impl PostgresConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::InvalidHost(self.host.clone()));
        }

        if self.port == 0 {
            return Err(ConfigError::InvalidPort(self.port));
        }

        if self.database.trim().is_empty() {
            return Err(ConfigError::InvalidDatabase(self.database.clone()));
        }

        if self.table.trim().is_empty() {
            return Err(ConfigError::InvalidTable(self.table.clone()));
        }

        if !(1..=100).contains(&self.max_connections) {
            return Err(ConfigError::InvalidMaxConnections(self.max_connections));
        }

        validate_timeout(self.acquire_timeout_seconds, "connection acquire")?;
        validate_timeout(self.query_timeout_seconds, "query")?;

        Ok(())
    }

    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_seconds)
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_secs(self.query_timeout_seconds)
    }

    pub fn set_port(&mut self, port: u16) -> Result<(), ConfigError> {
        if port == 0 {
            return Err(ConfigError::InvalidPort(port));
        }
        self.port = port;
        Ok(())
    }

    pub fn set_table(&mut self, table: String) -> Result<(), ConfigError> {
        if table.trim().is_empty() {
            return Err(ConfigError::InvalidTable(table));
        }
        self.table = table;
        Ok(())
    }
}

impl EmbeddingConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.endpoint_url()?;

        if self.model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(self.model.clone()));
        }

        if self.batch_size == 0 || self.batch_size > MAX_EMBEDDING_BATCH_SIZE {
            return Err(ConfigError::InvalidBatchSize(self.batch_size));
        }

        if self.dimension == 0 || self.dimension > MAX_EMBEDDING_DIMENSION {
            return Err(ConfigError::InvalidEmbeddingDimension(self.dimension));
        }

        validate_timeout(self.timeout_seconds, "embedding request")?;

        Ok(())
    }

    /// The `/embeddings` endpoint under `base_url`.
    pub fn endpoint_url(&self) -> Result<Url, ConfigError> {
        let base = Url::parse(self.base_url.trim())
            .map_err(|_| ConfigError::InvalidUrl(self.base_url.clone()))?;

        if base.scheme() != "http" && base.scheme() != "https" {
            return Err(ConfigError::InvalidProtocol(base.scheme().to_string()));
        }

        let endpoint = format!("{}/embeddings", base.as_str().trim_end_matches('/'));
        Url::parse(&endpoint).map_err(|_| ConfigError::InvalidUrl(endpoint))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    pub fn set_model(&mut self, model: String) -> Result<(), ConfigError> {
        if model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(model));
        }
        self.model = model;
        Ok(())
    }

    pub fn set_batch_size(&mut self, batch_size: u32) -> Result<(), ConfigError> {
        if batch_size == 0 || batch_size > MAX_EMBEDDING_BATCH_SIZE {
            return Err(ConfigError::InvalidBatchSize(batch_size));
        }
        self.batch_size = batch_size;
        Ok(())
    }

    pub fn set_dimension(&mut self, dimension: u32) -> Result<(), ConfigError> {
        if dimension == 0 || dimension > MAX_EMBEDDING_DIMENSION {
            return Err(ConfigError::InvalidEmbeddingDimension(dimension));
        }
        self.dimension = dimension;
        Ok(())
    }
}
