// Configuration management module
// TOML settings file plus environment overrides

pub mod display;
pub mod settings;

#[cfg(test)]
mod tests;

pub use display::show_config;
pub use settings::{Config, ConfigError, EmbeddingConfig, PostgresConfig};

/// Get the configuration directory path
#[inline]
pub fn get_config_dir() -> Result<std::path::PathBuf, ConfigError> {
    Config::config_dir()
}
