
use console::style;

use super::settings::Config;

/// Print the effective configuration to stderr with secrets masked.
#[inline]
pub fn show_config(config: &Config) {
    eprintln!("{}", style("Current Configuration").bold().cyan());
    eprintln!();

    let postgres = &config.postgres;
    eprintln!("{}", style("PostgreSQL Settings:").bold().yellow());
    eprintln!("  Host: {}", style(&postgres.host).cyan());
    eprintln!("  Port: {}", style(postgres.port).cyan());
    eprintln!("  Database: {}", style(&postgres.database).cyan());
    eprintln!("  User: {}", style(&postgres.user).cyan());
    eprintln!(
        "  Password: {}",
        style(mask_secret(postgres.password.as_deref())).cyan()
    );
    eprintln!("  Table: {}", style(&postgres.table).cyan());
    eprintln!("  Max Connections: {}", style(postgres.max_connections).cyan());

    eprintln!();
    let embedding = &config.embedding;
    eprintln!("{}", style("Embedding Settings:").bold().yellow());
    eprintln!("  Model: {}", style(&embedding.model).cyan());
    eprintln!("  Dimension: {}", style(embedding.dimension).cyan());
    eprintln!("  Batch Size: {}", style(embedding.batch_size).cyan());
    eprintln!(
        "  API Key: {}",
        style(mask_secret(embedding.api_key.as_deref())).cyan()
    );
    match embedding.endpoint_url() {
        Ok(url) => eprintln!("  Endpoint: {}", style(url).cyan()),
        Err(e) => eprintln!("  Endpoint: {} ({})", style("Invalid").red(), e),
    }

    if let Err(e) = config.validate() {
        eprintln!();
        eprintln!("{} {}", style("Validation failed:").bold().red(), e);
    }

    eprintln!();
    eprintln!(
        "Config file: {}",
        style(config.config_file_path().display()).dim()
    );
}

/// Render a secret as `<unset>` or its last four characters.
pub(crate) fn mask_secret(secret: Option<&str>) -> String {
    match secret {
        None => "<unset>".to_string(),
        Some(value) => {
            let count = value.chars().count();
            if count <= 4 {
                return "****".to_string();
            }
            let tail: String = value.chars().skip(count - 4).collect();
            format!("****{tail}")
        }
    }
}
