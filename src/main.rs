use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use uingest::commands::{ingest_file, init_schema, save_config, search_chunks, show_status};
use uingest::config::settings::MAX_EMBEDDING_BATCH_SIZE;
use uingest::config::{Config, show_config};
use uingest::search::DEFAULT_MATCH_COUNT;

#[derive(Parser)]
#[command(name = "uingest")]
#[command(about = "Embed text chunks into PostgreSQL/pgvector and search them by similarity")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write the effective configuration (file plus environment) to disk
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
    /// Create the pgvector extension and the chunk table
    Init,
    /// Embed and store chunks from a JSON Lines file
    Ingest {
        /// File with one {url, chunk_number, content, metadata} object per line
        file: PathBuf,
        /// Chunks per embedding request and per INSERT statement
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..=i64::from(MAX_EMBEDDING_BATCH_SIZE)))]
        batch_size: Option<u32>,
    },
    /// Search stored chunks by similarity to a query
    Search {
        /// Query text
        query: String,
        /// Maximum number of results
        #[arg(long, default_value_t = DEFAULT_MATCH_COUNT)]
        limit: usize,
        /// Only return chunks whose metadata source equals this value
        #[arg(long)]
        source: Option<String>,
    },
    /// Show database connectivity and embedding settings
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = Config::load_with_env()?;

    match cli.command {
        Commands::Config { show } => {
            if show {
                show_config(&config);
            } else {
                save_config(&config)?;
            }
        }
        Commands::Init => {
            init_schema(&config).await?;
        }
        Commands::Ingest { file, batch_size } => {
            ingest_file(&config, &file, batch_size).await?;
        }
        Commands::Search {
            query,
            limit,
            source,
        } => {
            search_chunks(&config, &query, limit, source).await?;
        }
        Commands::Status => {
            show_status(&config).await?;
        }
    }

    Ok(())
}
