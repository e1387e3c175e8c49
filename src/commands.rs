use anyhow::{Context, Result};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::Config;
use crate::database::{ChunkRepository, MetadataFilter, NewChunk, PostgresStore};
use crate::embeddings::OpenAiEmbedder;
use crate::search::SimilaritySearch;
use crate::store::ChunkStore;

/// Longest content preview printed per search hit
const PREVIEW_CHARS: usize = 160;

async fn connect_store(config: &Config) -> Result<PostgresStore> {
    PostgresStore::connect(&config.postgres)
        .await
        .context("Failed to connect to PostgreSQL")
}

fn build_embedder(config: &Config) -> Result<Arc<OpenAiEmbedder>> {
    let embedder =
        OpenAiEmbedder::new(&config.embedding).context("Failed to create embedding client")?;
    Ok(Arc::new(embedder))
}

/// Create the pgvector extension and the chunk table
#[inline]
pub async fn init_schema(config: &Config) -> Result<()> {
    let store = connect_store(config).await?;
    let dimension = config.embedding.dimension as usize;

    store
        .ensure_schema(dimension)
        .await
        .context("Failed to create schema")?;

    println!(
        "Table {} ready ({} dimensions)",
        store.table().qualified(),
        dimension
    );
    store.close().await;
    Ok(())
}

/// Read chunk records from a JSON Lines source, one object per line.
/// Blank lines are skipped.
#[inline]
pub fn read_chunks<R: BufRead>(reader: R) -> Result<Vec<NewChunk>> {
    let mut chunks = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line_number = index + 1;
        let line = line.with_context(|| format!("Failed to read line {line_number}"))?;
        if line.trim().is_empty() {
            continue;
        }
        let chunk: NewChunk = serde_json::from_str(&line)
            .with_context(|| format!("Invalid chunk record on line {line_number}"))?;
        chunks.push(chunk);
    }
    Ok(chunks)
}

/// Embed and store every chunk in a JSON Lines file
#[inline]
pub async fn ingest_file(config: &Config, path: &Path, batch_size: Option<u32>) -> Result<()> {
    let file =
        File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let chunks = read_chunks(BufReader::new(file))?;

    if chunks.is_empty() {
        println!("No chunks found in {}", path.display());
        return Ok(());
    }

    let mut embedding = config.embedding.clone();
    if let Some(batch_size) = batch_size {
        embedding
            .set_batch_size(batch_size)
            .context("Invalid --batch-size")?;
    }
    let batch_size = embedding.batch_size as usize;
    info!(
        "Ingesting {} chunks from {} (batch size {})",
        chunks.len(),
        path.display(),
        batch_size
    );

    let repository = connect_store(config).await?;
    let store = ChunkStore::new(build_embedder(config)?, Arc::new(repository.clone()));

    let written = store
        .add_chunks(chunks, &HashMap::new(), batch_size)
        .await
        .context("Failed to ingest chunks")?;

    println!("Stored {} chunks in {}", written, repository.table().qualified());
    repository.close().await;
    Ok(())
}

/// Run a similarity search and print the ranked hits
#[inline]
pub async fn search_chunks(
    config: &Config,
    query: &str,
    limit: usize,
    source: Option<String>,
) -> Result<()> {
    let repository = connect_store(config).await?;
    let search = SimilaritySearch::new(build_embedder(config)?, Arc::new(repository.clone()));
    let filter = source.map_or_else(MetadataFilter::none, MetadataFilter::by_source);

    let results = search
        .search(query, limit, &filter)
        .await
        .context("Search failed")?;
    repository.close().await;

    if results.is_empty() {
        println!("No matching chunks.");
        return Ok(());
    }

    for (rank, result) in results.iter().enumerate() {
        println!("{}. [{:.4}] {}", rank + 1, result.similarity, result.url);
        if let Some(source) = result.metadata.get("source").and_then(|v| v.as_str()) {
            println!("   Source: {}", source);
        }
        println!("   {}", preview(&result.content));
    }
    Ok(())
}

/// Report store and embedding configuration health
#[inline]
pub async fn show_status(config: &Config) -> Result<()> {
    println!("Status Report");
    println!("{}", "=".repeat(50));
    println!();

    println!("Database:");
    match PostgresStore::connect(&config.postgres).await {
        Ok(store) => {
            match store.health_check().await {
                Ok(()) => println!(
                    "   PostgreSQL: Connected ({}:{}/{})",
                    config.postgres.host, config.postgres.port, config.postgres.database
                ),
                Err(e) => println!("   PostgreSQL: Connected but unhealthy - {}", e),
            }
            match store.count().await {
                Ok(count) => println!("   Table {}: {} chunks", store.table().qualified(), count),
                Err(e) => {
                    warn!("Failed to count chunks: {}", e);
                    println!(
                        "   Table {}: unavailable - {}",
                        store.table().qualified(),
                        e
                    );
                }
            }
            store.close().await;
        }
        Err(e) => println!("   PostgreSQL: Failed to connect - {}", e),
    }

    println!();
    println!("Embeddings:");
    match OpenAiEmbedder::new(&config.embedding) {
        Ok(embedder) => {
            println!("   Endpoint: {}", embedder.endpoint());
            println!("   Model: {}", config.embedding.model);
            println!("   Dimension: {}", config.embedding.dimension);
            println!("   Batch Size: {}", config.embedding.batch_size);
        }
        Err(e) => println!("   Invalid configuration - {}", e),
    }

    Ok(())
}

/// Persist the effective configuration to the config file
#[inline]
pub fn save_config(config: &Config) -> Result<()> {
    config.save()?;
    println!(
        "Configuration saved to {}",
        config.config_file_path().display()
    );
    Ok(())
}

fn preview(content: &str) -> String {
    let single_line = content.split_whitespace().collect::<Vec<_>>().join(" ");
    if single_line.chars().count() <= PREVIEW_CHARS {
        return single_line;
    }
    let mut truncated: String = single_line.chars().take(PREVIEW_CHARS).collect();
    truncated.push_str("...");
    truncated
}
