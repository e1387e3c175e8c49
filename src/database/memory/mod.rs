//! In-memory chunk repository.
//!
//! Mirrors the constraints of the Postgres schema (fixed embedding dimension,
//! unique `(url, chunk_number)`, all-or-nothing batch inserts) and ranks with
//! brute-force cosine distance. Used by tests, benchmarks and offline runs.


use std::collections::HashSet;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use super::ChunkRepository;
use super::models::{ChunkRow, SearchResult, SimilarityQuery, ensure_unique_keys};
use crate::{IngestError, Result};

pub struct MemoryStore {
    dimension: usize,
    rows: RwLock<Vec<ChunkRow>>,
}

impl MemoryStore {
    /// Create an empty store whose embedding column has `dimension` entries.
    #[inline]
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            rows: RwLock::new(Vec::new()),
        }
    }

    #[inline]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    fn check_dimension(&self, embedding: &[f32]) -> Result<()> {
        if embedding.len() != self.dimension {
            return Err(IngestError::query(format!(
                "expected {} dimensions, not {}",
                self.dimension,
                embedding.len()
            )));
        }
        Ok(())
    }
}

/// Cosine distance in `[0, 2]`; NaN when either vector has zero norm, as
/// pgvector's `<=>` operator does.
#[inline]
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f64 {
    let mut dot = 0.0_f64;
    let mut norm_a = 0.0_f64;
    let mut norm_b = 0.0_f64;
    for (&x, &y) in a.iter().zip(b) {
        let (x, y) = (f64::from(x), f64::from(y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denominator = (norm_a * norm_b).sqrt();
    if denominator == 0.0 {
        return f64::NAN;
    }
    // Clamp rounding error so identical vectors report a distance of exactly 0
    1.0 - (dot / denominator).clamp(-1.0, 1.0)
}

#[async_trait]
impl ChunkRepository for MemoryStore {
    async fn insert_chunks(&self, rows: Vec<ChunkRow>, batch_size: usize) -> Result<u64> {
        if batch_size == 0 {
            return Err(IngestError::InvalidInput(
                "batch size must be at least 1".to_string(),
            ));
        }
        if rows.is_empty() {
            return Ok(0);
        }

        let mut stored = self.rows.write().await;

        // Validate the whole batch before touching storage
        for row in &rows {
            self.check_dimension(&row.embedding)?;
        }
        ensure_unique_keys(rows.iter().map(|row| (row.url.as_str(), row.chunk_number)))?;

        let duplicate = {
            let existing: HashSet<(&str, i32)> = stored
                .iter()
                .map(|row| (row.url.as_str(), row.chunk_number))
                .collect();
            rows.iter()
                .find(|row| existing.contains(&(row.url.as_str(), row.chunk_number)))
                .map(|row| (row.url.clone(), row.chunk_number))
        };
        if let Some((url, chunk_number)) = duplicate {
            return Err(IngestError::query(format!(
                "duplicate key (url, chunk_number) = ({url}, {chunk_number})"
            )));
        }

        let count = rows.len() as u64;
        stored.extend(rows);
        debug!("Stored {} chunks in memory", count);
        Ok(count)
    }

    async fn search(&self, query: &SimilarityQuery) -> Result<Vec<SearchResult>> {
        self.check_dimension(&query.embedding)?;

        let stored = self.rows.read().await;
        let mut ranked: Vec<(f64, &ChunkRow)> = stored
            .iter()
            .filter(|row| query.filter.matches(&row.metadata))
            .map(|row| (cosine_distance(&row.embedding, &query.embedding), row))
            .collect();

        // Stable sort keeps storage order for equal distances
        ranked.sort_by(|a, b| a.0.total_cmp(&b.0));
        ranked.truncate(query.match_count);

        Ok(ranked
            .into_iter()
            .map(|(distance, row)| SearchResult {
                url: row.url.clone(),
                content: row.content.clone(),
                metadata: row.metadata.clone(),
                similarity: 1.0 - distance,
            })
            .collect())
    }

    async fn count(&self) -> Result<u64> {
        Ok(self.rows.read().await.len() as u64)
    }
}
