//! Similarity search: embed a query and rank stored chunks against it.


use std::sync::Arc;

use tracing::{debug, error};

use crate::database::ChunkRepository;
use crate::database::models::{MetadataFilter, SearchResult, SimilarityQuery};
use crate::embeddings::Embedder;
use crate::{IngestError, Result};

/// Number of results returned when the caller does not choose.
pub const DEFAULT_MATCH_COUNT: usize = 5;

pub struct SimilaritySearch {
    embedder: Arc<dyn Embedder>,
    repository: Arc<dyn ChunkRepository>,
}

impl SimilaritySearch {
    #[inline]
    pub fn new(embedder: Arc<dyn Embedder>, repository: Arc<dyn ChunkRepository>) -> Self {
        Self {
            embedder,
            repository,
        }
    }

    /// Return at most `match_count` chunks ordered by descending similarity to
    /// `query`, restricted to `filter`.
    #[inline]
    pub async fn search(
        &self,
        query: &str,
        match_count: usize,
        filter: &MetadataFilter,
    ) -> Result<Vec<SearchResult>> {
        self.try_search(query, match_count, filter)
            .await
            .inspect_err(|e| error!("Error searching chunks: {}", e))
    }

    /// Rank against a precomputed query embedding.
    #[inline]
    pub async fn search_by_embedding(
        &self,
        embedding: Vec<f32>,
        match_count: usize,
        filter: &MetadataFilter,
    ) -> Result<Vec<SearchResult>> {
        self.rank(embedding, match_count, filter)
            .await
            .inspect_err(|e| error!("Error searching chunks: {}", e))
    }

    async fn try_search(
        &self,
        query: &str,
        match_count: usize,
        filter: &MetadataFilter,
    ) -> Result<Vec<SearchResult>> {
        if match_count == 0 {
            return Ok(Vec::new());
        }

        debug!("Embedding search query ({} chars)", query.len());
        let embedding = self
            .embedder
            .embed_batch(&[query.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| IngestError::embedding("No embedding returned for search query"))?;

        self.rank(embedding, match_count, filter).await
    }

    async fn rank(
        &self,
        embedding: Vec<f32>,
        match_count: usize,
        filter: &MetadataFilter,
    ) -> Result<Vec<SearchResult>> {
        if match_count == 0 {
            return Ok(Vec::new());
        }

        let query = SimilarityQuery {
            embedding,
            match_count,
            filter: filter.clone(),
        };
        let results = self.repository.search(&query).await?;
        debug!(
            "Found {} results (limit {}, source filter {:?})",
            results.len(),
            match_count,
            filter.source
        );
        Ok(results)
    }
}
