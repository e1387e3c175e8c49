//! Chunk ingestion: embed chunk contents and persist them atomically.


use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, error, info};

use crate::database::ChunkRepository;
use crate::database::models::{ChunkRow, Metadata, NewChunk, ensure_unique_keys};
use crate::embeddings::{Embedder, embed_in_batches};
use crate::{IngestError, Result};

/// Default number of chunks per embedding request and per INSERT statement.
pub const DEFAULT_BATCH_SIZE: usize = 20;

pub struct ChunkStore {
    embedder: Arc<dyn Embedder>,
    repository: Arc<dyn ChunkRepository>,
}

impl ChunkStore {
    #[inline]
    pub fn new(embedder: Arc<dyn Embedder>, repository: Arc<dyn ChunkRepository>) -> Self {
        Self {
            embedder,
            repository,
        }
    }

    /// Embed and persist `chunks`, returning how many rows were committed.
    ///
    /// `batch_size` caps both the number of texts per embedding request and
    /// the rows per INSERT statement; all statements share one transaction.
    /// `full_documents` is accepted for callers that track whole documents and
    /// is not persisted.
    #[inline]
    pub async fn add_chunks(
        &self,
        chunks: Vec<NewChunk>,
        full_documents: &HashMap<String, String>,
        batch_size: usize,
    ) -> Result<usize> {
        self.try_add_chunks(chunks, full_documents, batch_size)
            .await
            .inspect_err(|e| error!("Error adding chunks: {}", e))
    }

    /// Column-oriented variant of [`Self::add_chunks`]: position `i` of each
    /// vector describes the same chunk.
    #[inline]
    pub async fn add_chunk_columns(
        &self,
        urls: Vec<String>,
        chunk_numbers: Vec<i32>,
        contents: Vec<String>,
        metadatas: Vec<Metadata>,
        full_documents: &HashMap<String, String>,
        batch_size: usize,
    ) -> Result<usize> {
        let chunks = NewChunk::from_columns(urls, chunk_numbers, contents, metadatas)
            .inspect_err(|e| error!("Error adding chunks: {}", e))?;
        self.add_chunks(chunks, full_documents, batch_size).await
    }

    #[inline]
    pub async fn count(&self) -> Result<u64> {
        self.repository.count().await
    }

    async fn try_add_chunks(
        &self,
        chunks: Vec<NewChunk>,
        full_documents: &HashMap<String, String>,
        batch_size: usize,
    ) -> Result<usize> {
        if batch_size == 0 {
            return Err(IngestError::InvalidInput(
                "batch size must be at least 1".to_string(),
            ));
        }
        if chunks.is_empty() {
            debug!("No chunks to add");
            return Ok(0);
        }
        ensure_unique_keys(
            chunks
                .iter()
                .map(|chunk| (chunk.url.as_str(), chunk.chunk_number)),
        )?;

        debug!(
            "Adding {} chunks ({} full documents supplied)",
            chunks.len(),
            full_documents.len()
        );

        let contents: Vec<String> = chunks.iter().map(|chunk| chunk.content.clone()).collect();
        let embeddings = embed_in_batches(self.embedder.as_ref(), &contents, batch_size).await?;

        let rows: Vec<ChunkRow> = chunks
            .into_iter()
            .zip(embeddings)
            .map(|(chunk, embedding)| ChunkRow::from_chunk(chunk, embedding))
            .collect();
        let expected = rows.len();

        let written = self.repository.insert_chunks(rows, batch_size).await?;
        let written = usize::try_from(written).unwrap_or(usize::MAX);
        if written != expected {
            return Err(IngestError::query(format!(
                "Expected to write {expected} chunks but the store reported {written}"
            )));
        }

        info!("Successfully added {} chunks", written);
        Ok(written)
    }
}
