// Database module
// Chunk persistence behind a single repository trait, with a pgvector backend
// for production and an in-memory backend for tests and local experiments

pub mod memory;
pub mod models;
pub mod postgres;

use async_trait::async_trait;

use crate::Result;

pub use memory::MemoryStore;
pub use models::{ChunkRow, Metadata, MetadataFilter, NewChunk, SearchResult, SimilarityQuery};
pub use postgres::PostgresStore;

/// Storage contract for embedded chunks.
#[async_trait]
pub trait ChunkRepository: Send + Sync {
    /// Persist `rows` atomically: either every row is committed or none is.
    /// `batch_size` bounds how many rows go into a single INSERT statement.
    async fn insert_chunks(&self, rows: Vec<ChunkRow>, batch_size: usize) -> Result<u64>;

    /// Rank stored chunks by cosine distance to `query.embedding`.
    async fn search(&self, query: &SimilarityQuery) -> Result<Vec<SearchResult>>;

    /// Number of stored chunks.
    async fn count(&self) -> Result<u64>;
}
