// Embeddings module
// Remote embedding generation behind the `Embedder` trait


pub mod openai;

use async_trait::async_trait;
use tracing::debug;

use crate::{IngestError, Result};

pub use openai::OpenAiEmbedder;

/// Turns texts into equal-length vectors, one per input, in input order.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed the whole slice in a single request. An empty slice yields an
    /// empty result without contacting the service.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Identifier of the model producing the vectors.
    fn model(&self) -> &str;
}

/// Embed `texts` with requests of at most `batch_size` inputs each,
/// concatenating the results in input order.
#[inline]
pub async fn embed_in_batches(
    embedder: &dyn Embedder,
    texts: &[String],
    batch_size: usize,
) -> Result<Vec<Vec<f32>>> {
    if batch_size == 0 {
        return Err(IngestError::InvalidInput(
            "batch size must be at least 1".to_string(),
        ));
    }
    if texts.is_empty() {
        return Ok(Vec::new());
    }

    let mut embeddings = Vec::with_capacity(texts.len());
    for (index, batch) in texts.chunks(batch_size).enumerate() {
        debug!(
            "Embedding batch {} ({} texts) with {}",
            index + 1,
            batch.len(),
            embedder.model()
        );
        let vectors = embedder.embed_batch(batch).await?;
        if vectors.len() != batch.len() {
            return Err(IngestError::embedding(format!(
                "Mismatch between request and response counts: {} vs {}",
                batch.len(),
                vectors.len()
            )));
        }
        embeddings.extend(vectors);
    }

    Ok(embeddings)
}
