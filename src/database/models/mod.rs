
use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;

use crate::{IngestError, Result};

/// Open key-value document stored alongside each chunk.
pub type Metadata = serde_json::Map<String, Value>;

/// Metadata key honored by [`MetadataFilter`].
pub const SOURCE_KEY: &str = "source";

/// A chunk of source text before it has been embedded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewChunk {
    pub url: String,
    pub chunk_number: i32,
    pub content: String,
    #[serde(default)]
    pub metadata: Metadata,
}

impl NewChunk {
    #[inline]
    pub fn new(
        url: impl Into<String>,
        chunk_number: i32,
        content: impl Into<String>,
        metadata: Metadata,
    ) -> Self {
        Self {
            url: url.into(),
            chunk_number,
            content: content.into(),
            metadata,
        }
    }

    /// Zip parallel column vectors into chunk records.
    ///
    /// Every column must have the same length; a mismatch is rejected instead
    /// of silently truncating to the shortest column.
    #[inline]
    pub fn from_columns(
        urls: Vec<String>,
        chunk_numbers: Vec<i32>,
        contents: Vec<String>,
        metadatas: Vec<Metadata>,
    ) -> Result<Vec<Self>> {
        let len = urls.len();
        if chunk_numbers.len() != len || contents.len() != len || metadatas.len() != len {
            return Err(IngestError::InvalidInput(format!(
                "column lengths differ: {} urls, {} chunk numbers, {} contents, {} metadatas",
                len,
                chunk_numbers.len(),
                contents.len(),
                metadatas.len()
            )));
        }

        Ok(urls
            .into_iter()
            .zip(chunk_numbers)
            .zip(contents)
            .zip(metadatas)
            .map(|(((url, chunk_number), content), metadata)| Self {
                url,
                chunk_number,
                content,
                metadata,
            })
            .collect())
    }

    #[inline]
    pub fn source(&self) -> Option<String> {
        self.metadata.get(SOURCE_KEY).and_then(json_text)
    }
}

/// A chunk paired with its embedding, ready to be persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkRow {
    pub url: String,
    pub chunk_number: i32,
    pub content: String,
    pub embedding: Vec<f32>,
    pub metadata: Metadata,
}

impl ChunkRow {
    #[inline]
    pub fn from_chunk(chunk: NewChunk, embedding: Vec<f32>) -> Self {
        Self {
            url: chunk.url,
            chunk_number: chunk.chunk_number,
            content: chunk.content,
            embedding,
            metadata: chunk.metadata,
        }
    }
}

/// One ranked hit returned by a similarity search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct SearchResult {
    pub url: String,
    pub content: String,
    #[sqlx(json)]
    pub metadata: Metadata,
    pub similarity: f64,
}

/// Exact-match predicate on the `source` metadata field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataFilter {
    pub source: Option<String>,
}

impl MetadataFilter {
    /// A filter that matches every row.
    #[inline]
    pub fn none() -> Self {
        Self::default()
    }

    #[inline]
    pub fn by_source(source: impl Into<String>) -> Self {
        Self {
            source: Some(source.into()),
        }
    }

    /// Build a filter from a caller-supplied mapping. Only a non-null `source`
    /// key is honored; every other key is ignored.
    #[inline]
    pub fn from_metadata(metadata: &Metadata) -> Self {
        Self {
            source: metadata.get(SOURCE_KEY).and_then(json_text),
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.source.is_none()
    }

    /// Same semantics as `metadata->>'source' = $1` in Postgres.
    #[inline]
    pub fn matches(&self, metadata: &Metadata) -> bool {
        match self.source {
            None => true,
            Some(ref wanted) => metadata
                .get(SOURCE_KEY)
                .and_then(json_text)
                .is_some_and(|value| value == *wanted),
        }
    }
}

/// A nearest-neighbour request against stored embeddings.
#[derive(Debug, Clone, PartialEq)]
pub struct SimilarityQuery {
    pub embedding: Vec<f32>,
    pub match_count: usize,
    pub filter: MetadataFilter,
}

/// Textual form of a JSON value as produced by the `->>` operator.
fn json_text(value: &Value) -> Option<String> {
    match *value {
        Value::Null => None,
        Value::String(ref text) => Some(text.clone()),
        ref other => Some(other.to_string()),
    }
}

/// Reject batches that repeat a `(url, chunk_number)` pair.
pub(crate) fn ensure_unique_keys<'a, I>(keys: I) -> Result<()>
where
    I: IntoIterator<Item = (&'a str, i32)>,
{
    let mut seen = HashSet::new();
    for (url, chunk_number) in keys {
        if !seen.insert((url, chunk_number)) {
            return Err(IngestError::InvalidInput(format!(
                "duplicate chunk {chunk_number} for {url} in batch"
            )));
        }
    }
    Ok(())
}
