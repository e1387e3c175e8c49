//! Shared fakes for unit tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::database::models::{Metadata, NewChunk};
use crate::embeddings::Embedder;
use crate::{IngestError, Result};

/// Embedder backed by a fixed text → vector table.
///
/// Unknown texts map to a vector derived from their byte length so every
/// input still gets a distinct, deterministic embedding.
pub struct FixtureEmbedder {
    dimension: usize,
    vectors: HashMap<String, Vec<f32>>,
    fail_with: Option<String>,
    calls: Mutex<Vec<Vec<String>>>,
}

impl FixtureEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            vectors: HashMap::new(),
            fail_with: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_vector(mut self, text: &str, vector: &[f32]) -> Self {
        assert_eq!(vector.len(), self.dimension, "fixture vector dimension");
        self.vectors.insert(text.to_string(), vector.to_vec());
        self
    }

    pub fn failing(mut self, message: &str) -> Self {
        self.fail_with = Some(message.to_string());
        self
    }

    /// Texts of every request made so far, one entry per call.
    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().expect("calls lock poisoned").clone()
    }

    fn vector_for(&self, text: &str) -> Vec<f32> {
        self.vectors.get(text).cloned().unwrap_or_else(|| {
            let mut vector = vec![0.0; self.dimension];
            vector[text.len() % self.dimension] = 1.0;
            vector
        })
    }
}

#[async_trait]
impl Embedder for FixtureEmbedder {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        self.calls
            .lock()
            .expect("calls lock poisoned")
            .push(texts.to_vec());

        if let Some(ref message) = self.fail_with {
            return Err(IngestError::embedding(message.clone()));
        }
        Ok(texts.iter().map(|text| self.vector_for(text)).collect())
    }

    fn model(&self) -> &str {
        "fixture"
    }
}

/// Embedder for the cats/dogs/rockets scenario: "feline animal" lands next to
/// "cats are mammals".
pub fn animal_embedder() -> FixtureEmbedder {
    FixtureEmbedder::new(3)
        .with_vector("cats are mammals", &[0.9, 0.3, 0.0])
        .with_vector("dogs are mammals", &[0.3, 0.9, 0.0])
        .with_vector("rockets use fuel", &[0.0, 0.1, 1.0])
        .with_vector("feline animal", &[1.0, 0.2, 0.1])
}

pub fn source_metadata(source: &str) -> Metadata {
    let mut metadata = Metadata::new();
    metadata.insert("source".to_string(), serde_json::json!(source));
    metadata
}

pub fn animal_chunks() -> Vec<NewChunk> {
    vec![
        NewChunk::new("docA", 0, "cats are mammals", source_metadata("wiki")),
        NewChunk::new("docA", 1, "dogs are mammals", source_metadata("wiki")),
        NewChunk::new("docB", 0, "rockets use fuel", source_metadata("nasa")),
    ]
}
