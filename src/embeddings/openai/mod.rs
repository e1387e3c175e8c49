
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;
use url::Url;

use super::Embedder;
use crate::config::EmbeddingConfig;
use crate::{IngestError, Result};

/// Longest slice of an error body kept in error messages.
const MAX_ERROR_BODY_CHARS: usize = 512;

/// Client for OpenAI-compatible `/embeddings` endpoints.
///
/// One [`Embedder::embed_batch`] call issues exactly one HTTP request. There is
/// no retry: quota and transport failures are returned to the caller.
#[derive(Debug, Clone)]
pub struct OpenAiEmbedder {
    endpoint: Url,
    model: String,
    api_key: Option<String>,
    agent: ureq::Agent,
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
}

fn build_agent(timeout: Duration) -> ureq::Agent {
    ureq::Agent::config_builder()
        .timeout_global(Some(timeout))
        .http_status_as_error(false)
        .build()
        .into()
}

impl OpenAiEmbedder {
    #[inline]
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        config.validate()?;
        let endpoint = config.endpoint_url()?;

        Ok(Self {
            endpoint,
            model: config.model.clone(),
            api_key: config
                .api_key
                .as_ref()
                .map(|key| key.trim().to_string())
                .filter(|key| !key.is_empty()),
            agent: build_agent(config.timeout()),
        })
    }

    #[inline]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.agent = build_agent(timeout);
        self
    }

    #[inline]
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Blocking request for one batch. `texts` must not be empty.
    fn request_embeddings(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let request = EmbeddingRequest {
            model: &self.model,
            input: texts,
        };
        let request_json = serde_json::to_string(&request).map_err(|e| {
            IngestError::embedding_caused_by("Failed to serialize embedding request", e)
        })?;

        let mut builder = self
            .agent
            .post(self.endpoint.as_str())
            .header("Content-Type", "application/json");
        if let Some(ref api_key) = self.api_key {
            builder = builder.header("Authorization", &format!("Bearer {api_key}"));
        }

        let mut response = builder.send(&request_json).map_err(|e| {
            IngestError::embedding_caused_by(
                format!("Embedding request to {} failed", self.endpoint),
                e,
            )
        })?;

        let status = response.status();
        let body = response.body_mut().read_to_string().map_err(|e| {
            IngestError::embedding_caused_by("Failed to read embedding response", e)
        })?;

        if !status.is_success() {
            return Err(IngestError::embedding(format!(
                "Embedding service returned HTTP {}: {}",
                status.as_u16(),
                error_message(&body)
            )));
        }

        let mut parsed: EmbeddingResponse = serde_json::from_str(&body).map_err(|e| {
            IngestError::embedding_caused_by("Failed to parse embedding response", e)
        })?;

        if parsed.data.len() != texts.len() {
            return Err(IngestError::embedding(format!(
                "Mismatch between request and response counts: {} vs {}",
                texts.len(),
                parsed.data.len()
            )));
        }

        // The service may return entries out of order
        parsed.data.sort_by_key(|entry| entry.index);
        if parsed
            .data
            .iter()
            .enumerate()
            .any(|(position, entry)| entry.index != position)
        {
            return Err(IngestError::embedding(
                "Embedding response indices do not cover the request",
            ));
        }

        Ok(parsed.data.into_iter().map(|entry| entry.embedding).collect())
    }
}

/// Prefer the structured `error.message` field, else a truncated raw body.
fn error_message(body: &str) -> String {
    serde_json::from_str::<ErrorResponse>(body).map_or_else(
        |_| body.chars().take(MAX_ERROR_BODY_CHARS).collect(),
        |parsed| parsed.error.message,
    )
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!(
            "Requesting {} embeddings from {} with model {}",
            texts.len(),
            self.endpoint,
            self.model
        );

        let client = self.clone();
        let texts = texts.to_vec();
        let embeddings = tokio::task::spawn_blocking(move || client.request_embeddings(&texts))
            .await
            .map_err(|e| IngestError::embedding_caused_by("Embedding task failed", e))??;

        debug!(
            "Received {} embeddings with {} dimensions",
            embeddings.len(),
            embeddings.first().map_or(0, Vec::len)
        );
        Ok(embeddings)
    }

    fn model(&self) -> &str {
        &self.model
    }
}
