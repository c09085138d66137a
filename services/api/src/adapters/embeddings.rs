//! services/api/src/adapters/embeddings.rs
//!
//! This module contains the adapter for the embedding provider.
//! It implements the `EmbeddingService` port from the `core` crate against
//! the OpenAI-compatible `/embeddings` REST endpoint.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use book_companion_core::ports::{EmbeddingService, PortError, PortResult};

#[derive(Debug, Serialize)]
struct EmbeddingRequest {
    model: String,
    input: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `EmbeddingService` using an OpenAI-compatible
/// embedding endpoint.
#[derive(Clone)]
pub struct OpenAiEmbeddingAdapter {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    dims: usize,
}

impl OpenAiEmbeddingAdapter {
    /// Creates a new `OpenAiEmbeddingAdapter`.
    ///
    /// `endpoint` is the API base (e.g. "https://api.openai.com/v1") and
    /// `dims` the dimensionality of the configured model (1536 for
    /// text-embedding-3-small).
    pub fn new(api_key: String, model: String, endpoint: String, dims: usize) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint,
            api_key,
            model,
            dims,
        }
    }
}

//=========================================================================================
// `EmbeddingService` Trait Implementation
//=========================================================================================

#[async_trait]
impl EmbeddingService for OpenAiEmbeddingAdapter {
    async fn embed(&self, text: &str) -> PortResult<Vec<f32>> {
        let url = format!("{}/embeddings", self.endpoint);
        let request = EmbeddingRequest {
            model: self.model.clone(),
            input: vec![text.to_string()],
        };

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await
            .map_err(|e| PortError::Provider(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(PortError::Provider(format!(
                "Embedding API error {status}: {body}"
            )));
        }

        let result: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| PortError::Provider(e.to_string()))?;

        result
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| PortError::Provider("Empty embedding response".to_string()))
    }

    fn dimensions(&self) -> usize {
        self.dims
    }
}
