//! services/api/src/adapters/vector_store.rs
//!
//! This module contains the adapter for the Qdrant vector store.
//! It implements the `VectorIndexService` port from the `core` crate against
//! Qdrant's REST API.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use book_companion_core::domain::{ChunkPayload, ScoredChunk};
use book_companion_core::ports::{PortError, PortResult, VectorIndexService};

//=========================================================================================
// Request/Response Wire Types
//=========================================================================================

#[derive(Debug, Serialize)]
struct SearchRequest<'a> {
    vector: &'a [f32],
    limit: usize,
    with_payload: bool,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    result: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    score: f32,
    payload: Option<ChunkPayload>,
}

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `VectorIndexService` against Qdrant over HTTP.
#[derive(Clone)]
pub struct QdrantHttpAdapter {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    collection: String,
}

impl QdrantHttpAdapter {
    /// Creates a new `QdrantHttpAdapter`.
    pub fn new(base_url: String, api_key: Option<String>, collection: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            collection,
        }
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        let mut builder = self.client.request(method, url);
        if let Some(key) = &self.api_key {
            builder = builder.header("api-key", key);
        }
        builder
    }

    async fn expect_success(response: reqwest::Response, action: &str) -> PortResult<reqwest::Response> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Err(PortError::Provider(format!(
            "Qdrant {action} failed with {status}: {body}"
        )))
    }
}

//=========================================================================================
// `VectorIndexService` Trait Implementation
//=========================================================================================

#[async_trait]
impl VectorIndexService for QdrantHttpAdapter {
    async fn reset_collection(&self, dimensions: usize) -> PortResult<()> {
        // Dropping a collection that does not exist is fine; only the create
        // call has to succeed.
        let _ = self
            .request(
                reqwest::Method::DELETE,
                &format!("/collections/{}", self.collection),
            )
            .send()
            .await;

        let response = self
            .request(
                reqwest::Method::PUT,
                &format!("/collections/{}", self.collection),
            )
            .json(&json!({
                "vectors": { "size": dimensions, "distance": "Cosine" }
            }))
            .send()
            .await
            .map_err(|e| PortError::Provider(e.to_string()))?;

        Self::expect_success(response, "collection create").await?;
        Ok(())
    }

    async fn upsert_chunk(
        &self,
        id: Uuid,
        vector: Vec<f32>,
        payload: ChunkPayload,
    ) -> PortResult<()> {
        let response = self
            .request(
                reqwest::Method::PUT,
                &format!("/collections/{}/points?wait=true", self.collection),
            )
            .json(&json!({
                "points": [{
                    "id": id.to_string(),
                    "vector": vector,
                    "payload": payload,
                }]
            }))
            .send()
            .await
            .map_err(|e| PortError::Provider(e.to_string()))?;

        Self::expect_success(response, "upsert").await?;
        Ok(())
    }

    async fn search(&self, vector: &[f32], limit: usize) -> PortResult<Vec<ScoredChunk>> {
        let response = self
            .request(
                reqwest::Method::POST,
                &format!("/collections/{}/points/search", self.collection),
            )
            .json(&SearchRequest {
                vector,
                limit,
                with_payload: true,
            })
            .send()
            .await
            .map_err(|e| PortError::Provider(e.to_string()))?;

        let response = Self::expect_success(response, "search").await?;
        let parsed: SearchResponse = response
            .json()
            .await
            .map_err(|e| PortError::Provider(e.to_string()))?;

        Ok(parsed
            .result
            .into_iter()
            .filter_map(|hit| {
                hit.payload.map(|payload| ScoredChunk {
                    score: hit.score,
                    payload,
                })
            })
            .collect())
    }
}
