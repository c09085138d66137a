//! crates/book_companion_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of specific external implementations like databases or APIs.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::{Account, AccountCredentials, ChatTurn, ChunkPayload, JsonMap, NewAccount, ScoredChunk};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Already exists: {0}")]
    Duplicate(String),
    #[error("Unauthorized")]
    Unauthorized,
    #[error("Provider call failed: {0}")]
    Provider(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

/// Persistence for reader accounts and their preference maps.
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Creates a new account. Fails with `PortError::Duplicate` when the
    /// email is already registered.
    async fn create_account(&self, new_account: NewAccount) -> PortResult<Account>;

    /// Looks up the credential record for signin. `NotFound` on unknown email.
    async fn get_credentials_by_email(&self, email: &str) -> PortResult<AccountCredentials>;

    async fn get_account_by_id(&self, account_id: Uuid) -> PortResult<Account>;

    /// Shallow-merges `patch` into the stored preference map (new keys
    /// overwrite or add, others untouched) and returns the merged map.
    async fn merge_preferences(&self, account_id: Uuid, patch: JsonMap) -> PortResult<JsonMap>;
}

/// Converts text into a fixed-dimension embedding vector.
#[async_trait]
pub trait EmbeddingService: Send + Sync {
    async fn embed(&self, text: &str) -> PortResult<Vec<f32>>;

    /// The dimensionality of the vectors this service produces.
    fn dimensions(&self) -> usize;
}

/// Requests a chat completion from the language-model provider.
#[async_trait]
pub trait CompletionService: Send + Sync {
    async fn complete(
        &self,
        turns: &[ChatTurn],
        temperature: f32,
        max_tokens: u32,
    ) -> PortResult<String>;
}

/// Stores and searches embedded content chunks.
#[async_trait]
pub trait VectorIndexService: Send + Sync {
    /// Drops any existing collection of the configured name and creates a
    /// fresh one with the given dimensionality.
    async fn reset_collection(&self, dimensions: usize) -> PortResult<()>;

    async fn upsert_chunk(
        &self,
        id: Uuid,
        vector: Vec<f32>,
        payload: ChunkPayload,
    ) -> PortResult<()>;

    /// Returns up to `limit` chunks ranked by similarity. A missing or empty
    /// collection yields an empty list rather than an error.
    async fn search(&self, vector: &[f32], limit: usize) -> PortResult<Vec<ScoredChunk>>;
}
