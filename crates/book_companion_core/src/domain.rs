//! crates/book_companion_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any database or web framework.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An open string-keyed map of dynamically-typed values.
///
/// Background questionnaires and personalization preferences carry arbitrary
/// keys, so they are stored as JSON objects rather than fixed records.
pub type JsonMap = serde_json::Map<String, serde_json::Value>;

/// Shallow-merges `patch` into `base`: patch keys overwrite existing keys at
/// the top level, other keys are left untouched. Nested objects are replaced
/// wholesale, not merged.
///
/// This is the reference semantics for preference updates; storage backends
/// must merge the same way (Postgres JSONB `||` does).
pub fn merge_shallow(mut base: JsonMap, patch: JsonMap) -> JsonMap {
    for (key, value) in patch {
        base.insert(key, value);
    }
    base
}

/// A registered reader account.
#[derive(Debug, Clone)]
pub struct Account {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub background: JsonMap,
    pub preferences: JsonMap,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The fields required to create a new account. The password arrives here
/// already hashed; the core never sees plaintext credentials.
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub email: String,
    pub name: String,
    pub password_hash: String,
    pub background: JsonMap,
    pub preferences: JsonMap,
}

/// Only used internally for signin - contains sensitive data.
#[derive(Debug, Clone)]
pub struct AccountCredentials {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub password_hash: String,
}

/// The role of a single conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    System,
    User,
    Assistant,
}

/// One turn of a conversation, supplied by the caller as prior context.
/// Turns are not persisted; each chat request is stateless.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: TurnRole,
    pub content: String,
}

impl ChatTurn {
    pub fn new(role: TurnRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// The payload stored alongside each embedded chunk of book content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkPayload {
    pub text: String,
    pub chapter: String,
    pub section: Option<String>,
    /// `"<chapter>/<section-or-'main'>"`, used for answer attribution.
    pub source: String,
}

impl ChunkPayload {
    pub fn new(text: String, chapter: String, section: Option<String>) -> Self {
        let source = format!("{}/{}", chapter, section.as_deref().unwrap_or("main"));
        Self {
            text,
            chapter,
            section,
            source,
        }
    }
}

/// A chunk returned from a similarity search, ranked by score.
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub score: f32,
    pub payload: ChunkPayload,
}

/// The assembled answer to a chat query.
#[derive(Debug, Clone)]
pub struct ChatAnswer {
    pub message: String,
    /// Deduplicated source labels of the retrieved chunks. Empty when
    /// retrieval was skipped or failed.
    pub sources: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

/// The outcome of a provider-backed text transformation.
///
/// Personalization and translation fail open: on provider error the original
/// text is returned unchanged. This type keeps that distinction visible so
/// callers can log or alert on degradation instead of silently discarding it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Produced {
    /// The provider returned a fresh result.
    Generated(String),
    /// The provider failed; the value is the original input.
    Degraded(String),
}

impl Produced {
    pub fn text(&self) -> &str {
        match self {
            Produced::Generated(s) | Produced::Degraded(s) => s,
        }
    }

    pub fn into_text(self) -> String {
        match self {
            Produced::Generated(s) | Produced::Degraded(s) => s,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Produced::Degraded(_))
    }
}

/// A chapter rewritten for one reader's background.
#[derive(Debug, Clone)]
pub struct PersonalizedChapter {
    pub original_content: String,
    pub personalized_content: String,
    pub difficulty_hint: String,
    pub user_background: JsonMap,
}

/// A chapter translated into a target language. Title and content are
/// translated independently; either may have fallen back to the original.
#[derive(Debug, Clone)]
pub struct TranslatedChapter {
    pub original_title: String,
    pub translated_title: String,
    pub original_content: String,
    pub translated_content: String,
    pub target_language: String,
}
