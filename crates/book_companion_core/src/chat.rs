//! crates/book_companion_core/src/chat.rs
//!
//! The retrieval-augmented chat pipeline: embed the question, search the
//! vector index for relevant book chunks, assemble a prompt, and request a
//! completion. Also owns content ingestion into the index.

use std::sync::Arc;

use chrono::Utc;
use sha2::{Digest, Sha256};
use tracing::warn;
use uuid::Uuid;

use crate::domain::{ChatAnswer, ChatTurn, ChunkPayload, TurnRole};
use crate::ports::{CompletionService, EmbeddingService, PortResult, VectorIndexService};

const SYSTEM_PROMPT: &str = "You are a helpful AI assistant for a book. \n\
Answer questions based on the provided book content. \n\
If the answer is not in the provided context, say so clearly.\n\
Keep answers concise and informative.";

/// How many chunks to retrieve per question.
const RETRIEVAL_LIMIT: usize = 3;

/// A single chat request. Prior turns are supplied by the caller; the
/// pipeline itself is stateless.
#[derive(Debug, Clone, Default)]
pub struct ChatQuery {
    pub message: String,
    pub selected_text: Option<String>,
    pub history: Vec<ChatTurn>,
}

/// Orchestrates embed -> search -> prompt assembly -> complete.
pub struct ChatPipeline {
    embeddings: Arc<dyn EmbeddingService>,
    index: Arc<dyn VectorIndexService>,
    completions: Arc<dyn CompletionService>,
}

impl ChatPipeline {
    pub fn new(
        embeddings: Arc<dyn EmbeddingService>,
        index: Arc<dyn VectorIndexService>,
        completions: Arc<dyn CompletionService>,
    ) -> Self {
        Self {
            embeddings,
            index,
            completions,
        }
    }

    /// Answers a question about the book.
    ///
    /// Retrieval failure is not fatal: if the search errors (e.g. the
    /// collection was never created) the answer is produced without book
    /// context and with an empty source list. Embedding or completion
    /// failures propagate to the caller.
    pub async fn answer(&self, query: ChatQuery) -> PortResult<ChatAnswer> {
        let embedding = self.embeddings.embed(&query.message).await?;

        let results = match self.index.search(&embedding, RETRIEVAL_LIMIT).await {
            Ok(results) => results,
            Err(e) => {
                warn!("vector search failed, answering without context: {e}");
                Vec::new()
            }
        };

        let mut context = String::new();
        let mut sources: Vec<String> = Vec::new();
        for chunk in &results {
            if chunk.payload.text.is_empty() {
                continue;
            }
            context.push_str(&chunk.payload.text);
            context.push('\n');
            if !sources.contains(&chunk.payload.source) {
                sources.push(chunk.payload.source.clone());
            }
        }

        if let Some(selected) = &query.selected_text {
            context = format!("User selected text: {selected}\n\n{context}");
        }

        let mut turns = Vec::with_capacity(query.history.len() + 2);
        turns.push(ChatTurn::new(TurnRole::System, SYSTEM_PROMPT));
        turns.extend(query.history.iter().cloned());
        turns.push(ChatTurn::new(
            TurnRole::User,
            format!(
                "Context from the book:\n{context}\n\nUser question: {}",
                query.message
            ),
        ));

        let message = self.completions.complete(&turns, 0.7, 500).await?;

        Ok(ChatAnswer {
            message,
            sources,
            timestamp: Utc::now(),
        })
    }

    /// Embeds a chunk of book text and upserts it into the vector index.
    ///
    /// The point id is derived from a digest of the chapter, section, and
    /// text, so re-ingesting identical content overwrites the same point
    /// instead of accumulating duplicates.
    pub async fn ingest(
        &self,
        text: &str,
        chapter: &str,
        section: Option<&str>,
    ) -> PortResult<Uuid> {
        let embedding = self.embeddings.embed(text).await?;
        let id = chunk_id(chapter, section, text);
        let payload = ChunkPayload::new(
            text.to_string(),
            chapter.to_string(),
            section.map(str::to_string),
        );
        self.index.upsert_chunk(id, embedding, payload).await?;
        Ok(id)
    }
}

/// Derives a deterministic, collision-resistant point id for a content chunk.
fn chunk_id(chapter: &str, section: Option<&str>, text: &str) -> Uuid {
    let mut hasher = Sha256::new();
    hasher.update(chapter.as_bytes());
    hasher.update([0x1f]);
    hasher.update(section.unwrap_or("").as_bytes());
    hasher.update([0x1f]);
    hasher.update(text.as_bytes());
    let digest = hasher.finalize();
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&digest[..16]);
    Uuid::from_bytes(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ScoredChunk;
    use crate::ports::PortError;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct FixedEmbedder;

    #[async_trait]
    impl EmbeddingService for FixedEmbedder {
        async fn embed(&self, _text: &str) -> PortResult<Vec<f32>> {
            Ok(vec![0.1, 0.2, 0.3])
        }

        fn dimensions(&self) -> usize {
            3
        }
    }

    struct FailingEmbedder;

    #[async_trait]
    impl EmbeddingService for FailingEmbedder {
        async fn embed(&self, _text: &str) -> PortResult<Vec<f32>> {
            Err(PortError::Provider("embedding quota exceeded".into()))
        }

        fn dimensions(&self) -> usize {
            3
        }
    }

    /// Returns canned chunks, or errors when `fail` is set.
    struct StubIndex {
        chunks: Vec<ScoredChunk>,
        fail: bool,
        upserted: Mutex<Vec<(Uuid, ChunkPayload)>>,
    }

    impl StubIndex {
        fn with_chunks(chunks: Vec<ScoredChunk>) -> Self {
            Self {
                chunks,
                fail: false,
                upserted: Mutex::new(Vec::new()),
            }
        }

        fn failing() -> Self {
            Self {
                chunks: Vec::new(),
                fail: true,
                upserted: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl VectorIndexService for StubIndex {
        async fn reset_collection(&self, _dimensions: usize) -> PortResult<()> {
            Ok(())
        }

        async fn upsert_chunk(
            &self,
            id: Uuid,
            _vector: Vec<f32>,
            payload: ChunkPayload,
        ) -> PortResult<()> {
            self.upserted.lock().unwrap().push((id, payload));
            Ok(())
        }

        async fn search(&self, _vector: &[f32], _limit: usize) -> PortResult<Vec<ScoredChunk>> {
            if self.fail {
                return Err(PortError::Provider("collection not found".into()));
            }
            Ok(self.chunks.clone())
        }
    }

    /// Records the turns it was called with and echoes a fixed reply.
    struct RecordingCompleter {
        turns_seen: Mutex<Vec<ChatTurn>>,
    }

    impl RecordingCompleter {
        fn new() -> Self {
            Self {
                turns_seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl CompletionService for RecordingCompleter {
        async fn complete(
            &self,
            turns: &[ChatTurn],
            _temperature: f32,
            _max_tokens: u32,
        ) -> PortResult<String> {
            *self.turns_seen.lock().unwrap() = turns.to_vec();
            Ok("The CPU executes instructions.".to_string())
        }
    }

    fn chunk(text: &str, chapter: &str, section: Option<&str>) -> ScoredChunk {
        ScoredChunk {
            score: 0.9,
            payload: ChunkPayload::new(
                text.to_string(),
                chapter.to_string(),
                section.map(str::to_string),
            ),
        }
    }

    fn pipeline(index: StubIndex, completer: Arc<RecordingCompleter>) -> ChatPipeline {
        ChatPipeline::new(Arc::new(FixedEmbedder), Arc::new(index), completer)
    }

    #[tokio::test]
    async fn search_failure_degrades_to_empty_sources() {
        let completer = Arc::new(RecordingCompleter::new());
        let pipeline = pipeline(StubIndex::failing(), completer.clone());

        let answer = pipeline
            .answer(ChatQuery {
                message: "What does a CPU do?".into(),
                ..Default::default()
            })
            .await
            .unwrap();

        assert!(answer.sources.is_empty());
        assert_eq!(answer.message, "The CPU executes instructions.");
    }

    #[tokio::test]
    async fn retrieved_chunks_feed_context_and_sources() {
        let chunks = vec![
            chunk("The CPU executes instructions.", "ch1", Some("intro")),
            chunk("Registers hold operands.", "ch1", Some("intro")),
            chunk("Memory is byte-addressed.", "ch2", None),
        ];
        let completer = Arc::new(RecordingCompleter::new());
        let pipeline = pipeline(StubIndex::with_chunks(chunks), completer.clone());

        let answer = pipeline
            .answer(ChatQuery {
                message: "What does a CPU do?".into(),
                ..Default::default()
            })
            .await
            .unwrap();

        // Duplicate source labels collapse; ranked order of first sight kept.
        assert_eq!(answer.sources, vec!["ch1/intro", "ch2/main"]);

        let turns = completer.turns_seen.lock().unwrap();
        let last = turns.last().unwrap();
        assert!(last.content.contains("The CPU executes instructions."));
        assert!(last.content.contains("User question: What does a CPU do?"));
    }

    #[tokio::test]
    async fn selected_text_is_prepended_to_context() {
        let completer = Arc::new(RecordingCompleter::new());
        let pipeline = pipeline(
            StubIndex::with_chunks(vec![chunk("Body text.", "ch3", None)]),
            completer.clone(),
        );

        pipeline
            .answer(ChatQuery {
                message: "Explain this".into(),
                selected_text: Some("the highlighted passage".into()),
                history: Vec::new(),
            })
            .await
            .unwrap();

        let turns = completer.turns_seen.lock().unwrap();
        let last = turns.last().unwrap();
        let selected_pos = last
            .content
            .find("User selected text: the highlighted passage")
            .unwrap();
        let body_pos = last.content.find("Body text.").unwrap();
        assert!(selected_pos < body_pos);
    }

    #[tokio::test]
    async fn history_is_passed_through_in_order() {
        let completer = Arc::new(RecordingCompleter::new());
        let pipeline = pipeline(StubIndex::with_chunks(Vec::new()), completer.clone());

        let history = vec![
            ChatTurn::new(TurnRole::User, "first question"),
            ChatTurn::new(TurnRole::Assistant, "first answer"),
        ];
        pipeline
            .answer(ChatQuery {
                message: "follow-up".into(),
                selected_text: None,
                history,
            })
            .await
            .unwrap();

        let turns = completer.turns_seen.lock().unwrap();
        assert_eq!(turns.len(), 4);
        assert_eq!(turns[0].role, TurnRole::System);
        assert_eq!(turns[1].content, "first question");
        assert_eq!(turns[2].content, "first answer");
        assert_eq!(turns[3].role, TurnRole::User);
    }

    #[tokio::test]
    async fn embedding_failure_propagates() {
        let pipeline = ChatPipeline::new(
            Arc::new(FailingEmbedder),
            Arc::new(StubIndex::with_chunks(Vec::new())),
            Arc::new(RecordingCompleter::new()),
        );

        let result = pipeline
            .answer(ChatQuery {
                message: "anything".into(),
                ..Default::default()
            })
            .await;

        assert!(matches!(result, Err(PortError::Provider(_))));
    }

    #[tokio::test]
    async fn ingest_derives_stable_ids() {
        let completer = Arc::new(RecordingCompleter::new());
        let index = StubIndex::with_chunks(Vec::new());
        let pipeline = pipeline(index, completer);

        let a = pipeline
            .ingest("The CPU executes instructions.", "ch1", Some("intro"))
            .await
            .unwrap();
        let b = pipeline
            .ingest("The CPU executes instructions.", "ch1", Some("intro"))
            .await
            .unwrap();
        let c = pipeline
            .ingest("The CPU executes instructions.", "ch1", Some("outro"))
            .await
            .unwrap();

        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn chunk_id_separates_fields() {
        // "ab" + "c" must not collide with "a" + "bc".
        let x = chunk_id("ab", Some("c"), "t");
        let y = chunk_id("a", Some("bc"), "t");
        assert_ne!(x, y);
    }

    #[test]
    fn source_label_defaults_to_main() {
        let payload = ChunkPayload::new("t".into(), "ch2".into(), None);
        assert_eq!(payload.source, "ch2/main");
    }
}
