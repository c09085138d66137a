pub mod chat_llm;
pub mod db;
pub mod embeddings;
pub mod vector_store;

pub use chat_llm::OpenAiCompletionAdapter;
pub use db::PgAccountStore;
pub use embeddings::OpenAiEmbeddingAdapter;
pub use vector_store::QdrantHttpAdapter;
