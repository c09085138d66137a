pub mod chat;
pub mod domain;
pub mod personalizer;
pub mod ports;
pub mod translator;

pub use chat::{ChatPipeline, ChatQuery};
pub use domain::{
    merge_shallow, Account, AccountCredentials, ChatAnswer, ChatTurn, ChunkPayload, JsonMap,
    NewAccount, PersonalizedChapter, Produced, ScoredChunk, TranslatedChapter, TurnRole,
};
pub use personalizer::ContentPersonalizer;
pub use ports::{
    AccountStore, CompletionService, EmbeddingService, PortError, PortResult, VectorIndexService,
};
pub use translator::ContentTranslator;
