//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use std::sync::Arc;

use crate::config::Config;
use crate::web::token::TokenService;
use book_companion_core::chat::ChatPipeline;
use book_companion_core::personalizer::ContentPersonalizer;
use book_companion_core::ports::AccountStore;
use book_companion_core::translator::ContentTranslator;

/// The shared application state, created once at startup and passed to all handlers.
///
/// Every collaborator is an explicit instance injected here; nothing lives in
/// module-level globals, so handlers can be exercised with test doubles.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn AccountStore>,
    pub chat: Arc<ChatPipeline>,
    pub personalizer: Arc<ContentPersonalizer>,
    pub translator: Arc<ContentTranslator>,
    pub tokens: Arc<TokenService>,
    pub config: Arc<Config>,
}
