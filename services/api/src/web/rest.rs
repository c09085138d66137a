//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the REST API endpoints and the master
//! definition for the OpenAPI specification.

use axum::{
    extract::State,
    response::{IntoResponse, Json},
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi, ToSchema};

use crate::error::ApiError;
use crate::web::auth::{
    AuthResponse, ProfileResponse, PublicUser, SigninRequest, SignupRequest,
};
use crate::web::state::AppState;
use book_companion_core::chat::ChatQuery;
use book_companion_core::domain::{ChatTurn, JsonMap, TurnRole};

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::web::auth::signup_handler,
        crate::web::auth::signin_handler,
        crate::web::auth::me_handler,
        crate::web::auth::update_preferences_handler,
        crate::web::auth::logout_handler,
        chat_handler,
        add_content_handler,
        translate_handler,
        personalize_handler,
        personalize_chapter_handler,
        translate_chapter_handler,
        get_glossary_handler,
        health_handler,
        root_handler,
    ),
    components(
        schemas(
            SignupRequest,
            SigninRequest,
            AuthResponse,
            PublicUser,
            ProfileResponse,
            Message,
            ChatRequest,
            ChatResponse,
            ContentChunkRequest,
            TranslationRequest,
            PersonalizationRequest,
            PersonalizeChapterRequest,
            TranslateChapterRequest,
            GlossaryRequest,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Book Companion API", description = "RAG chat, personalization, and translation for book readers.")
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_token",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

//=========================================================================================
// API Request and Response Structs
//=========================================================================================

/// A single prior conversation turn, supplied by the client.
#[derive(Deserialize, ToSchema)]
pub struct Message {
    #[schema(value_type = String)]
    pub role: TurnRole,
    pub content: String,
}

#[derive(Deserialize, ToSchema)]
pub struct ChatRequest {
    pub message: String,
    pub user_id: Option<String>,
    pub selected_text: Option<String>,
    pub conversation_history: Option<Vec<Message>>,
}

#[derive(Serialize, ToSchema)]
pub struct ChatResponse {
    pub message: String,
    pub sources: Vec<String>,
    pub timestamp: String,
}

#[derive(Deserialize, ToSchema)]
pub struct ContentChunkRequest {
    pub text: String,
    pub chapter: String,
    pub section: Option<String>,
}

fn default_language() -> String {
    "urdu".to_string()
}

#[derive(Deserialize, ToSchema)]
pub struct TranslationRequest {
    pub text: String,
    #[serde(default = "default_language")]
    pub target_language: String,
}

#[derive(Deserialize, ToSchema)]
pub struct PersonalizationRequest {
    pub user_id: String,
    #[schema(value_type = Object)]
    pub preferences: JsonMap,
    #[schema(value_type = Object)]
    pub background: JsonMap,
}

#[derive(Deserialize, ToSchema)]
pub struct PersonalizeChapterRequest {
    pub chapter_title: String,
    pub chapter_content: String,
    pub user_id: Option<String>,
    #[schema(value_type = Object)]
    pub background: JsonMap,
}

#[derive(Deserialize, ToSchema)]
pub struct TranslateChapterRequest {
    pub chapter_title: String,
    pub chapter_content: String,
    #[serde(default = "default_language")]
    pub target_language: String,
}

#[derive(Deserialize, ToSchema)]
pub struct GlossaryRequest {
    pub terms: Vec<String>,
    #[serde(default = "default_language")]
    pub target_language: String,
}

//=========================================================================================
// REST API Handlers
//=========================================================================================

/// Answer a question about the book with retrieval-augmented generation.
#[utoipa::path(
    post,
    path = "/api/chat",
    request_body = ChatRequest,
    responses(
        (status = 200, description = "Generated answer with source labels", body = ChatResponse),
        (status = 500, description = "Provider failure")
    )
)]
pub async fn chat_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ChatRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let history = req
        .conversation_history
        .unwrap_or_default()
        .into_iter()
        .map(|m| ChatTurn::new(m.role, m.content))
        .collect();

    let answer = state
        .chat
        .answer(ChatQuery {
            message: req.message,
            selected_text: req.selected_text,
            history,
        })
        .await?;

    Ok(Json(ChatResponse {
        message: answer.message,
        sources: answer.sources,
        timestamp: answer.timestamp.to_rfc3339(),
    }))
}

/// Embed a chunk of book text and add it to the vector store.
#[utoipa::path(
    post,
    path = "/api/add-content",
    request_body = ContentChunkRequest,
    responses(
        (status = 200, description = "Content added"),
        (status = 500, description = "Provider failure")
    )
)]
pub async fn add_content_handler(
    State(state): State<Arc<AppState>>,
    Json(chunk): Json<ContentChunkRequest>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .chat
        .ingest(&chunk.text, &chunk.chapter, chunk.section.as_deref())
        .await?;

    Ok(Json(json!({
        "status": "success",
        "message": "Content added to vector store",
    })))
}

/// Translate text to a target language.
#[utoipa::path(
    post,
    path = "/api/translate",
    request_body = TranslationRequest,
    responses((status = 200, description = "Translated text"))
)]
pub async fn translate_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<TranslationRequest>,
) -> impl IntoResponse {
    // Translation fails open; a degraded result still answers the request.
    let translated = state
        .translator
        .translate(&req.text, &req.target_language, true)
        .await;

    Json(json!({
        "original": req.text,
        "translated": translated.into_text(),
        "language": req.target_language,
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

/// Echo personalization preferences back to the caller.
///
/// This endpoint does not persist anything; preference storage happens via
/// PUT /api/auth/preferences.
#[utoipa::path(
    post,
    path = "/api/personalize",
    request_body = PersonalizationRequest,
    responses((status = 200, description = "Preferences acknowledged"))
)]
pub async fn personalize_handler(Json(req): Json<PersonalizationRequest>) -> impl IntoResponse {
    Json(json!({
        "status": "success",
        "message": "Personalization preferences saved",
        "data": {
            "user_id": req.user_id,
            "preferences": req.preferences,
            "background": req.background,
            "timestamp": Utc::now().to_rfc3339(),
        },
    }))
}

/// Rewrite a chapter for the reader's background.
#[utoipa::path(
    post,
    path = "/api/personalize-chapter",
    request_body = PersonalizeChapterRequest,
    responses((status = 200, description = "Personalized chapter"))
)]
pub async fn personalize_chapter_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<PersonalizeChapterRequest>,
) -> impl IntoResponse {
    let chapter = state
        .personalizer
        .create_personalized_chapter(&req.chapter_content, &req.background)
        .await;

    Json(json!({
        "status": "success",
        "chapter_title": req.chapter_title,
        "original_content": chapter.original_content,
        "personalized_content": chapter.personalized_content,
        "difficulty_hint": chapter.difficulty_hint,
        "user_background": chapter.user_background,
    }))
}

/// Translate a chapter title and body to a target language.
#[utoipa::path(
    post,
    path = "/api/translate-chapter",
    request_body = TranslateChapterRequest,
    responses((status = 200, description = "Translated chapter"))
)]
pub async fn translate_chapter_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<TranslateChapterRequest>,
) -> impl IntoResponse {
    let chapter = state
        .translator
        .translate_chapter(&req.chapter_title, &req.chapter_content, &req.target_language)
        .await;

    Json(json!({
        "status": "success",
        "original_title": chapter.original_title,
        "translated_title": chapter.translated_title,
        "original_content": chapter.original_content,
        "translated_content": chapter.translated_content,
        "target_language": chapter.target_language,
    }))
}

/// Translate a set of technical terms in a single request.
#[utoipa::path(
    post,
    path = "/api/get-glossary",
    request_body = GlossaryRequest,
    responses((status = 200, description = "Term-to-translation mapping"))
)]
pub async fn get_glossary_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<GlossaryRequest>,
) -> impl IntoResponse {
    let glossary = state
        .translator
        .get_glossary(&req.terms, &req.target_language)
        .await;

    Json(json!({
        "status": "success",
        "terms": glossary,
        "target_language": req.target_language,
    }))
}

/// Health check endpoint.
#[utoipa::path(
    get,
    path = "/api/health",
    responses((status = 200, description = "Service is up"))
)]
pub async fn health_handler() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

/// Root endpoint - service banner.
#[utoipa::path(
    get,
    path = "/",
    responses((status = 200, description = "Service banner"))
)]
pub async fn root_handler() -> impl IntoResponse {
    Json(json!({
        "message": "Book Companion API",
        "version": env!("CARGO_PKG_VERSION"),
        "docs": "/swagger-ui",
        "health": "/api/health",
    }))
}
