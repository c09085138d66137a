//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{
        chat_llm::OpenAiCompletionAdapter, db::PgAccountStore,
        embeddings::OpenAiEmbeddingAdapter, vector_store::QdrantHttpAdapter,
    },
    config::Config,
    error::ApiError,
    web::{
        auth::{
            logout_handler, me_handler, signin_handler, signup_handler,
            update_preferences_handler,
        },
        middleware::require_auth,
        rest::{
            add_content_handler, chat_handler, get_glossary_handler, health_handler,
            personalize_chapter_handler, personalize_handler, root_handler, translate_chapter_handler,
            translate_handler, ApiDoc,
        },
        state::AppState,
        token::TokenService,
    },
};
use async_openai::{config::OpenAIConfig, Client};
use axum::{
    extract::DefaultBodyLimit,
    http::{
        header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
        HeaderValue, Method,
    },
    middleware as axum_middleware,
    routing::{get, post, put},
    Router,
};
use book_companion_core::chat::ChatPipeline;
use book_companion_core::personalizer::ContentPersonalizer;
use book_companion_core::translator::ContentTranslator;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Connect to Database & Run Migrations ---
    info!("Connecting to database...");
    let db_pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await?;
    let account_store = Arc::new(PgAccountStore::new(db_pool.clone()));
    info!("Running database migrations...");
    account_store.run_migrations().await?;
    info!("Database migrations complete.");

    // --- 3. Initialize Provider Adapters ---
    let api_key = config
        .openai_api_key
        .clone()
        .ok_or_else(|| ApiError::Internal("OPENAI_API_KEY is required".to_string()))?;

    let openai_client = Client::with_config(
        OpenAIConfig::new()
            .with_api_key(&api_key)
            .with_api_base(&config.openai_api_base),
    );

    let chat_llm = Arc::new(OpenAiCompletionAdapter::new(
        openai_client.clone(),
        config.chat_model.clone(),
    ));
    let translate_llm = Arc::new(OpenAiCompletionAdapter::new(
        openai_client,
        config.translate_model.clone(),
    ));
    let embeddings = Arc::new(OpenAiEmbeddingAdapter::new(
        api_key,
        config.embedding_model.clone(),
        config.openai_api_base.clone(),
        config.embedding_dimensions,
    ));
    let vector_index = Arc::new(QdrantHttpAdapter::new(
        config.qdrant_url.clone(),
        config.qdrant_api_key.clone(),
        config.collection_name.clone(),
    ));

    // --- 4. Reset the Vector Collection ---
    // The collection is recreated on every start; ingested content does not
    // survive a restart unless an external process re-ingests it.
    use book_companion_core::ports::VectorIndexService;
    if let Err(e) = vector_index.reset_collection(config.embedding_dimensions).await {
        warn!("Could not initialize vector store: {e}");
    }

    // --- 5. Build the Core Services and Shared AppState ---
    let chat = Arc::new(ChatPipeline::new(
        embeddings,
        vector_index,
        chat_llm.clone(),
    ));
    let personalizer = Arc::new(ContentPersonalizer::new(chat_llm));
    let translator = Arc::new(ContentTranslator::new(translate_llm));
    let tokens = Arc::new(TokenService::new(
        &config.token_secret,
        config.token_ttl_minutes,
    ));

    let app_state = Arc::new(AppState {
        store: account_store,
        chat,
        personalizer,
        translator,
        tokens,
        config: config.clone(),
    });

    let allowed_origin = config
        .allowed_origin
        .parse::<HeaderValue>()
        .map_err(|e| ApiError::Internal(format!("Invalid ALLOWED_ORIGIN: {e}")))?;
    let cors = tower_http::cors::CorsLayer::new()
        .allow_origin(allowed_origin)
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE, ACCEPT]);

    // --- 6. Create the Web Router ---
    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/", get(root_handler))
        .route("/api/health", get(health_handler))
        .route("/api/auth/signup", post(signup_handler))
        .route("/api/auth/signin", post(signin_handler))
        .route("/api/auth/logout", post(logout_handler))
        .route("/api/chat", post(chat_handler))
        .route("/api/add-content", post(add_content_handler))
        .route("/api/translate", post(translate_handler))
        .route("/api/personalize", post(personalize_handler))
        .route("/api/personalize-chapter", post(personalize_chapter_handler))
        .route("/api/translate-chapter", post(translate_chapter_handler))
        .route("/api/get-glossary", post(get_glossary_handler));

    // Protected routes (bearer token required)
    let protected_routes = Router::new()
        .route("/api/auth/me", get(me_handler))
        .route("/api/auth/preferences", put(update_preferences_handler))
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            require_auth,
        ));

    // Combine API routes
    let api_router = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(DefaultBodyLimit::max(10 * 1024 * 1024))
        .layer(cors)
        .with_state(app_state);

    // Merge the API router with the Swagger UI router for a complete application.
    let app = Router::new()
        .merge(api_router)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    // --- 7. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
