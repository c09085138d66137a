//! services/api/src/web/auth.rs
//!
//! Authentication endpoints for reader signup, signin, profile lookup,
//! preference updates, and logout.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{extract::State, http::StatusCode, response::IntoResponse, Extension, Json};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::error;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::ApiError;
use crate::web::state::AppState;
use book_companion_core::domain::{JsonMap, NewAccount};
use book_companion_core::ports::PortError;

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct SignupRequest {
    pub email: String,
    pub name: String,
    pub password: String,
    /// Software/hardware background questionnaire, free-form keys.
    #[serde(default)]
    #[schema(value_type = Object)]
    pub background: JsonMap,
    #[serde(default)]
    #[schema(value_type = Object)]
    pub preferences: JsonMap,
}

#[derive(Deserialize, ToSchema)]
pub struct SigninRequest {
    pub email: String,
    pub password: String,
}

#[derive(Serialize, ToSchema)]
pub struct PublicUser {
    pub id: Uuid,
    pub email: String,
    pub name: String,
}

#[derive(Serialize, ToSchema)]
pub struct AuthResponse {
    pub access_token: String,
    pub token_type: String,
    pub user: PublicUser,
}

#[derive(Serialize, ToSchema)]
pub struct ProfileResponse {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    #[schema(value_type = Object)]
    pub background: JsonMap,
    #[schema(value_type = Object)]
    pub preferences: JsonMap,
}

//=========================================================================================
// Handlers
//=========================================================================================

/// POST /api/auth/signup - Create a new reader account
#[utoipa::path(
    post,
    path = "/api/auth/signup",
    request_body = SignupRequest,
    responses(
        (status = 200, description = "Account created", body = AuthResponse),
        (status = 400, description = "Email already registered"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn signup_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SignupRequest>,
) -> Result<impl IntoResponse, ApiError> {
    // 1. Hash the password; plaintext never leaves this scope
    let salt = SaltString::generate(&mut OsRng);
    let password_hash = Argon2::default()
        .hash_password(req.password.as_bytes(), &salt)
        .map_err(|e| {
            error!("Failed to hash password: {:?}", e);
            ApiError::Internal("Failed to hash password".to_string())
        })?
        .to_string();

    // 2. Create the account; a duplicate email surfaces as 400
    let account = state
        .store
        .create_account(NewAccount {
            email: req.email,
            name: req.name,
            password_hash,
            background: req.background,
            preferences: req.preferences,
        })
        .await?;

    // 3. Issue the access token
    let access_token = state.tokens.issue(account.id)?;

    Ok(Json(AuthResponse {
        access_token,
        token_type: "bearer".to_string(),
        user: PublicUser {
            id: account.id,
            email: account.email,
            name: account.name,
        },
    }))
}

/// POST /api/auth/signin - Sign in with an existing account
#[utoipa::path(
    post,
    path = "/api/auth/signin",
    request_body = SigninRequest,
    responses(
        (status = 200, description = "Signin successful", body = AuthResponse),
        (status = 401, description = "Invalid credentials"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn signin_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SigninRequest>,
) -> Result<impl IntoResponse, ApiError> {
    // Unknown email and wrong password must be indistinguishable to the
    // caller, so both paths collapse into InvalidCredentials.
    let creds = state
        .store
        .get_credentials_by_email(&req.email)
        .await
        .map_err(|e| match e {
            PortError::NotFound(_) => ApiError::InvalidCredentials,
            other => ApiError::Port(other),
        })?;

    let parsed_hash = PasswordHash::new(&creds.password_hash).map_err(|e| {
        error!("Failed to parse password hash: {:?}", e);
        ApiError::Internal("Authentication error".to_string())
    })?;

    let valid = Argon2::default()
        .verify_password(req.password.as_bytes(), &parsed_hash)
        .is_ok();
    if !valid {
        return Err(ApiError::InvalidCredentials);
    }

    let access_token = state.tokens.issue(creds.id)?;

    Ok(Json(AuthResponse {
        access_token,
        token_type: "bearer".to_string(),
        user: PublicUser {
            id: creds.id,
            email: creds.email,
            name: creds.name,
        },
    }))
}

/// GET /api/auth/me - Profile of the authenticated reader
#[utoipa::path(
    get,
    path = "/api/auth/me",
    responses(
        (status = 200, description = "Current account", body = ProfileResponse),
        (status = 401, description = "Invalid or expired token"),
        (status = 404, description = "Account no longer exists")
    ),
    security(("bearer_token" = []))
)]
pub async fn me_handler(
    State(state): State<Arc<AppState>>,
    Extension(account_id): Extension<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let account = state.store.get_account_by_id(account_id).await?;

    Ok(Json(ProfileResponse {
        id: account.id,
        email: account.email,
        name: account.name,
        background: account.background,
        preferences: account.preferences,
    }))
}

/// PUT /api/auth/preferences - Merge a patch into the stored preferences
#[utoipa::path(
    put,
    path = "/api/auth/preferences",
    request_body = Object,
    responses(
        (status = 200, description = "Merged preference map"),
        (status = 401, description = "Invalid or expired token"),
        (status = 404, description = "Account no longer exists")
    ),
    security(("bearer_token" = []))
)]
pub async fn update_preferences_handler(
    State(state): State<Arc<AppState>>,
    Extension(account_id): Extension<Uuid>,
    Json(patch): Json<JsonMap>,
) -> Result<impl IntoResponse, ApiError> {
    let merged = state.store.merge_preferences(account_id, patch).await?;

    Ok(Json(json!({
        "status": "success",
        "preferences": merged,
    })))
}

/// POST /api/auth/logout - Stateless logout
///
/// Token invalidation is the caller's responsibility; this endpoint only
/// acknowledges the request.
#[utoipa::path(
    post,
    path = "/api/auth/logout",
    responses((status = 200, description = "Logout acknowledged"))
)]
pub async fn logout_handler() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(json!({
            "status": "success",
            "message": "Logged out successfully",
        })),
    )
}
