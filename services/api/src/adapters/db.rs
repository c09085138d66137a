//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `AccountStore` port from the `core` crate. It handles all interactions
//! with the PostgreSQL database using `sqlx`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use book_companion_core::domain::{Account, AccountCredentials, JsonMap, NewAccount};
use book_companion_core::ports::{AccountStore, PortError, PortResult};

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `AccountStore` port.
#[derive(Clone)]
pub struct PgAccountStore {
    pool: PgPool,
}

impl PgAccountStore {
    /// Creates a new `PgAccountStore`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::Error> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct AccountRecord {
    id: Uuid,
    email: String,
    name: String,
    background: serde_json::Value,
    preferences: serde_json::Value,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl AccountRecord {
    fn to_domain(self) -> Account {
        Account {
            id: self.id,
            email: self.email,
            name: self.name,
            background: into_map(self.background),
            preferences: into_map(self.preferences),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(FromRow)]
struct CredentialsRecord {
    id: Uuid,
    email: String,
    name: String,
    password_hash: String,
}

impl CredentialsRecord {
    fn to_domain(self) -> AccountCredentials {
        AccountCredentials {
            id: self.id,
            email: self.email,
            name: self.name,
            password_hash: self.password_hash,
        }
    }
}

/// JSONB columns always hold objects here; anything else decodes to empty.
fn into_map(value: serde_json::Value) -> JsonMap {
    match value {
        serde_json::Value::Object(map) => map,
        _ => JsonMap::new(),
    }
}

//=========================================================================================
// `AccountStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl AccountStore for PgAccountStore {
    async fn create_account(&self, new_account: NewAccount) -> PortResult<Account> {
        let record = sqlx::query_as::<_, AccountRecord>(
            "INSERT INTO accounts (id, email, name, password_hash, background, preferences) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING id, email, name, background, preferences, created_at, updated_at",
        )
        .bind(Uuid::new_v4())
        .bind(&new_account.email)
        .bind(&new_account.name)
        .bind(&new_account.password_hash)
        .bind(serde_json::Value::Object(new_account.background.clone()))
        .bind(serde_json::Value::Object(new_account.preferences.clone()))
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                PortError::Duplicate(new_account.email.clone())
            }
            _ => PortError::Unexpected(e.to_string()),
        })?;

        Ok(record.to_domain())
    }

    async fn get_credentials_by_email(&self, email: &str) -> PortResult<AccountCredentials> {
        let record = sqlx::query_as::<_, CredentialsRecord>(
            "SELECT id, email, name, password_hash FROM accounts WHERE email = $1",
        )
        .bind(email)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => PortError::NotFound(format!("Account {} not found", email)),
            _ => PortError::Unexpected(e.to_string()),
        })?;

        Ok(record.to_domain())
    }

    async fn get_account_by_id(&self, account_id: Uuid) -> PortResult<Account> {
        let record = sqlx::query_as::<_, AccountRecord>(
            "SELECT id, email, name, background, preferences, created_at, updated_at \
             FROM accounts WHERE id = $1",
        )
        .bind(account_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => {
                PortError::NotFound(format!("Account {} not found", account_id))
            }
            _ => PortError::Unexpected(e.to_string()),
        })?;

        Ok(record.to_domain())
    }

    async fn merge_preferences(&self, account_id: Uuid, patch: JsonMap) -> PortResult<JsonMap> {
        // JSONB || implements the same shallow merge as `domain::merge_shallow`:
        // patch keys overwrite, the rest stay untouched.
        let (merged,): (serde_json::Value,) = sqlx::query_as(
            "UPDATE accounts \
             SET preferences = preferences || $2, updated_at = now() \
             WHERE id = $1 \
             RETURNING preferences",
        )
        .bind(account_id)
        .bind(serde_json::Value::Object(patch))
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => {
                PortError::NotFound(format!("Account {} not found", account_id))
            }
            _ => PortError::Unexpected(e.to_string()),
        })?;

        Ok(into_map(merged))
    }
}
