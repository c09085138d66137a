//! services/api/src/web/token.rs
//!
//! Bearer-token issuance and verification. Tokens are HS256-signed JWTs
//! carrying the account id as subject and a short expiry.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use book_companion_core::ports::{PortError, PortResult};

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    exp: i64,
}

/// Issues and verifies the signed access tokens handed out at signup/signin.
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl: Duration,
}

impl TokenService {
    pub fn new(secret: &str, ttl_minutes: i64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            ttl: Duration::minutes(ttl_minutes),
        }
    }

    /// Issues a token for the given account, valid for the configured TTL.
    pub fn issue(&self, account_id: Uuid) -> PortResult<String> {
        let claims = Claims {
            sub: account_id.to_string(),
            exp: (Utc::now() + self.ttl).timestamp(),
        };
        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| PortError::Unexpected(e.to_string()))
    }

    /// Verifies a token's signature and expiry and returns the account id.
    /// Expired, tampered, and malformed tokens all map to `Unauthorized`.
    pub fn verify(&self, token: &str) -> PortResult<Uuid> {
        let data = decode::<Claims>(token, &self.decoding_key, &Validation::default())
            .map_err(|_| PortError::Unauthorized)?;
        Uuid::parse_str(&data.claims.sub).map_err(|_| PortError::Unauthorized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issued_token_resolves_to_the_same_account() {
        let service = TokenService::new("test-secret", 30);
        let account_id = Uuid::new_v4();

        let token = service.issue(account_id).unwrap();
        assert_eq!(service.verify(&token).unwrap(), account_id);
    }

    #[test]
    fn tampered_token_is_unauthorized() {
        let service = TokenService::new("test-secret", 30);
        let token = service.issue(Uuid::new_v4()).unwrap();

        let mut tampered = token.clone();
        tampered.pop();
        tampered.push('x');

        assert!(matches!(
            service.verify(&tampered),
            Err(PortError::Unauthorized)
        ));
    }

    #[test]
    fn token_signed_with_other_secret_is_unauthorized() {
        let issuer = TokenService::new("secret-a", 30);
        let verifier = TokenService::new("secret-b", 30);

        let token = issuer.issue(Uuid::new_v4()).unwrap();
        assert!(matches!(
            verifier.verify(&token),
            Err(PortError::Unauthorized)
        ));
    }

    #[test]
    fn expired_token_is_unauthorized() {
        // A negative TTL puts the expiry in the past.
        let service = TokenService::new("test-secret", -5);
        let token = service.issue(Uuid::new_v4()).unwrap();

        assert!(matches!(
            service.verify(&token),
            Err(PortError::Unauthorized)
        ));
    }

    #[test]
    fn garbage_is_unauthorized() {
        let service = TokenService::new("test-secret", 30);
        assert!(matches!(
            service.verify("not-a-token"),
            Err(PortError::Unauthorized)
        ));
    }
}
