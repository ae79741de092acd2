//! Session credentials and boundary validation.
//!
//! Identities authenticate with a signed session token issued at login
//! (HS256). Verification yields the `(identity id, public key)` pair the
//! core operations take as a precondition.

use chrono::Utc;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{ApiError, ApiResult};
use crate::types::IdentityId;

/// Payload stored in the session token
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Identity id
    pub sub: IdentityId,
    /// Plaintext public key (safe to expose)
    pub public_key: String,
    pub iat: i64,
    pub exp: i64,
}

/// The authenticated caller, as extracted from a verified token
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: IdentityId,
    pub public_key: String,
}

/// Issues and verifies session tokens
pub struct TokenIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    expiry: Duration,
}

impl TokenIssuer {
    pub fn new(secret: &str, expiry: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            expiry,
        }
    }

    pub fn issue(&self, id: IdentityId, public_key: &str) -> ApiResult<String> {
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: id,
            public_key: public_key.to_string(),
            iat: now,
            exp: now + self.expiry.as_secs() as i64,
        };

        encode(&Header::default(), &claims, &self.encoding)
            .map_err(|e| ApiError::internal(format!("token issuance failed: {}", e)))
    }

    pub fn verify(&self, token: &str) -> ApiResult<AuthUser> {
        let data = decode::<Claims>(token, &self.decoding, &Validation::default())
            .map_err(|_| ApiError::Unauthorized)?;

        Ok(AuthUser {
            id: data.claims.sub,
            public_key: data.claims.public_key,
        })
    }
}

// ============ Validation Functions ============

/// Validate username
pub fn validate_username(username: &str) -> Result<(), &'static str> {
    if username.len() < 3 {
        return Err("Username must be at least 3 characters");
    }
    if username.len() > 32 {
        return Err("Username must be at most 32 characters");
    }
    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.' || c == '@')
    {
        return Err("Username contains invalid characters");
    }
    Ok(())
}

/// Validate ISBN (natural catalog key)
pub fn validate_isbn(isbn: &str) -> Result<(), &'static str> {
    if isbn.is_empty() {
        return Err("ISBN cannot be empty");
    }
    if isbn.len() > 32 {
        return Err("ISBN must be at most 32 characters");
    }
    if !isbn
        .chars()
        .all(|c| c.is_ascii_digit() || c == '-' || c == 'X' || c == 'x')
    {
        return Err("ISBN must contain only digits, dashes, and X");
    }
    Ok(())
}

/// Validate batch size
pub fn validate_batch_len(len: usize, max: usize) -> Result<(), &'static str> {
    if len == 0 {
        return Err("Batch must contain at least one book");
    }
    if len > max {
        return Err("Batch exceeds the maximum number of books");
    }
    Ok(())
}
