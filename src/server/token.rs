//! Signed, time-limited session tokens.
//!
//! Tokens are HS256 JWTs carrying the principal id. They are not stored
//! anywhere: expiry is the only way one stops being valid.

use crate::library::PrincipalId;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

pub const SESSION_TOKEN_LIFETIME: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: PrincipalId,
    pub iat: u64,
    pub exp: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    #[error("token expired")]
    Expired,
    #[error("token malformed or forged")]
    MalformedOrForged,
    #[error("failed to sign token: {0}")]
    Signing(String),
}

#[derive(Clone)]
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    lifetime: Duration,
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

impl TokenCodec {
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is checked against our own clock in `verify_at`.
        validation.validate_exp = false;
        validation.required_spec_claims.clear();
        validation.required_spec_claims.insert("exp".to_string());

        TokenCodec {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            lifetime: SESSION_TOKEN_LIFETIME,
        }
    }

    pub fn issue(&self, user_id: PrincipalId) -> Result<String, TokenError> {
        self.issue_at(user_id, unix_now())
    }

    /// Issues a token as if the current time were `now` (unix seconds).
    pub fn issue_at(&self, user_id: PrincipalId, now: u64) -> Result<String, TokenError> {
        let claims = Claims {
            user_id,
            iat: now,
            exp: now + self.lifetime.as_secs(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|err| TokenError::Signing(err.to_string()))
    }

    pub fn verify(&self, token: &str) -> Result<PrincipalId, TokenError> {
        self.verify_at(token, unix_now())
    }

    /// Verifies signature and structure, then checks `now > exp`.
    pub fn verify_at(&self, token: &str, now: u64) -> Result<PrincipalId, TokenError> {
        let data = decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map_err(|_| TokenError::MalformedOrForged)?;
        if now > data.claims.exp {
            return Err(TokenError::Expired);
        }
        Ok(data.claims.user_id)
    }
}
