pub mod password;

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, errors::ErrorKind, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::config::SecurityConfig;

pub use password::{hash_fingerprint, hash_password, verify_password, PasswordError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Reset,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    #[serde(rename = "userId")]
    pub user_id: Uuid,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<TokenKind>,
    /// Password-hash fingerprint, reset tokens only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fp: Option<String>,
    pub exp: i64,
    pub iat: i64,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("JWT generation error: {0}")]
    Generation(String),

    #[error("Token has expired")]
    Expired,

    #[error("Token is invalid")]
    Invalid,

    #[error("Invalid token type")]
    WrongKind,
}

/// Issues and verifies the HS256 tokens used for sessions and password resets.
#[derive(Clone)]
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    session_ttl: Duration,
    reset_ttl: Duration,
}

impl TokenService {
    pub fn new(config: &SecurityConfig) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(config.jwt_secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            session_ttl: Duration::minutes(config.session_ttl_minutes),
            reset_ttl: Duration::minutes(config.reset_ttl_minutes),
        }
    }

    pub fn session_ttl(&self) -> Duration {
        self.session_ttl
    }

    pub fn issue_session(&self, user_id: Uuid) -> Result<String, TokenError> {
        self.issue(user_id, None, None, self.session_ttl)
    }

    pub fn issue_reset(&self, user_id: Uuid, password_hash: &str) -> Result<String, TokenError> {
        self.issue(
            user_id,
            Some(TokenKind::Reset),
            Some(hash_fingerprint(password_hash)),
            self.reset_ttl,
        )
    }

    /// Accepts only session tokens. Reset tokens never authenticate a request.
    pub fn verify_session(&self, token: &str) -> Result<Claims, TokenError> {
        let claims = self.decode(token)?;
        if claims.kind.is_some() {
            return Err(TokenError::WrongKind);
        }
        Ok(claims)
    }

    /// Accepts only reset tokens. The caller still has to compare `fp` against the user's
    /// current hash.
    pub fn verify_reset(&self, token: &str) -> Result<Claims, TokenError> {
        let claims = self.decode(token)?;
        if claims.kind != Some(TokenKind::Reset) {
            return Err(TokenError::WrongKind);
        }
        Ok(claims)
    }

    fn issue(
        &self,
        user_id: Uuid,
        kind: Option<TokenKind>,
        fp: Option<String>,
        ttl: Duration,
    ) -> Result<String, TokenError> {
        let now = Utc::now();
        let claims = Claims {
            user_id,
            kind,
            fp,
            exp: (now + ttl).timestamp(),
            iat: now.timestamp(),
        };
        encode(&Header::default(), &claims, &self.encoding_key).map_err(|e| TokenError::Generation(e.to_string()))
    }

    fn decode(&self, token: &str) -> Result<Claims, TokenError> {
        decode::<Claims>(token, &self.decoding_key, &Validation::default())
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Invalid,
            })
    }
}
