// Bearer token model
//
// Tokens are 16 bytes of OS randomness rendered as 26 base-32 characters.
// Only the SHA-256 of the plaintext is ever persisted.

use std::fmt;

use base32::Alphabet;
use chrono::{DateTime, Duration, Utc};
use diesel::prelude::*;
use rand::{rngs::OsRng, RngCore};
use serde::Serialize;
use sha2::{Digest, Sha256};
use validator::{Validate, ValidationError};

use crate::models::user::field_error;
use crate::schema::tokens;

/// Length of every plaintext token
pub const TOKEN_PLAINTEXT_LEN: usize = 26;

const TOKEN_ENTROPY_BYTES: usize = 16;

/// Purpose a token was issued for. A token only resolves within its own scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    Activation,
    Authentication,
}

impl Scope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::Activation => "activation",
            Scope::Authentication => "authentication",
        }
    }

    /// Lifetime of freshly issued tokens in this scope
    pub fn default_ttl(&self) -> Duration {
        match self {
            Scope::Activation => Duration::days(3),
            Scope::Authentication => Duration::hours(24),
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An issued token. The plaintext is only populated on the value returned at issue time.
#[derive(Clone, Serialize)]
pub struct Token {
    #[serde(rename = "token")]
    pub plaintext: String,
    #[serde(skip)]
    pub hash: Vec<u8>,
    #[serde(skip)]
    pub user_id: i64,
    pub expiry: DateTime<Utc>,
    #[serde(skip)]
    pub scope: Scope,
}

impl Token {
    /// Generate a fresh token for `user_id` expiring `ttl` from now
    pub fn generate(user_id: i64, ttl: Duration, scope: Scope) -> Result<Self, rand::Error> {
        let mut random = [0u8; TOKEN_ENTROPY_BYTES];
        OsRng.try_fill_bytes(&mut random)?;

        let plaintext = base32::encode(Alphabet::Rfc4648 { padding: false }, &random);
        let hash = hash_plaintext(&plaintext);

        Ok(Self {
            plaintext,
            hash,
            user_id,
            expiry: Utc::now() + ttl,
            scope,
        })
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Token")
            .field("user_id", &self.user_id)
            .field("expiry", &self.expiry)
            .field("scope", &self.scope)
            .finish_non_exhaustive()
    }
}

/// SHA-256 of a plaintext token, the only form that is stored
pub fn hash_plaintext(plaintext: &str) -> Vec<u8> {
    Sha256::digest(plaintext.as_bytes()).to_vec()
}

/// Structural check on a presented token. Storage is not consulted.
pub fn validate_token_plaintext(token: &str) -> Result<(), ValidationError> {
    if token.is_empty() {
        return Err(field_error("required", "must be provided"));
    }
    if token.len() != TOKEN_PLAINTEXT_LEN {
        return Err(field_error("length", "must be 26 bytes long"));
    }
    Ok(())
}

/// Body of `PUT /v1/users/activated`
#[derive(Debug, serde::Deserialize, Validate)]
pub struct ActivateUserRequest {
    #[validate(custom(function = "validate_token_plaintext"))]
    #[serde(default)]
    pub token: String,
}

/// Insertable shape of the `tokens` table
#[derive(Debug, Insertable)]
#[diesel(table_name = tokens)]
pub struct NewTokenRow<'a> {
    pub hash: &'a [u8],
    pub user_id: i64,
    pub expiry: DateTime<Utc>,
    pub scope: &'static str,
}

impl<'a> From<&'a Token> for NewTokenRow<'a> {
    fn from(token: &'a Token) -> Self {
        Self {
            hash: &token.hash,
            user_id: token.user_id,
            expiry: token.expiry,
            scope: token.scope.as_str(),
        }
    }
}
