// Data-access seams consumed by the identity core
//
// Store implementations classify their failures into `StoreError` once, so
// callers never inspect backend-specific errors.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::permission::Permissions;
use crate::models::token::{Scope, Token};
use crate::models::user::{NewUser, User};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,

    #[error("a user with this email address already exists")]
    DuplicateEmail,

    #[error("edit conflict")]
    EditConflict,

    #[error("store call timed out after {0:?}")]
    Timeout(Duration),

    #[error("connection pool error: {0}")]
    Pool(String),

    #[error("database error: {0}")]
    Database(String),
}

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Persist a new user and return it with its assigned id, timestamp and version
    async fn insert(&self, user: &NewUser) -> Result<User, StoreError>;

    async fn get_by_email(&self, email: &str) -> Result<User, StoreError>;

    /// Resolve the owner of an unexpired token in `scope` by the token's SHA-256
    async fn get_for_token(&self, scope: Scope, token_hash: &[u8]) -> Result<User, StoreError>;

    /// Write `user` back only if its stored version still matches, then bump
    /// `user.version` to the new value
    async fn update(&self, user: &mut User) -> Result<(), StoreError>;
}

#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn insert(&self, token: &Token) -> Result<(), StoreError>;

    async fn delete_all_for_user(&self, scope: Scope, user_id: i64) -> Result<(), StoreError>;
}

#[async_trait]
pub trait PermissionStore: Send + Sync {
    /// Empty set when the user holds no grants
    async fn get_all_for_user(&self, user_id: i64) -> Result<Permissions, StoreError>;

    async fn add_for_user(&self, user_id: i64, codes: &[&str]) -> Result<(), StoreError>;
}

/// Handles to the three stores, usually backed by one object
#[derive(Clone)]
pub struct Stores {
    pub users: Arc<dyn UserStore>,
    pub tokens: Arc<dyn TokenStore>,
    pub permissions: Arc<dyn PermissionStore>,
}

impl Stores {
    pub fn from_backend<B>(backend: Arc<B>) -> Self
    where
        B: UserStore + TokenStore + PermissionStore + 'static,
    {
        Self {
            users: backend.clone(),
            tokens: backend.clone(),
            permissions: backend,
        }
    }
}

/// Run a store call under `limit`. An elapsed deadline surfaces as `StoreError::Timeout`.
pub async fn bounded<T, F>(limit: Duration, call: F) -> Result<T, StoreError>
where
    F: Future<Output = Result<T, StoreError>>,
{
    tokio::time::timeout(limit, call)
        .await
        .map_err(|_| StoreError::Timeout(limit))?
}
