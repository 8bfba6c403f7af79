// Token issuance, lookup and invalidation

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, instrument};

use crate::db::store::{bounded, StoreError, TokenStore, UserStore};
use crate::models::token::{hash_plaintext, Scope, Token};
use crate::models::user::User;
use crate::utils::service_error::ServiceError;

#[derive(Clone)]
pub struct TokenService {
    users: Arc<dyn UserStore>,
    tokens: Arc<dyn TokenStore>,
    timeout: Duration,
}

impl TokenService {
    pub fn new(users: Arc<dyn UserStore>, tokens: Arc<dyn TokenStore>, timeout: Duration) -> Self {
        Self {
            users,
            tokens,
            timeout,
        }
    }

    /// Issue and persist a token for `user_id`. The returned value is the only
    /// place the plaintext ever exists.
    #[instrument(skip(self))]
    pub async fn new_token(
        &self,
        user_id: i64,
        ttl: chrono::Duration,
        scope: Scope,
    ) -> Result<Token, ServiceError> {
        let token = Token::generate(user_id, ttl, scope)?;
        bounded(self.timeout, self.tokens.insert(&token)).await?;

        debug!(scope = %token.scope, expiry = %token.expiry, "Token issued");
        Ok(token)
    }

    /// Resolve the owner of an unexpired token. Unknown and expired tokens both
    /// come back as `StoreError::NotFound`.
    pub async fn user_for_token(&self, scope: Scope, plaintext: &str) -> Result<User, StoreError> {
        let hash = hash_plaintext(plaintext);
        bounded(self.timeout, self.users.get_for_token(scope, &hash)).await
    }

    #[instrument(skip(self))]
    pub async fn delete_all_for_user(&self, scope: Scope, user_id: i64) -> Result<(), StoreError> {
        bounded(self.timeout, self.tokens.delete_all_for_user(scope, user_id)).await
    }
}
