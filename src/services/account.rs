// Account lifecycle: registration, activation and credential exchange

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, instrument};
use validator::Validate;

use crate::db::store::{bounded, StoreError, UserStore};
use crate::models::permission::MOVIES_READ;
use crate::models::token::{ActivateUserRequest, Scope, Token};
use crate::models::user::{AuthenticationRequest, NewUser, RegisterUserRequest, User};
use crate::services::permission::PermissionService;
use crate::services::token::TokenService;
use crate::utils::api_error::ApiError;
use crate::utils::password::Password;

/// Delivery seam for activation tokens
#[async_trait]
pub trait ActivationNotifier: Send + Sync {
    async fn send_activation(&self, user: &User, token: &Token);
}

/// Writes activation tokens to the log instead of mailing them
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl ActivationNotifier for LogNotifier {
    async fn send_activation(&self, user: &User, token: &Token) {
        info!(
            user_id = user.id,
            email = %user.email,
            expiry = %token.expiry,
            "Activation token issued"
        );
        debug!(user_id = user.id, token = %token.plaintext, "Activation token plaintext");
    }
}

#[derive(Clone)]
pub struct AccountService {
    users: Arc<dyn UserStore>,
    tokens: TokenService,
    permissions: PermissionService,
    notifier: Arc<dyn ActivationNotifier>,
    bcrypt_cost: u32,
    timeout: Duration,
}

impl AccountService {
    pub fn new(
        users: Arc<dyn UserStore>,
        tokens: TokenService,
        permissions: PermissionService,
        notifier: Arc<dyn ActivationNotifier>,
        bcrypt_cost: u32,
        timeout: Duration,
    ) -> Self {
        Self {
            users,
            tokens,
            permissions,
            notifier,
            bcrypt_cost,
            timeout,
        }
    }

    /// Create an inactive account, grant it read access and send an activation token
    #[instrument(skip(self, request), fields(email = %request.email))]
    pub async fn register(&self, request: RegisterUserRequest) -> Result<User, ApiError> {
        request.validate()?;

        let RegisterUserRequest {
            name,
            email,
            password,
        } = request;

        let cost = self.bcrypt_cost;
        let mut password =
            run_blocking(move || Password::set_with_cost(&password, cost)).await??;
        password.forget_plaintext();

        let new_user = NewUser {
            name,
            email,
            password,
            activated: false,
        };

        let user = match bounded(self.timeout, self.users.insert(&new_user)).await {
            Ok(user) => user,
            Err(StoreError::DuplicateEmail) => {
                return Err(ApiError::failed_field(
                    "email",
                    "a user with this email address already exists",
                ))
            },
            Err(e) => return Err(e.into()),
        };

        self.permissions.add_for_user(user.id, &[MOVIES_READ]).await?;

        let token = self
            .tokens
            .new_token(user.id, Scope::Activation.default_ttl(), Scope::Activation)
            .await?;
        self.notifier.send_activation(&user, &token).await;

        info!(user_id = user.id, "User registered");
        Ok(user)
    }

    /// Redeem an activation token. Every outstanding activation token for the
    /// user is invalidated afterwards.
    #[instrument(skip(self, request))]
    pub async fn activate(&self, request: ActivateUserRequest) -> Result<User, ApiError> {
        request.validate()?;

        let mut user = match self
            .tokens
            .user_for_token(Scope::Activation, &request.token)
            .await
        {
            Ok(user) => user,
            Err(StoreError::NotFound) => {
                return Err(ApiError::failed_field(
                    "token",
                    "invalid or expired activation token",
                ))
            },
            Err(e) => return Err(e.into()),
        };

        user.activated = true;
        bounded(self.timeout, self.users.update(&mut user)).await?;

        self.tokens
            .delete_all_for_user(Scope::Activation, user.id)
            .await?;

        info!(user_id = user.id, "User activated");
        Ok(user)
    }

    /// Exchange email and password for a fresh authentication token
    #[instrument(skip(self, request), fields(email = %request.email))]
    pub async fn create_authentication_token(
        &self,
        request: AuthenticationRequest,
    ) -> Result<Token, ApiError> {
        request.validate()?;

        let user = match bounded(self.timeout, self.users.get_by_email(&request.email)).await {
            Ok(user) => user,
            Err(StoreError::NotFound) => return Err(ApiError::InvalidCredentials),
            Err(e) => return Err(e.into()),
        };

        let stored = user.password.clone();
        let candidate = request.password;
        let matches = run_blocking(move || stored.matches(&candidate)).await??;
        if !matches {
            return Err(ApiError::InvalidCredentials);
        }

        let token = self
            .tokens
            .new_token(
                user.id,
                Scope::Authentication.default_ttl(),
                Scope::Authentication,
            )
            .await?;

        info!(user_id = user.id, "Authentication token issued");
        Ok(token)
    }
}

// Runs bcrypt work on the blocking pool
async fn run_blocking<T, F>(work: F) -> Result<T, ApiError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| ApiError::Internal(format!("blocking task failed: {}", e)))
}
