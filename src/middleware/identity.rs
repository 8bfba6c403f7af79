// Request-scoped identity and the extractors that read it
//
// The authenticate middleware inserts exactly one `Identity` into the request
// extensions. Reading it anywhere that middleware does not wrap is a wiring
// bug and panics.

use std::convert::Infallible;

use axum::{extract::FromRequestParts, http::request::Parts, http::Extensions};

use crate::models::user::User;
use crate::utils::api_error::ApiError;

/// Who is making the request
#[derive(Debug, Clone)]
pub enum Identity {
    Anonymous,
    Authenticated(User),
}

impl Identity {
    pub fn is_anonymous(&self) -> bool {
        matches!(self, Identity::Anonymous)
    }

    pub fn user(&self) -> Option<&User> {
        match self {
            Identity::Anonymous => None,
            Identity::Authenticated(user) => Some(user),
        }
    }

    /// The user, or `AuthenticationRequired` for anonymous requests
    pub fn authenticated(&self) -> Result<&User, ApiError> {
        self.user().ok_or(ApiError::AuthenticationRequired)
    }

    /// The user if authenticated and activated
    pub fn activated(&self) -> Result<&User, ApiError> {
        let user = self.authenticated()?;
        if !user.activated {
            return Err(ApiError::InactiveAccount);
        }
        Ok(user)
    }

    /// # Panics
    /// When the authenticate middleware has not run for this request.
    pub fn from_extensions(extensions: &Extensions) -> &Identity {
        match extensions.get::<Identity>() {
            Some(identity) => identity,
            None => panic!("request has no Identity: the authenticate middleware is not installed on this route"),
        }
    }
}

impl<S> FromRequestParts<S> for Identity
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Identity::from_extensions(&parts.extensions).clone())
    }
}

/// Extractor that rejects anonymous requests with 401
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub User);

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Identity::from_extensions(&parts.extensions)
            .authenticated()
            .map(|user| AuthenticatedUser(user.clone()))
    }
}

/// Extractor that additionally rejects inactive accounts with 403
#[derive(Debug, Clone)]
pub struct ActivatedUser(pub User);

impl<S> FromRequestParts<S> for ActivatedUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Identity::from_extensions(&parts.extensions)
            .activated()
            .map(|user| ActivatedUser(user.clone()))
    }
}
