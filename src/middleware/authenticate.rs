// Authentication middleware
// Resolves the bearer token into an Identity and injects it into request extensions

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::app::AppState;
use crate::db::store::StoreError;
use crate::middleware::identity::Identity;
use crate::models::token::{validate_token_plaintext, Scope};
use crate::services::token::TokenService;
use crate::utils::api_error::{log_auth_failure, ApiError};

/// Bind an `Identity` to every request. The identity is only attached once the
/// token lookup has fully succeeded.
pub async fn authenticate(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let identity = match resolve_identity(&state.tokens, request.headers()).await {
        Ok(identity) => identity,
        Err(error) => {
            if !matches!(error, ApiError::Internal(_)) {
                log_auth_failure(None, &error);
            }
            let mut response = error.into_response();
            vary_on_authorization(&mut response);
            return response;
        },
    };

    request.extensions_mut().insert(identity);

    let mut response = next.run(request).await;
    vary_on_authorization(&mut response);
    response
}

/// Map an `Authorization` header to an identity
///
/// An absent header is anonymous. Anything other than `Bearer <26 chars>`
/// naming a live authentication token is rejected.
pub async fn resolve_identity(
    tokens: &TokenService,
    headers: &HeaderMap,
) -> Result<Identity, ApiError> {
    let value = match headers.get(header::AUTHORIZATION) {
        Some(value) if !value.is_empty() => value,
        _ => return Ok(Identity::Anonymous),
    };

    let value = value
        .to_str()
        .map_err(|_| ApiError::InvalidAuthenticationToken)?;

    let token = match value.split(' ').collect::<Vec<_>>().as_slice() {
        ["Bearer", token] => *token,
        _ => return Err(ApiError::InvalidAuthenticationToken),
    };

    if validate_token_plaintext(token).is_err() {
        return Err(ApiError::InvalidAuthenticationToken);
    }

    match tokens.user_for_token(Scope::Authentication, token).await {
        Ok(user) => Ok(Identity::Authenticated(user)),
        Err(StoreError::NotFound) => Err(ApiError::InvalidAuthenticationToken),
        Err(e) => Err(e.into()),
    }
}

fn vary_on_authorization(response: &mut Response) {
    response
        .headers_mut()
        .append(header::VARY, HeaderValue::from_static("Authorization"));
}
