// Authentication token endpoint

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};

use crate::app::AppState;
use crate::models::user::AuthenticationRequest;
use crate::utils::api_error::ApiError;

/// POST /v1/tokens/authentication
///
/// Exchanges an email and password for a 24 hour bearer token.
pub async fn create_authentication_token(
    State(state): State<AppState>,
    payload: Result<Json<AuthenticationRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let Json(request) = payload?;
    let token = state.accounts.create_authentication_token(request).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "authentication_token": token })),
    ))
}
