// User registration, activation and profile endpoints

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};

use crate::app::AppState;
use crate::middleware::identity::ActivatedUser;
use crate::models::token::ActivateUserRequest;
use crate::models::user::RegisterUserRequest;
use crate::utils::api_error::ApiError;

/// POST /v1/users
pub async fn register_user(
    State(state): State<AppState>,
    payload: Result<Json<RegisterUserRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let Json(request) = payload?;
    let user = state.accounts.register(request).await?;

    Ok((StatusCode::ACCEPTED, Json(json!({ "user": user }))))
}

/// PUT /v1/users/activated
pub async fn activate_user(
    State(state): State<AppState>,
    payload: Result<Json<ActivateUserRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(request) = payload?;
    let user = state.accounts.activate(request).await?;

    Ok(Json(json!({ "user": user })))
}

/// GET /v1/users/me
pub async fn current_user(
    State(state): State<AppState>,
    ActivatedUser(user): ActivatedUser,
) -> Result<Json<Value>, ApiError> {
    let permissions = state.permissions.all_for_user(user.id).await?;

    Ok(Json(json!({
        "user": user,
        "permissions": permissions,
    })))
}
