// HTTP handlers and route table

pub mod health;
pub mod tokens;
pub mod users;

use axum::{
    http::Method,
    routing::{get, post, put},
    Router,
};

use crate::app::AppState;
use crate::utils::api_error::ApiError;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/healthcheck", get(health::healthcheck))
        .route("/v1/metrics", get(health::metrics))
        .route("/v1/users", post(users::register_user))
        .route("/v1/users/activated", put(users::activate_user))
        .route("/v1/users/me", get(users::current_user))
        .route(
            "/v1/tokens/authentication",
            post(tokens::create_authentication_token),
        )
}

pub async fn not_found() -> ApiError {
    ApiError::NotFound
}

pub async fn method_not_allowed(method: Method) -> ApiError {
    ApiError::MethodNotAllowed(method)
}
