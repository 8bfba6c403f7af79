// HTTP-facing error type
// Every failure response carries a `{"error": ...}` envelope

use std::collections::BTreeMap;

use axum::{
    extract::rejection::JsonRejection,
    http::{header, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Json, Response},
};
use serde_json::json;
use thiserror::Error;
use validator::ValidationErrors;

use crate::db::store::StoreError;
use crate::utils::password::PasswordError;
use crate::utils::service_error::ServiceError;

/// Message shown to clients for any 5xx. The detail only goes to the log.
pub const SERVER_ERROR_MESSAGE: &str =
    "the server encountered a problem and could not process your request";

/// Field name -> message, serialized as a JSON object
pub type FieldErrors = BTreeMap<String, String>;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("failed validation")]
    FailedValidation(FieldErrors),

    #[error("{0}")]
    BadRequest(String),

    #[error("the requested resource could not be found")]
    NotFound,

    #[error("the {0} method is not supported for this resource")]
    MethodNotAllowed(Method),

    #[error("unable to update the record due to an edit conflict, please try again")]
    EditConflict,

    #[error("invalid authentication credentials")]
    InvalidCredentials,

    #[error("invalid or missing authentication token")]
    InvalidAuthenticationToken,

    #[error("you must be authenticated to access this resource")]
    AuthenticationRequired,

    #[error("your user account must be activated to access this resource")]
    InactiveAccount,

    #[error("your user account doesn't have the necessary permissions to access this resource")]
    NotPermitted,

    #[error("rate limit exceeded")]
    RateLimitExceeded,

    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    /// Single-field validation failure
    pub fn failed_field(field: &str, message: &str) -> Self {
        let mut fields = FieldErrors::new();
        fields.insert(field.to_string(), message.to_string());
        ApiError::FailedValidation(fields)
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::FailedValidation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            ApiError::EditConflict => StatusCode::CONFLICT,
            ApiError::InvalidCredentials
            | ApiError::InvalidAuthenticationToken
            | ApiError::AuthenticationRequired => StatusCode::UNAUTHORIZED,
            ApiError::InactiveAccount | ApiError::NotPermitted => StatusCode::FORBIDDEN,
            ApiError::RateLimitExceeded => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Short machine-readable label, used in log fields
    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::FailedValidation(_) => "FAILED_VALIDATION",
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::NotFound => "NOT_FOUND",
            ApiError::MethodNotAllowed(_) => "METHOD_NOT_ALLOWED",
            ApiError::EditConflict => "EDIT_CONFLICT",
            ApiError::InvalidCredentials => "INVALID_CREDENTIALS",
            ApiError::InvalidAuthenticationToken => "INVALID_TOKEN",
            ApiError::AuthenticationRequired => "AUTHENTICATION_REQUIRED",
            ApiError::InactiveAccount => "INACTIVE_ACCOUNT",
            ApiError::NotPermitted => "NOT_PERMITTED",
            ApiError::RateLimitExceeded => "RATE_LIMITED",
            ApiError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let body = match &self {
            ApiError::FailedValidation(fields) => json!({ "error": fields }),
            ApiError::Internal(detail) => {
                tracing::error!(error = %detail, "Request failed with a server error");
                json!({ "error": SERVER_ERROR_MESSAGE })
            },
            other => json!({ "error": other.to_string() }),
        };

        let mut response = (status, Json(body)).into_response();
        if matches!(self, ApiError::InvalidAuthenticationToken) {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        response
    }
}

impl From<ValidationErrors> for ApiError {
    fn from(errors: ValidationErrors) -> Self {
        let fields = errors
            .field_errors()
            .into_iter()
            .map(|(field, errors)| {
                let message = errors
                    .first()
                    .and_then(|error| error.message.as_ref())
                    .map(|message| message.to_string())
                    .unwrap_or_else(|| "is invalid".to_string());
                (field.to_string(), message)
            })
            .collect();
        ApiError::FailedValidation(fields)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<StoreError> for ApiError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::NotFound => ApiError::NotFound,
            StoreError::EditConflict => ApiError::EditConflict,
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<ServiceError> for ApiError {
    fn from(error: ServiceError) -> Self {
        match error {
            ServiceError::Store(store) => store.into(),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<PasswordError> for ApiError {
    fn from(error: PasswordError) -> Self {
        ApiError::Internal(error.to_string())
    }
}

/// Log a rejected authentication or authorization attempt
pub fn log_auth_failure(user_id: Option<i64>, error: &ApiError) {
    tracing::warn!(
        user_id = user_id,
        error_code = error.error_code(),
        status = error.status_code().as_u16(),
        "Access denied"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::user::validate_email_address;
    use validator::Validate;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(ApiError::InvalidCredentials.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            ApiError::InvalidAuthenticationToken.status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(ApiError::AuthenticationRequired.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::InactiveAccount.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(ApiError::NotPermitted.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(ApiError::RateLimitExceeded.status_code(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(ApiError::EditConflict.status_code(), StatusCode::CONFLICT);
        assert_eq!(
            ApiError::FailedValidation(FieldErrors::new()).status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
    }

    #[tokio::test]
    async fn test_invalid_token_sets_www_authenticate() {
        let response = ApiError::InvalidAuthenticationToken.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(response.headers()[header::WWW_AUTHENTICATE], "Bearer");

        let body = body_json(response).await;
        assert_eq!(body["error"], "invalid or missing authentication token");

        let response = ApiError::AuthenticationRequired.into_response();
        assert!(response.headers().get(header::WWW_AUTHENTICATE).is_none());
    }

    #[tokio::test]
    async fn test_internal_error_hides_detail() {
        let response =
            ApiError::Internal("connection refused to 10.0.0.5".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = body_json(response).await;
        assert_eq!(body["error"], SERVER_ERROR_MESSAGE);
    }

    #[tokio::test]
    async fn test_validation_errors_become_field_map() {
        #[derive(Validate)]
        struct Input {
            #[validate(custom(function = "validate_email_address"))]
            email: String,
        }

        let errors = Input {
            email: "nope".to_string(),
        }
        .validate()
        .unwrap_err();

        let response = ApiError::from(errors).into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let body = body_json(response).await;
        assert_eq!(body["error"]["email"], "must be a valid email address");
    }

    #[test]
    fn test_store_error_mapping() {
        assert!(matches!(ApiError::from(StoreError::NotFound), ApiError::NotFound));
        assert!(matches!(
            ApiError::from(StoreError::EditConflict),
            ApiError::EditConflict
        ));
        assert!(matches!(
            ApiError::from(StoreError::Timeout(std::time::Duration::from_secs(3))),
            ApiError::Internal(_)
        ));
        assert!(matches!(
            ApiError::from(StoreError::Database("boom".to_string())),
            ApiError::Internal(_)
        ));
    }

    #[test]
    fn test_method_not_allowed_message() {
        let error = ApiError::MethodNotAllowed(Method::PATCH);
        assert_eq!(
            error.to_string(),
            "the PATCH method is not supported for this resource"
        );
    }
}
