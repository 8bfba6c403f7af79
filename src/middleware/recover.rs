// Panic recovery
// Turns a panic anywhere below this layer into a JSON 500 and closes the connection

use std::any::Any;

use axum::{
    http::{header, HeaderValue},
    response::{IntoResponse, Response},
};
use tower_http::catch_panic::CatchPanicLayer;

use crate::utils::api_error::ApiError;

pub type PanicHandler = fn(Box<dyn Any + Send + 'static>) -> Response;

pub fn recover_panic_layer() -> CatchPanicLayer<PanicHandler> {
    CatchPanicLayer::custom(handle_panic as PanicHandler)
}

pub fn handle_panic(payload: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else {
        "unknown panic payload".to_string()
    };

    let mut response = ApiError::Internal(format!("handler panicked: {}", detail)).into_response();
    response
        .headers_mut()
        .insert(header::CONNECTION, HeaderValue::from_static("close"));
    response
}
