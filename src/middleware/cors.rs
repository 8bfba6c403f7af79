use axum::{
    extract::{Request, State},
    http::{
        header::{self, HeaderValue},
        Method, StatusCode,
    },
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::debug;

use crate::app::AppState;

const ALLOWED_METHODS: &str = "OPTIONS, PUT, PATCH, DELETE";
const ALLOWED_HEADERS: &str = "Authorization, Content-Type";

/// CORS against an explicit list of trusted origins
///
/// Responses always vary on `Origin` and `Access-Control-Request-Method`.
/// Preflight requests from a trusted origin are answered here and never reach
/// the router.
pub async fn enable_cors(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let trusted_origin = request
        .headers()
        .get(header::ORIGIN)
        .filter(|origin| {
            origin
                .to_str()
                .map(|origin| state.config.is_trusted_origin(origin))
                .unwrap_or(false)
        })
        .cloned();

    if let Some(origin) = &trusted_origin {
        let is_preflight = request.method() == Method::OPTIONS
            && request
                .headers()
                .contains_key(header::ACCESS_CONTROL_REQUEST_METHOD);

        if is_preflight {
            debug!(origin = ?origin, "CORS preflight answered");
            let mut response = StatusCode::OK.into_response();
            add_vary(&mut response);

            let headers = response.headers_mut();
            headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, origin.clone());
            headers.insert(
                header::ACCESS_CONTROL_ALLOW_METHODS,
                HeaderValue::from_static(ALLOWED_METHODS),
            );
            headers.insert(
                header::ACCESS_CONTROL_ALLOW_HEADERS,
                HeaderValue::from_static(ALLOWED_HEADERS),
            );
            return response;
        }
    }

    let mut response = next.run(request).await;
    add_vary(&mut response);

    if let Some(origin) = trusted_origin {
        response
            .headers_mut()
            .insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, origin);
    }

    response
}

fn add_vary(response: &mut Response) {
    let headers = response.headers_mut();
    headers.append(header::VARY, HeaderValue::from_static("Origin"));
    headers.append(
        header::VARY,
        HeaderValue::from_static("Access-Control-Request-Method"),
    );
}
