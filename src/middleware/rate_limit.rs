// Rate limiting middleware keyed by client IP

use std::net::{IpAddr, SocketAddr};

use axum::{
    extract::{ConnectInfo, Request, State},
    http::HeaderMap,
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::warn;

use crate::app::AppState;
use crate::utils::api_error::ApiError;

pub async fn limit_rate(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let limiter = &state.rate_limiter;
    if !limiter.is_enabled() {
        return next.run(request).await;
    }

    let remote = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    if remote.is_none() && limiter.note_missing_peer() {
        warn!(
            "Request without a socket peer address; all such clients share the \"unknown\" \
             rate limit bucket. Serve with into_make_service_with_connect_info::<SocketAddr>()"
        );
    }
    let client = client_ip(
        request.headers(),
        remote,
        limiter.config().trust_proxy_headers,
    );

    if !limiter.check(&client) {
        warn!(client = %client, "Rate limit exceeded");
        return ApiError::RateLimitExceeded.into_response();
    }

    next.run(request).await
}

/// Key a request by client IP
///
/// Proxy headers are only honoured when `trust_proxy_headers` is set: the first
/// `X-Forwarded-For` entry wins, then `X-Real-IP`. Otherwise the socket peer is
/// used, and "unknown" when even that is unavailable.
pub fn client_ip(headers: &HeaderMap, remote: Option<SocketAddr>, trust_proxy_headers: bool) -> String {
    if trust_proxy_headers {
        let forwarded = headers
            .get("x-forwarded-for")
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.split(',').next())
            .and_then(parse_ip);
        if let Some(ip) = forwarded {
            return ip.to_string();
        }

        let real_ip = headers
            .get("x-real-ip")
            .and_then(|value| value.to_str().ok())
            .and_then(parse_ip);
        if let Some(ip) = real_ip {
            return ip.to_string();
        }
    }

    remote
        .map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

fn parse_ip(value: &str) -> Option<IpAddr> {
    value.trim().parse().ok()
}
