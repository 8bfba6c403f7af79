// Application state and router assembly
use std::sync::Arc;

use axum::{middleware::from_fn_with_state, Router};
use tower_http::trace::TraceLayer;

use crate::{
    app_config::AppConfig,
    db::store::Stores,
    handlers,
    middleware::{
        authenticate, enable_cors, limit_rate, recover_panic_layer, track_metrics, Metrics,
    },
    services::{AccountService, ActivationNotifier, PermissionService, RateLimiter, TokenService},
};

// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub tokens: TokenService,
    pub permissions: PermissionService,
    pub accounts: AccountService,
    pub rate_limiter: Arc<RateLimiter>,
    pub metrics: Arc<Metrics>,
}

impl AppState {
    /// Wire services over `stores`. Spawns the rate limiter sweep, so call
    /// from within a tokio runtime.
    pub fn new(
        config: Arc<AppConfig>,
        stores: Stores,
        notifier: Arc<dyn ActivationNotifier>,
    ) -> anyhow::Result<Self> {
        let timeout = config.store_timeout;

        let tokens = TokenService::new(stores.users.clone(), stores.tokens.clone(), timeout);
        let permissions = PermissionService::new(stores.permissions.clone(), timeout);
        let accounts = AccountService::new(
            stores.users.clone(),
            tokens.clone(),
            permissions.clone(),
            notifier,
            config.bcrypt_cost,
            timeout,
        );
        let rate_limiter = Arc::new(RateLimiter::new(config.limiter.clone())?);
        let metrics = Arc::new(Metrics::new()?);

        Ok(Self {
            config,
            tokens,
            permissions,
            accounts,
            rate_limiter,
            metrics,
        })
    }
}

/// The full application: every route behind the middleware chain
pub fn build_router(state: AppState) -> Router {
    build_router_with(state, Router::new())
}

/// Like `build_router`, with `extra` routes mounted behind the same chain
///
/// Layers run outermost first: tracing, metrics, panic recovery, CORS, rate
/// limiting, authentication. Per-route gates sit inside `extra` itself.
///
/// Rate limiting keys clients by socket peer, so serve the router with
/// `into_make_service_with_connect_info::<SocketAddr>()`. Without it every
/// client lands in one shared "unknown" bucket.
pub fn build_router_with(state: AppState, extra: Router<AppState>) -> Router {
    handlers::routes()
        .merge(extra)
        .fallback(handlers::not_found)
        .method_not_allowed_fallback(handlers::method_not_allowed)
        .layer(from_fn_with_state(state.clone(), authenticate))
        .layer(from_fn_with_state(state.clone(), limit_rate))
        .layer(from_fn_with_state(state.clone(), enable_cors))
        .layer(recover_panic_layer())
        .layer(from_fn_with_state(state.metrics.clone(), track_metrics))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
