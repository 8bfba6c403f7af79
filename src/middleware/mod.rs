// Middleware modules
// Chain order, outermost first: metrics, panic recovery, CORS, rate limiting, authentication

pub mod authenticate;
pub mod authorize;
pub mod cors;
pub mod identity;
pub mod metrics;
pub mod rate_limit;
pub mod recover;

pub use authenticate::authenticate;
pub use authorize::{require_activated_user, require_authenticated_user, RequirePermissionLayer};
pub use cors::enable_cors;
pub use identity::{ActivatedUser, AuthenticatedUser, Identity};
pub use metrics::{track_metrics, Metrics};
pub use rate_limit::{client_ip, limit_rate};
pub use recover::recover_panic_layer;
