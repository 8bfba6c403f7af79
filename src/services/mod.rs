// Services module
// Business logic layer for the application

pub mod account;
pub mod permission;
pub mod rate_limit;
pub mod token;

// Re-export commonly used services
pub use account::{AccountService, ActivationNotifier, LogNotifier};
pub use permission::PermissionService;
pub use rate_limit::{RateLimitConfig, RateLimitError, RateLimiter};
pub use token::TokenService;
