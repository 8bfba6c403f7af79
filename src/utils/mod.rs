// Utility modules

pub mod api_error;
pub mod password;
pub mod service_error;

pub use api_error::{log_auth_failure, ApiError};
pub use password::{Password, PasswordError};
pub use service_error::ServiceError;
