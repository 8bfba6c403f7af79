pub mod permission;
pub mod token;
pub mod user;

// Re-export common types
pub use permission::{Permissions, MOVIES_READ, MOVIES_WRITE};
pub use token::{ActivateUserRequest, Scope, Token};
pub use user::{AuthenticationRequest, NewUser, RegisterUserRequest, User};
