// Service layer error type
use thiserror::Error;

use crate::db::store::StoreError;
use crate::utils::password::PasswordError;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Password(#[from] PasswordError),

    #[error("Token generation failed: {0}")]
    TokenGeneration(String),
}

impl From<rand::Error> for ServiceError {
    fn from(error: rand::Error) -> Self {
        ServiceError::TokenGeneration(error.to_string())
    }
}
