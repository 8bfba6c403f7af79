// User model, registration input and field validation

use std::borrow::Cow;

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use crate::schema::users;
use crate::utils::password::{Password, MAX_PASSWORD_BYTES};

/// A registered account
#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: i64,
    pub created_at: DateTime<Utc>,
    pub name: String,
    pub email: String,
    #[serde(skip)]
    pub password: Password,
    pub activated: bool,
    /// Optimistic concurrency counter, bumped by the store on every update
    #[serde(skip)]
    pub version: i32,
}

/// A user that has not been persisted yet
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password: Password,
    pub activated: bool,
}

/// Row shape of the `users` table
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = users)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct UserRow {
    pub id: i64,
    pub created_at: DateTime<Utc>,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub activated: bool,
    pub version: i32,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id,
            created_at: row.created_at,
            name: row.name,
            email: row.email,
            password: Password::from_hash(row.password_hash),
            activated: row.activated,
            version: row.version,
        }
    }
}

/// Insertable shape of the `users` table
#[derive(Debug, Insertable)]
#[diesel(table_name = users)]
pub struct NewUserRow<'a> {
    pub name: &'a str,
    pub email: &'a str,
    pub password_hash: &'a str,
    pub activated: bool,
}

impl<'a> From<&'a NewUser> for NewUserRow<'a> {
    fn from(user: &'a NewUser) -> Self {
        Self {
            name: &user.name,
            email: &user.email,
            password_hash: user.password.hash(),
            activated: user.activated,
        }
    }
}

// =============================================================================
// REQUEST TYPES
// =============================================================================

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterUserRequest {
    #[validate(custom(function = "validate_name"))]
    #[serde(default)]
    pub name: String,

    #[validate(custom(function = "validate_email_address"))]
    #[serde(default)]
    pub email: String,

    #[validate(custom(function = "validate_password_plaintext"))]
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct AuthenticationRequest {
    #[validate(custom(function = "validate_email_address"))]
    #[serde(default)]
    pub email: String,

    #[validate(custom(function = "validate_password_plaintext"))]
    #[serde(default)]
    pub password: String,
}

// =============================================================================
// FIELD VALIDATORS
// =============================================================================

pub(crate) fn field_error(code: &'static str, message: &'static str) -> ValidationError {
    let mut error = ValidationError::new(code);
    error.message = Some(Cow::Borrowed(message));
    error
}

pub fn validate_name(name: &str) -> Result<(), ValidationError> {
    if name.trim().is_empty() {
        return Err(field_error("required", "must be provided"));
    }
    if name.len() < 2 {
        return Err(field_error("too_short", "must be at least 2 bytes"));
    }
    if name.len() > 500 {
        return Err(field_error("too_long", "must not be more than 500 bytes long"));
    }
    Ok(())
}

pub fn validate_email_address(email: &str) -> Result<(), ValidationError> {
    if email.trim().is_empty() {
        return Err(field_error("required", "must be provided"));
    }
    if !validator::validate_email(email) {
        return Err(field_error("email", "must be a valid email address"));
    }
    Ok(())
}

pub fn validate_password_plaintext(password: &str) -> Result<(), ValidationError> {
    if password.is_empty() {
        return Err(field_error("required", "must be provided"));
    }
    if password.len() < 8 {
        return Err(field_error("too_short", "must be at least 8 bytes long"));
    }
    if password.len() > MAX_PASSWORD_BYTES {
        return Err(field_error("too_long", "must not be more than 72 bytes long"));
    }
    Ok(())
}
