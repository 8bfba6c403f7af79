// Postgres-backed stores using diesel-async on the bb8 pool

use async_trait::async_trait;
use chrono::Utc;
use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use diesel_async::RunQueryDsl;
use tracing::instrument;

use super::diesel_pool::{DieselConnection, DieselPool};
use super::store::{PermissionStore, StoreError, TokenStore, UserStore};
use crate::models::permission::Permissions;
use crate::models::token::{NewTokenRow, Scope, Token};
use crate::models::user::{NewUser, NewUserRow, User, UserRow};
use crate::schema::{permissions, tokens, users, users_permissions};

const USERS_EMAIL_KEY: &str = "users_email_key";

define_sql_function!(fn lower(x: diesel::sql_types::Text) -> diesel::sql_types::Text);

impl From<DieselError> for StoreError {
    fn from(error: DieselError) -> Self {
        match error {
            DieselError::NotFound => StoreError::NotFound,
            DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, ref info)
                if info.constraint_name() == Some(USERS_EMAIL_KEY) =>
            {
                StoreError::DuplicateEmail
            },
            other => StoreError::Database(other.to_string()),
        }
    }
}

/// All three stores over one connection pool
#[derive(Clone)]
pub struct PgStore {
    pool: DieselPool,
}

impl PgStore {
    pub fn new(pool: DieselPool) -> Self {
        Self { pool }
    }

    async fn connection(&self) -> Result<DieselConnection<'_>, StoreError> {
        self.pool
            .get()
            .await
            .map_err(|e| StoreError::Pool(e.to_string()))
    }
}

#[async_trait]
impl UserStore for PgStore {
    #[instrument(skip(self, user), fields(email = %user.email))]
    async fn insert(&self, user: &NewUser) -> Result<User, StoreError> {
        let mut conn = self.connection().await?;

        // Emails are unique regardless of case; the unique key backs this up under races
        let taken = users::table
            .filter(lower(users::email).eq(user.email.to_lowercase()))
            .select(users::id)
            .first::<i64>(&mut conn)
            .await
            .optional()?;
        if taken.is_some() {
            return Err(StoreError::DuplicateEmail);
        }

        let row = diesel::insert_into(users::table)
            .values(NewUserRow::from(user))
            .returning(UserRow::as_returning())
            .get_result::<UserRow>(&mut conn)
            .await?;

        Ok(row.into())
    }

    async fn get_by_email(&self, email: &str) -> Result<User, StoreError> {
        let mut conn = self.connection().await?;

        let row = users::table
            .filter(lower(users::email).eq(email.to_lowercase()))
            .select(UserRow::as_select())
            .first::<UserRow>(&mut conn)
            .await?;

        Ok(row.into())
    }

    async fn get_for_token(&self, scope: Scope, token_hash: &[u8]) -> Result<User, StoreError> {
        let mut conn = self.connection().await?;

        let row = users::table
            .inner_join(tokens::table)
            .filter(tokens::hash.eq(token_hash))
            .filter(tokens::scope.eq(scope.as_str()))
            .filter(tokens::expiry.gt(Utc::now()))
            .select(UserRow::as_select())
            .first::<UserRow>(&mut conn)
            .await?;

        Ok(row.into())
    }

    #[instrument(skip(self, user), fields(user_id = user.id, version = user.version))]
    async fn update(&self, user: &mut User) -> Result<(), StoreError> {
        let mut conn = self.connection().await?;

        let taken = users::table
            .filter(lower(users::email).eq(user.email.to_lowercase()))
            .filter(users::id.ne(user.id))
            .select(users::id)
            .first::<i64>(&mut conn)
            .await
            .optional()?;
        if taken.is_some() {
            return Err(StoreError::DuplicateEmail);
        }

        let version = diesel::update(
            users::table
                .filter(users::id.eq(user.id))
                .filter(users::version.eq(user.version)),
        )
        .set((
            users::name.eq(&user.name),
            users::email.eq(&user.email),
            users::password_hash.eq(user.password.hash()),
            users::activated.eq(user.activated),
            users::version.eq(users::version + 1),
        ))
        .returning(users::version)
        .get_result::<i32>(&mut conn)
        .await
        .map_err(|e| match e {
            // No row matched the id/version pair
            DieselError::NotFound => StoreError::EditConflict,
            other => other.into(),
        })?;

        user.version = version;
        Ok(())
    }
}

#[async_trait]
impl TokenStore for PgStore {
    async fn insert(&self, token: &Token) -> Result<(), StoreError> {
        let mut conn = self.connection().await?;

        diesel::insert_into(tokens::table)
            .values(NewTokenRow::from(token))
            .execute(&mut conn)
            .await?;

        Ok(())
    }

    async fn delete_all_for_user(&self, scope: Scope, user_id: i64) -> Result<(), StoreError> {
        let mut conn = self.connection().await?;

        diesel::delete(
            tokens::table
                .filter(tokens::scope.eq(scope.as_str()))
                .filter(tokens::user_id.eq(user_id)),
        )
        .execute(&mut conn)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl PermissionStore for PgStore {
    async fn get_all_for_user(&self, user_id: i64) -> Result<Permissions, StoreError> {
        let mut conn = self.connection().await?;

        let codes = permissions::table
            .inner_join(users_permissions::table)
            .filter(users_permissions::user_id.eq(user_id))
            .select(permissions::code)
            .load::<String>(&mut conn)
            .await?;

        Ok(Permissions::from(codes))
    }

    async fn add_for_user(&self, user_id: i64, codes: &[&str]) -> Result<(), StoreError> {
        let mut conn = self.connection().await?;

        let permission_ids = permissions::table
            .filter(permissions::code.eq_any(codes))
            .select(permissions::id)
            .load::<i64>(&mut conn)
            .await?;

        let grants: Vec<_> = permission_ids
            .into_iter()
            .map(|permission_id| {
                (
                    users_permissions::user_id.eq(user_id),
                    users_permissions::permission_id.eq(permission_id),
                )
            })
            .collect();

        if grants.is_empty() {
            return Ok(());
        }

        diesel::insert_into(users_permissions::table)
            .values(grants)
            .on_conflict_do_nothing()
            .execute(&mut conn)
            .await?;

        Ok(())
    }
}
