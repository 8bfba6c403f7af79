// In-process store used by tests and local runs without Postgres

use std::collections::{BTreeSet, HashMap};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use subtle::ConstantTimeEq;

use super::store::{PermissionStore, StoreError, TokenStore, UserStore};
use crate::models::permission::{Permissions, MOVIES_READ, MOVIES_WRITE};
use crate::models::token::{Scope, Token};
use crate::models::user::{NewUser, User};
use crate::utils::password::Password;

#[derive(Debug, Clone)]
struct StoredUser {
    id: i64,
    created_at: DateTime<Utc>,
    name: String,
    email: String,
    password_hash: String,
    activated: bool,
    version: i32,
}

impl From<&StoredUser> for User {
    fn from(stored: &StoredUser) -> Self {
        Self {
            id: stored.id,
            created_at: stored.created_at,
            name: stored.name.clone(),
            email: stored.email.clone(),
            password: Password::from_hash(stored.password_hash.clone()),
            activated: stored.activated,
            version: stored.version,
        }
    }
}

#[derive(Debug, Clone)]
struct StoredToken {
    hash: Vec<u8>,
    user_id: i64,
    expiry: DateTime<Utc>,
    scope: Scope,
}

#[derive(Debug, Default)]
struct State {
    next_user_id: i64,
    users: HashMap<i64, StoredUser>,
    tokens: Vec<StoredToken>,
    grants: HashMap<i64, BTreeSet<String>>,
}

/// Store backed by process memory. Matches `PgStore` on email handling (unique
/// and looked up by lowercase form) and on version checks during update.
#[derive(Debug)]
pub struct MemoryStore {
    state: Mutex<State>,
    known_permissions: BTreeSet<String>,
    clock_offset: Mutex<chrono::Duration>,
    latency: Mutex<Option<Duration>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                next_user_id: 1,
                ..State::default()
            }),
            known_permissions: [MOVIES_READ, MOVIES_WRITE]
                .into_iter()
                .map(String::from)
                .collect(),
            clock_offset: Mutex::new(chrono::Duration::zero()),
            latency: Mutex::new(None),
        }
    }

    /// Shift the store's notion of "now", used to drive token expiry in tests
    pub fn advance_clock(&self, by: chrono::Duration) {
        let mut offset = lock(&self.clock_offset);
        *offset += by;
    }

    /// Delay every subsequent call by `latency`, or stop delaying with `None`
    pub fn simulate_latency(&self, latency: Option<Duration>) {
        *lock(&self.latency) = latency;
    }

    pub fn token_count(&self) -> usize {
        lock(&self.state).tokens.len()
    }

    fn now(&self) -> DateTime<Utc> {
        Utc::now() + *lock(&self.clock_offset)
    }

    async fn delay(&self) {
        let latency = *lock(&self.latency);
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
    }
}

// Same comparison PgStore makes with lower(email)
fn same_email(a: &str, b: &str) -> bool {
    a.to_lowercase() == b.to_lowercase()
}

// A poisoned lock only means another test thread panicked mid-update; the data is still usable
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn insert(&self, user: &NewUser) -> Result<User, StoreError> {
        self.delay().await;
        let created_at = self.now();
        let mut state = lock(&self.state);

        if state
            .users
            .values()
            .any(|existing| same_email(&existing.email, &user.email))
        {
            return Err(StoreError::DuplicateEmail);
        }

        let id = state.next_user_id;
        state.next_user_id += 1;

        let stored = StoredUser {
            id,
            created_at,
            name: user.name.clone(),
            email: user.email.clone(),
            password_hash: user.password.hash().to_string(),
            activated: user.activated,
            version: 1,
        };
        let created = User::from(&stored);
        state.users.insert(id, stored);

        Ok(created)
    }

    async fn get_by_email(&self, email: &str) -> Result<User, StoreError> {
        self.delay().await;
        let state = lock(&self.state);

        state
            .users
            .values()
            .find(|user| same_email(&user.email, email))
            .map(User::from)
            .ok_or(StoreError::NotFound)
    }

    async fn get_for_token(&self, scope: Scope, token_hash: &[u8]) -> Result<User, StoreError> {
        self.delay().await;
        let now = self.now();
        let state = lock(&self.state);

        let token = state
            .tokens
            .iter()
            .find(|token| {
                token.scope == scope
                    && token.expiry > now
                    && bool::from(token.hash.as_slice().ct_eq(token_hash))
            })
            .ok_or(StoreError::NotFound)?;

        state
            .users
            .get(&token.user_id)
            .map(User::from)
            .ok_or(StoreError::NotFound)
    }

    async fn update(&self, user: &mut User) -> Result<(), StoreError> {
        self.delay().await;
        let mut state = lock(&self.state);

        let email_taken = state.users.values().any(|other| {
            other.id != user.id && same_email(&other.email, &user.email)
        });

        let stored = match state.users.get_mut(&user.id) {
            Some(stored) if stored.version == user.version => stored,
            _ => return Err(StoreError::EditConflict),
        };
        if email_taken {
            return Err(StoreError::DuplicateEmail);
        }

        stored.name = user.name.clone();
        stored.email = user.email.clone();
        stored.password_hash = user.password.hash().to_string();
        stored.activated = user.activated;
        stored.version += 1;
        user.version = stored.version;

        Ok(())
    }
}

#[async_trait]
impl TokenStore for MemoryStore {
    async fn insert(&self, token: &Token) -> Result<(), StoreError> {
        self.delay().await;
        let mut state = lock(&self.state);

        if !state.users.contains_key(&token.user_id) {
            return Err(StoreError::Database(format!(
                "token references unknown user {}",
                token.user_id
            )));
        }

        state.tokens.push(StoredToken {
            hash: token.hash.clone(),
            user_id: token.user_id,
            expiry: token.expiry,
            scope: token.scope,
        });
        Ok(())
    }

    async fn delete_all_for_user(&self, scope: Scope, user_id: i64) -> Result<(), StoreError> {
        self.delay().await;
        let mut state = lock(&self.state);
        state
            .tokens
            .retain(|token| !(token.scope == scope && token.user_id == user_id));
        Ok(())
    }
}

#[async_trait]
impl PermissionStore for MemoryStore {
    async fn get_all_for_user(&self, user_id: i64) -> Result<Permissions, StoreError> {
        self.delay().await;
        let state = lock(&self.state);

        let codes = state
            .grants
            .get(&user_id)
            .map(|codes| codes.iter().cloned().collect::<Vec<_>>())
            .unwrap_or_default();
        Ok(Permissions::from(codes))
    }

    async fn add_for_user(&self, user_id: i64, codes: &[&str]) -> Result<(), StoreError> {
        self.delay().await;
        let mut state = lock(&self.state);

        // Unknown codes are ignored, matching the join against the permissions table
        let granted = state.grants.entry(user_id).or_default();
        for code in codes {
            if self.known_permissions.contains(*code) {
                granted.insert((*code).to_string());
            }
        }
        Ok(())
    }
}
