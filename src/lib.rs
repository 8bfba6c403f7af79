// Library exports for the Goplex backend
// Authentication, authorization and request protection for the movies API

pub mod app;
pub mod app_config;
pub mod db;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod schema;
pub mod services;
pub mod utils;

// Re-export commonly used types
pub use app::{build_router, build_router_with, AppState};
pub use app_config::{config, AppConfig, CONFIG};
pub use db::{DieselPool, MemoryStore, PgStore, Stores};
pub use middleware::{ActivatedUser, AuthenticatedUser, Identity, RequirePermissionLayer};
pub use utils::api_error::ApiError;

use std::sync::Arc;

use tracing::info;

use crate::db::{create_diesel_pool, DieselDatabaseConfig};
use crate::services::LogNotifier;

/// Build application state backed by PostgreSQL
pub async fn initialize_app_state(config: Arc<AppConfig>) -> anyhow::Result<AppState> {
    info!("Initializing database pool...");
    let pool = create_diesel_pool(DieselDatabaseConfig::from(&config.database)).await?;

    let stores = Stores::from_backend(Arc::new(PgStore::new(pool)));
    AppState::new(config, stores, Arc::new(LogNotifier))
}
