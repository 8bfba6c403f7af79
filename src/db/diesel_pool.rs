// Diesel Database Pool Configuration
// Diesel-async + bb8 connection pooling

use bb8::Pool;
use diesel_async::pooled_connection::AsyncDieselConnectionManager;
use diesel_async::AsyncPgConnection;
use std::time::Duration;

use crate::app_config::DatabaseConfig;

pub type DieselPool = Pool<AsyncDieselConnectionManager<AsyncPgConnection>>;
pub type DieselConnection<'a> =
    bb8::PooledConnection<'a, AsyncDieselConnectionManager<AsyncPgConnection>>;

/// Database configuration
#[derive(Debug, Clone)]
pub struct DieselDatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connection_timeout: Duration,
    pub idle_timeout: Duration,
    pub test_on_checkout: bool,
}

impl From<&DatabaseConfig> for DieselDatabaseConfig {
    fn from(config: &DatabaseConfig) -> Self {
        Self {
            url: config.url.clone(),
            max_connections: config.max_connections,
            min_connections: config.min_connections,
            connection_timeout: Duration::from_secs(config.connect_timeout),
            idle_timeout: Duration::from_secs(config.idle_timeout),
            test_on_checkout: true,
        }
    }
}

/// Create Diesel connection pool
pub async fn create_diesel_pool(config: DieselDatabaseConfig) -> anyhow::Result<DieselPool> {
    let manager = AsyncDieselConnectionManager::<AsyncPgConnection>::new(config.url.clone());

    let pool = Pool::builder()
        .max_size(config.max_connections)
        .min_idle(Some(config.min_connections))
        .connection_timeout(config.connection_timeout)
        .idle_timeout(Some(config.idle_timeout))
        .test_on_check_out(config.test_on_checkout)
        .build(manager)
        .await?;

    // Test the connection
    check_diesel_health(&pool).await?;

    tracing::info!(
        url = %mask_connection_string(&config.url),
        max_connections = config.max_connections,
        "Diesel pool initialized"
    );

    Ok(pool)
}

/// Health check for database pool
pub async fn check_diesel_health(pool: &DieselPool) -> anyhow::Result<()> {
    let conn = pool.get().await?;

    // Simple health check - just getting a connection is enough
    drop(conn);

    Ok(())
}

/// Mask database connection string for logging
pub fn mask_connection_string(url: &str) -> String {
    if let Ok(parsed) = url::Url::parse(url) {
        let scheme = parsed.scheme();
        let host = parsed.host_str().unwrap_or("***");
        let path = parsed.path();

        let normalized_scheme = if scheme == "postgres" {
            "postgresql"
        } else {
            scheme
        };

        if parsed.username().is_empty() && parsed.password().is_none() {
            format!("{}://{}{}", normalized_scheme, host, path)
        } else {
            format!("{}://***:***@{}{}", normalized_scheme, host, path)
        }
    } else {
        "postgresql://***:***@***".to_string()
    }
}
