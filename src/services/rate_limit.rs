// Per-client rate limiting
// One governor token bucket per client IP, with a background sweep that
// forgets clients that have gone quiet

use std::collections::HashMap;
use std::num::NonZeroU32;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use governor::{DefaultDirectRateLimiter, Quota, RateLimiter as Governor};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

// =============================================================================
// ERROR TYPES
// =============================================================================

#[derive(Debug, Error)]
pub enum RateLimitError {
    #[error("Configuration error: {0}")]
    Config(String),
}

// =============================================================================
// CONFIGURATION
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RateLimitConfig {
    /// When false the limiter admits everything and no sweep task runs
    pub enabled: bool,

    /// Sustained requests per second per client
    pub rps: f64,

    /// Bucket capacity, i.e. how many requests a fresh client may fire at once
    pub burst: u32,

    /// Derive the client key from X-Forwarded-For / X-Real-IP
    pub trust_proxy_headers: bool,

    pub sweep_interval: Duration,

    /// Clients idle for longer than this are evicted by the sweep
    pub stale_after: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            rps: 2.0,
            burst: 4,
            trust_proxy_headers: false,
            sweep_interval: Duration::from_secs(60),
            stale_after: Duration::from_secs(180),
        }
    }
}

impl RateLimitConfig {
    fn quota(&self) -> Result<Quota, RateLimitError> {
        if !(self.rps > 0.0 && self.rps.is_finite()) {
            return Err(RateLimitError::Config(format!(
                "rps must be positive, got {}",
                self.rps
            )));
        }
        let burst = NonZeroU32::new(self.burst)
            .ok_or_else(|| RateLimitError::Config("burst must be at least 1".to_string()))?;
        let quota = Quota::with_period(Duration::from_secs_f64(1.0 / self.rps)).ok_or_else(
            || RateLimitError::Config(format!("rps {} is too high to schedule", self.rps)),
        )?;

        Ok(quota.allow_burst(burst))
    }
}

// =============================================================================
// LIMITER
// =============================================================================

struct Client {
    limiter: DefaultDirectRateLimiter,
    last_seen: Instant,
}

type ClientMap = Arc<Mutex<HashMap<String, Client>>>;

/// Per-client token buckets. Owns the sweep task and stops it on
/// `shutdown` or drop.
pub struct RateLimiter {
    config: RateLimitConfig,
    quota: Quota,
    clients: ClientMap,
    sweeper: Mutex<Option<JoinHandle<()>>>,
    missing_peer_seen: AtomicBool,
}

impl RateLimiter {
    /// Build a limiter. When enabled and a tokio runtime is available the
    /// sweep task is spawned immediately.
    pub fn new(config: RateLimitConfig) -> Result<Self, RateLimitError> {
        let quota = config.quota()?;
        if config.sweep_interval.is_zero() {
            return Err(RateLimitError::Config(
                "sweep interval must be non-zero".to_string(),
            ));
        }

        let clients: ClientMap = Arc::new(Mutex::new(HashMap::new()));

        let sweeper = if config.enabled {
            match tokio::runtime::Handle::try_current() {
                Ok(handle) => Some(handle.spawn(sweep_loop(
                    Arc::clone(&clients),
                    config.sweep_interval,
                    config.stale_after,
                ))),
                Err(_) => {
                    warn!("No tokio runtime available, idle rate limit clients will not be swept");
                    None
                },
            }
        } else {
            None
        };

        info!(
            enabled = config.enabled,
            rps = config.rps,
            burst = config.burst,
            "Rate limiter initialized"
        );

        Ok(Self {
            config,
            quota,
            clients,
            sweeper: Mutex::new(sweeper),
            missing_peer_seen: AtomicBool::new(false),
        })
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Take one cell from `client`'s bucket. A client seen for the first time
    /// starts with a full bucket.
    pub fn check(&self, client: &str) -> bool {
        if !self.config.enabled {
            return true;
        }

        let now = Instant::now();
        let mut clients = lock(&self.clients);
        let entry = clients
            .entry(client.to_string())
            .or_insert_with(|| Client {
                limiter: Governor::direct(self.quota),
                last_seen: now,
            });
        entry.last_seen = now;
        entry.limiter.check().is_ok()
    }

    /// Record a request that arrived without a socket peer. Returns true only
    /// the first time, so the caller can warn once.
    pub fn note_missing_peer(&self) -> bool {
        !self.missing_peer_seen.swap(true, Ordering::Relaxed)
    }

    /// Evict clients idle longer than the staleness window, returning how many went
    pub fn sweep(&self) -> usize {
        sweep_stale(&self.clients, self.config.stale_after)
    }

    pub fn tracked_clients(&self) -> usize {
        lock(&self.clients).len()
    }

    pub fn is_sweeping(&self) -> bool {
        lock(&self.sweeper)
            .as_ref()
            .map(|handle| !handle.is_finished())
            .unwrap_or(false)
    }

    /// Stop the sweep task. Safe to call more than once.
    pub fn shutdown(&self) {
        if let Some(handle) = lock(&self.sweeper).take() {
            handle.abort();
            debug!("Rate limiter sweep stopped");
        }
    }
}

impl Drop for RateLimiter {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("config", &self.config)
            .field("tracked_clients", &self.tracked_clients())
            .finish()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

fn sweep_stale(clients: &Mutex<HashMap<String, Client>>, stale_after: Duration) -> usize {
    let mut clients = lock(clients);
    let before = clients.len();
    clients.retain(|_, client| client.last_seen.elapsed() <= stale_after);
    before - clients.len()
}

async fn sweep_loop(clients: ClientMap, interval: Duration, stale_after: Duration) {
    let mut ticker = tokio::time::interval(interval);
    // The first tick completes immediately
    ticker.tick().await;

    loop {
        ticker.tick().await;
        let evicted = sweep_stale(&clients, stale_after);
        if evicted > 0 {
            debug!(evicted, "Evicted idle rate limit clients");
        }
    }
}
