//! The two narrow capability interfaces the acceptance pipeline consults,
//! injected into the registry so tests can fake them deterministically.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::RemoteError;
use crate::telemetry::TelemetrySource;

/// Answers "which workers does the pool currently know?", fresh within the
/// implementation's own bounded cache window.
#[async_trait]
pub trait PoolMembershipOracle: Send + Sync {
    async fn current_workers(&self) -> Result<HashSet<String>, RemoteError>;
}

/// Answers "is this hotkey currently registered on the distributed ledger?".
#[async_trait]
pub trait ChainRegistry: Send + Sync {
    async fn is_registered(&self, hotkey: &str) -> Result<bool, RemoteError>;
}

struct CachedWorkers {
    workers: HashSet<String>,
    captured_at: Instant,
}

/// Pool membership derived from telemetry: a worker belongs to the pool iff
/// the current window shows positive uptime for it.
///
/// The cache is an explicit `(value, captured_at)` pair with a staleness
/// check on read; there is no background refresh.
pub struct TelemetryWorkerProvider {
    telemetry: Arc<dyn TelemetrySource>,
    window: Duration,
    cache_ttl: Duration,
    cache: Mutex<Option<CachedWorkers>>,
}

impl TelemetryWorkerProvider {
    pub fn new(
        telemetry: Arc<dyn TelemetrySource>,
        window: Duration,
        cache_ttl: Duration,
    ) -> Self {
        Self {
            telemetry,
            window,
            cache_ttl,
            cache: Mutex::new(None),
        }
    }
}

#[async_trait]
impl PoolMembershipOracle for TelemetryWorkerProvider {
    async fn current_workers(&self) -> Result<HashSet<String>, RemoteError> {
        let mut cache = self.cache.lock().await;
        if let Some(cached) = cache.as_ref() {
            if cached.captured_at.elapsed() < self.cache_ttl {
                return Ok(cached.workers.clone());
            }
        }

        let snapshot = self.telemetry.fetch_window(self.window).await?;
        let workers: HashSet<String> = snapshot
            .into_iter()
            .filter(|(_, metrics)| metrics.uptime_seconds > 0.0)
            .map(|(key, _)| key.worker)
            .collect();
        debug!(workers = workers.len(), "refreshed pool worker set");

        *cache = Some(CachedWorkers {
            workers: workers.clone(),
            captured_at: Instant::now(),
        });
        Ok(workers)
    }
}

/// Allowlist-backed [`ChainRegistry`] for deployments without a chain
/// endpoint and for tests. An empty allowlist disables the gate entirely.
pub struct StaticChainRegistry {
    registered: HashSet<String>,
}

impl StaticChainRegistry {
    pub fn from_allowlist(registered: HashSet<String>) -> Self {
        Self { registered }
    }

    /// Gate disabled: every hotkey counts as registered.
    pub fn open() -> Self {
        Self {
            registered: HashSet::new(),
        }
    }
}

#[async_trait]
impl ChainRegistry for StaticChainRegistry {
    async fn is_registered(&self, hotkey: &str) -> Result<bool, RemoteError> {
        Ok(self.registered.is_empty() || self.registered.contains(hotkey))
    }
}
