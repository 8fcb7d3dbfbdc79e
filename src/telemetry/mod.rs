//! Telemetry boundary: the typed snapshot the rating cycle consumes.
//!
//! The backend behind [`TelemetrySource`] is a metrics time-series store
//! queried by label-matched aggregation; the core never sees anything but
//! the typed per-worker snapshot. Malformed samples (negative counters,
//! non-finite numbers) are rejected here, before the rating engine.

pub mod prometheus;

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::RemoteError;

pub use prometheus::PrometheusClient;

/// Composite telemetry key: the pool payout wallet plus the worker id.
/// Only the telemetry boundary speaks this key; the registry keys on
/// `worker` alone.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MinerKey {
    pub wallet: String,
    pub worker: String,
}

/// Rolling-window counters for one worker. An immutable snapshot value,
/// regenerated each rating cycle and never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MinerMetrics {
    pub uptime_seconds: f64,
    pub valid_shares: u64,
    pub invalid_shares: u64,
    pub difficulty: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hashrate: Option<f64>,
}

impl MinerMetrics {
    /// The boundary check of the error-handling design: anything false here
    /// never reaches the rating engine.
    pub fn is_well_formed(&self) -> bool {
        self.uptime_seconds.is_finite()
            && self.uptime_seconds >= 0.0
            && self.difficulty.is_finite()
            && self.difficulty >= 0.0
            && self.hashrate.map_or(true, |h| h.is_finite() && h >= 0.0)
    }
}

/// A telemetry backend able to produce the per-worker snapshot for a
/// rolling window ending now.
#[async_trait]
pub trait TelemetrySource: Send + Sync {
    async fn fetch_window(
        &self,
        window: Duration,
    ) -> Result<HashMap<MinerKey, MinerMetrics>, RemoteError>;
}
