use std::collections::HashSet;
use std::env;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::rating::RatingConfig;

/// Process configuration, loaded once at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidatorConfig {
    /// Server configuration
    pub server: ServerConfig,
    /// Binding store configuration
    pub database: DatabaseConfig,
    /// Telemetry backend configuration
    pub telemetry: TelemetryConfig,
    /// Acceptance pipeline configuration
    pub registry: RegistryConfig,
    /// Peer replication configuration
    pub sync: SyncConfig,
    /// Scoring parameters
    pub rating: RatingSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,
    /// Port to bind to
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// `sqlite:` URL or bare path; the literal `memory` selects the
    /// in-memory store.
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Prometheus-compatible HTTP API base URL
    pub endpoint: String,
    /// Metric-name prefix of the pool exporter
    pub namespace: String,
    /// Rolling window length in seconds (shared with the rating engine)
    pub window_secs: u64,
    /// Per-call timeout in seconds
    pub timeout_secs: u64,
    /// When set, telemetry for other payout wallets is ignored
    pub pool_wallet: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Maximum |now - registration_time| for a claim to count as fresh
    pub freshness_tolerance_secs: u64,
    /// TTL of the cached pool worker set
    pub membership_cache_ttl_secs: u64,
    /// Hotkeys accepted by the static chain registry; empty disables the
    /// chain gate
    pub registered_hotkeys: HashSet<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Peer validator base URLs
    pub peers: Vec<String>,
    /// Seconds between replication passes
    pub interval_secs: u64,
    /// Page size for the watermarked fetch
    pub page_size: u32,
    /// Per-call timeout in seconds
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RatingSettings {
    pub uptime_alpha: f64,
    pub max_difficulty: f64,
    pub shares_per_minute: u64,
    pub ndigits: u32,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8000,
            },
            database: DatabaseConfig {
                url: "sqlite:data/bindings.db".to_string(),
            },
            telemetry: TelemetryConfig {
                endpoint: "http://localhost:9090".to_string(),
                namespace: "pool".to_string(),
                window_secs: 3600,
                timeout_secs: 10,
                pool_wallet: None,
            },
            registry: RegistryConfig {
                freshness_tolerance_secs: 300,
                membership_cache_ttl_secs: 15,
                registered_hotkeys: HashSet::new(),
            },
            sync: SyncConfig {
                peers: Vec::new(),
                interval_secs: 600,
                page_size: 100,
                timeout_secs: 10,
            },
            rating: RatingSettings {
                uptime_alpha: 2.0,
                max_difficulty: 16384.0,
                shares_per_minute: 20,
                ndigits: 8,
            },
        }
    }
}

impl ValidatorConfig {
    /// Load configuration from `HASHPOOL_*` environment variables on top of
    /// the defaults, then validate.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(host) = env::var("HASHPOOL_HOST") {
            config.server.host = host;
        }
        if let Ok(port) = env::var("HASHPOOL_PORT") {
            config.server.port = port.parse().context("Invalid HASHPOOL_PORT value")?;
        }

        if let Ok(url) = env::var("HASHPOOL_DATABASE_URL") {
            config.database.url = url;
        }

        if let Ok(endpoint) = env::var("HASHPOOL_PROMETHEUS_ENDPOINT") {
            config.telemetry.endpoint = endpoint;
        }
        if let Ok(namespace) = env::var("HASHPOOL_METRIC_NAMESPACE") {
            config.telemetry.namespace = namespace;
        }
        if let Ok(window) = env::var("HASHPOOL_WINDOW_SECS") {
            config.telemetry.window_secs =
                window.parse().context("Invalid HASHPOOL_WINDOW_SECS value")?;
        }
        if let Ok(timeout) = env::var("HASHPOOL_TELEMETRY_TIMEOUT_SECS") {
            config.telemetry.timeout_secs = timeout
                .parse()
                .context("Invalid HASHPOOL_TELEMETRY_TIMEOUT_SECS value")?;
        }
        if let Ok(wallet) = env::var("HASHPOOL_POOL_WALLET") {
            config.telemetry.pool_wallet = Some(wallet);
        }

        if let Ok(tolerance) = env::var("HASHPOOL_FRESHNESS_TOLERANCE_SECS") {
            config.registry.freshness_tolerance_secs = tolerance
                .parse()
                .context("Invalid HASHPOOL_FRESHNESS_TOLERANCE_SECS value")?;
        }
        if let Ok(ttl) = env::var("HASHPOOL_MEMBERSHIP_CACHE_TTL_SECS") {
            config.registry.membership_cache_ttl_secs = ttl
                .parse()
                .context("Invalid HASHPOOL_MEMBERSHIP_CACHE_TTL_SECS value")?;
        }
        if let Ok(hotkeys) = env::var("HASHPOOL_REGISTERED_HOTKEYS") {
            config.registry.registered_hotkeys = split_list(&hotkeys).into_iter().collect();
        }

        if let Ok(peers) = env::var("HASHPOOL_SYNC_PEERS") {
            config.sync.peers = split_list(&peers);
        }
        if let Ok(interval) = env::var("HASHPOOL_SYNC_INTERVAL_SECS") {
            config.sync.interval_secs = interval
                .parse()
                .context("Invalid HASHPOOL_SYNC_INTERVAL_SECS value")?;
        }
        if let Ok(page_size) = env::var("HASHPOOL_SYNC_PAGE_SIZE") {
            config.sync.page_size = page_size
                .parse()
                .context("Invalid HASHPOOL_SYNC_PAGE_SIZE value")?;
        }
        if let Ok(timeout) = env::var("HASHPOOL_SYNC_TIMEOUT_SECS") {
            config.sync.timeout_secs = timeout
                .parse()
                .context("Invalid HASHPOOL_SYNC_TIMEOUT_SECS value")?;
        }

        if let Ok(alpha) = env::var("HASHPOOL_UPTIME_ALPHA") {
            config.rating.uptime_alpha =
                alpha.parse().context("Invalid HASHPOOL_UPTIME_ALPHA value")?;
        }
        if let Ok(max_difficulty) = env::var("HASHPOOL_MAX_DIFFICULTY") {
            config.rating.max_difficulty = max_difficulty
                .parse()
                .context("Invalid HASHPOOL_MAX_DIFFICULTY value")?;
        }
        if let Ok(rate) = env::var("HASHPOOL_SHARES_PER_MINUTE") {
            config.rating.shares_per_minute = rate
                .parse()
                .context("Invalid HASHPOOL_SHARES_PER_MINUTE value")?;
        }
        if let Ok(ndigits) = env::var("HASHPOOL_NDIGITS") {
            config.rating.ndigits = ndigits.parse().context("Invalid HASHPOOL_NDIGITS value")?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate constraints the rest of the system assumes.
    pub fn validate(&self) -> Result<()> {
        if self.server.host.is_empty() {
            anyhow::bail!("Server host cannot be empty");
        }
        if self.server.port == 0 {
            anyhow::bail!("Server port must be non-zero");
        }
        if self.database.url.is_empty() {
            anyhow::bail!("Database URL cannot be empty");
        }
        if self.telemetry.endpoint.is_empty() {
            anyhow::bail!("Telemetry endpoint cannot be empty");
        }
        if self.telemetry.window_secs == 0 {
            anyhow::bail!("Telemetry window must be positive");
        }
        if self.rating.uptime_alpha < 0.0 {
            anyhow::bail!("Uptime alpha must be non-negative");
        }
        if self.rating.max_difficulty <= 0.0 {
            anyhow::bail!("Max difficulty must be positive");
        }
        if self.rating.shares_per_minute == 0 {
            anyhow::bail!("Shares per minute must be positive");
        }
        if self.sync.page_size == 0 {
            anyhow::bail!("Sync page size must be positive");
        }
        if self.registry.freshness_tolerance_secs == 0 {
            anyhow::bail!("Freshness tolerance must be positive");
        }
        Ok(())
    }

    /// The scoring parameters, with the window shared from telemetry.
    pub fn rating_config(&self) -> RatingConfig {
        RatingConfig {
            uptime_alpha: self.rating.uptime_alpha,
            window_seconds: self.telemetry.window_secs as f64,
            max_difficulty: self.rating.max_difficulty,
            shares_per_minute: self.rating.shares_per_minute,
            ndigits: self.rating.ndigits,
        }
    }

    pub fn telemetry_window(&self) -> Duration {
        Duration::from_secs(self.telemetry.window_secs)
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
