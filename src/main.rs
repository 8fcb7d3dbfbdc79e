use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use hashpool_validator::api::{create_router, AppState};
use hashpool_validator::config::ValidatorConfig;
use hashpool_validator::database::{BindingStore, MemoryBindingStore, SqliteBindingStore};
use hashpool_validator::rating::RatingCalculator;
use hashpool_validator::registry::{BindingRegistry, StaticChainRegistry, TelemetryWorkerProvider};
use hashpool_validator::sync::{HttpPeerRegistry, PeerRegistry, ReplicationSync};
use hashpool_validator::telemetry::PrometheusClient;
use hashpool_validator::validator::Validator;

#[tokio::main]
async fn main() -> Result<()> {
    let config = ValidatorConfig::from_env().map_err(|e| {
        eprintln!("Configuration error: {}", e);
        e
    })?;

    init_logging();

    info!("Starting hashpool validator");
    info!(
        endpoint = %config.telemetry.endpoint,
        window_secs = config.telemetry.window_secs,
        peers = config.sync.peers.len(),
        "validator configuration loaded"
    );

    // Binding store
    let store: Arc<dyn BindingStore> = if config.database.url == "memory" {
        warn!("using the in-memory binding store; bindings will not survive a restart");
        Arc::new(MemoryBindingStore::new())
    } else {
        Arc::new(
            SqliteBindingStore::open(&config.database.url)
                .await
                .context("Failed to open the binding store")?,
        )
    };

    // Telemetry backend and the oracles derived from it
    let telemetry = Arc::new(
        PrometheusClient::new(
            &config.telemetry.endpoint,
            &config.telemetry.namespace,
            Duration::from_secs(config.telemetry.timeout_secs),
            config.telemetry.pool_wallet.clone(),
        )
        .context("Failed to build the telemetry client")?,
    );
    let pool_membership = Arc::new(TelemetryWorkerProvider::new(
        telemetry.clone(),
        config.telemetry_window(),
        Duration::from_secs(config.registry.membership_cache_ttl_secs),
    ));
    if config.registry.registered_hotkeys.is_empty() {
        warn!("no registered hotkeys configured; the chain gate is disabled");
    }
    let chain = Arc::new(StaticChainRegistry::from_allowlist(
        config.registry.registered_hotkeys.clone(),
    ));

    let registry = Arc::new(BindingRegistry::new(
        store.clone(),
        pool_membership,
        chain,
        config.registry.freshness_tolerance_secs as i64,
    ));

    let validator = Arc::new(Validator::new(
        store.clone(),
        telemetry,
        RatingCalculator::new(config.rating_config()),
        config.telemetry_window(),
    ));

    // Peer replication as a periodic background task
    let peers: Vec<Arc<dyn PeerRegistry>> = config
        .sync
        .peers
        .iter()
        .map(|url| -> Result<Arc<dyn PeerRegistry>> {
            Ok(Arc::new(
                HttpPeerRegistry::new(url, Duration::from_secs(config.sync.timeout_secs))
                    .with_context(|| format!("Failed to build peer client for {url}"))?,
            ))
        })
        .collect::<Result<_>>()?;

    if !peers.is_empty() {
        let sync = Arc::new(ReplicationSync::new(
            store.clone(),
            peers,
            config.sync.page_size,
        ));
        let interval = Duration::from_secs(config.sync.interval_secs);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                sync.sync_all().await;
            }
        });
        info!(
            interval_secs = config.sync.interval_secs,
            "peer replication task started"
        );
    }

    let app = create_router(AppState {
        registry,
        validator,
        store,
    })
    .layer(TraceLayer::new_for_http());

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!(addr = %addr, "validator API listening");

    axum::serve(listener, app)
        .await
        .context("Server error")?;

    Ok(())
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,hashpool_validator=debug"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
