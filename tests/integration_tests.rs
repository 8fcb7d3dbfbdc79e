//! Integration tests for the hashpool validator
//!
//! These tests verify end-to-end functionality across components: claim
//! acceptance into a store, replication between two independent validator
//! nodes, and the rating cycle over the replicated state.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;

use hashpool_validator::{
    claim_payload, Binding, BindingRegistry, BindingStore, Keypair, MemoryBindingStore, MinerKey,
    MinerMetrics, PeerRegistry, PoolMembershipOracle, RatingCalculator, RatingConfig,
    RegistryError, RejectReason, RemoteError, ReplicationSync, StaticChainRegistry,
    TelemetrySource, Validator,
};

// ============================================================================
// Test Helpers
// ============================================================================

/// Pool membership oracle backed by a fixed worker set.
struct FixedWorkers(HashSet<String>);

#[async_trait]
impl PoolMembershipOracle for FixedWorkers {
    async fn current_workers(&self) -> Result<HashSet<String>, RemoteError> {
        Ok(self.0.clone())
    }
}

/// Telemetry source backed by a fixed snapshot.
struct FixedTelemetry(HashMap<MinerKey, MinerMetrics>);

#[async_trait]
impl TelemetrySource for FixedTelemetry {
    async fn fetch_window(
        &self,
        _window: Duration,
    ) -> Result<HashMap<MinerKey, MinerMetrics>, RemoteError> {
        Ok(self.0.clone())
    }
}

/// A peer validator seen through its binding listing, backed directly by
/// that node's store — the in-process equivalent of the `/bindings`
/// endpoint.
struct StorePeer {
    label: String,
    store: Arc<dyn BindingStore>,
}

#[async_trait]
impl PeerRegistry for StorePeer {
    fn label(&self) -> &str {
        &self.label
    }

    async fn list_bindings(
        &self,
        since_timestamp: i64,
        page_size: u32,
        page_number: u32,
    ) -> Result<Vec<Binding>, RemoteError> {
        let offset = page_number.saturating_sub(1).saturating_mul(page_size);
        self.store
            .scan_since(since_timestamp, page_size, offset)
            .await
            .map_err(|e| RemoteError::BadResponse(e.to_string()))
    }
}

/// A validator node reduced to the pieces these tests exercise.
struct TestNode {
    store: Arc<MemoryBindingStore>,
    registry: BindingRegistry,
}

fn create_test_node(known_workers: &[&str]) -> TestNode {
    let store = Arc::new(MemoryBindingStore::new());
    let workers: HashSet<String> = known_workers.iter().map(|w| w.to_string()).collect();
    let registry = BindingRegistry::new(
        store.clone(),
        Arc::new(FixedWorkers(workers)),
        Arc::new(StaticChainRegistry::open()),
        300,
    );
    TestNode { store, registry }
}

fn signed_claim(keypair: &Keypair, worker: &str, registration_time: i64) -> Binding {
    let payload = claim_payload(&keypair.hotkey(), worker, registration_time);
    Binding {
        worker: worker.to_string(),
        hotkey: keypair.hotkey(),
        registration_time,
        signature: keypair.sign(&payload),
    }
}

fn full_uptime_metrics(worker: &str, valid_shares: u64) -> (MinerKey, MinerMetrics) {
    (
        MinerKey {
            wallet: "pool-wallet".to_string(),
            worker: worker.to_string(),
        },
        MinerMetrics {
            uptime_seconds: 3600.0,
            valid_shares,
            invalid_shares: 0,
            difficulty: 2.0,
            hashrate: Some(1000.0),
        },
    )
}

// ============================================================================
// Acceptance Flow
// ============================================================================

#[tokio::test]
async fn accepted_claim_is_stored_verbatim() {
    let node = create_test_node(&["rig-01"]);
    let keypair = Keypair::generate();
    let claim = signed_claim(&keypair, "rig-01", Utc::now().timestamp());

    node.registry.accept(&claim).await.unwrap();
    assert_eq!(node.store.get("rig-01").await.unwrap(), Some(claim.clone()));

    // A second claim for the same worker is rejected and changes nothing,
    // whatever its payload says.
    let usurper = signed_claim(&Keypair::generate(), "rig-01", Utc::now().timestamp());
    let err = node.registry.accept(&usurper).await.unwrap_err();
    assert!(matches!(
        err,
        RegistryError::Rejected(RejectReason::AlreadyRegistered)
    ));
    assert_eq!(node.store.get("rig-01").await.unwrap(), Some(claim));
}

// ============================================================================
// Two-Node Replication
// ============================================================================

#[tokio::test]
async fn bindings_replicate_between_independent_nodes() {
    let node_a = create_test_node(&["rig-01", "rig-02"]);
    let node_b = create_test_node(&[]);

    let now = Utc::now().timestamp();
    let owner_1 = Keypair::generate();
    let owner_2 = Keypair::generate();
    node_a
        .registry
        .accept(&signed_claim(&owner_1, "rig-01", now - 1))
        .await
        .unwrap();
    node_a
        .registry
        .accept(&signed_claim(&owner_2, "rig-02", now))
        .await
        .unwrap();

    // Node B never saw the submissions; it learns them from node A's
    // listing, re-checking only the signatures.
    let peer_a: Arc<dyn PeerRegistry> = Arc::new(StorePeer {
        label: "node-a".to_string(),
        store: node_a.store.clone(),
    });
    let sync = ReplicationSync::new(node_b.store.clone(), vec![peer_a], 100);

    let outcomes = sync.sync_all().await;
    let report = outcomes[0].1.as_ref().unwrap();
    assert_eq!(report.accepted, 2);
    assert_eq!(report.rejected, 0);
    assert_eq!(node_b.store.len().await, 2);
    assert_eq!(sync.watermark("node-a").await, now);

    // Replicated state matches the origin exactly.
    assert_eq!(
        node_b.store.get("rig-01").await.unwrap(),
        node_a.store.get("rig-01").await.unwrap()
    );

    // Re-running against the unchanged peer accepts nothing new.
    let outcomes = sync.sync_all().await;
    let report = outcomes[0].1.as_ref().unwrap();
    assert_eq!(report.accepted, 0);
    assert_eq!(node_b.store.len().await, 2);
}

#[tokio::test]
async fn replication_is_keyed_to_small_pages() {
    let node_a = create_test_node(&[]);
    let node_b = create_test_node(&[]);

    // Seed node A's store directly with many signed bindings.
    let base = 1_700_000_000;
    for i in 0..25 {
        let keypair = Keypair::generate();
        let binding = signed_claim(&keypair, &format!("rig-{i:03}"), base + i);
        assert!(node_a.store.insert_if_absent(&binding).await.unwrap());
    }

    let peer_a: Arc<dyn PeerRegistry> = Arc::new(StorePeer {
        label: "node-a".to_string(),
        store: node_a.store.clone(),
    });
    let sync = ReplicationSync::new(node_b.store.clone(), vec![peer_a.clone()], 10);

    let report = sync.sync_peer(peer_a.as_ref()).await.unwrap();
    assert_eq!(report.accepted, 25);
    assert_eq!(report.pages, 3);
    assert_eq!(sync.watermark("node-a").await, base + 24);
}

// ============================================================================
// Rating Over Replicated State
// ============================================================================

#[tokio::test]
async fn replicated_node_rates_the_network() {
    let node_a = create_test_node(&["rig-01", "rig-02"]);
    let node_b = create_test_node(&[]);

    let now = Utc::now().timestamp();
    let productive = Keypair::generate();
    let modest = Keypair::generate();
    node_a
        .registry
        .accept(&signed_claim(&productive, "rig-01", now - 1))
        .await
        .unwrap();
    node_a
        .registry
        .accept(&signed_claim(&modest, "rig-02", now))
        .await
        .unwrap();

    let peer_a: Arc<dyn PeerRegistry> = Arc::new(StorePeer {
        label: "node-a".to_string(),
        store: node_a.store.clone(),
    });
    ReplicationSync::new(node_b.store.clone(), vec![peer_a.clone()], 100)
        .sync_peer(peer_a.as_ref())
        .await
        .unwrap();

    // Node B rates from its own replicated store and its own telemetry view.
    let telemetry: HashMap<_, _> = [
        full_uptime_metrics("rig-01", 100),
        full_uptime_metrics("rig-02", 50),
    ]
    .into_iter()
    .collect();
    let validator = Validator::new(
        node_b.store.clone(),
        Arc::new(FixedTelemetry(telemetry)),
        RatingCalculator::new(RatingConfig::default()),
        Duration::from_secs(3600),
    );

    let ratings = validator.compute_ratings().await.unwrap();
    assert_eq!(ratings.len(), 2);
    assert_eq!(ratings[&productive.hotkey()], 1.0);
    assert_eq!(ratings[&modest.hotkey()], 0.5);
    for score in ratings.values() {
        assert!(*score >= 0.0 && *score <= 1.0);
    }
}
