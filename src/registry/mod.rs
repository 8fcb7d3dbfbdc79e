//! Binding registry: the single authority for local acceptance decisions.
//!
//! A claim passes a five-step pipeline that short-circuits on the first
//! failure, cheapest check first: freshness, pool membership, signature,
//! chain registration, and finally the one atomic store mutation.

pub mod binding;
pub mod oracles;

use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tracing::{debug, info};

use crate::database::{BindingStore, StoreError};
use crate::error::RemoteError;

pub use binding::{claim_payload, Binding, RejectReason};
pub use oracles::{ChainRegistry, PoolMembershipOracle, StaticChainRegistry, TelemetryWorkerProvider};

/// Outcome of an acceptance attempt that did not succeed.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// The claim itself is invalid. Terminal for this claim.
    #[error("claim rejected: {0}")]
    Rejected(#[from] RejectReason),

    /// An oracle could not be consulted. The claim is neither accepted nor
    /// rejected; the submitter may retry.
    #[error("lookup unavailable: {0}")]
    Remote(#[from] RemoteError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub struct BindingRegistry {
    store: Arc<dyn BindingStore>,
    pool: Arc<dyn PoolMembershipOracle>,
    chain: Arc<dyn ChainRegistry>,
    /// Maximum |now - registration_time| in seconds for a claim to count
    /// as fresh.
    freshness_tolerance: i64,
}

impl BindingRegistry {
    pub fn new(
        store: Arc<dyn BindingStore>,
        pool: Arc<dyn PoolMembershipOracle>,
        chain: Arc<dyn ChainRegistry>,
        freshness_tolerance: i64,
    ) -> Self {
        Self {
            store,
            pool,
            chain,
            freshness_tolerance,
        }
    }

    /// Validate and store a claim. On success exactly one new binding exists
    /// in the store; on any failure no state was mutated.
    pub async fn accept(&self, claim: &Binding) -> Result<(), RegistryError> {
        self.accept_at(claim, Utc::now().timestamp()).await
    }

    async fn accept_at(&self, claim: &Binding, now: i64) -> Result<(), RegistryError> {
        if (now - claim.registration_time).abs() > self.freshness_tolerance {
            debug!(worker = %claim.worker, registration_time = claim.registration_time, "stale claim");
            return Err(RejectReason::StaleTimestamp.into());
        }

        let workers = self.pool.current_workers().await?;
        if !workers.contains(&claim.worker) {
            return Err(RejectReason::WorkerUnknownToPool.into());
        }

        if !claim.verify_signature() {
            return Err(RejectReason::BadSignature.into());
        }

        if !self.chain.is_registered(&claim.hotkey).await? {
            return Err(RejectReason::HotkeyNotRegistered.into());
        }

        // The single atomic mutation; a concurrent duplicate loses here and
        // is indistinguishable from one that arrived earlier.
        if !self.store.insert_if_absent(claim).await? {
            return Err(RejectReason::AlreadyRegistered.into());
        }

        info!(worker = %claim.worker, hotkey = %claim.hotkey, "binding accepted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use async_trait::async_trait;

    use super::*;
    use crate::crypto::Keypair;
    use crate::database::MemoryBindingStore;

    struct FixedWorkers(HashSet<String>);

    #[async_trait]
    impl PoolMembershipOracle for FixedWorkers {
        async fn current_workers(&self) -> Result<HashSet<String>, RemoteError> {
            Ok(self.0.clone())
        }
    }

    struct UnreachablePool;

    #[async_trait]
    impl PoolMembershipOracle for UnreachablePool {
        async fn current_workers(&self) -> Result<HashSet<String>, RemoteError> {
            Err(RemoteError::BadResponse("connection refused".to_string()))
        }
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

    fn registry_with(
        store: Arc<MemoryBindingStore>,
        workers: &[&str],
        chain: StaticChainRegistry,
    ) -> BindingRegistry {
        let workers: HashSet<String> = workers.iter().map(|w| w.to_string()).collect();
        BindingRegistry::new(store, Arc::new(FixedWorkers(workers)), Arc::new(chain), 300)
    }

    #[tokio::test]
    async fn valid_claim_is_accepted_and_readable() {
        let store = Arc::new(MemoryBindingStore::new());
        let registry = registry_with(store.clone(), &["rig-01"], StaticChainRegistry::open());
        let keypair = Keypair::generate();
        let claim = signed_claim(&keypair, "rig-01", Utc::now().timestamp());

        registry.accept(&claim).await.unwrap();
        assert_eq!(store.get("rig-01").await.unwrap(), Some(claim));
    }

    #[tokio::test]
    async fn second_claim_for_same_worker_is_already_registered() {
        let store = Arc::new(MemoryBindingStore::new());
        let registry = registry_with(store.clone(), &["rig-01"], StaticChainRegistry::open());
        let first_owner = Keypair::generate();
        let second_owner = Keypair::generate();
        let now = Utc::now().timestamp();

        let first = signed_claim(&first_owner, "rig-01", now);
        registry.accept(&first).await.unwrap();

        let second = signed_claim(&second_owner, "rig-01", now);
        let err = registry.accept(&second).await.unwrap_err();
        assert!(matches!(
            err,
            RegistryError::Rejected(RejectReason::AlreadyRegistered)
        ));

        // The stored binding is untouched.
        assert_eq!(store.get("rig-01").await.unwrap(), Some(first));
    }

    #[tokio::test]
    async fn stale_timestamp_is_rejected_before_anything_else() {
        let store = Arc::new(MemoryBindingStore::new());
        // The pool oracle is unreachable; a stale claim must still be
        // rejected as stale, proving the freshness check runs first.
        let registry = BindingRegistry::new(
            store,
            Arc::new(UnreachablePool),
            Arc::new(StaticChainRegistry::open()),
            300,
        );
        let keypair = Keypair::generate();
        let claim = signed_claim(&keypair, "rig-01", Utc::now().timestamp() - 10_000);

        let err = registry.accept(&claim).await.unwrap_err();
        assert!(matches!(
            err,
            RegistryError::Rejected(RejectReason::StaleTimestamp)
        ));
    }

    #[tokio::test]
    async fn future_dated_claims_are_stale_too() {
        let store = Arc::new(MemoryBindingStore::new());
        let registry = registry_with(store, &["rig-01"], StaticChainRegistry::open());
        let keypair = Keypair::generate();
        let claim = signed_claim(&keypair, "rig-01", Utc::now().timestamp() + 10_000);

        let err = registry.accept(&claim).await.unwrap_err();
        assert!(matches!(
            err,
            RegistryError::Rejected(RejectReason::StaleTimestamp)
        ));
    }

    #[tokio::test]
    async fn unknown_worker_is_rejected() {
        let store = Arc::new(MemoryBindingStore::new());
        let registry = registry_with(store, &["some-other-rig"], StaticChainRegistry::open());
        let keypair = Keypair::generate();
        let claim = signed_claim(&keypair, "rig-01", Utc::now().timestamp());

        let err = registry.accept(&claim).await.unwrap_err();
        assert!(matches!(
            err,
            RegistryError::Rejected(RejectReason::WorkerUnknownToPool)
        ));
    }

    #[tokio::test]
    async fn forged_signature_is_rejected_without_mutation() {
        let store = Arc::new(MemoryBindingStore::new());
        let registry = registry_with(store.clone(), &["rig-01"], StaticChainRegistry::open());
        let keypair = Keypair::generate();
        let mut claim = signed_claim(&keypair, "rig-01", Utc::now().timestamp());
        claim.signature = Keypair::generate().sign(&claim.signed_payload());

        let err = registry.accept(&claim).await.unwrap_err();
        assert!(matches!(
            err,
            RegistryError::Rejected(RejectReason::BadSignature)
        ));
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn unregistered_hotkey_is_rejected() {
        let store = Arc::new(MemoryBindingStore::new());
        let registry = registry_with(
            store,
            &["rig-01"],
            StaticChainRegistry::from_allowlist(["someone-else".to_string()].into_iter().collect()),
        );
        let keypair = Keypair::generate();
        let claim = signed_claim(&keypair, "rig-01", Utc::now().timestamp());

        let err = registry.accept(&claim).await.unwrap_err();
        assert!(matches!(
            err,
            RegistryError::Rejected(RejectReason::HotkeyNotRegistered)
        ));
    }

    #[tokio::test]
    async fn oracle_outage_is_not_a_rejection() {
        let store = Arc::new(MemoryBindingStore::new());
        let registry = BindingRegistry::new(
            store.clone(),
            Arc::new(UnreachablePool),
            Arc::new(StaticChainRegistry::open()),
            300,
        );
        let keypair = Keypair::generate();
        let claim = signed_claim(&keypair, "rig-01", Utc::now().timestamp());

        let err = registry.accept(&claim).await.unwrap_err();
        assert!(matches!(err, RegistryError::Remote(_)));
        assert!(store.is_empty().await);
    }
}
