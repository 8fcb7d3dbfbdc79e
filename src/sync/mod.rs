//! Replication of bindings across validators that do not share a store.
//!
//! Each peer is drained through a timestamp-watermarked page loop. Replicated
//! candidates are re-checked for signature validity only: the remote peer
//! already gated on its own pool-membership and chain state, which this node
//! cannot re-derive identically, but a forged or unsigned binding still dies
//! here no matter which peer relayed it.

pub mod peer;

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::join_all;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::database::{BindingStore, StoreError};
use crate::error::RemoteError;

pub use peer::{HttpPeerRegistry, PeerRegistry};

#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Counters for one sync pass against one peer.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SyncReport {
    pub pages: u32,
    pub fetched: usize,
    pub accepted: usize,
    /// Duplicates and signature failures.
    pub rejected: usize,
}

pub struct ReplicationSync {
    store: Arc<dyn BindingStore>,
    peers: Vec<Arc<dyn PeerRegistry>>,
    page_size: u32,
    /// Highest committed registration_time per peer label. Process-local;
    /// a cold restart re-scans from 0 and `insert_if_absent` absorbs the
    /// replay.
    watermarks: Mutex<HashMap<String, i64>>,
}

impl ReplicationSync {
    pub fn new(
        store: Arc<dyn BindingStore>,
        peers: Vec<Arc<dyn PeerRegistry>>,
        page_size: u32,
    ) -> Self {
        Self {
            store,
            peers,
            page_size,
            watermarks: Mutex::new(HashMap::new()),
        }
    }

    /// Sync every configured peer concurrently. A failing peer is logged and
    /// skipped; it never aborts the other peers' passes.
    pub async fn sync_all(&self) -> Vec<(String, Result<SyncReport, SyncError>)> {
        let passes = self.peers.iter().map(|peer| {
            let peer = peer.clone();
            async move {
                let label = peer.label().to_string();
                let outcome = self.sync_peer(peer.as_ref()).await;
                match &outcome {
                    Ok(report) => info!(
                        peer = %label,
                        pages = report.pages,
                        fetched = report.fetched,
                        accepted = report.accepted,
                        rejected = report.rejected,
                        "peer sync finished"
                    ),
                    Err(err) => warn!(peer = %label, error = %err, "peer sync failed"),
                }
                (label, outcome)
            }
        });
        join_all(passes).await
    }

    /// Run one full pass against one peer, advancing its watermark page by
    /// page. Idempotent: an immediate re-run fetches from the committed
    /// watermark and accepts nothing new.
    pub async fn sync_peer(&self, peer: &dyn PeerRegistry) -> Result<SyncReport, SyncError> {
        let label = peer.label().to_string();
        let mut watermark = self.watermark(&label).await;
        let mut report = SyncReport::default();

        loop {
            // The strict watermark advance IS the pagination: every fetch
            // re-narrows the window, so only its first page is ever needed.
            let page = peer.list_bindings(watermark, self.page_size, 1).await?;
            if page.is_empty() {
                break;
            }

            report.pages += 1;
            report.fetched += page.len();
            let mut max_seen = watermark;
            let mut accepted = 0usize;
            let mut rejected = 0usize;

            for candidate in &page {
                max_seen = max_seen.max(candidate.registration_time);
                if !candidate.verify_signature() {
                    warn!(
                        peer = %label,
                        worker = %candidate.worker,
                        "replicated binding failed signature re-check"
                    );
                    rejected += 1;
                    continue;
                }
                if self.store.insert_if_absent(candidate).await? {
                    accepted += 1;
                } else {
                    rejected += 1;
                }
            }

            info!(
                peer = %label,
                page_fetched = page.len(),
                accepted,
                rejected,
                "replication page merged"
            );
            report.accepted += accepted;
            report.rejected += rejected;

            let shortfall = (page.len() as u32) < self.page_size;
            watermark = max_seen;
            self.commit_watermark(&label, watermark).await;
            if shortfall {
                break;
            }
        }

        Ok(report)
    }

    pub async fn watermark(&self, label: &str) -> i64 {
        self.watermarks.lock().await.get(label).copied().unwrap_or(0)
    }

    async fn commit_watermark(&self, label: &str, watermark: i64) {
        self.watermarks
            .lock()
            .await
            .insert(label.to_string(), watermark);
    }
}
