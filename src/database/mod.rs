//! Binding persistence.
//!
//! The registry and the replication sync only ever touch the [`BindingStore`]
//! contract; which backend sits behind it is a deployment choice. Two
//! backends ship here: an in-memory map for tests and single-node setups,
//! and a SQLite store for durable deployments.

pub mod memory;
pub mod sqlite;

use std::collections::HashMap;

use async_trait::async_trait;
use thiserror::Error;

use crate::registry::Binding;

pub use memory::MemoryBindingStore;
pub use sqlite::SqliteBindingStore;

/// A storage backend failed. A concurrent duplicate insert is NOT an error:
/// it is `insert_if_absent -> false`.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Backend(#[from] sqlx::Error),
}

/// Durable, keyed storage of accepted bindings.
///
/// `insert_if_absent` is the sole mutating operation and must be atomic with
/// respect to concurrent callers: exactly one of any set of racing inserts
/// for the same worker wins, and losers observe `false` with no state change.
#[async_trait]
pub trait BindingStore: Send + Sync {
    async fn get(&self, worker: &str) -> Result<Option<Binding>, StoreError>;

    /// Insert unless the worker is already bound. First writer wins.
    async fn insert_if_absent(&self, binding: &Binding) -> Result<bool, StoreError>;

    /// Bindings with `registration_time` strictly greater than `since`,
    /// ordered by `registration_time` ascending with `worker` as the
    /// tie-break so pagination is stable under equal timestamps.
    async fn scan_since(
        &self,
        since: i64,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<Binding>, StoreError>;

    /// Point-in-time worker-to-hotkey map for the rating join.
    async fn snapshot(&self) -> Result<HashMap<String, String>, StoreError>;
}
