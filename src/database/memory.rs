//! In-memory binding store.
//!
//! The write lock is the single-writer critical section that makes
//! `insert_if_absent` first-writer-wins under concurrent submissions.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::database::{BindingStore, StoreError};
use crate::registry::Binding;

#[derive(Default)]
pub struct MemoryBindingStore {
    bindings: RwLock<HashMap<String, Binding>>,
}

impl MemoryBindingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.bindings.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.bindings.read().await.is_empty()
    }
}

#[async_trait]
impl BindingStore for MemoryBindingStore {
    async fn get(&self, worker: &str) -> Result<Option<Binding>, StoreError> {
        Ok(self.bindings.read().await.get(worker).cloned())
    }

    async fn insert_if_absent(&self, binding: &Binding) -> Result<bool, StoreError> {
        let mut bindings = self.bindings.write().await;
        if bindings.contains_key(&binding.worker) {
            return Ok(false);
        }
        bindings.insert(binding.worker.clone(), binding.clone());
        Ok(true)
    }

    async fn scan_since(
        &self,
        since: i64,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<Binding>, StoreError> {
        let bindings = self.bindings.read().await;
        let mut matching: Vec<Binding> = bindings
            .values()
            .filter(|b| b.registration_time > since)
            .cloned()
            .collect();
        matching.sort_by(|a, b| {
            a.registration_time
                .cmp(&b.registration_time)
                .then_with(|| a.worker.cmp(&b.worker))
        });
        Ok(matching
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect())
    }

    async fn snapshot(&self) -> Result<HashMap<String, String>, StoreError> {
        Ok(self
            .bindings
            .read()
            .await
            .iter()
            .map(|(worker, binding)| (worker.clone(), binding.hotkey.clone()))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    fn binding(worker: &str, hotkey: &str, registration_time: i64) -> Binding {
        Binding {
            worker: worker.to_string(),
            hotkey: hotkey.to_string(),
            registration_time,
            signature: "00".to_string(),
        }
    }

    #[tokio::test]
    async fn insert_then_get_round_trips() {
        let store = MemoryBindingStore::new();
        let b = binding("rig-01", "hk1", 100);
        assert!(store.insert_if_absent(&b).await.unwrap());
        assert_eq!(store.get("rig-01").await.unwrap(), Some(b));
        assert_eq!(store.get("rig-99").await.unwrap(), None);
    }

    #[tokio::test]
    async fn duplicate_insert_leaves_first_binding_untouched() {
        let store = MemoryBindingStore::new();
        let first = binding("rig-01", "hk1", 100);
        let second = binding("rig-01", "hk2", 200);
        assert!(store.insert_if_absent(&first).await.unwrap());
        assert!(!store.insert_if_absent(&second).await.unwrap());
        assert_eq!(store.get("rig-01").await.unwrap(), Some(first));
    }

    #[tokio::test]
    async fn concurrent_inserts_have_exactly_one_winner() {
        let store = Arc::new(MemoryBindingStore::new());
        let mut handles = Vec::new();
        for i in 0..32 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                let b = binding("rig-01", &format!("hk{}", i), 100);
                store.insert_if_absent(&b).await.unwrap()
            }));
        }
        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn scan_since_is_ordered_and_paginated() {
        let store = MemoryBindingStore::new();
        store.insert_if_absent(&binding("c", "hk", 300)).await.unwrap();
        store.insert_if_absent(&binding("a", "hk", 100)).await.unwrap();
        store.insert_if_absent(&binding("b", "hk", 200)).await.unwrap();
        store.insert_if_absent(&binding("d", "hk", 200)).await.unwrap();

        let all = store.scan_since(0, 100, 0).await.unwrap();
        let workers: Vec<_> = all.iter().map(|b| b.worker.as_str()).collect();
        assert_eq!(workers, vec!["a", "b", "d", "c"]);

        // Strictly-greater filter.
        let after = store.scan_since(200, 100, 0).await.unwrap();
        assert_eq!(after.len(), 1);
        assert_eq!(after[0].worker, "c");

        // Limit and offset walk the same total order.
        let page = store.scan_since(0, 2, 1).await.unwrap();
        let workers: Vec<_> = page.iter().map(|b| b.worker.as_str()).collect();
        assert_eq!(workers, vec!["b", "d"]);
    }

    #[tokio::test]
    async fn snapshot_maps_worker_to_hotkey() {
        let store = MemoryBindingStore::new();
        store.insert_if_absent(&binding("a", "hk1", 100)).await.unwrap();
        store.insert_if_absent(&binding("b", "hk2", 200)).await.unwrap();

        let snapshot = store.snapshot().await.unwrap();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot["a"], "hk1");
        assert_eq!(snapshot["b"], "hk2");
    }
}
