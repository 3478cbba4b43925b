//! In-memory index of user-assigned address labels.
//!
//! Labels live in a platform store (the address book); this index caches them
//! per address and is populated lazily, one address batch at a time. All
//! label mutations go through the index so the cache can be updated
//! synchronously: a `labels_for` call issued right after a mutation reflects
//! it, with no stale flash while a background refetch runs.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::debug;

/// A user-assigned label for an address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Label {
    /// Display name.
    pub name: String,
    /// Display color, as the UI encodes it.
    pub color: String,
    /// Grouping category (e.g. "exchange", "donation").
    pub category: String,
}

/// Contract for the persistent label store.
#[async_trait::async_trait]
pub trait LabelStore: Send + Sync {
    /// Fetch labels for a batch of addresses. Addresses without labels may be
    /// omitted from the result.
    async fn fetch(&self, addresses: &[String]) -> HashMap<String, Vec<Label>>;

    /// Persist a label for an address, replacing any label of the same name.
    async fn put(&self, address: &str, label: Label) -> bool;

    /// Remove a label by name from an address.
    async fn remove(&self, address: &str, label_name: &str) -> bool;
}

/// Lazily populated map from address to labels.
pub struct AddressLabelIndex {
    store: Arc<dyn LabelStore>,
    /// Cached entries. An address mapped to an empty vec has been looked up
    /// and has no labels; an absent address has not been loaded yet.
    cache: Mutex<HashMap<String, Vec<Label>>>,
}

impl AddressLabelIndex {
    pub fn new(store: Arc<dyn LabelStore>) -> Self {
        Self {
            store,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Labels for one address; empty when none are known.
    pub fn labels_for(&self, address: &str) -> Vec<Label> {
        self.cache
            .lock()
            .unwrap()
            .get(address)
            .cloned()
            .unwrap_or_default()
    }

    /// Load labels for any of the given addresses not yet cached.
    ///
    /// Already-cached addresses are served from the cache until invalidated;
    /// repeating an identical request hits the store only for what is still
    /// missing.
    pub async fn load_for(&self, addresses: &[String]) {
        let missing: Vec<String> = {
            let cache = self.cache.lock().unwrap();
            addresses
                .iter()
                .filter(|address| !cache.contains_key(*address))
                .cloned()
                .collect()
        };
        if missing.is_empty() {
            return;
        }

        debug!("loading labels for {} addresses", missing.len());
        let mut fetched = self.store.fetch(&missing).await;

        let mut cache = self.cache.lock().unwrap();
        for address in missing {
            let labels = fetched.remove(&address).unwrap_or_default();
            cache.insert(address, labels);
        }
    }

    /// Add or replace a label. The cache entry is updated synchronously on
    /// success so the next read reflects the change.
    pub async fn set_label(&self, address: &str, label: Label) -> bool {
        if !self.store.put(address, label.clone()).await {
            return false;
        }

        let mut cache = self.cache.lock().unwrap();
        let labels = cache.entry(address.to_string()).or_default();
        match labels.iter_mut().find(|l| l.name == label.name) {
            Some(existing) => *existing = label,
            None => labels.push(label),
        }
        true
    }

    /// Remove a label by name, updating the cache synchronously on success.
    pub async fn remove_label(&self, address: &str, label_name: &str) -> bool {
        if !self.store.remove(address, label_name).await {
            return false;
        }

        if let Some(labels) = self.cache.lock().unwrap().get_mut(address) {
            labels.retain(|l| l.name != label_name);
        }
        true
    }

    /// Drop the cached entry for one address; the next load refetches it.
    pub fn invalidate(&self, address: &str) {
        self.cache.lock().unwrap().remove(address);
    }

    /// Drop every cached entry.
    pub fn invalidate_all(&self) {
        self.cache.lock().unwrap().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::MemoryLabelStore;
    use std::sync::atomic::Ordering;

    fn label(name: &str) -> Label {
        Label {
            name: name.to_string(),
            color: "#ff8800".to_string(),
            category: "contact".to_string(),
        }
    }

    #[tokio::test]
    async fn repeated_loads_only_fetch_missing_addresses() {
        let store = Arc::new(MemoryLabelStore::default());
        store.seed("t1abc", vec![label("alice")]).await;
        let index = AddressLabelIndex::new(store.clone());

        let batch = vec!["t1abc".to_string(), "t1def".to_string()];
        index.load_for(&batch).await;
        assert_eq!(store.fetch_calls.load(Ordering::SeqCst), 1);
        assert_eq!(index.labels_for("t1abc"), vec![label("alice")]);
        assert!(index.labels_for("t1def").is_empty());

        // Identical request: everything cached, no store hit.
        index.load_for(&batch).await;
        assert_eq!(store.fetch_calls.load(Ordering::SeqCst), 1);

        // A new address in the batch fetches only that address.
        let wider = vec!["t1abc".to_string(), "t1ghi".to_string()];
        index.load_for(&wider).await;
        assert_eq!(store.fetch_calls.load(Ordering::SeqCst), 2);
        assert_eq!(store.last_fetch(), vec!["t1ghi".to_string()]);
    }

    #[tokio::test]
    async fn mutations_are_read_your_writes() {
        let store = Arc::new(MemoryLabelStore::default());
        let index = AddressLabelIndex::new(store.clone());

        assert!(index.set_label("zs1xyz", label("cold storage")).await);
        assert_eq!(index.labels_for("zs1xyz"), vec![label("cold storage")]);

        // Replacement by name, not duplication.
        let mut renamed = label("cold storage");
        renamed.color = "#00ff00".to_string();
        assert!(index.set_label("zs1xyz", renamed.clone()).await);
        assert_eq!(index.labels_for("zs1xyz"), vec![renamed]);

        assert!(index.remove_label("zs1xyz", "cold storage").await);
        assert!(index.labels_for("zs1xyz").is_empty());
    }

    #[tokio::test]
    async fn rejected_store_write_leaves_cache_untouched() {
        let store = Arc::new(MemoryLabelStore::default());
        store.seed("t1abc", vec![label("alice")]).await;
        let index = AddressLabelIndex::new(store.clone());
        index.load_for(&["t1abc".to_string()]).await;

        store.reject_writes(true);
        assert!(!index.set_label("t1abc", label("mallory")).await);
        assert_eq!(index.labels_for("t1abc"), vec![label("alice")]);
    }

    #[tokio::test]
    async fn invalidate_forces_a_refetch() {
        let store = Arc::new(MemoryLabelStore::default());
        store.seed("t1abc", vec![label("alice")]).await;
        let index = AddressLabelIndex::new(store.clone());

        index.load_for(&["t1abc".to_string()]).await;
        index.invalidate("t1abc");
        index.load_for(&["t1abc".to_string()]).await;
        assert_eq!(store.fetch_calls.load(Ordering::SeqCst), 2);
    }
}
