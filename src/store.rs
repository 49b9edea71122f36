//! Node Record Store
//!
//! In-memory keyed store with concurrent-safe mutation and a
//! monotonically accurate `records_count`.

use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Outcome of an upsert
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created,
    Replaced,
}

/// Outcome of a remove
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoveOutcome {
    Removed,
    Absent,
}

/// In-memory key-value store for a single node.
///
/// `records_count` is derived from the map rather than tracked
/// separately, so invariant 1 of the data model holds by construction.
pub struct RecordStore {
    records: RwLock<HashMap<Uuid, String>>,
}

impl Default for RecordStore {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordStore {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
        }
    }

    /// Pure read of the local map.
    pub async fn lookup(&self, key: &Uuid) -> Option<String> {
        self.records.read().await.get(key).cloned()
    }

    /// Single critical section: consults presence, writes the new value,
    /// reports whether the key was newly created.
    pub async fn upsert(&self, key: Uuid, value: String) -> UpsertOutcome {
        let mut records = self.records.write().await;
        match records.insert(key, value) {
            Some(_) => UpsertOutcome::Replaced,
            None => UpsertOutcome::Created,
        }
    }

    /// Single critical section: if present, delete it.
    pub async fn remove(&self, key: &Uuid) -> RemoveOutcome {
        let mut records = self.records.write().await;
        match records.remove(key) {
            Some(_) => RemoveOutcome::Removed,
            None => RemoveOutcome::Absent,
        }
    }

    /// Cardinality of the local key map.
    pub async fn records_count(&self) -> usize {
        self.records.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(n: u8) -> Uuid {
        Uuid::parse_str(&format!("550e8400-e29b-41d4-a716-44665544{n:04}")).unwrap()
    }

    #[tokio::test]
    async fn upsert_then_lookup() {
        let store = RecordStore::new();
        let k = key(1);
        assert_eq!(store.upsert(k, "hello".into()).await, UpsertOutcome::Created);
        assert_eq!(store.lookup(&k).await, Some("hello".to_string()));
        assert_eq!(store.records_count().await, 1);
    }

    #[tokio::test]
    async fn idempotent_set() {
        let store = RecordStore::new();
        let k = key(2);
        assert_eq!(store.upsert(k, "v1".into()).await, UpsertOutcome::Created);
        assert_eq!(store.upsert(k, "v1".into()).await, UpsertOutcome::Replaced);
        assert_eq!(store.records_count().await, 1);
        assert_eq!(store.lookup(&k).await, Some("v1".to_string()));
    }

    #[tokio::test]
    async fn remove_present_and_absent() {
        let store = RecordStore::new();
        let k = key(3);
        assert_eq!(store.remove(&k).await, RemoveOutcome::Absent);
        store.upsert(k, "v".into()).await;
        assert_eq!(store.remove(&k).await, RemoveOutcome::Removed);
        assert_eq!(store.records_count().await, 0);
        assert!(store.lookup(&k).await.is_none());
    }

    #[tokio::test]
    async fn count_consistency_after_sequence() {
        let store = RecordStore::new();
        let keys: Vec<Uuid> = (0..5).map(key).collect();
        for k in &keys {
            store.upsert(*k, "v".into()).await;
        }
        store.remove(&keys[0]).await;
        store.remove(&keys[1]).await;
        assert_eq!(store.records_count().await, 3);
    }
}
