//! In-memory document store.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use super::{validate_path, Document, DocumentStore, StorageError, WriteBatch};

/// Document store held in a sorted map; counts every write.
#[derive(Default)]
pub struct MemoryStore {
    docs: RwLock<BTreeMap<String, Value>>,
    writes: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of documents written since creation.
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub async fn len(&self) -> usize {
        self.docs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.docs.read().await.is_empty()
    }

    /// All document paths, sorted.
    pub async fn paths(&self) -> Vec<String> {
        self.docs.read().await.keys().cloned().collect()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, path: &str) -> Result<Option<Value>, StorageError> {
        validate_path(path)?;
        Ok(self.docs.read().await.get(path).cloned())
    }

    async fn set(&self, path: &str, doc: Value) -> Result<(), StorageError> {
        validate_path(path)?;
        self.docs.write().await.insert(path.to_string(), doc);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn commit(&self, batch: WriteBatch) -> Result<usize, StorageError> {
        let ops = batch.into_ops();
        for (path, _) in &ops {
            validate_path(path)?;
        }
        let count = ops.len();
        let mut docs = self.docs.write().await;
        for (path, doc) in ops {
            docs.insert(path, doc);
        }
        self.writes.fetch_add(count, Ordering::SeqCst);
        Ok(count)
    }

    async fn list(&self, collection: &str) -> Result<Vec<Document>, StorageError> {
        validate_path(collection)?;
        let prefix = format!("{}/", collection);
        let docs = self.docs.read().await;
        Ok(docs
            .range(prefix.clone()..)
            .take_while(|(k, _)| k.starts_with(&prefix))
            .filter(|(k, _)| !k[prefix.len()..].contains('/'))
            .map(|(k, v)| Document::new(k.clone(), v.clone()))
            .collect())
    }

    async fn collection_group(&self, id: &str) -> Result<Vec<Document>, StorageError> {
        let segments = validate_path(id)?;
        if segments.len() != 1 {
            return Err(StorageError::InvalidPath(id.to_string()));
        }
        let docs = self.docs.read().await;
        Ok(docs
            .iter()
            .filter(|(k, _)| k.rsplit('/').next() == Some(id))
            .map(|(k, v)| Document::new(k.clone(), v.clone()))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_set_get_and_count() {
        let store = MemoryStore::new();
        store.set("c/a", json!({"v": 1})).await.unwrap();
        store.set("c/a", json!({"v": 2})).await.unwrap();

        assert_eq!(store.get("c/a").await.unwrap(), Some(json!({"v": 2})));
        assert_eq!(store.writes(), 2);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_list_direct_children_only() {
        let store = MemoryStore::new();
        store.set("c/a", json!(1)).await.unwrap();
        store.set("c/b/nested", json!(2)).await.unwrap();
        store.set("cc/x", json!(3)).await.unwrap();

        let docs = store.list("c").await.unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].path, "c/a");
    }

    #[tokio::test]
    async fn test_collection_group() {
        let store = MemoryStore::new();
        store.set("players/1/latest", json!(1)).await.unwrap();
        store.set("guilds/2/latest", json!(2)).await.unwrap();
        store.set("players/1/history", json!(3)).await.unwrap();

        let docs = store.collection_group("latest").await.unwrap();
        assert_eq!(docs.len(), 2);
        assert!(docs.iter().all(|d| d.path.ends_with("/latest")));
    }

    #[tokio::test]
    async fn test_commit_counts_writes() {
        let store = MemoryStore::new();
        let mut batch = WriteBatch::new();
        batch.set("c/a", &json!(1)).unwrap();
        batch.set("c/b", &json!(2)).unwrap();

        assert_eq!(store.commit(batch).await.unwrap(), 2);
        assert_eq!(store.writes(), 2);
        assert_eq!(store.paths().await, vec!["c/a", "c/b"]);
    }

    #[tokio::test]
    async fn test_invalid_path() {
        let store = MemoryStore::new();
        assert!(store.set("a//b", json!(1)).await.is_err());
        assert!(store.get("").await.is_err());
    }
}
