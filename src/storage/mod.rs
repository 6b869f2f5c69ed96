//! Document store operations.
//!
//! The pipeline reads and writes JSON documents addressed by slash-separated
//! paths (`players/123/latest`, `stats_cache_player_derived/123`). Backends
//! implement [`DocumentStore`]:
//! - [`FsStore`]: one JSON file per document under the data directory
//! - [`MemoryStore`]: in-process map, used by tests and dry runs

mod fs;
mod memory;
pub mod paths;

pub use fs::FsStore;
pub use memory::MemoryStore;

use std::path::PathBuf;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

/// Maximum operations per committed batch.
pub const MAX_BATCH_WRITES: usize = 400;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Malformed document {path}: {source}")]
    Malformed {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Glob pattern error: {0}")]
    Pattern(#[from] glob::PatternError),
}

/// Configuration for storage paths.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
}

impl StorageConfig {
    pub fn new(data_dir: PathBuf) -> Self {
        Self { data_dir }
    }

    pub fn documents_dir(&self) -> PathBuf {
        self.data_dir.join("documents")
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self::new(PathBuf::from("./data"))
    }
}

/// A stored document with its full path.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub path: String,
    pub data: Value,
}

impl Document {
    pub fn new(path: impl Into<String>, data: Value) -> Self {
        Self {
            path: path.into(),
            data,
        }
    }

    /// Deserialize the document body.
    pub fn parse<T: DeserializeOwned>(&self) -> Result<T, StorageError> {
        serde_json::from_value(self.data.clone()).map_err(|source| StorageError::Malformed {
            path: self.path.clone(),
            source,
        })
    }
}

/// A set of document writes committed together.
#[derive(Debug, Clone, Default)]
pub struct WriteBatch {
    ops: Vec<(String, Value)>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a write of `doc` to `path`.
    pub fn set<T: Serialize>(&mut self, path: impl Into<String>, doc: &T) -> Result<(), StorageError> {
        self.ops.push((path.into(), serde_json::to_value(doc)?));
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn into_ops(self) -> Vec<(String, Value)> {
        self.ops
    }

    /// Split into batches of at most `limit` operations.
    pub fn into_chunks(self, limit: usize) -> Vec<WriteBatch> {
        let limit = limit.max(1);
        let mut chunks = Vec::new();
        let mut ops = self.ops.into_iter().peekable();
        while ops.peek().is_some() {
            chunks.push(WriteBatch {
                ops: ops.by_ref().take(limit).collect(),
            });
        }
        chunks
    }
}

/// Trait for document store backends.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Backend name for logging.
    fn name(&self) -> &'static str;

    /// Read one document.
    async fn get(&self, path: &str) -> Result<Option<Value>, StorageError>;

    /// Create or replace one document.
    async fn set(&self, path: &str, doc: Value) -> Result<(), StorageError>;

    /// Apply every write in the batch; returns the number written.
    async fn commit(&self, batch: WriteBatch) -> Result<usize, StorageError>;

    /// Direct child documents of a collection.
    async fn list(&self, collection: &str) -> Result<Vec<Document>, StorageError>;

    /// Every document, at any depth, whose id is `id`.
    async fn collection_group(&self, id: &str) -> Result<Vec<Document>, StorageError>;
}

/// Read and deserialize a document.
pub async fn read_doc<T: DeserializeOwned>(
    store: &dyn DocumentStore,
    path: &str,
) -> Result<Option<T>, StorageError> {
    match store.get(path).await? {
        Some(value) => serde_json::from_value(value)
            .map(Some)
            .map_err(|source| StorageError::Malformed {
                path: path.to_string(),
                source,
            }),
        None => Ok(None),
    }
}

/// Serialize and write a document.
pub async fn write_doc<T: Serialize>(
    store: &dyn DocumentStore,
    path: &str,
    doc: &T,
) -> Result<(), StorageError> {
    store.set(path, serde_json::to_value(doc)?).await
}

/// Commit a batch of any size in chunks of [`MAX_BATCH_WRITES`].
pub async fn commit_chunked(
    store: &dyn DocumentStore,
    batch: WriteBatch,
) -> Result<usize, StorageError> {
    let mut written = 0;
    for chunk in batch.into_chunks(MAX_BATCH_WRITES) {
        written += store.commit(chunk).await?;
        debug!("Committed batch to {} ({} written so far)", store.name(), written);
    }
    Ok(written)
}

/// Reject empty, relative or backslashed segments.
pub(crate) fn validate_path(path: &str) -> Result<Vec<&str>, StorageError> {
    let segments: Vec<&str> = path.split('/').collect();
    let bad = segments
        .iter()
        .any(|s| s.is_empty() || *s == "." || *s == ".." || s.contains('\\'));
    if bad {
        return Err(StorageError::InvalidPath(path.to_string()));
    }
    Ok(segments)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_storage_config_paths() {
        let config = StorageConfig::new(PathBuf::from("/data"));
        assert_eq!(config.documents_dir(), PathBuf::from("/data/documents"));
    }

    #[test]
    fn test_storage_config_default() {
        let config = StorageConfig::default();
        assert_eq!(config.data_dir, PathBuf::from("./data"));
    }

    #[test]
    fn test_validate_path() {
        assert!(validate_path("players/42/latest").is_ok());
        assert!(validate_path("").is_err());
        assert!(validate_path("players//latest").is_err());
        assert!(validate_path("../etc/passwd").is_err());
        assert!(validate_path("a\\b").is_err());
        assert!(validate_path("/abs").is_err());
    }

    #[test]
    fn test_batch_chunks() {
        let mut batch = WriteBatch::new();
        for i in 0..7 {
            batch.set(format!("c/{}", i), &json!({"i": i})).unwrap();
        }
        let chunks = batch.into_chunks(3);
        let sizes: Vec<usize> = chunks.iter().map(WriteBatch::len).collect();
        assert_eq!(sizes, vec![3, 3, 1]);
    }

    #[test]
    fn test_empty_batch_has_no_chunks() {
        assert!(WriteBatch::new().into_chunks(10).is_empty());
    }

    #[tokio::test]
    async fn test_read_doc_malformed() {
        let store = MemoryStore::new();
        store.set("c/x", json!({"n": "not a number"})).await.unwrap();

        #[derive(serde::Deserialize)]
        struct Typed {
            #[allow(dead_code)]
            n: u32,
        }

        let err = read_doc::<Typed>(&store, "c/x").await;
        assert!(matches!(err, Err(StorageError::Malformed { .. })));
    }

    #[tokio::test]
    async fn test_commit_chunked_counts_all() {
        let store = MemoryStore::new();
        let mut batch = WriteBatch::new();
        for i in 0..(MAX_BATCH_WRITES + 5) {
            batch.set(format!("c/{}", i), &json!(i)).unwrap();
        }
        let written = commit_chunked(&store, batch).await.unwrap();
        assert_eq!(written, MAX_BATCH_WRITES + 5);
        assert_eq!(store.list("c").await.unwrap().len(), MAX_BATCH_WRITES + 5);
    }
}
