//! Filesystem document store.
//!
//! Each document is one pretty-printed JSON file: `players/42/latest` lives
//! at `<root>/players/42/latest.json`. Writes go to a temporary file first
//! and are renamed into place.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use glob::Pattern;
use serde_json::Value;
use tokio::fs;
use tracing::{debug, info, warn};

use super::{validate_path, Document, DocumentStore, StorageConfig, StorageError, WriteBatch};

/// Document store backed by a directory tree.
pub struct FsStore {
    root: PathBuf,
}

impl FsStore {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn from_config(config: &StorageConfig) -> Self {
        Self::new(config.documents_dir())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn file_path(&self, path: &str) -> Result<PathBuf, StorageError> {
        let segments = validate_path(path)?;
        let (last, parents) = segments
            .split_last()
            .ok_or_else(|| StorageError::InvalidPath(path.to_string()))?;
        let mut file = self.root.clone();
        for segment in parents {
            file.push(segment);
        }
        file.push(format!("{}.json", last));
        Ok(file)
    }

    /// Inverse of [`Self::file_path`].
    fn doc_path(&self, file: &Path) -> Option<String> {
        let rel = file.strip_prefix(&self.root).ok()?;
        let mut segments: Vec<String> = rel
            .components()
            .map(|c| c.as_os_str().to_str().map(str::to_string))
            .collect::<Option<_>>()?;
        let last = segments.pop()?;
        segments.push(last.strip_suffix(".json")?.to_string());
        Some(segments.join("/"))
    }

    async fn write_file(&self, path: &str, doc: &Value) -> Result<(), StorageError> {
        let file = self.file_path(path)?;
        if let Some(parent) = file.parent() {
            fs::create_dir_all(parent).await?;
        }
        let tmp = file.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(doc)?).await?;
        fs::rename(&tmp, &file).await?;
        Ok(())
    }

    async fn read_matches(&self, pattern: &str) -> Result<Vec<Document>, StorageError> {
        let mut files = Vec::new();
        for entry in glob::glob(pattern)? {
            match entry {
                Ok(file) if file.is_file() => files.push(file),
                Ok(_) => {}
                Err(e) => warn!("Skipping unreadable path: {}", e),
            }
        }
        files.sort();

        let mut docs = Vec::with_capacity(files.len());
        for file in files {
            let Some(path) = self.doc_path(&file) else {
                continue;
            };
            let bytes = fs::read(&file).await?;
            match serde_json::from_slice(&bytes) {
                Ok(data) => docs.push(Document { path, data }),
                Err(e) => warn!("Failed to parse {:?}: {}", file, e),
            }
        }

        debug!("Read {} documents matching {}", docs.len(), pattern);
        Ok(docs)
    }

    fn escaped_root(&self) -> String {
        Pattern::escape(&self.root.to_string_lossy())
    }
}

#[async_trait]
impl DocumentStore for FsStore {
    fn name(&self) -> &'static str {
        "fs"
    }

    async fn get(&self, path: &str) -> Result<Option<Value>, StorageError> {
        let file = self.file_path(path)?;
        match fs::read(&file).await {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map(Some)
                .map_err(|source| StorageError::Malformed {
                    path: path.to_string(),
                    source,
                }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn set(&self, path: &str, doc: Value) -> Result<(), StorageError> {
        self.write_file(path, &doc).await?;
        debug!("Wrote document {}", path);
        Ok(())
    }

    async fn commit(&self, batch: WriteBatch) -> Result<usize, StorageError> {
        let ops = batch.into_ops();
        let count = ops.len();
        for (path, doc) in &ops {
            self.write_file(path, doc).await?;
        }
        if count > 0 {
            info!("Committed {} documents under {:?}", count, self.root);
        }
        Ok(count)
    }

    async fn list(&self, collection: &str) -> Result<Vec<Document>, StorageError> {
        validate_path(collection)?;
        let pattern = format!(
            "{}/{}/*.json",
            self.escaped_root(),
            Pattern::escape(collection)
        );
        self.read_matches(&pattern).await
    }

    async fn collection_group(&self, id: &str) -> Result<Vec<Document>, StorageError> {
        let segments = validate_path(id)?;
        if segments.len() != 1 {
            return Err(StorageError::InvalidPath(id.to_string()));
        }
        let pattern = format!("{}/**/{}.json", self.escaped_root(), Pattern::escape(id));
        self.read_matches(&pattern).await
    }
}
