//! Blob store
//!
//! Durable large-object storage for document payloads, keyed by document id.
//! Payloads are immutable once written; lifecycle is independent from the
//! snapshot store and the coordinator keeps the two consistent.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use async_trait::async_trait;
use tokio::sync::RwLock;

// ============================================================================
// Port
// ============================================================================

/// Durable large-object store
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store a payload under a document id
    async fn put(&self, id: &str, bytes: &[u8]) -> anyhow::Result<()>;

    /// Fetch a payload; `None` when no blob exists for the id
    async fn get(&self, id: &str) -> anyhow::Result<Option<Vec<u8>>>;

    /// Remove a payload; deleting a missing blob is an error so callers can
    /// abort the matching metadata delete
    async fn delete(&self, id: &str) -> anyhow::Result<()>;
}

// ============================================================================
// Filesystem implementation
// ============================================================================

/// Filesystem-backed blob store, one file per document id
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    /// Open a store rooted at `root`, creating the directory if needed
    pub async fn open(root: impl AsRef<Path>) -> anyhow::Result<Self> {
        let root = root.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&root)
            .await
            .with_context(|| format!("failed to create blob root {}", root.display()))?;
        Ok(Self { root })
    }

    fn path_for(&self, id: &str) -> PathBuf {
        // Ids are generated UUIDs, safe to use directly as file names
        self.root.join(format!("{id}.blob"))
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn put(&self, id: &str, bytes: &[u8]) -> anyhow::Result<()> {
        let path = self.path_for(id);
        tokio::fs::write(&path, bytes)
            .await
            .with_context(|| format!("failed to write blob {}", path.display()))?;
        Ok(())
    }

    async fn get(&self, id: &str) -> anyhow::Result<Option<Vec<u8>>> {
        let path = self.path_for(id);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("failed to read blob {}", path.display())),
        }
    }

    async fn delete(&self, id: &str) -> anyhow::Result<()> {
        let path = self.path_for(id);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                bail!("blob not found: {id}")
            }
            Err(e) => Err(e).with_context(|| format!("failed to delete blob {}", path.display())),
        }
    }
}

// ============================================================================
// In-memory implementation
// ============================================================================

/// In-memory blob store, used as a fake port in tests
#[derive(Default)]
pub struct MemoryBlobStore {
    blobs: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored blobs
    pub async fn len(&self) -> usize {
        self.blobs.read().await.len()
    }

    /// Drop a blob without the error contract, to stage partial-failure tests
    pub async fn evict(&self, id: &str) {
        self.blobs.write().await.remove(id);
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(&self, id: &str, bytes: &[u8]) -> anyhow::Result<()> {
        let mut blobs = self.blobs.write().await;
        blobs.insert(id.to_string(), bytes.to_vec());
        Ok(())
    }

    async fn get(&self, id: &str) -> anyhow::Result<Option<Vec<u8>>> {
        let blobs = self.blobs.read().await;
        Ok(blobs.get(id).cloned())
    }

    async fn delete(&self, id: &str) -> anyhow::Result<()> {
        let mut blobs = self.blobs.write().await;
        if blobs.remove(id).is_none() {
            bail!("blob not found: {id}");
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
