//! In-memory blob store.

use std::collections::HashMap;

use bytes::Bytes;
use tokio::sync::RwLock;

use crate::blobs::BlobStore;
use crate::error::{BackendError, BackendResult};

#[derive(Debug, Clone)]
pub struct StoredBlob {
    pub bytes: Bytes,
    pub content_type: String,
}

pub struct MemoryBlobStore {
    base_url: String,
    blobs: RwLock<HashMap<String, StoredBlob>>,
}

impl Default for MemoryBlobStore {
    fn default() -> Self {
        Self::new("memory://blobs")
    }
}

impl MemoryBlobStore {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            blobs: RwLock::new(HashMap::new()),
        }
    }

    pub async fn get(&self, path: &str) -> Option<StoredBlob> {
        self.blobs.read().await.get(path).cloned()
    }

    pub async fn paths(&self) -> Vec<String> {
        let mut paths: Vec<_> = self.blobs.read().await.keys().cloned().collect();
        paths.sort();
        paths
    }
}

impl BlobStore for MemoryBlobStore {
    async fn upload(&self, path: &str, bytes: Bytes, content_type: &str) -> BackendResult<String> {
        if path.trim().is_empty() {
            return Err(BackendError::Rejected("empty object path".to_string()));
        }

        self.blobs.write().await.insert(
            path.to_string(),
            StoredBlob {
                bytes,
                content_type: content_type.to_string(),
            },
        );
        Ok(format!("{}/{}", self.base_url.trim_end_matches('/'), path))
    }
}
