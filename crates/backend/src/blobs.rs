//! Blob store interface.

use std::future::Future;

use bytes::Bytes;

use crate::error::BackendResult;

/// Object storage for listing images.
pub trait BlobStore: Send + Sync + 'static {
    /// Upload `bytes` to `path` and return a public download URL.
    fn upload(
        &self,
        path: &str,
        bytes: Bytes,
        content_type: &str,
    ) -> impl Future<Output = BackendResult<String>> + Send;
}
