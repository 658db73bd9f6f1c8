use brandmarket_config::FirebaseConfig;
use bytes::Bytes;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde::Deserialize;
use tracing::debug;
use url::Url;

use super::{decode_json, error_from_response, TokenCell};
use crate::blobs::BlobStore;
use crate::error::{BackendError, BackendResult};

/// Cloud Storage for Firebase client (v0 REST surface).
pub struct FirebaseStorage {
    http: reqwest::Client,
    base_url: String,
    bucket: String,
    tokens: TokenCell,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ObjectMetadata {
    name: String,
    #[serde(default)]
    download_tokens: Option<String>,
}

impl FirebaseStorage {
    pub(crate) fn new(http: reqwest::Client, config: &FirebaseConfig, tokens: TokenCell) -> Self {
        Self {
            http,
            base_url: config.storage_base_url.trim_end_matches('/').to_string(),
            bucket: config.bucket(),
            tokens,
        }
    }

    /// Public URL of an uploaded object. The object name is one path
    /// segment, so `/` inside it is percent-encoded.
    pub fn download_url(&self, path: &str, token: Option<&str>) -> BackendResult<String> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|error| BackendError::Rejected(format!("storage base url: {error}")))?;
        url.path_segments_mut()
            .map_err(|_| BackendError::Rejected("storage base url cannot be a base".to_string()))?
            .extend(["b", self.bucket.as_str(), "o"])
            .push(path);

        {
            let mut query = url.query_pairs_mut();
            query.append_pair("alt", "media");
            if let Some(token) = token {
                query.append_pair("token", token);
            }
        }
        Ok(url.into())
    }
}

impl BlobStore for FirebaseStorage {
    async fn upload(&self, path: &str, bytes: Bytes, content_type: &str) -> BackendResult<String> {
        if path.trim().is_empty() {
            return Err(BackendError::Rejected("empty object path".to_string()));
        }

        let mut request = self
            .http
            .post(format!("{}/b/{}/o", self.base_url, self.bucket))
            .query(&[("uploadType", "media"), ("name", path)])
            .header(CONTENT_TYPE, content_type)
            .body(bytes);
        if let Some(token) = self.tokens.bearer().await? {
            request = request.header(AUTHORIZATION, format!("Firebase {token}"));
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(error_from_response(response, |message, _| {
                BackendError::Rejected(message.to_string())
            })
            .await);
        }

        let metadata: ObjectMetadata = decode_json(response).await?;
        debug!(object = %metadata.name, "object uploaded");

        // Several tokens may be listed, comma separated.
        let token = metadata
            .download_tokens
            .as_deref()
            .and_then(|tokens| tokens.split(',').next());
        self.download_url(&metadata.name, token)
    }
}
