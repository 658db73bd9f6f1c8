//! REST clients for the hosted Firebase services.

mod firestore;
mod identity;
mod storage;
mod tokens;
mod values;

pub use firestore::FirestoreStore;
pub use identity::FirebaseIdentityClient;
pub use storage::FirebaseStorage;
pub use tokens::TokenCell;

use std::time::Duration;

use brandmarket_config::FirebaseConfig;
use serde::Deserialize;

use crate::error::{BackendError, BackendResult};

/// The three Firebase clients, sharing one HTTP client and token.
pub struct FirebaseBackend {
    pub identity: FirebaseIdentityClient,
    pub documents: FirestoreStore,
    pub blobs: FirebaseStorage,
}

impl FirebaseBackend {
    pub fn connect(config: &FirebaseConfig, refresh_token: Option<String>) -> BackendResult<Self> {
        let http = reqwest::Client::builder()
            .user_agent("brandmarket-core")
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .build()?;
        let tokens = TokenCell::new(http.clone(), config, refresh_token);

        Ok(Self {
            identity: FirebaseIdentityClient::new(http.clone(), config, tokens.clone()),
            documents: FirestoreStore::new(http.clone(), config, tokens.clone()),
            blobs: FirebaseStorage::new(http, config, tokens),
        })
    }
}

/// Google API error envelope: `{ "error": { "code", "message", "status" } }`.
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: Option<String>,
}

/// Turn a non-success response into an error, using `classify` on the
/// decoded envelope for 4xx responses.
async fn error_from_response(
    response: reqwest::Response,
    classify: impl FnOnce(&str, Option<&str>) -> BackendError,
) -> BackendError {
    let status = response.status();
    if status.is_server_error() {
        return BackendError::Unavailable(status.to_string());
    }

    match response.json::<ErrorEnvelope>().await {
        Ok(envelope) => classify(&envelope.error.message, envelope.error.status.as_deref()),
        Err(_) => BackendError::Rejected(status.to_string()),
    }
}

async fn decode_json<T: serde::de::DeserializeOwned>(response: reqwest::Response) -> BackendResult<T> {
    response
        .json::<T>()
        .await
        .map_err(|error| BackendError::Decode(error.to_string()))
}

fn require_api_key(api_key: &Option<String>) -> BackendResult<&str> {
    api_key
        .as_deref()
        .ok_or_else(|| BackendError::Rejected("firebase api key is not configured".to_string()))
}
