use std::sync::{Arc, Mutex as StdMutex};

use brandmarket_config::FirebaseConfig;
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::{decode_json, error_from_response, require_api_key};
use crate::error::{BackendError, BackendResult};

/// Lifetime Firebase gives ID tokens when a response omits `expiresIn`.
const DEFAULT_LIFETIME_SECONDS: i64 = 3600;
/// Refresh this long before the token actually expires.
const EXPIRY_MARGIN_SECONDS: i64 = 60;

#[derive(Debug, Clone, PartialEq, Eq)]
struct IdToken {
    value: String,
    expires_at: DateTime<Utc>,
}

impl IdToken {
    fn issued(value: String, expires_in: Option<&str>, now: DateTime<Utc>) -> Self {
        let seconds = expires_in
            .and_then(|seconds| seconds.trim().parse::<i64>().ok())
            .filter(|seconds| *seconds > 0)
            .unwrap_or(DEFAULT_LIFETIME_SECONDS);
        Self {
            value,
            expires_at: now + Duration::seconds(seconds),
        }
    }

    fn is_stale(&self, now: DateTime<Utc>) -> bool {
        now + Duration::seconds(EXPIRY_MARGIN_SECONDS) >= self.expires_at
    }
}

#[derive(Debug, Default)]
struct Credentials {
    id_token: Option<IdToken>,
    refresh_token: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RefreshResponse {
    pub(crate) id_token: String,
    pub(crate) refresh_token: String,
    #[serde(default)]
    pub(crate) expires_in: Option<String>,
}

struct TokenSource {
    http: reqwest::Client,
    api_key: Option<String>,
    token_base_url: String,
    credentials: StdMutex<Credentials>,
    /// Serializes refresh-token exchanges.
    exchange: Mutex<()>,
}

/// Credentials of the signed-in identity, shared by all clients of one
/// backend. Hands out an ID token that is refreshed once it nears expiry.
#[derive(Clone)]
pub struct TokenCell(Arc<TokenSource>);

impl TokenCell {
    pub(crate) fn new(
        http: reqwest::Client,
        config: &FirebaseConfig,
        refresh_token: Option<String>,
    ) -> Self {
        Self(Arc::new(TokenSource {
            http,
            api_key: config.api_key.clone(),
            token_base_url: config.token_base_url.trim_end_matches('/').to_string(),
            credentials: StdMutex::new(Credentials {
                id_token: None,
                refresh_token,
            }),
            exchange: Mutex::new(()),
        }))
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.0
            .credentials
            .lock()
            .ok()
            .and_then(|credentials| credentials.refresh_token.clone())
    }

    /// Adopt tokens from a sign-in or refresh response.
    pub(crate) fn adopt(
        &self,
        id_token: String,
        refresh_token: Option<String>,
        expires_in: Option<&str>,
    ) {
        if let Ok(mut credentials) = self.0.credentials.lock() {
            credentials.id_token = Some(IdToken::issued(id_token, expires_in, Utc::now()));
            if refresh_token.is_some() {
                credentials.refresh_token = refresh_token;
            }
        }
    }

    pub(crate) fn clear(&self) {
        if let Ok(mut credentials) = self.0.credentials.lock() {
            *credentials = Credentials::default();
        }
    }

    /// A usable ID token, or `None` when nobody is signed in.
    ///
    /// A stale token is exchanged for a fresh one first. If the refresh
    /// token is rejected the credentials are dropped and the call fails
    /// with [`BackendError::Unauthenticated`].
    pub async fn bearer(&self) -> BackendResult<Option<String>> {
        if let Some(token) = self.fresh_token(Utc::now()) {
            return Ok(token);
        }

        let _exchange = self.0.exchange.lock().await;
        // Another caller may have refreshed while we waited.
        if let Some(token) = self.fresh_token(Utc::now()) {
            return Ok(token);
        }
        let Some(refresh_token) = self.refresh_token() else {
            return Err(BackendError::Unauthenticated);
        };

        match self.exchange(&refresh_token).await {
            Ok(refreshed) => {
                debug!("id token refreshed");
                let value = refreshed.id_token.clone();
                self.adopt(
                    refreshed.id_token,
                    Some(refreshed.refresh_token),
                    refreshed.expires_in.as_deref(),
                );
                Ok(Some(value))
            }
            Err(error) if !error.is_transient() => {
                warn!(%error, "refresh token rejected, dropping credentials");
                self.clear();
                Err(BackendError::Unauthenticated)
            }
            Err(error) => Err(error),
        }
    }

    /// `Some(token)` when no exchange is needed: either a fresh token or
    /// `Some(None)` when there is no ID token at all.
    fn fresh_token(&self, now: DateTime<Utc>) -> Option<Option<String>> {
        let credentials = self.0.credentials.lock().ok()?;
        match &credentials.id_token {
            None => Some(None),
            Some(token) if !token.is_stale(now) => Some(Some(token.value.clone())),
            Some(_) => None,
        }
    }

    /// Secure Token refresh grant.
    pub(crate) async fn exchange(&self, refresh_token: &str) -> BackendResult<RefreshResponse> {
        let key = require_api_key(&self.0.api_key)?;
        let response = self
            .0
            .http
            .post(format!("{}/token", self.0.token_base_url))
            .query(&[("key", key)])
            .json(&json!({ "grant_type": "refresh_token", "refresh_token": refresh_token }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(error_from_response(response, |message, _| {
                BackendError::from_identity_code(message)
            })
            .await);
        }

        decode_json(response).await
    }
}
