use brandmarket_config::FirebaseConfig;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::{decode_json, error_from_response, require_api_key, TokenCell};
use crate::error::{BackendError, BackendResult};
use crate::identity::{IdentityClient, IdentityHandle, IdentityState};

/// Identity Toolkit v1 client.
///
/// Sign-out is local: it forgets the tokens and publishes `SignedOut`.
pub struct FirebaseIdentityClient {
    http: reqwest::Client,
    api_key: Option<String>,
    identity_base_url: String,
    tokens: TokenCell,
    state: watch::Sender<IdentityState>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CredentialResponse {
    #[serde(default)]
    email: String,
    id_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LookupResponse {
    #[serde(default)]
    users: Vec<AccountInfo>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccountInfo {
    #[serde(default)]
    local_id: String,
    #[serde(default)]
    email: String,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    email_verified: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResetPasswordResponse {
    #[serde(default)]
    email: String,
}

impl FirebaseIdentityClient {
    pub(crate) fn new(
        http: reqwest::Client,
        config: &FirebaseConfig,
        tokens: TokenCell,
    ) -> Self {
        let (state, _) = watch::channel(IdentityState::Unresolved);
        Self {
            http,
            api_key: config.api_key.clone(),
            identity_base_url: config.identity_base_url.trim_end_matches('/').to_string(),
            tokens,
            state,
        }
    }

    /// Refresh token of the signed-in identity, for the host to persist.
    pub fn refresh_token(&self) -> Option<String> {
        self.tokens.refresh_token()
    }

    async fn call<T: DeserializeOwned>(&self, endpoint: &str, body: Value) -> BackendResult<T> {
        let key = require_api_key(&self.api_key)?;
        let url = format!("{}/accounts:{endpoint}", self.identity_base_url);

        let response = self
            .http
            .post(url)
            .query(&[("key", key)])
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let error = error_from_response(response, |message, _| {
                BackendError::from_identity_code(message)
            })
            .await;
            debug!(endpoint, %error, "identity toolkit call failed");
            return Err(error);
        }

        decode_json(response).await
    }

    async fn lookup(&self, id_token: &str) -> BackendResult<IdentityHandle> {
        let response: LookupResponse = self.call("lookup", json!({ "idToken": id_token })).await?;
        let account = response
            .users
            .into_iter()
            .next()
            .ok_or(BackendError::AccountNotFound)?;

        Ok(IdentityHandle {
            uid: account.local_id,
            email: account.email,
            display_name: account.display_name,
            email_verified: account.email_verified,
            id_token: Some(id_token.to_string()),
        })
    }

    /// Adopt fresh credentials and publish the signed-in identity.
    async fn establish(&self, credential: CredentialResponse) -> BackendResult<IdentityHandle> {
        let mut handle = self.lookup(&credential.id_token).await?;
        if handle.email.is_empty() {
            handle.email = credential.email;
        }

        self.tokens.adopt(
            credential.id_token,
            credential.refresh_token,
            credential.expires_in.as_deref(),
        );
        self.state.send_replace(IdentityState::SignedIn(handle.clone()));
        Ok(handle)
    }

    /// The shared token, refreshed when stale; falls back to the token the
    /// handle was issued with once the identity has been signed out.
    async fn bearer(&self, handle: &IdentityHandle) -> BackendResult<String> {
        self.tokens
            .bearer()
            .await?
            .or_else(|| handle.id_token.clone())
            .ok_or(BackendError::Unauthenticated)
    }

    /// Publish the outcome of a restore unless a sign-in or sign-out
    /// already resolved the state, and return whatever state won.
    fn settle(&self, restored: IdentityState) -> IdentityState {
        self.state.send_if_modified(|state| {
            if state.is_resolved() {
                return false;
            }
            *state = restored;
            true
        });
        self.current()
    }
}

impl IdentityClient for FirebaseIdentityClient {
    async fn restore_session(&self) -> BackendResult<IdentityState> {
        let current = self.current();
        if current.is_resolved() {
            return Ok(current);
        }
        let Some(refresh_token) = self.tokens.refresh_token() else {
            return Ok(self.settle(IdentityState::SignedOut));
        };

        let restored = match self.tokens.exchange(&refresh_token).await {
            Ok(refreshed) => {
                let handle = self.lookup(&refreshed.id_token).await?;
                self.tokens.adopt(
                    refreshed.id_token,
                    Some(refreshed.refresh_token),
                    refreshed.expires_in.as_deref(),
                );
                info!(uid = %handle.uid, "restored persisted identity");
                IdentityState::SignedIn(handle)
            }
            Err(error) if !error.is_transient() => {
                warn!(%error, "persisted refresh token rejected");
                self.tokens.clear();
                IdentityState::SignedOut
            }
            Err(error) => return Err(error),
        };

        Ok(self.settle(restored))
    }

    fn current(&self) -> IdentityState {
        self.state.borrow().clone()
    }

    fn subscribe(&self) -> watch::Receiver<IdentityState> {
        self.state.subscribe()
    }

    async fn create_account(&self, email: &str, password: &str) -> BackendResult<IdentityHandle> {
        let credential: CredentialResponse = self
            .call(
                "signUp",
                json!({ "email": email, "password": password, "returnSecureToken": true }),
            )
            .await?;
        self.establish(credential).await
    }

    async fn sign_in(&self, email: &str, password: &str) -> BackendResult<IdentityHandle> {
        let credential: CredentialResponse = self
            .call(
                "signInWithPassword",
                json!({ "email": email, "password": password, "returnSecureToken": true }),
            )
            .await?;
        self.establish(credential).await
    }

    async fn sign_out(&self) -> BackendResult<()> {
        self.tokens.clear();
        self.state.send_if_modified(|state| {
            if matches!(state, IdentityState::SignedOut) {
                false
            } else {
                *state = IdentityState::SignedOut;
                true
            }
        });
        Ok(())
    }

    async fn send_verification_email(&self, handle: &IdentityHandle) -> BackendResult<()> {
        let id_token = self.bearer(handle).await?;
        let _: Value = self
            .call(
                "sendOobCode",
                json!({ "requestType": "VERIFY_EMAIL", "idToken": id_token }),
            )
            .await?;
        Ok(())
    }

    async fn apply_action_code(&self, code: &str) -> BackendResult<()> {
        let account: AccountInfo = self.call("update", json!({ "oobCode": code })).await?;

        self.state.send_if_modified(|state| match state {
            IdentityState::SignedIn(handle) if handle.uid == account.local_id => {
                handle.email_verified = account.email_verified;
                true
            }
            _ => false,
        });
        Ok(())
    }

    async fn send_password_reset(&self, email: &str) -> BackendResult<()> {
        let _: Value = self
            .call(
                "sendOobCode",
                json!({ "requestType": "PASSWORD_RESET", "email": email }),
            )
            .await?;
        Ok(())
    }

    async fn verify_reset_code(&self, code: &str) -> BackendResult<String> {
        let response: ResetPasswordResponse =
            self.call("resetPassword", json!({ "oobCode": code })).await?;
        Ok(response.email)
    }

    async fn confirm_password_reset(&self, code: &str, new_password: &str) -> BackendResult<()> {
        let _: ResetPasswordResponse = self
            .call(
                "resetPassword",
                json!({ "oobCode": code, "newPassword": new_password }),
            )
            .await?;
        Ok(())
    }

    async fn update_display_name(
        &self,
        handle: &IdentityHandle,
        display_name: &str,
    ) -> BackendResult<IdentityHandle> {
        let id_token = self.bearer(handle).await?;
        let _: Value = self
            .call(
                "update",
                json!({ "idToken": id_token, "displayName": display_name, "returnSecureToken": false }),
            )
            .await?;

        let mut updated = handle.clone();
        updated.display_name = Some(display_name.to_string());
        self.state.send_if_modified(|state| match state {
            IdentityState::SignedIn(current) if current.uid == updated.uid => {
                current.display_name = updated.display_name.clone();
                true
            }
            _ => false,
        });
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(api_key: Option<&str>, refresh_token: Option<&str>) -> FirebaseIdentityClient {
        let config = FirebaseConfig {
            api_key: api_key.map(str::to_string),
            ..FirebaseConfig::default()
        };
        let http = reqwest::Client::new();
        let tokens = TokenCell::new(http.clone(), &config, refresh_token.map(str::to_string));
        FirebaseIdentityClient::new(http, &config, tokens)
    }

    #[tokio::test]
    async fn restore_without_refresh_token_resolves_signed_out() {
        let client = client(Some("key"), None);
        assert_eq!(client.current(), IdentityState::Unresolved);

        let state = client.restore_session().await.unwrap();
        assert_eq!(state, IdentityState::SignedOut);
        assert_eq!(client.current(), IdentityState::SignedOut);
    }

    #[tokio::test]
    async fn calls_without_api_key_fail_locally() {
        let client = client(None, None);
        let result = client.sign_in("a@x.com", "secret1").await;
        assert!(matches!(result, Err(BackendError::Rejected(_))));
    }

    #[tokio::test]
    async fn sign_out_forgets_tokens() {
        let client = client(Some("key"), Some("refresh"));
        client.tokens.adopt("id-token".to_string(), None, Some("3600"));

        client.sign_out().await.unwrap();

        assert_eq!(client.tokens.bearer().await.unwrap(), None);
        assert!(client.refresh_token().is_none());
        assert_eq!(client.current(), IdentityState::SignedOut);
    }

    #[tokio::test]
    async fn restore_keeps_an_identity_signed_in_meanwhile() {
        // Without an api key the exchange would be rejected and the
        // persisted identity dropped, were the restore not skipped.
        let client = client(None, Some("refresh"));
        let handle = IdentityHandle::new("uid-1", "a@x.com");
        client.state.send_replace(IdentityState::SignedIn(handle.clone()));

        let state = client.restore_session().await.unwrap();

        assert_eq!(state, IdentityState::SignedIn(handle));
        assert_eq!(client.refresh_token().as_deref(), Some("refresh"));
    }

    #[tokio::test]
    async fn rejected_refresh_token_restores_signed_out() {
        let client = client(None, Some("refresh"));

        let state = client.restore_session().await.unwrap();

        assert_eq!(state, IdentityState::SignedOut);
        assert!(client.refresh_token().is_none());
    }

    #[test]
    fn credential_response_parses_camel_case() {
        let credential: CredentialResponse = serde_json::from_value(json!({
            "kind": "identitytoolkit#SignupNewUserResponse",
            "localId": "uid-1",
            "email": "a@x.com",
            "idToken": "token",
            "refreshToken": "refresh",
            "expiresIn": "3600"
        }))
        .unwrap();
        assert_eq!(credential.id_token, "token");
        assert_eq!(credential.refresh_token.as_deref(), Some("refresh"));
        assert_eq!(credential.expires_in.as_deref(), Some("3600"));
    }
}
