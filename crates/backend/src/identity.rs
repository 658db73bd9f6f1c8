//! Identity service interface.

use std::fmt;
use std::future::Future;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::error::BackendResult;

/// An identity record as reported by the identity service.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityHandle {
    pub uid: String,
    pub email: String,
    pub display_name: Option<String>,
    pub email_verified: bool,
    /// Bearer token for calls made on behalf of this identity.
    #[serde(skip)]
    pub id_token: Option<String>,
}

impl IdentityHandle {
    pub fn new(uid: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            email: email.into(),
            display_name: None,
            email_verified: false,
            id_token: None,
        }
    }
}

impl fmt::Debug for IdentityHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentityHandle")
            .field("uid", &self.uid)
            .field("email", &self.email)
            .field("display_name", &self.display_name)
            .field("email_verified", &self.email_verified)
            .field("id_token", &self.id_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// The identity service's own notion of who is signed in.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum IdentityState {
    /// The initial state has not been determined yet.
    #[default]
    Unresolved,
    SignedOut,
    SignedIn(IdentityHandle),
}

impl IdentityState {
    pub fn identity(&self) -> Option<&IdentityHandle> {
        match self {
            Self::SignedIn(handle) => Some(handle),
            _ => None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        !matches!(self, Self::Unresolved)
    }
}

/// Credential and session operations against the managed identity service.
///
/// Implementations publish every change of their signed-in identity on the
/// channel returned by [`IdentityClient::subscribe`].
pub trait IdentityClient: Send + Sync + 'static {
    /// Resolve the initial state, e.g. by exchanging a persisted refresh token.
    fn restore_session(&self) -> impl Future<Output = BackendResult<IdentityState>> + Send;

    /// Snapshot of the current state.
    fn current(&self) -> IdentityState;

    /// Change notifications for the signed-in identity.
    fn subscribe(&self) -> watch::Receiver<IdentityState>;

    /// Create an account and sign it in.
    fn create_account(
        &self,
        email: &str,
        password: &str,
    ) -> impl Future<Output = BackendResult<IdentityHandle>> + Send;

    fn sign_in(
        &self,
        email: &str,
        password: &str,
    ) -> impl Future<Output = BackendResult<IdentityHandle>> + Send;

    fn sign_out(&self) -> impl Future<Output = BackendResult<()>> + Send;

    fn send_verification_email(
        &self,
        handle: &IdentityHandle,
    ) -> impl Future<Output = BackendResult<()>> + Send;

    /// Apply an out-of-band email verification code.
    fn apply_action_code(&self, code: &str) -> impl Future<Output = BackendResult<()>> + Send;

    fn send_password_reset(&self, email: &str) -> impl Future<Output = BackendResult<()>> + Send;

    /// Check a password reset code, returning the email it was issued for.
    fn verify_reset_code(&self, code: &str) -> impl Future<Output = BackendResult<String>> + Send;

    fn confirm_password_reset(
        &self,
        code: &str,
        new_password: &str,
    ) -> impl Future<Output = BackendResult<()>> + Send;

    fn update_display_name(
        &self,
        handle: &IdentityHandle,
        display_name: &str,
    ) -> impl Future<Output = BackendResult<IdentityHandle>> + Send;
}
