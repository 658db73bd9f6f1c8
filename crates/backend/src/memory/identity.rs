//! In-memory identity service.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use rand::distributions::Alphanumeric;
use rand::Rng;
use tokio::sync::{watch, RwLock};
use tracing::debug;

use super::new_id;
use crate::error::{BackendError, BackendResult};
use crate::identity::{IdentityClient, IdentityHandle, IdentityState};

const MIN_PASSWORD_LENGTH: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Verification,
    PasswordReset,
}

/// A message the identity service would have emailed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub kind: MessageKind,
    pub email: String,
    pub code: String,
}

#[derive(Debug, Clone)]
struct Account {
    uid: String,
    email: String,
    password: String,
    display_name: Option<String>,
    email_verified: bool,
}

impl Account {
    fn handle(&self) -> IdentityHandle {
        IdentityHandle {
            uid: self.uid.clone(),
            email: self.email.clone(),
            display_name: self.display_name.clone(),
            email_verified: self.email_verified,
            id_token: Some(format!("memory-token-{}", self.uid)),
        }
    }
}

#[derive(Default)]
struct Directory {
    accounts: HashMap<String, Account>,
    codes: HashMap<String, (MessageKind, String)>,
    outbox: Vec<OutboundMessage>,
}

impl Directory {
    fn by_uid_mut(&mut self, uid: &str) -> Option<&mut Account> {
        self.accounts.values_mut().find(|account| account.uid == uid)
    }

    fn issue_code(&mut self, kind: MessageKind, email: &str) -> String {
        let code: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(24)
            .map(char::from)
            .collect();
        self.codes.insert(code.clone(), (kind, email.to_string()));
        self.outbox.push(OutboundMessage {
            kind,
            email: email.to_string(),
            code: code.clone(),
        });
        code
    }
}

/// Identity service kept entirely in process memory.
///
/// Every call counts towards [`MemoryIdentityClient::call_count`], and
/// dispatched emails are recorded instead of sent.
pub struct MemoryIdentityClient {
    directory: RwLock<Directory>,
    state: watch::Sender<IdentityState>,
    persisted_email: Mutex<Option<String>>,
    calls: AtomicUsize,
    unavailable: AtomicBool,
}

impl Default for MemoryIdentityClient {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryIdentityClient {
    pub fn new() -> Self {
        let (state, _) = watch::channel(IdentityState::Unresolved);
        Self {
            directory: RwLock::new(Directory::default()),
            state,
            persisted_email: Mutex::new(None),
            calls: AtomicUsize::new(0),
            unavailable: AtomicBool::new(false),
        }
    }

    /// Register an account directly, bypassing the sign-up flow.
    pub async fn seed_account(
        &self,
        email: &str,
        password: &str,
        display_name: Option<&str>,
        email_verified: bool,
    ) -> IdentityHandle {
        let account = Account {
            uid: new_id(),
            email: email.to_string(),
            password: password.to_string(),
            display_name: display_name.map(str::to_string),
            email_verified,
        };
        let handle = account.handle();
        self.directory
            .write()
            .await
            .accounts
            .insert(email.to_lowercase(), account);
        handle
    }

    /// Make [`IdentityClient::restore_session`] come back signed in as `email`.
    pub fn persist_session(&self, email: Option<&str>) {
        if let Ok(mut persisted) = self.persisted_email.lock() {
            *persisted = email.map(str::to_lowercase);
        }
    }

    /// Mark an account verified, as if the user clicked the emailed link.
    pub async fn mark_verified(&self, email: &str) {
        let mut directory = self.directory.write().await;
        if let Some(account) = directory.accounts.get_mut(&email.to_lowercase()) {
            account.email_verified = true;
        }
    }

    /// Publish a state change without going through an operation.
    pub fn emit(&self, state: IdentityState) {
        self.state.send_replace(state);
    }

    /// Make every subsequent call fail as if the service were unreachable.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub async fn messages(&self) -> Vec<OutboundMessage> {
        self.directory.read().await.outbox.clone()
    }

    pub async fn message_count(&self, kind: MessageKind, email: &str) -> usize {
        self.directory
            .read()
            .await
            .outbox
            .iter()
            .filter(|message| message.kind == kind && message.email.eq_ignore_ascii_case(email))
            .count()
    }

    pub async fn last_code(&self, kind: MessageKind, email: &str) -> Option<String> {
        self.directory
            .read()
            .await
            .outbox
            .iter()
            .rev()
            .find(|message| message.kind == kind && message.email.eq_ignore_ascii_case(email))
            .map(|message| message.code.clone())
    }

    fn enter(&self) -> BackendResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(BackendError::Unavailable(
                "identity service unreachable".to_string(),
            ));
        }
        Ok(())
    }

    /// Refresh the published identity if it belongs to `account`.
    fn republish_if_current(&self, account: &Account) {
        self.state.send_if_modified(|state| match state {
            IdentityState::SignedIn(handle) if handle.uid == account.uid => {
                *handle = account.handle();
                true
            }
            _ => false,
        });
    }
}

impl IdentityClient for MemoryIdentityClient {
    async fn restore_session(&self) -> BackendResult<IdentityState> {
        self.enter()?;
        let current = self.current();
        if current.is_resolved() {
            return Ok(current);
        }
        let persisted = self
            .persisted_email
            .lock()
            .ok()
            .and_then(|persisted| persisted.clone());

        let restored = match persisted {
            Some(email) => self
                .directory
                .read()
                .await
                .accounts
                .get(&email)
                .map(|account| IdentityState::SignedIn(account.handle()))
                .unwrap_or(IdentityState::SignedOut),
            None => IdentityState::SignedOut,
        };

        // A sign-in or sign-out may have resolved the state meanwhile.
        self.state.send_if_modified(|state| {
            if state.is_resolved() {
                return false;
            }
            *state = restored;
            true
        });
        Ok(self.current())
    }

    fn current(&self) -> IdentityState {
        self.state.borrow().clone()
    }

    fn subscribe(&self) -> watch::Receiver<IdentityState> {
        self.state.subscribe()
    }

    async fn create_account(&self, email: &str, password: &str) -> BackendResult<IdentityHandle> {
        self.enter()?;
        if !email.contains('@') {
            return Err(BackendError::InvalidEmail);
        }
        if password.len() < MIN_PASSWORD_LENGTH {
            return Err(BackendError::WeakPassword(format!(
                "Password should be at least {MIN_PASSWORD_LENGTH} characters"
            )));
        }

        let handle = {
            let mut directory = self.directory.write().await;
            let key = email.to_lowercase();
            if directory.accounts.contains_key(&key) {
                return Err(BackendError::EmailExists);
            }
            let account = Account {
                uid: new_id(),
                email: email.to_string(),
                password: password.to_string(),
                display_name: None,
                email_verified: false,
            };
            let handle = account.handle();
            directory.accounts.insert(key, account);
            handle
        };

        debug!(uid = %handle.uid, "memory identity created");
        self.state.send_replace(IdentityState::SignedIn(handle.clone()));
        Ok(handle)
    }

    async fn sign_in(&self, email: &str, password: &str) -> BackendResult<IdentityHandle> {
        self.enter()?;
        let handle = {
            let directory = self.directory.read().await;
            match directory.accounts.get(&email.to_lowercase()) {
                Some(account) if account.password == password => account.handle(),
                _ => return Err(BackendError::InvalidCredentials),
            }
        };

        self.state.send_replace(IdentityState::SignedIn(handle.clone()));
        Ok(handle)
    }

    async fn sign_out(&self) -> BackendResult<()> {
        self.enter()?;
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
        self.enter()?;
        let mut directory = self.directory.write().await;
        let email = directory
            .by_uid_mut(&handle.uid)
            .map(|account| account.email.clone())
            .ok_or(BackendError::AccountNotFound)?;
        directory.issue_code(MessageKind::Verification, &email);
        Ok(())
    }

    async fn apply_action_code(&self, code: &str) -> BackendResult<()> {
        self.enter()?;
        let account = {
            let mut directory = self.directory.write().await;
            let email = match directory.codes.get(code) {
                Some((MessageKind::Verification, email)) => email.to_lowercase(),
                _ => return Err(BackendError::InvalidActionCode),
            };
            directory.codes.remove(code);
            let account = directory
                .accounts
                .get_mut(&email)
                .ok_or(BackendError::AccountNotFound)?;
            account.email_verified = true;
            account.clone()
        };

        self.republish_if_current(&account);
        Ok(())
    }

    async fn send_password_reset(&self, email: &str) -> BackendResult<()> {
        self.enter()?;
        let mut directory = self.directory.write().await;
        let email = directory
            .accounts
            .get(&email.to_lowercase())
            .map(|account| account.email.clone())
            .ok_or(BackendError::AccountNotFound)?;
        directory.issue_code(MessageKind::PasswordReset, &email);
        Ok(())
    }

    async fn verify_reset_code(&self, code: &str) -> BackendResult<String> {
        self.enter()?;
        match self.directory.read().await.codes.get(code) {
            Some((MessageKind::PasswordReset, email)) => Ok(email.clone()),
            _ => Err(BackendError::InvalidActionCode),
        }
    }

    async fn confirm_password_reset(&self, code: &str, new_password: &str) -> BackendResult<()> {
        self.enter()?;
        if new_password.len() < MIN_PASSWORD_LENGTH {
            return Err(BackendError::WeakPassword(format!(
                "Password should be at least {MIN_PASSWORD_LENGTH} characters"
            )));
        }

        let mut directory = self.directory.write().await;
        let email = match directory.codes.get(code) {
            Some((MessageKind::PasswordReset, email)) => email.to_lowercase(),
            _ => return Err(BackendError::InvalidActionCode),
        };
        directory.codes.remove(code);
        let account = directory
            .accounts
            .get_mut(&email)
            .ok_or(BackendError::AccountNotFound)?;
        account.password = new_password.to_string();
        Ok(())
    }

    async fn update_display_name(
        &self,
        handle: &IdentityHandle,
        display_name: &str,
    ) -> BackendResult<IdentityHandle> {
        self.enter()?;
        let account = {
            let mut directory = self.directory.write().await;
            let account = directory
                .by_uid_mut(&handle.uid)
                .ok_or(BackendError::AccountNotFound)?;
            account.display_name = Some(display_name.to_string());
            account.clone()
        };

        self.republish_if_current(&account);
        Ok(account.handle())
    }
}
