use std::sync::{Arc, Mutex as StdMutex, Weak};

use brandmarket_backend::{BackendError, DocumentStore, IdentityClient, IdentityHandle, IdentityState};
use brandmarket_config::AppConfig;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::AuthError;
use crate::profile::{ProfileRepository, ProfileUpdate, UserProfile};
use crate::session::{Session, SessionUser};
use crate::subscription::SessionSubscription;
use crate::validation::{
    validate_display_name, validate_email, validate_mobile_number, validate_password_length,
};

/// Owns the session state and every transition of it.
///
/// Cloning is cheap; clones share one state and one identity listener.
pub struct SessionManager<I, S> {
    inner: Arc<Inner<I, S>>,
}

impl<I, S> Clone for SessionManager<I, S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct Inner<I, S> {
    identity: Arc<I>,
    profiles: ProfileRepository<S>,
    min_password_length: usize,
    session: watch::Sender<Session>,
    /// Held for the whole of every transition.
    transitions: Mutex<Transitions>,
    listener: StdMutex<Option<JoinHandle<()>>>,
}

#[derive(Default)]
struct Transitions {
    /// Last identity created or signed in while unverified.
    pending: Option<IdentityHandle>,
}

impl<I, S> Drop for Inner<I, S> {
    fn drop(&mut self) {
        if let Ok(mut listener) = self.listener.lock() {
            if let Some(handle) = listener.take() {
                handle.abort();
            }
        }
    }
}

impl<I: IdentityClient, S: DocumentStore> SessionManager<I, S> {
    /// Publish `Loading` and start listening to the identity client.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(identity: Arc<I>, store: Arc<S>, config: &AppConfig) -> Self {
        let (session, _) = watch::channel(Session::Loading);
        let updates = identity.subscribe();

        let inner = Arc::new(Inner {
            identity,
            profiles: ProfileRepository::new(store, config.collections.users.clone()),
            min_password_length: config.auth.min_password_length,
            session,
            transitions: Mutex::new(Transitions::default()),
            listener: StdMutex::new(None),
        });

        let handle = tokio::spawn(listen(Arc::downgrade(&inner), updates));
        if let Ok(mut listener) = inner.listener.lock() {
            *listener = Some(handle);
        }

        Self { inner }
    }

    pub fn current(&self) -> Session {
        self.inner.session.borrow().clone()
    }

    pub fn observe_session(&self) -> SessionSubscription {
        SessionSubscription::new(self.inner.session.subscribe())
    }

    pub fn identity(&self) -> &Arc<I> {
        &self.inner.identity
    }

    pub fn profiles(&self) -> &ProfileRepository<S> {
        &self.inner.profiles
    }

    /// Create an account, send one verification email, write the initial
    /// profile and sign the new identity out again.
    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        display_name: &str,
        mobile_number: &str,
    ) -> Result<IdentityHandle, AuthError> {
        validate_email(email)
            .map_err(|_| AuthError::IdentityCreation("Please enter a valid email address".to_string()))?;
        validate_password_length(password, self.inner.min_password_length).map_err(|_| {
            AuthError::IdentityCreation(format!(
                "Password should be at least {} characters",
                self.inner.min_password_length
            ))
        })?;
        validate_display_name(display_name)?;
        validate_mobile_number(mobile_number)?;

        let inner = &self.inner;
        let mut transitions = inner.transitions.lock().await;

        let handle = inner
            .identity
            .create_account(email, password)
            .await
            .map_err(AuthError::from_creation)?;

        let created = async {
            let handle = inner
                .identity
                .update_display_name(&handle, display_name)
                .await
                .map_err(AuthError::from_backend)?;
            inner
                .identity
                .send_verification_email(&handle)
                .await
                .map_err(AuthError::from_backend)?;
            inner
                .profiles
                .create(&UserProfile::for_new_account(&handle, display_name, mobile_number))
                .await?;
            Ok::<_, AuthError>(handle)
        }
        .await;

        let signed_out = inner.identity.sign_out().await;
        transitions.pending = Some(created.as_ref().map_or(&handle, |updated| updated).clone());
        inner.publish(Session::Anonymous);

        let handle = created?;
        signed_out.map_err(AuthError::from_backend)?;
        info!(uid = %handle.uid, "account created, awaiting email verification");
        Ok(handle)
    }

    /// Authenticate a verified identity and publish it as the session.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<SessionUser, AuthError> {
        if email.trim().is_empty() || password.is_empty() {
            return Err(AuthError::InvalidInput(
                "Email and password are required".to_string(),
            ));
        }

        let inner = &self.inner;
        let mut transitions = inner.transitions.lock().await;

        let handle = inner
            .identity
            .sign_in(email, password)
            .await
            .map_err(AuthError::from_sign_in)?;

        if !handle.email_verified {
            let dispatched = inner.identity.send_verification_email(&handle).await;
            let signed_out = inner.identity.sign_out().await;
            info!(uid = %handle.uid, "sign-in refused until email is verified");
            transitions.pending = Some(handle);
            inner.publish(Session::Anonymous);

            dispatched.map_err(AuthError::from_backend)?;
            signed_out.map_err(AuthError::from_backend)?;
            return Err(AuthError::EmailNotVerified);
        }

        let profile = match inner.profiles.get(&handle.uid).await {
            Ok(profile) => profile,
            Err(error) => {
                warn!(uid = %handle.uid, %error, "profile unavailable, abandoning sign-in");
                if let Err(error) = inner.identity.sign_out().await {
                    warn!(%error, "sign-out after failed sign-in also failed");
                }
                inner.publish(Session::Anonymous);
                return Err(error);
            }
        };

        transitions.pending = None;
        let user = SessionUser::new(handle, profile);
        inner.publish(Session::Authenticated(user.clone()));
        info!(uid = %user.uid(), "signed in");
        Ok(user)
    }

    /// Sign out. Succeeds without contacting the identity client when
    /// nobody is signed in.
    pub async fn sign_out(&self) -> Result<(), AuthError> {
        let inner = &self.inner;
        let _transitions = inner.transitions.lock().await;

        if !matches!(inner.identity.current(), IdentityState::SignedOut) {
            inner
                .identity
                .sign_out()
                .await
                .map_err(AuthError::from_backend)?;
            info!("signed out");
        }
        inner.publish(Session::Anonymous);
        Ok(())
    }

    /// Re-send the verification email to the pending identity, or to the
    /// signed-in identity when nothing is pending.
    pub async fn send_verification_email(&self) -> Result<(), AuthError> {
        let target = {
            let transitions = self.inner.transitions.lock().await;
            transitions
                .pending
                .clone()
                .or_else(|| self.inner.identity.current().identity().cloned())
        };

        let Some(handle) = target else {
            return Err(AuthError::NoPendingIdentity);
        };

        self.inner
            .identity
            .send_verification_email(&handle)
            .await
            .map_err(AuthError::from_backend)?;
        debug!(uid = %handle.uid, "verification email sent");
        Ok(())
    }

    /// Apply the code from a verification email. Nobody is signed in by this.
    pub async fn apply_email_verification(&self, code: &str) -> Result<(), AuthError> {
        self.inner
            .identity
            .apply_action_code(code)
            .await
            .map_err(|error| match error {
                BackendError::InvalidActionCode => AuthError::InvalidVerificationCode,
                other => AuthError::from_backend(other),
            })?;

        self.inner.transitions.lock().await.pending = None;
        info!("email address verified");
        Ok(())
    }

    /// Ask for a password reset email. Unknown addresses are reported as
    /// success so that accounts cannot be enumerated.
    pub async fn request_password_reset(&self, email: &str) -> Result<(), AuthError> {
        validate_email(email)?;

        match self.inner.identity.send_password_reset(email).await {
            Ok(()) | Err(BackendError::AccountNotFound) => {
                debug!("password reset requested");
                Ok(())
            }
            Err(error) => Err(AuthError::from_backend(error)),
        }
    }

    /// The email address a reset code belongs to.
    pub async fn verify_password_reset_code(&self, code: &str) -> Result<String, AuthError> {
        self.inner
            .identity
            .verify_reset_code(code)
            .await
            .map_err(|error| AuthError::from_reset(error, self.inner.min_password_length))
    }

    pub async fn confirm_password_reset(
        &self,
        code: &str,
        new_password: &str,
        confirmation: &str,
    ) -> Result<(), AuthError> {
        let min = self.inner.min_password_length;
        validate_password_length(new_password, min)?;
        if new_password != confirmation {
            return Err(AuthError::PasswordMismatch);
        }

        let identity = &self.inner.identity;
        identity
            .verify_reset_code(code)
            .await
            .map_err(|error| AuthError::from_reset(error, min))?;
        identity
            .confirm_password_reset(code, new_password)
            .await
            .map_err(|error| AuthError::from_reset(error, min))?;

        info!("password reset completed");
        Ok(())
    }

    /// Merge the given fields into the signed-in user's profile and publish
    /// the re-read result.
    pub async fn update_profile(&self, update: ProfileUpdate) -> Result<SessionUser, AuthError> {
        if let Some(display_name) = &update.display_name {
            validate_display_name(display_name)?;
        }
        if let Some(mobile_number) = &update.mobile_number {
            validate_mobile_number(mobile_number)?;
        }

        let inner = &self.inner;
        let _transitions = inner.transitions.lock().await;
        let Session::Authenticated(user) = self.current() else {
            return Err(AuthError::NotAuthenticated);
        };

        let mut handle = user.identity().clone();
        if let Some(display_name) = &update.display_name {
            handle = inner
                .identity
                .update_display_name(&handle, display_name)
                .await
                .map_err(AuthError::from_backend)?;
        }

        inner.profiles.merge(&handle.uid, &update).await?;
        let profile = inner.profiles.get(&handle.uid).await?;

        let refreshed = SessionUser::new(handle, profile);
        inner.publish(Session::Authenticated(refreshed.clone()));
        info!(uid = %refreshed.uid(), "profile updated");
        Ok(refreshed)
    }

    /// Re-read the signed-in user's profile document.
    pub async fn refresh_profile(&self) -> Result<UserProfile, AuthError> {
        let inner = &self.inner;
        let _transitions = inner.transitions.lock().await;
        let Session::Authenticated(user) = self.current() else {
            return Err(AuthError::NotAuthenticated);
        };

        let profile = inner.profiles.require(user.uid()).await?;
        inner.publish(Session::Authenticated(SessionUser::new(
            user.identity().clone(),
            Some(profile.clone()),
        )));
        Ok(profile)
    }

    /// Stop listening to the identity client. The last published session
    /// stays observable.
    pub fn shutdown(&self) {
        if let Ok(mut listener) = self.inner.listener.lock() {
            if let Some(handle) = listener.take() {
                handle.abort();
                debug!("session listener stopped");
            }
        }
    }
}

impl<I: IdentityClient, S: DocumentStore> Inner<I, S> {
    fn publish(&self, next: Session) {
        self.session.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            debug!(from = ?current.status(), to = ?next.status(), "session transition");
            *current = next;
            true
        });
    }

    fn last_profile(&self, uid: &str) -> Option<UserProfile> {
        self.session
            .borrow()
            .user()
            .filter(|user| user.uid() == uid)
            .and_then(|user| user.profile().cloned())
    }

    async fn reconcile(&self) {
        let mut transitions = self.transitions.lock().await;
        self.apply_identity(&mut transitions).await;
    }

    /// Publish the session matching the identity client's current state.
    /// The caller holds the transition lock.
    async fn apply_identity(&self, transitions: &mut Transitions) {
        match self.identity.current() {
            IdentityState::Unresolved => {}
            IdentityState::SignedOut => self.publish(Session::Anonymous),
            IdentityState::SignedIn(handle) if !handle.email_verified => {
                info!(uid = %handle.uid, "unverified identity reported, signing out");
                if let Err(error) = self.identity.sign_out().await {
                    warn!(%error, "could not sign out unverified identity");
                }
                transitions.pending = Some(handle);
                self.publish(Session::Anonymous);
            }
            IdentityState::SignedIn(handle) => {
                let profile = match self.profiles.get(&handle.uid).await {
                    Ok(profile) => profile,
                    Err(error) => {
                        warn!(uid = %handle.uid, %error, "could not load profile, keeping the last one");
                        self.last_profile(&handle.uid)
                    }
                };
                self.publish(Session::Authenticated(SessionUser::new(handle, profile)));
            }
        }
    }

    /// Restore the persisted identity and publish the first resolved
    /// session. Operations started meanwhile wait for the lock, so none of
    /// them can be overwritten by the restore.
    async fn resolve_initial(&self) {
        let mut transitions = self.transitions.lock().await;
        match self.identity.restore_session().await {
            Ok(_) => self.apply_identity(&mut transitions).await,
            Err(error) => {
                warn!(%error, "could not restore the persisted identity");
                if !self.session.borrow().is_resolved() {
                    self.publish(Session::Anonymous);
                }
            }
        }
    }
}

async fn listen<I: IdentityClient, S: DocumentStore>(
    inner: Weak<Inner<I, S>>,
    mut updates: watch::Receiver<IdentityState>,
) {
    {
        let Some(inner) = inner.upgrade() else {
            return;
        };
        inner.resolve_initial().await;
    }

    while updates.changed().await.is_ok() {
        let Some(inner) = inner.upgrade() else {
            break;
        };
        inner.reconcile().await;
    }
    debug!("identity listener finished");
}
