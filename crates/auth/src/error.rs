use brandmarket_backend::BackendError;
use thiserror::Error;

/// Failures of session operations.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("could not create account: {0}")]
    IdentityCreation(String),

    #[error("authentication failed: {0}")]
    Authentication(BackendError),

    #[error("email address has not been verified")]
    EmailNotVerified,

    #[error("password reset code is invalid or expired")]
    InvalidResetCode,

    #[error("email verification code is invalid or expired")]
    InvalidVerificationCode,

    #[error("password must be at least {min} characters")]
    WeakPassword { min: usize },

    #[error("passwords do not match")]
    PasswordMismatch,

    #[error("{0} not found")]
    NotFound(String),

    #[error("backend temporarily unavailable: {0}")]
    Transient(BackendError),

    #[error("backend rejected the request: {0}")]
    Backend(BackendError),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("not signed in")]
    NotAuthenticated,

    #[error("no identity is awaiting email verification")]
    NoPendingIdentity,
}

impl AuthError {
    /// Classify a backend failure that has no operation-specific meaning.
    pub fn from_backend(error: BackendError) -> Self {
        if error.is_transient() {
            Self::Transient(error)
        } else {
            Self::Backend(error)
        }
    }

    pub(crate) fn from_creation(error: BackendError) -> Self {
        match error {
            BackendError::EmailExists => {
                Self::IdentityCreation("An account with this email already exists".to_string())
            }
            BackendError::InvalidEmail => {
                Self::IdentityCreation("Please enter a valid email address".to_string())
            }
            BackendError::WeakPassword(detail) if !detail.is_empty() => {
                Self::IdentityCreation(detail)
            }
            BackendError::WeakPassword(_) => {
                Self::IdentityCreation("Password is too weak".to_string())
            }
            other => Self::from_backend(other),
        }
    }

    pub(crate) fn from_sign_in(error: BackendError) -> Self {
        match error {
            BackendError::InvalidCredentials
            | BackendError::AccountNotFound
            | BackendError::AccountDisabled
            | BackendError::InvalidEmail => Self::Authentication(error),
            other => Self::from_backend(other),
        }
    }

    pub(crate) fn from_reset(error: BackendError, min: usize) -> Self {
        match error {
            BackendError::InvalidActionCode | BackendError::AccountNotFound => {
                Self::InvalidResetCode
            }
            BackendError::WeakPassword(_) => Self::WeakPassword { min },
            other => Self::from_backend(other),
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }

    /// Text suitable for showing inline next to a form.
    pub fn user_message(&self) -> String {
        match self {
            Self::IdentityCreation(reason) => reason.clone(),
            Self::Authentication(BackendError::AccountDisabled) => {
                "This account has been disabled.".to_string()
            }
            Self::Authentication(_) => "Invalid email or password.".to_string(),
            Self::EmailNotVerified => "Please verify your email before signing in. \
                 A new verification email has been sent."
                .to_string(),
            Self::InvalidResetCode => {
                "This password reset link is invalid or has expired.".to_string()
            }
            Self::InvalidVerificationCode => {
                "This verification link is invalid or has expired.".to_string()
            }
            Self::WeakPassword { min } => {
                format!("Password must be at least {min} characters long.")
            }
            Self::PasswordMismatch => "Passwords do not match.".to_string(),
            Self::NotFound(_) => "User data not found.".to_string(),
            Self::Transient(BackendError::RateLimited) => {
                "Too many attempts. Please try again later.".to_string()
            }
            Self::Transient(_) => {
                "The service is unavailable right now. Please try again.".to_string()
            }
            Self::Backend(_) => "Something went wrong. Please try again.".to_string(),
            Self::InvalidInput(reason) => reason.clone(),
            Self::NotAuthenticated => "Please sign in to continue.".to_string(),
            Self::NoPendingIdentity => {
                "There is no account waiting for email verification.".to_string()
            }
        }
    }
}
