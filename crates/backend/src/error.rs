//! Error types shared by every backend client.

use thiserror::Error;

/// Failures reported by the identity service, document store or blob store.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("email already in use")]
    EmailExists,

    #[error("password too weak: {0}")]
    WeakPassword(String),

    #[error("invalid email address")]
    InvalidEmail,

    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("account not found")]
    AccountNotFound,

    #[error("account disabled")]
    AccountDisabled,

    #[error("invalid or expired action code")]
    InvalidActionCode,

    #[error("too many attempts, try again later")]
    RateLimited,

    #[error("request requires a signed-in identity")]
    Unauthenticated,

    #[error("request rejected: {0}")]
    Rejected(String),

    #[error("service unavailable: {0}")]
    Unavailable(String),

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("unexpected response: {0}")]
    Decode(String),
}

impl BackendError {
    /// Maps an identity toolkit error code (e.g. `EMAIL_EXISTS`) to an error.
    ///
    /// Codes may carry a trailing explanation after ` : `, as in
    /// `WEAK_PASSWORD : Password should be at least 6 characters`.
    pub fn from_identity_code(message: &str) -> Self {
        let (code, detail) = match message.split_once(" : ") {
            Some((code, detail)) => (code.trim(), detail.trim()),
            None => (message.trim(), ""),
        };

        match code {
            "EMAIL_EXISTS" => Self::EmailExists,
            "WEAK_PASSWORD" => Self::WeakPassword(detail.to_string()),
            "INVALID_EMAIL" | "MISSING_EMAIL" => Self::InvalidEmail,
            "INVALID_PASSWORD" | "INVALID_LOGIN_CREDENTIALS" | "MISSING_PASSWORD" => {
                Self::InvalidCredentials
            }
            "EMAIL_NOT_FOUND" | "USER_NOT_FOUND" => Self::AccountNotFound,
            "USER_DISABLED" => Self::AccountDisabled,
            "INVALID_OOB_CODE" | "EXPIRED_OOB_CODE" => Self::InvalidActionCode,
            "TOO_MANY_ATTEMPTS_TRY_LATER" => Self::RateLimited,
            "INVALID_ID_TOKEN" | "TOKEN_EXPIRED" | "INVALID_REFRESH_TOKEN" | "CREDENTIAL_TOO_OLD_LOGIN_AGAIN" => {
                Self::Unauthenticated
            }
            other => Self::Rejected(other.to_string()),
        }
    }

    /// Whether the failure came from the network or an unreadable response
    /// rather than a decision made by the backend.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Transport(_) | Self::Decode(_) | Self::RateLimited | Self::Unavailable(_)
        )
    }
}

pub type BackendResult<T> = Result<T, BackendError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_codes_map_to_variants() {
        assert!(matches!(
            BackendError::from_identity_code("EMAIL_EXISTS"),
            BackendError::EmailExists
        ));
        assert!(matches!(
            BackendError::from_identity_code("INVALID_LOGIN_CREDENTIALS"),
            BackendError::InvalidCredentials
        ));
        assert!(matches!(
            BackendError::from_identity_code("EXPIRED_OOB_CODE"),
            BackendError::InvalidActionCode
        ));
    }

    #[test]
    fn weak_password_keeps_detail() {
        match BackendError::from_identity_code(
            "WEAK_PASSWORD : Password should be at least 6 characters",
        ) {
            BackendError::WeakPassword(detail) => {
                assert_eq!(detail, "Password should be at least 6 characters")
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn unknown_codes_are_rejections() {
        let error = BackendError::from_identity_code("PROJECT_NOT_FOUND");
        assert_eq!(error.to_string(), "request rejected: PROJECT_NOT_FOUND");
        assert!(!error.is_transient());
    }
}
