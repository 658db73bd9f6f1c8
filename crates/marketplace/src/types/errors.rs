//! Error types for the marketplace.

use brandmarket_auth::AuthError;
use brandmarket_backend::BackendError;
use thiserror::Error;

/// Listing-related errors
#[derive(Debug, Error)]
pub enum ListingError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("sign in to manage listings")]
    NotAuthenticated,

    #[error("listing {0} belongs to another seller")]
    NotOwner(String),

    #[error("invalid listing: {0}")]
    Validation(String),

    #[error("profile error: {0}")]
    Profile(AuthError),

    #[error("backend error: {0}")]
    Backend(#[from] BackendError),
}

impl From<AuthError> for ListingError {
    fn from(error: AuthError) -> Self {
        match error {
            AuthError::NotFound(what) => ListingError::NotFound(what),
            AuthError::NotAuthenticated => ListingError::NotAuthenticated,
            other => ListingError::Profile(other),
        }
    }
}

impl ListingError {
    pub fn is_transient(&self) -> bool {
        match self {
            ListingError::Backend(error) => error.is_transient(),
            ListingError::Profile(error) => error.is_transient(),
            _ => false,
        }
    }
}

/// Result type for listing operations
pub type ListingResult<T> = Result<T, ListingError>;
