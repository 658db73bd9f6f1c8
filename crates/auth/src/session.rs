use brandmarket_backend::IdentityHandle;

use crate::profile::UserProfile;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionStatus {
    Loading,
    Anonymous,
    Authenticated,
}

/// The process-wide view of who is signed in.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Session {
    /// The identity client has not reported its initial state yet.
    #[default]
    Loading,
    Anonymous,
    /// Only ever holds an identity whose email is verified.
    Authenticated(SessionUser),
}

impl Session {
    pub fn status(&self) -> SessionStatus {
        match self {
            Self::Loading => SessionStatus::Loading,
            Self::Anonymous => SessionStatus::Anonymous,
            Self::Authenticated(_) => SessionStatus::Authenticated,
        }
    }

    pub fn user(&self) -> Option<&SessionUser> {
        match self {
            Self::Authenticated(user) => Some(user),
            _ => None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        !matches!(self, Self::Loading)
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated(_))
    }
}

/// A verified identity merged with its profile document.
///
/// Profile fields take precedence over identity fields when both are set.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionUser {
    identity: IdentityHandle,
    profile: Option<UserProfile>,
}

impl SessionUser {
    pub(crate) fn new(identity: IdentityHandle, profile: Option<UserProfile>) -> Self {
        Self { identity, profile }
    }

    pub fn uid(&self) -> &str {
        &self.identity.uid
    }

    pub fn email(&self) -> &str {
        self.profile
            .as_ref()
            .map(|profile| profile.email.as_str())
            .filter(|email| !email.is_empty())
            .unwrap_or(&self.identity.email)
    }

    pub fn display_name(&self) -> Option<&str> {
        self.profile
            .as_ref()
            .map(|profile| profile.display_name.as_str())
            .filter(|name| !name.is_empty())
            .or(self.identity.display_name.as_deref())
    }

    pub fn mobile_number(&self) -> Option<&str> {
        self.profile
            .as_ref()
            .map(|profile| profile.mobile_number.as_str())
            .filter(|number| !number.is_empty())
    }

    /// Always true: unverified identities never become session users.
    pub fn email_verified(&self) -> bool {
        self.identity.email_verified
    }

    pub fn listings(&self) -> &[String] {
        self.profile
            .as_ref()
            .map_or(&[], |profile| profile.listings.as_slice())
    }

    pub fn profile(&self) -> Option<&UserProfile> {
        self.profile.as_ref()
    }

    pub fn identity(&self) -> &IdentityHandle {
        &self.identity
    }
}
