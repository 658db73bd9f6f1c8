//! Session and access-gate management.
//!
//! [`SessionManager`] is the single owner of the process-wide [`Session`]:
//! it turns identity client notifications and user operations into session
//! transitions, and never exposes an identity whose email is unverified.
//! [`RouteGuard`] decides whether a protected path may be rendered.

mod error;
mod guard;
mod manager;
mod profile;
mod session;
mod subscription;
pub mod validation;

pub use error::AuthError;
pub use guard::{Access, RouteGuard};
pub use manager::SessionManager;
pub use profile::{ProfileRepository, ProfileUpdate, UserProfile};
pub use session::{Session, SessionStatus, SessionUser};
pub use subscription::SessionSubscription;
