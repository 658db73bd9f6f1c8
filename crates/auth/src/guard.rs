use brandmarket_config::AuthConfig;
use url::form_urlencoded;

use crate::session::{Session, SessionUser};
use crate::subscription::SessionSubscription;

/// Outcome of checking a path against the session.
#[derive(Debug, Clone, PartialEq)]
pub enum Access {
    /// Render the view. Carries the user when the session is authenticated.
    Allow(Option<SessionUser>),
    /// The session is still loading: render nothing and do not redirect yet.
    Pending,
    Redirect { to: String },
}

/// Gate in front of protected views.
pub struct RouteGuard {
    protected_routes: Vec<String>,
    sign_in_path: String,
    subscription: SessionSubscription,
}

impl RouteGuard {
    pub fn new(config: &AuthConfig, subscription: SessionSubscription) -> Self {
        Self {
            protected_routes: config
                .protected_routes
                .iter()
                .map(|route| normalize(route).to_string())
                .collect(),
            sign_in_path: config.sign_in_path.clone(),
            subscription,
        }
    }

    /// Whether `path` is one of the protected routes or nested below one.
    /// Query strings and fragments are ignored.
    pub fn is_protected(&self, path: &str) -> bool {
        let path = normalize(path);
        self.protected_routes.iter().any(|route| {
            path == route
                || path
                    .strip_prefix(route.as_str())
                    .is_some_and(|rest| rest.starts_with('/'))
        })
    }

    pub fn decide(&self, session: &Session, path: &str) -> Access {
        if !self.is_protected(path) {
            return Access::Allow(session.user().cloned());
        }

        match session {
            Session::Loading => Access::Pending,
            Session::Anonymous => Access::Redirect {
                to: self.sign_in_redirect(path),
            },
            Session::Authenticated(user) => Access::Allow(Some(user.clone())),
        }
    }

    /// Wait until the session is resolved, then decide. A guard whose
    /// session manager is gone treats every visitor as anonymous.
    pub async fn resolve(&mut self, path: &str) -> Access {
        let session = self
            .subscription
            .resolved()
            .await
            .unwrap_or(Session::Anonymous);
        self.decide(&session, path)
    }

    fn sign_in_redirect(&self, path: &str) -> String {
        let target: String = form_urlencoded::byte_serialize(path.as_bytes()).collect();
        format!("{}?redirect={target}", self.sign_in_path)
    }
}

fn normalize(path: &str) -> &str {
    let path = path.split(['?', '#']).next().unwrap_or(path);
    match path.trim_end_matches('/') {
        "" => "/",
        trimmed => trimmed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::watch;

    fn guard(session: Session) -> (watch::Sender<Session>, RouteGuard) {
        let (sender, receiver) = watch::channel(session);
        let guard = RouteGuard::new(&AuthConfig::default(), SessionSubscription::new(receiver));
        (sender, guard)
    }

    #[test]
    fn nested_and_query_paths_are_protected() {
        let (_sender, guard) = guard(Session::Anonymous);
        assert!(guard.is_protected("/profile"));
        assert!(guard.is_protected("/profile/"));
        assert!(guard.is_protected("/my-listings/42"));
        assert!(guard.is_protected("/create-listing?step=2"));
        assert!(!guard.is_protected("/profiles"));
        assert!(!guard.is_protected("/listings"));
        assert!(!guard.is_protected("/"));
    }

    #[test]
    fn anonymous_visitor_is_redirected_with_return_path() {
        let (_sender, guard) = guard(Session::Anonymous);
        assert_eq!(
            guard.decide(&Session::Anonymous, "/create-listing"),
            Access::Redirect {
                to: "/signin?redirect=%2Fcreate-listing".to_string()
            }
        );
    }

    #[test]
    fn loading_session_is_pending_only_on_protected_paths() {
        let (_sender, guard) = guard(Session::Loading);
        assert_eq!(guard.decide(&Session::Loading, "/profile"), Access::Pending);
        assert_eq!(guard.decide(&Session::Loading, "/about"), Access::Allow(None));
    }

    #[tokio::test]
    async fn resolve_waits_for_the_first_resolved_state() {
        let (sender, mut guard) = guard(Session::Loading);

        let decision = tokio::spawn(async move { guard.resolve("/consultation").await });
        sender.send_replace(Session::Anonymous);

        assert_eq!(
            decision.await.unwrap(),
            Access::Redirect {
                to: "/signin?redirect=%2Fconsultation".to_string()
            }
        );
    }
}
