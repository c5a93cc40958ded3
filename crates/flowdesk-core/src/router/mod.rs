//! In-app navigation.
//!
//! `Router` resolves paths to views and consults the `NavigationGuard`
//! before every transition. Anonymous users end up on the login view.

pub mod guard;
pub mod routes;

pub use guard::{Decision, NavigationGuard, SessionState};
pub use routes::{Destination, Route};

use tracing::debug;

use crate::auth::{SharedStore, StoreError};

/// Where a navigation attempt ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Navigation {
    Arrived(Route),
    /// The guard sent the user to the login view instead
    Redirected(Route),
    /// Guard passed but no view matches the path
    NotFound(String),
}

pub struct Router {
    guard: NavigationGuard,
    current: Option<Route>,
}

impl Router {
    pub fn new(store: SharedStore) -> Self {
        Self {
            guard: NavigationGuard::new(store),
            current: None,
        }
    }

    pub fn guard(&self) -> &NavigationGuard {
        &self.guard
    }

    /// The view currently shown, if any navigation has completed
    pub fn current(&self) -> Option<Route> {
        self.current
    }

    pub fn navigate(&mut self, path: &str) -> Result<Navigation, StoreError> {
        let destination = Destination::resolve(path);
        let navigation = match self.guard.check(&destination)? {
            Decision::RedirectToLogin => Navigation::Redirected(Route::Login),
            Decision::Proceed => match destination {
                Destination::Route(route) => Navigation::Arrived(route),
                Destination::Unmatched(path) => Navigation::NotFound(path),
            },
        };

        match navigation {
            Navigation::Arrived(route) | Navigation::Redirected(route) => {
                self.current = Some(route);
            }
            Navigation::NotFound(_) => {}
        }
        debug!(path, ?navigation, "Navigation resolved");
        Ok(navigation)
    }

    /// Drop whatever is shown and start over at login, bypassing the guard.
    /// Used when the session has been invalidated.
    pub fn reset_to_login(&mut self) {
        self.current = Some(Route::Login);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{Credential, CredentialStore, MemoryStore};

    #[test]
    fn test_anonymous_dashboard_redirects_to_login() {
        let mut router = Router::new(MemoryStore::new().shared());
        assert_eq!(
            router.navigate("/dashboard").unwrap(),
            Navigation::Redirected(Route::Login)
        );
        assert_eq!(router.current(), Some(Route::Login));
    }

    #[test]
    fn test_login_reachable_with_token() {
        let store = MemoryStore::with_credential(Credential {
            token: Some("abc".to_string()),
            ..Credential::default()
        });
        let mut router = Router::new(store.shared());
        assert_eq!(router.navigate("/login").unwrap(), Navigation::Arrived(Route::Login));
    }

    #[test]
    fn test_root_lands_on_dashboard_when_logged_in() {
        let store = MemoryStore::with_credential(Credential::new("abc", "u", "user"));
        let mut router = Router::new(store.shared());
        assert_eq!(router.navigate("/").unwrap(), Navigation::Arrived(Route::Dashboard));
        assert_eq!(router.current(), Some(Route::Dashboard));
    }

    #[test]
    fn test_unknown_path_keeps_current_view() {
        let store = MemoryStore::with_credential(Credential::new("abc", "u", "user"));
        let mut router = Router::new(store.shared());
        router.navigate("/tasks").unwrap();

        assert_eq!(
            router.navigate("/reports").unwrap(),
            Navigation::NotFound("/reports".to_string())
        );
        assert_eq!(router.current(), Some(Route::Tasks));
    }

    #[test]
    fn test_session_loss_observed_on_next_navigation() {
        let store = MemoryStore::with_credential(Credential::new("abc", "u", "admin")).shared();
        let mut router = Router::new(store.clone());
        assert_eq!(router.navigate("/users").unwrap(), Navigation::Arrived(Route::Users));

        store.clear().unwrap();
        assert_eq!(
            router.navigate("/users").unwrap(),
            Navigation::Redirected(Route::Login)
        );
    }

    #[test]
    fn test_reset_to_login() {
        let store = MemoryStore::with_credential(Credential::new("abc", "u", "admin"));
        let mut router = Router::new(store.shared());
        router.navigate("/logs").unwrap();
        router.reset_to_login();
        assert_eq!(router.current(), Some(Route::Login));
    }
}
