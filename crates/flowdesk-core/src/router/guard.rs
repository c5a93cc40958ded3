use tracing::debug;

use super::routes::Destination;
use crate::auth::{CredentialStore, SharedStore, StoreError};

/// Outcome of consulting the guard before a view transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Proceed,
    RedirectToLogin,
}

/// Session state as seen by navigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Anonymous,
    Authenticated,
}

/// Keeps protected views from rendering without a token.
///
/// This is a presence check only: the token is never validated here. An
/// expired token gets through and is caught by the first API call that
/// returns 401. The store is read on every check, nothing is cached.
pub struct NavigationGuard {
    store: SharedStore,
}

impl NavigationGuard {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    pub fn state(&self) -> Result<SessionState, StoreError> {
        Ok(if self.store.token()?.is_some() {
            SessionState::Authenticated
        } else {
            SessionState::Anonymous
        })
    }

    pub fn check(&self, destination: &Destination) -> Result<Decision, StoreError> {
        // The login view is always reachable, or redirects would loop.
        if destination.is_login() {
            return Ok(Decision::Proceed);
        }

        match self.state()? {
            SessionState::Authenticated => Ok(Decision::Proceed),
            SessionState::Anonymous => {
                debug!(path = destination.path(), "No session, redirecting to login");
                Ok(Decision::RedirectToLogin)
            }
        }
    }
}
