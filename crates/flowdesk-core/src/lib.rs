//! Core library for flowdesk.
//!
//! The session layer of the flowdesk client: a credential store, an HTTP
//! client whose request pipeline attaches the bearer token and ends the
//! session on 401, and a navigation guard that keeps anonymous users on
//! the login view. Hosts compose these and subscribe to `SessionEvents`.

pub mod api;
pub mod auth;
pub mod config;
pub mod router;

pub use api::{ApiClient, ApiError};
pub use auth::{Credential, CredentialStore, FileStore, MemoryStore, SessionEvent, SessionEvents, SharedStore};
pub use config::{ClientConfig, Config};
pub use router::{Navigation, NavigationGuard, Route, Router};
