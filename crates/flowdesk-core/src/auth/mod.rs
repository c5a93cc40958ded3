//! Session state for the flowdesk client.
//!
//! This module provides:
//! - `CredentialStore`: key-value storage for the token, username and role
//! - `MemoryStore` / `FileStore`: in-process and persisted backends
//! - `SessionEvents`: login, logout and invalidation notifications
//! - `PasswordVault`: remembered passwords via the OS keychain
//!
//! The persisted store keeps a user logged in across restarts.

pub mod credentials;
pub mod events;
pub mod session;
pub mod vault;

pub use credentials::{Credential, CredentialKey, CredentialStore, MemoryStore, SharedStore, StoreError};
pub use events::{SessionEvent, SessionEvents};
pub use session::FileStore;
pub use vault::PasswordVault;
