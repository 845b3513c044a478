//! Identity for remote progress sync.
//!
//! This module provides:
//! - `Session`: which user is signed in, persisted to disk
//! - `CredentialStore`: the user's sync token in the OS keychain
//!
//! The token itself never touches the session file.

pub mod credentials;
pub mod session;

pub use credentials::CredentialStore;
pub use session::{Identity, Session, SessionData};
