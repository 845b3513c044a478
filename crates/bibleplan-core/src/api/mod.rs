//! REST client for the public verse API (`bible-api.com`).
//!
//! All requests go through the offline `CacheRouter`, so chapters that were
//! read once stay readable without a connection.

pub mod client;
pub mod error;

pub use client::VerseClient;
pub use error::ApiError;
