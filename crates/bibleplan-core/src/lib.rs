//! Core library for bibleplan: a day-by-day Bible reading plan that works
//! offline.
//!
//! - `reference`: expand a day's reference string into fetchable references
//! - `reader`: load a day, fetching every passage concurrently
//! - `progress` / `sync`: completed days, stored locally and mirrored remotely
//! - `cache`: the offline-first request router and its disk buckets
//! - `api`: the verse API client
//! - `auth`: signed-in user and sync token
//!
//! The terminal front end lives in the `bibleplan-tui` crate.

pub mod api;
pub mod auth;
pub mod cache;
pub mod config;
pub mod models;
pub mod preferences;
pub mod progress;
pub mod reader;
pub mod reference;
pub mod storage;
pub mod sync;
