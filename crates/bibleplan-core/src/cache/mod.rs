//! Offline caching for outbound HTTP requests.
//!
//! Every request the app makes goes through the `CacheRouter`, which picks a
//! caching strategy from the request's host class:
//!
//! - local static assets (the plan) and web fonts: cache-first
//! - the verse API: network-first, falling back to the cached copy and then
//!   to a synthetic 503 response
//! - the identity / sync provider: network-only
//! - anything else: network-first without a dedicated bucket
//!
//! Responses are stored by the `BucketStore` in named, versioned buckets on
//! disk. Buckets whose name is no longer current are deleted on activation.

pub mod manager;
pub mod response;
pub mod router;

pub use manager::{BucketStore, CachedData};
pub use response::{HttpResponse, ResponseSource};
pub use router::{
    CacheRouter, HostClass, Origins, ReqwestTransport, Strategy, Transport, API_BUCKET,
    ASSET_BUCKET, CURRENT_BUCKETS, FONT_BUCKET,
};
