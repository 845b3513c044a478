use std::future::Future;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::{header, Client, Method, Request, Url};
use tracing::{debug, info, warn};

use super::manager::BucketStore;
use super::response::{HttpResponse, ResponseSource};

// ============================================================================
// Constants
// ============================================================================

/// Bucket for same-origin static assets (the reading plan).
pub const ASSET_BUCKET: &str = "bibleplan-assets-v1";

/// Bucket for web fonts.
pub const FONT_BUCKET: &str = "bibleplan-fonts-v1";

/// Bucket for verse API responses.
pub const API_BUCKET: &str = "bibleplan-api-v1";

/// Buckets that survive activation. Bump a version to invalidate it.
pub const CURRENT_BUCKETS: [&str; 3] = [ASSET_BUCKET, FONT_BUCKET, API_BUCKET];

const FONT_HOSTS: [&str; 2] = ["fonts.googleapis.com", "fonts.gstatic.com"];

/// HTTP request timeout in seconds.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Status of the made-up response for an unreachable verse API.
const OFFLINE_STATUS: u16 = 503;

// ============================================================================
// Transport
// ============================================================================

/// Sends a request over the network.
pub trait Transport: Send + Sync {
    fn execute(&self, request: Request) -> impl Future<Output = Result<HttpResponse>> + Send;
}

/// Production transport backed by a shared `reqwest::Client`.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;
        Ok(Self { client })
    }
}

impl Transport for ReqwestTransport {
    async fn execute(&self, request: Request) -> Result<HttpResponse> {
        let url = request.url().to_string();
        let response = self
            .client
            .execute(request)
            .await
            .with_context(|| format!("Failed to send request to {}", url))?;

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response
            .bytes()
            .await
            .with_context(|| format!("Failed to read response body from {}", url))?;

        Ok(HttpResponse {
            url,
            status,
            content_type,
            body: body.to_vec(),
            source: ResponseSource::Network,
        })
    }
}

// ============================================================================
// Routing table
// ============================================================================

/// Coarse classification of a request by where it is going.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostClass {
    LocalAsset,
    FontProvider,
    VerseApi,
    Identity,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Serve the cached copy if present, else fetch and populate.
    CacheFirst { bucket: &'static str },
    /// Try the network first; on failure fall back to `bucket` (or every
    /// bucket when `None`) and, if `offline_response` is set, to a synthetic
    /// 503 response.
    NetworkFirst {
        bucket: Option<&'static str>,
        offline_response: bool,
    },
    /// Never cache.
    NetworkOnly,
}

impl HostClass {
    pub fn strategy(self) -> Strategy {
        match self {
            HostClass::LocalAsset => Strategy::CacheFirst { bucket: ASSET_BUCKET },
            HostClass::FontProvider => Strategy::CacheFirst { bucket: FONT_BUCKET },
            HostClass::VerseApi => Strategy::NetworkFirst {
                bucket: Some(API_BUCKET),
                offline_response: true,
            },
            HostClass::Identity => Strategy::NetworkOnly,
            HostClass::Other => Strategy::NetworkFirst {
                bucket: None,
                offline_response: false,
            },
        }
    }
}

/// The hosts the router needs to tell apart.
#[derive(Debug, Clone, Default)]
pub struct Origins {
    /// Serialized origin of the app's own static assets.
    pub local: Option<String>,
    pub verse_api_host: Option<String>,
    pub identity_host: Option<String>,
}

impl Origins {
    pub fn new(local: Option<&Url>, verse_api: &Url, identity: Option<&Url>) -> Self {
        Self {
            local: local.map(|u| u.origin().ascii_serialization()),
            verse_api_host: verse_api.host_str().map(str::to_string),
            identity_host: identity.and_then(|u| u.host_str()).map(str::to_string),
        }
    }

    pub fn classify(&self, url: &Url) -> HostClass {
        let host = url.host_str();
        if self.local.as_deref() == Some(url.origin().ascii_serialization().as_str()) {
            HostClass::LocalAsset
        } else if host.is_some_and(|h| FONT_HOSTS.contains(&h)) {
            HostClass::FontProvider
        } else if host.is_some() && host == self.verse_api_host.as_deref() {
            HostClass::VerseApi
        } else if host.is_some() && host == self.identity_host.as_deref() {
            HostClass::Identity
        } else {
            HostClass::Other
        }
    }
}

/// JSON error body returned when the verse API is unreachable and nothing is
/// cached.
pub fn offline_response(url: &Url) -> HttpResponse {
    let body = serde_json::json!({
        "error": "offline",
        "message": "Verse service unavailable and no cached copy exists",
        "url": url.as_str(),
    });
    HttpResponse {
        url: url.to_string(),
        status: OFFLINE_STATUS,
        content_type: Some("application/json".to_string()),
        body: body.to_string().into_bytes(),
        source: ResponseSource::Synthetic,
    }
}

// ============================================================================
// Router
// ============================================================================

/// Routes every outbound request through the strategy for its host class.
pub struct CacheRouter<T> {
    transport: T,
    store: BucketStore,
    origins: Origins,
}

impl<T: Transport> CacheRouter<T> {
    pub fn new(transport: T, store: BucketStore, origins: Origins) -> Self {
        Self {
            transport,
            store,
            origins,
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn classify(&self, url: &Url) -> HostClass {
        self.origins.classify(url)
    }

    pub async fn get(&self, url: Url) -> Result<HttpResponse> {
        self.fetch(Request::new(Method::GET, url)).await
    }

    /// Send `request`, applying the caching strategy for its host.
    /// Non-GET requests are passed straight through.
    pub async fn fetch(&self, request: Request) -> Result<HttpResponse> {
        if request.method() != Method::GET {
            return self.transport.execute(request).await;
        }

        let class = self.classify(request.url());
        debug!(url = %request.url(), ?class, "Routing request");

        match class.strategy() {
            Strategy::CacheFirst { bucket } => self.cache_first(bucket, request).await,
            Strategy::NetworkFirst {
                bucket,
                offline_response,
            } => self.network_first(bucket, offline_response, request).await,
            Strategy::NetworkOnly => self.transport.execute(request).await,
        }
    }

    async fn cache_first(&self, bucket: &str, request: Request) -> Result<HttpResponse> {
        let url = request.url().to_string();
        if let Some(hit) = self.lookup(Some(bucket), &url) {
            return Ok(hit);
        }

        let response = self.transport.execute(request).await?;
        if response.is_success() {
            self.store_best_effort(bucket, &url, &response);
        }
        Ok(response)
    }

    async fn network_first(
        &self,
        bucket: Option<&str>,
        offline: bool,
        request: Request,
    ) -> Result<HttpResponse> {
        let url = request.url().clone();
        match self.transport.execute(request).await {
            Ok(response) => {
                if let Some(bucket) = bucket {
                    if response.is_success() {
                        self.store_best_effort(bucket, url.as_str(), &response);
                    }
                }
                Ok(response)
            }
            Err(e) => {
                debug!(url = %url, error = %e, "Network failed, trying cache");
                if let Some(hit) = self.lookup(bucket, url.as_str()) {
                    return Ok(hit);
                }
                if offline {
                    warn!(url = %url, "Offline with no cached copy");
                    return Ok(offline_response(&url));
                }
                Err(e)
            }
        }
    }

    /// Cache lookup that treats read errors as a miss.
    fn lookup(&self, bucket: Option<&str>, url: &str) -> Option<HttpResponse> {
        let result = match bucket {
            Some(bucket) => self.store.get(bucket, url),
            None => self.store.match_any(url),
        };
        match result {
            Ok(hit) => hit,
            Err(e) => {
                debug!(url, error = %e, "Cache lookup failed");
                None
            }
        }
    }

    fn store_best_effort(&self, bucket: &str, url: &str, response: &HttpResponse) {
        if let Err(e) = self.store.put(bucket, url, response) {
            warn!(bucket, url, error = %e, "Failed to cache response");
        }
    }

    /// Precache static assets. Failures are logged and skipped.
    pub async fn install(&self, urls: &[Url]) {
        for url in urls {
            match self.transport.execute(Request::new(Method::GET, url.clone())).await {
                Ok(response) if response.is_success() => {
                    self.store_best_effort(ASSET_BUCKET, url.as_str(), &response);
                }
                Ok(response) => {
                    warn!(url = %url, status = response.status, "Precache skipped");
                }
                Err(e) => {
                    debug!(url = %url, error = %e, "Precache failed");
                }
            }
        }
    }

    /// Delete every bucket that is not in [`CURRENT_BUCKETS`].
    /// Returns the names of the deleted buckets.
    pub fn activate(&self) -> Result<Vec<String>> {
        let mut deleted = Vec::new();
        for name in self.store.bucket_names()? {
            if CURRENT_BUCKETS.contains(&name.as_str()) {
                continue;
            }
            if self.store.delete_bucket(&name)? {
                info!(bucket = %name, "Deleted stale cache bucket");
                deleted.push(name);
            }
        }
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    /// Echoes the URL back while online, fails while offline.
    struct MockTransport {
        online: AtomicBool,
        calls: AtomicUsize,
    }

    impl MockTransport {
        fn new() -> Self {
            Self {
                online: AtomicBool::new(true),
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl Transport for MockTransport {
        async fn execute(&self, request: Request) -> Result<HttpResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.online.load(Ordering::SeqCst) {
                anyhow::bail!("connection refused");
            }
            Ok(HttpResponse {
                url: request.url().to_string(),
                status: 200,
                content_type: Some("application/json".to_string()),
                body: format!("{} {}", request.method(), request.url()).into_bytes(),
                source: ResponseSource::Network,
            })
        }
    }

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    fn router(dir: &tempfile::TempDir) -> CacheRouter<MockTransport> {
        let origins = Origins::new(
            Some(&url("https://plan.example.org/plan.json")),
            &url("https://bible-api.com"),
            Some(&url("https://sync.example.org/v1")),
        );
        let store = BucketStore::new(dir.path().to_path_buf()).unwrap();
        CacheRouter::new(MockTransport::new(), store, origins)
    }

    fn go_offline(router: &CacheRouter<MockTransport>) {
        router.transport.online.store(false, Ordering::SeqCst);
    }

    fn calls(router: &CacheRouter<MockTransport>) -> usize {
        router.transport.calls.load(Ordering::SeqCst)
    }

    #[test]
    fn test_classify() {
        let dir = tempfile::tempdir().unwrap();
        let router = router(&dir);
        assert_eq!(router.classify(&url("https://plan.example.org/icon.svg")), HostClass::LocalAsset);
        assert_eq!(router.classify(&url("https://fonts.gstatic.com/s/a.woff2")), HostClass::FontProvider);
        assert_eq!(router.classify(&url("https://bible-api.com/John%203")), HostClass::VerseApi);
        assert_eq!(router.classify(&url("https://sync.example.org/v1/users/a")), HostClass::Identity);
        assert_eq!(router.classify(&url("https://example.com/")), HostClass::Other);
        // Same host on another port is another origin
        assert_eq!(router.classify(&url("https://plan.example.org:8443/plan.json")), HostClass::Other);
    }

    #[tokio::test]
    async fn test_local_assets_are_cache_first() {
        let dir = tempfile::tempdir().unwrap();
        let router = router(&dir);
        let plan = url("https://plan.example.org/plan.json");

        let first = router.get(plan.clone()).await.unwrap();
        assert_eq!(first.source, ResponseSource::Network);
        let second = router.get(plan.clone()).await.unwrap();
        assert!(matches!(second.source, ResponseSource::Cache { .. }));
        assert_eq!(second.body, first.body);
        assert_eq!(calls(&router), 1);
    }

    #[tokio::test]
    async fn test_verse_api_is_network_first_with_cache_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let router = router(&dir);
        let chapter = url("https://bible-api.com/Genesis%201?translation=kjv");

        let live = router.get(chapter.clone()).await.unwrap();
        assert_eq!(live.source, ResponseSource::Network);
        // Online requests always hit the network
        router.get(chapter.clone()).await.unwrap();
        assert_eq!(calls(&router), 2);

        go_offline(&router);
        let cached = router.get(chapter).await.unwrap();
        assert!(cached.cached_at().is_some());
        assert_eq!(cached.body, live.body);
    }

    #[tokio::test]
    async fn test_verse_api_offline_without_cache_is_synthetic_503() {
        let dir = tempfile::tempdir().unwrap();
        let router = router(&dir);
        go_offline(&router);

        let response = router
            .get(url("https://bible-api.com/Psalm%2023?translation=kjv"))
            .await
            .unwrap();
        assert_eq!(response.status, 503);
        assert_eq!(response.source, ResponseSource::Synthetic);
        let body: serde_json::Value = response.json().unwrap();
        assert_eq!(body["error"], "offline");
    }

    #[tokio::test]
    async fn test_identity_host_is_never_cached() {
        let dir = tempfile::tempdir().unwrap();
        let router = router(&dir);
        let doc = url("https://sync.example.org/v1/users/u1/progress");

        router.get(doc.clone()).await.unwrap();
        go_offline(&router);
        assert!(router.get(doc).await.is_err());
        assert!(router.store.bucket_names().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_other_hosts_fall_back_to_any_bucket() {
        let dir = tempfile::tempdir().unwrap();
        let router = router(&dir);
        let page = url("https://example.com/page");

        go_offline(&router);
        assert!(router.get(page.clone()).await.is_err());

        let seeded = HttpResponse {
            url: page.to_string(),
            status: 200,
            content_type: None,
            body: b"seeded".to_vec(),
            source: ResponseSource::Network,
        };
        router.store.put(ASSET_BUCKET, page.as_str(), &seeded).unwrap();
        let hit = router.get(page).await.unwrap();
        assert_eq!(hit.body, b"seeded");
    }

    #[tokio::test]
    async fn test_non_get_requests_pass_through() {
        let dir = tempfile::tempdir().unwrap();
        let router = router(&dir);
        let chapter = url("https://bible-api.com/John%201?translation=kjv");
        router.get(chapter.clone()).await.unwrap();

        go_offline(&router);
        let result = router.fetch(Request::new(Method::POST, chapter)).await;
        // No cache fallback and no synthetic response
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_install_precaches_assets() {
        let dir = tempfile::tempdir().unwrap();
        let router = router(&dir);
        let plan = url("https://plan.example.org/plan.json");

        router.install(std::slice::from_ref(&plan)).await;
        go_offline(&router);
        let cached = router.get(plan).await.unwrap();
        assert!(cached.cached_at().is_some());
    }

    #[test]
    fn test_activate_deletes_stale_buckets() {
        let dir = tempfile::tempdir().unwrap();
        let router = router(&dir);
        let entry = HttpResponse {
            url: "https://example.com/".to_string(),
            status: 200,
            content_type: None,
            body: Vec::new(),
            source: ResponseSource::Network,
        };
        router.store.put("bibleplan-api-v0", &entry.url, &entry).unwrap();
        router.store.put(API_BUCKET, &entry.url, &entry).unwrap();

        let deleted = router.activate().unwrap();
        assert_eq!(deleted, vec!["bibleplan-api-v0".to_string()]);
        assert_eq!(router.store.bucket_names().unwrap(), vec![API_BUCKET.to_string()]);
    }
}
