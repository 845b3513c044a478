use std::sync::Arc;

use anyhow::{Context, Result};
use reqwest::Url;
use serde::Deserialize;
use tracing::debug;

use crate::cache::{CacheRouter, HttpResponse, Transport};
use crate::models::Passage;
use crate::reader::VerseSource;

use super::ApiError;

/// Client for `GET <api_base>/<reference>?translation=<translation>`.
/// Clone is cheap - the router is shared.
pub struct VerseClient<T> {
    router: Arc<CacheRouter<T>>,
    api_base: Url,
    translation: String,
}

impl<T> Clone for VerseClient<T> {
    fn clone(&self) -> Self {
        Self {
            router: Arc::clone(&self.router),
            api_base: self.api_base.clone(),
            translation: self.translation.clone(),
        }
    }
}

impl<T: Transport> VerseClient<T> {
    pub fn new(router: Arc<CacheRouter<T>>, api_base: Url, translation: &str) -> Self {
        Self {
            router,
            api_base,
            translation: translation.to_string(),
        }
    }

    /// URL for a single reference; the reference becomes one
    /// percent-encoded path segment.
    pub fn passage_url(&self, reference: &str) -> Result<Url> {
        let mut url = self.api_base.clone();
        url.path_segments_mut()
            .map_err(|_| anyhow::anyhow!("API base {} cannot take a path", self.api_base))?
            .pop_if_empty()
            .push(reference.trim());
        url.query_pairs_mut()
            .clear()
            .append_pair("translation", &self.translation);
        Ok(url)
    }

    pub async fn fetch_passage(&self, reference: &str) -> Result<Passage> {
        let url = self.passage_url(reference)?;
        debug!(reference, %url, "Fetching passage");

        let response = self
            .router
            .get(url)
            .await
            .with_context(|| format!("Failed to fetch {}", reference))?;

        if !response.is_success() {
            return Err(ApiError::from_status(response.status, &error_detail(&response)).into());
        }

        let mut passage: Passage = response.json()?;
        passage.cached_at = response.cached_at();
        Ok(passage)
    }
}

/// The `message` or `error` field of a JSON error body, else the raw body.
fn error_detail(response: &HttpResponse) -> String {
    #[derive(Deserialize)]
    struct ErrorBody {
        error: Option<String>,
        message: Option<String>,
    }

    match response.json::<ErrorBody>() {
        Ok(ErrorBody { message: Some(m), .. }) | Ok(ErrorBody { error: Some(m), .. }) => m,
        _ => response.text(),
    }
}

impl<T: Transport> VerseSource for VerseClient<T> {
    async fn fetch_passage(&self, reference: &str) -> Result<Passage> {
        VerseClient::fetch_passage(self, reference).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{BucketStore, Origins, ResponseSource};
    use reqwest::Request;

    /// Serves a canned chapter for John 3 and a 404 for everything else.
    struct CannedTransport;

    impl Transport for CannedTransport {
        async fn execute(&self, request: Request) -> Result<HttpResponse> {
            let url = request.url().to_string();
            let (status, body) = if request.url().path() == "/John%203" {
                (200, r#"{"reference":"John 3","verses":[{"verse":16,"text":"For God so loved the world"}]}"#)
            } else {
                (404, r#"{"error":"not found"}"#)
            };
            Ok(HttpResponse {
                url,
                status,
                content_type: Some("application/json".to_string()),
                body: body.as_bytes().to_vec(),
                source: ResponseSource::Network,
            })
        }
    }

    fn client(dir: &tempfile::TempDir) -> VerseClient<CannedTransport> {
        let api = Url::parse("https://bible-api.com").unwrap();
        let store = BucketStore::new(dir.path().to_path_buf()).unwrap();
        let router = CacheRouter::new(CannedTransport, store, Origins::new(None, &api, None));
        VerseClient::new(Arc::new(router), api, "kjv")
    }

    #[test]
    fn test_passage_url_encodes_reference() {
        let dir = tempfile::tempdir().unwrap();
        let url = client(&dir).passage_url("1 Kings 15:1-24").unwrap();
        assert_eq!(
            url.as_str(),
            "https://bible-api.com/1%20Kings%2015:1-24?translation=kjv"
        );
    }

    #[tokio::test]
    async fn test_fetch_passage() {
        let dir = tempfile::tempdir().unwrap();
        let passage = client(&dir).fetch_passage("John 3").await.unwrap();
        assert_eq!(passage.reference, "John 3");
        assert_eq!(passage.verses.len(), 1);
    }

    #[tokio::test]
    async fn test_non_success_status_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = client(&dir).fetch_passage("Hezekiah 1").await.unwrap_err();
        let api_err = err.downcast_ref::<ApiError>().unwrap();
        assert_eq!(api_err.status(), Some(404));
        assert_eq!(api_err.to_string(), "Not found: not found");
    }

    #[test]
    fn test_offline_detail_is_readable() {
        let url = Url::parse("https://bible-api.com/John%203").unwrap();
        let offline = crate::cache::router::offline_response(&url);
        assert_eq!(
            error_detail(&offline),
            "Verse service unavailable and no cached copy exists"
        );
    }
}
