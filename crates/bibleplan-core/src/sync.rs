//! Remote mirror of the completed-days set.
//!
//! The remote store keeps one document per user at
//! `<sync_url>/users/<user_id>/progress`. Writes merge into the document,
//! reads return it whole. Last writer wins.
//!
//! The app pushes through [`ProgressSync::spawn_pusher`], which sends one
//! request at a time so an older set can never land after a newer one.

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use reqwest::header::{HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Body, Method, Request, Url};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::api::ApiError;
use crate::auth::Identity;
use crate::cache::{CacheRouter, Transport};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProgressDocument {
    #[serde(default)]
    pub completed_days: Vec<u32>,
    #[serde(default)]
    pub last_updated: Option<DateTime<Utc>>,
}

pub struct ProgressSync<T> {
    router: Arc<CacheRouter<T>>,
    base: Url,
}

impl<T> Clone for ProgressSync<T> {
    fn clone(&self) -> Self {
        Self {
            router: Arc::clone(&self.router),
            base: self.base.clone(),
        }
    }
}

impl<T: Transport> ProgressSync<T> {
    pub fn new(router: Arc<CacheRouter<T>>, base: Url) -> Self {
        Self { router, base }
    }

    pub fn document_url(&self, user_id: &str) -> Result<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| anyhow::anyhow!("Sync URL {} cannot take a path", self.base))?
            .pop_if_empty()
            .extend(["users", user_id, "progress"]);
        Ok(url)
    }

    /// Write the full set of completed days.
    pub async fn push(&self, identity: &Identity, days: &[u32]) -> Result<()> {
        let document = ProgressDocument {
            completed_days: days.to_vec(),
            last_updated: Some(Utc::now()),
        };
        let body = serde_json::to_string(&document)?;

        let mut request = self.request(Method::PATCH, identity)?;
        request
            .headers_mut()
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        *request.body_mut() = Some(Body::from(body));

        let response = self
            .router
            .fetch(request)
            .await
            .context("Failed to push progress")?;
        if !response.is_success() {
            return Err(ApiError::from_status(response.status, &response.text()).into());
        }
        info!(user_id = %identity.user_id, days = days.len(), "Progress pushed");
        Ok(())
    }

    /// Read the remote set. `None` when the user has no document yet.
    pub async fn pull(&self, identity: &Identity) -> Result<Option<Vec<u32>>> {
        let request = self.request(Method::GET, identity)?;
        let response = self
            .router
            .fetch(request)
            .await
            .context("Failed to pull progress")?;

        if response.status == 404 {
            debug!(user_id = %identity.user_id, "No remote progress document");
            return Ok(None);
        }
        if !response.is_success() {
            return Err(ApiError::from_status(response.status, &response.text()).into());
        }
        let document: ProgressDocument = response.json()?;
        Ok(Some(document.completed_days))
    }

    /// Push `days` now and then every set sent on the returned channel, one
    /// request at a time. Sets sent while a push is in flight collapse into
    /// the newest. The task ends once the sender is dropped.
    pub fn spawn_pusher(
        &self,
        identity: Identity,
        days: Vec<u32>,
    ) -> (watch::Sender<Vec<u32>>, JoinHandle<()>)
    where
        T: 'static,
    {
        let (tx, mut rx) = watch::channel(days);
        let sync = self.clone();
        let handle = tokio::spawn(async move {
            loop {
                let days = rx.borrow_and_update().clone();
                if let Err(e) = sync.push(&identity, &days).await {
                    warn!(error = %e, "Failed to push progress");
                }
                if rx.changed().await.is_err() {
                    break;
                }
            }
        });
        (tx, handle)
    }

    fn request(&self, method: Method, identity: &Identity) -> Result<Request> {
        let url = self.document_url(&identity.user_id)?;
        let mut request = Request::new(method, url);
        let bearer = HeaderValue::from_str(&format!("Bearer {}", identity.token))
            .context("Sync token is not a valid header value")?;
        request.headers_mut().insert(AUTHORIZATION, bearer);
        Ok(request)
    }
}
