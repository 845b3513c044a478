use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;

use anyhow::{Context, Result};

/// Where a response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseSource {
    Network,
    Cache { cached_at: DateTime<Utc> },
    /// Made up by the router when nothing else was available.
    Synthetic,
}

/// A fully buffered HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub url: String,
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
    pub source: ResponseSource,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.body)
            .with_context(|| format!("Failed to parse JSON response from {}", self.url))
    }

    pub fn cached_at(&self) -> Option<DateTime<Utc>> {
        match self.source {
            ResponseSource::Cache { cached_at } => Some(cached_at),
            _ => None,
        }
    }
}
