use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::debug;

use super::response::{HttpResponse, ResponseSource};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedData<T> {
    pub data: T,
    pub cached_at: DateTime<Utc>,
}

impl<T> CachedData<T> {
    pub fn new(data: T) -> Self {
        Self {
            data,
            cached_at: Utc::now(),
        }
    }
}

pub fn age_minutes(cached_at: DateTime<Utc>) -> i64 {
    (Utc::now() - cached_at).num_minutes()
}

/// Human readable age, e.g. `"5m ago"`, `"2h ago"`, `"3d ago"`.
pub fn age_display(cached_at: DateTime<Utc>) -> String {
    let minutes = age_minutes(cached_at);
    if minutes < 1 {
        // Also covers clock skew
        "just now".to_string()
    } else if minutes < 60 {
        format!("{}m ago", minutes)
    } else if minutes < 1440 {
        let hours = minutes / 60;
        if minutes % 60 >= 30 {
            format!("{}h ago", hours + 1)
        } else {
            format!("{}h ago", hours)
        }
    } else {
        let days = minutes / 1440;
        if (minutes % 1440) / 60 >= 12 {
            format!("{}d ago", days + 1)
        } else {
            format!("{}d ago", days)
        }
    }
}

/// Metadata stored next to each cached body.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct EntryMeta {
    url: String,
    status: u16,
    content_type: Option<String>,
}

/// Named response buckets under a root directory.
///
/// Layout: `<root>/<bucket>/<sha256(url)>.json` holds the metadata and
/// `<sha256(url)>.body` the raw body.
pub struct BucketStore {
    root: PathBuf,
}

impl BucketStore {
    pub fn new(root: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    fn bucket_dir(&self, bucket: &str) -> PathBuf {
        self.root.join(bucket)
    }

    fn entry_key(url: &str) -> String {
        format!("{:x}", Sha256::digest(url.as_bytes()))
    }

    pub fn get(&self, bucket: &str, url: &str) -> Result<Option<HttpResponse>> {
        let dir = self.bucket_dir(bucket);
        let key = Self::entry_key(url);
        let meta_path = dir.join(format!("{}.json", key));
        let body_path = dir.join(format!("{}.body", key));
        if !meta_path.exists() || !body_path.exists() {
            return Ok(None);
        }

        let contents = std::fs::read_to_string(&meta_path)
            .with_context(|| format!("Failed to read cache entry in {}", bucket))?;
        let cached: CachedData<EntryMeta> = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse cache entry in {}", bucket))?;
        let body = std::fs::read(&body_path)
            .with_context(|| format!("Failed to read cached body in {}", bucket))?;

        Ok(Some(HttpResponse {
            url: cached.data.url,
            status: cached.data.status,
            content_type: cached.data.content_type,
            body,
            source: ResponseSource::Cache {
                cached_at: cached.cached_at,
            },
        }))
    }

    /// Store (or overwrite) the response for `url` in `bucket`.
    pub fn put(&self, bucket: &str, url: &str, response: &HttpResponse) -> Result<()> {
        let dir = self.bucket_dir(bucket);
        std::fs::create_dir_all(&dir)?;
        let key = Self::entry_key(url);

        std::fs::write(dir.join(format!("{}.body", key)), &response.body)?;
        let cached = CachedData::new(EntryMeta {
            url: url.to_string(),
            status: response.status,
            content_type: response.content_type.clone(),
        });
        let contents = serde_json::to_string_pretty(&cached)?;
        std::fs::write(dir.join(format!("{}.json", key)), contents)?;
        debug!(bucket, url, "Cached response");
        Ok(())
    }

    /// Look `url` up in every bucket, in name order.
    pub fn match_any(&self, url: &str) -> Result<Option<HttpResponse>> {
        for bucket in self.bucket_names()? {
            if let Some(hit) = self.get(&bucket, url)? {
                return Ok(Some(hit));
            }
        }
        Ok(None)
    }

    pub fn bucket_names(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in std::fs::read_dir(&self.root)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                if let Some(name) = entry.file_name().to_str() {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    /// Remove a whole bucket. Returns false if it did not exist.
    pub fn delete_bucket(&self, bucket: &str) -> Result<bool> {
        let dir = self.bucket_dir(bucket);
        if !dir.exists() {
            return Ok(false);
        }
        std::fs::remove_dir_all(&dir)
            .with_context(|| format!("Failed to delete cache bucket {}", bucket))?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn response(url: &str, body: &str) -> HttpResponse {
        HttpResponse {
            url: url.to_string(),
            status: 200,
            content_type: Some("application/json".to_string()),
            body: body.as_bytes().to_vec(),
            source: ResponseSource::Network,
        }
    }

    #[test]
    fn test_age_display() {
        assert_eq!(age_display(Utc::now()), "just now");
        assert_eq!(age_display(Utc::now() + Duration::minutes(5)), "just now");
        assert_eq!(age_display(Utc::now() - Duration::minutes(5)), "5m ago");
        assert_eq!(age_display(Utc::now() - Duration::minutes(95)), "2h ago");
        assert_eq!(age_display(Utc::now() - Duration::hours(50)), "2d ago");
    }

    #[test]
    fn test_put_get_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let store = BucketStore::new(dir.path().to_path_buf()).unwrap();
        let url = "https://bible-api.com/John%203?translation=kjv";

        assert!(store.get("api", url).unwrap().is_none());

        store.put("api", url, &response(url, "first")).unwrap();
        store.put("api", url, &response(url, "second")).unwrap();

        let hit = store.get("api", url).unwrap().unwrap();
        assert_eq!(hit.text(), "second");
        assert_eq!(hit.status, 200);
        assert!(matches!(hit.source, ResponseSource::Cache { .. }));
        assert!(store.get("assets", url).unwrap().is_none());
    }

    #[test]
    fn test_match_any_and_delete_bucket() {
        let dir = tempfile::tempdir().unwrap();
        let store = BucketStore::new(dir.path().to_path_buf()).unwrap();
        let url = "https://example.org/a";
        store.put("old-v0", url, &response(url, "x")).unwrap();

        assert!(store.match_any(url).unwrap().is_some());
        assert_eq!(store.bucket_names().unwrap(), vec!["old-v0".to_string()]);

        assert!(store.delete_bucket("old-v0").unwrap());
        assert!(!store.delete_bucket("old-v0").unwrap());
        assert!(store.match_any(url).unwrap().is_none());
    }
}
