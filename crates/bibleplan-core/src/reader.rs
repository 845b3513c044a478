//! Day loading: resolve a plan day, expand its references and fetch every
//! passage concurrently.
//!
//! A failed fetch only affects its own section; the aggregate never fails.

use std::future::Future;

use anyhow::{Context, Result};
use futures::future::join_all;
use reqwest::Url;
use tracing::{debug, info, warn};

use crate::api::ApiError;
use crate::cache::{CacheRouter, Transport};
use crate::models::passage::book_of;
use crate::models::{Passage, ReadingPlan};
use crate::reference::expand_references;

/// Headline shown when a day has no references at all.
const DEFAULT_HEADLINE: &str = "Genesis 1";

/// Anything that can resolve one expanded reference to its text.
pub trait VerseSource: Send + Sync {
    fn fetch_passage(&self, reference: &str) -> impl Future<Output = Result<Passage>> + Send;
}

/// One fetched unit of a day's reading.
#[derive(Debug, Clone, PartialEq)]
pub enum Section {
    Passage(Passage),
    Failed {
        reference: String,
        status: Option<u16>,
        message: String,
    },
}

impl Section {
    pub fn is_failed(&self) -> bool {
        matches!(self, Section::Failed { .. })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DayContent {
    /// The plan has no entry for this day.
    NoData,
    /// The entry's reference string is empty.
    NoVerses,
    /// The reference string expanded to nothing.
    NoReferences,
    Passages {
        title: Option<String>,
        sections: Vec<Section>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct DayReading {
    pub day: u32,
    /// First reference of the day, or a default when there is none.
    pub headline: String,
    pub content: DayContent,
}

impl DayReading {
    pub fn failed_count(&self) -> usize {
        match &self.content {
            DayContent::Passages { sections, .. } => {
                sections.iter().filter(|s| s.is_failed()).count()
            }
            _ => 0,
        }
    }
}

/// Load one day of the plan.
///
/// Sections come back in expansion order regardless of which fetch finishes
/// first. No request is made when the plan has no entry for `day`.
pub async fn load_day<S: VerseSource>(plan: &ReadingPlan, day: u32, source: &S) -> DayReading {
    let Some(entry) = plan.entry(day) else {
        warn!(day, "Day not found in plan");
        return DayReading {
            day,
            headline: DEFAULT_HEADLINE.to_string(),
            content: DayContent::NoData,
        };
    };

    let headline = entry
        .first_reference()
        .unwrap_or_else(|| DEFAULT_HEADLINE.to_string());
    let clean = entry.clean_verses();
    if clean.is_empty() {
        return DayReading {
            day,
            headline,
            content: DayContent::NoVerses,
        };
    }

    let references: Vec<String> = expand_references(&clean).collect();
    debug!(day, ?references, "Expanded references");
    if references.is_empty() {
        return DayReading {
            day,
            headline,
            content: DayContent::NoReferences,
        };
    }

    let sections = fetch_sections(&references, source).await;
    let title = sections.iter().find_map(|s| match s {
        Section::Passage(p) => section_title(&p.reference),
        Section::Failed { .. } => None,
    });

    let failed = sections.iter().filter(|s| s.is_failed()).count();
    info!(day, total = sections.len(), failed, "Day loaded");

    DayReading {
        day,
        headline,
        content: DayContent::Passages { title, sections },
    }
}

async fn fetch_sections<S: VerseSource>(references: &[String], source: &S) -> Vec<Section> {
    let fetches = references.iter().map(|reference| async move {
        match source.fetch_passage(reference).await {
            Ok(passage) => Section::Passage(passage),
            Err(e) => {
                warn!(reference = %reference, error = %e, "Passage fetch failed");
                Section::Failed {
                    reference: reference.clone(),
                    status: e.downcast_ref::<ApiError>().and_then(ApiError::status),
                    message: e.to_string(),
                }
            }
        }
    });
    join_all(fetches).await
}

/// Fetch and validate the reading plan from `url`. The plan is a local
/// asset, so the router serves it cache-first.
pub async fn fetch_plan<T: Transport>(router: &CacheRouter<T>, url: Url) -> Result<ReadingPlan> {
    let response = router
        .get(url.clone())
        .await
        .with_context(|| format!("Failed to fetch plan from {}", url))?;
    if !response.is_success() {
        anyhow::bail!("Server returned {} for {}", response.status, url);
    }
    let plan = ReadingPlan::from_json(&response.text())
        .with_context(|| format!("Invalid plan at {}", url))?;
    info!(days = plan.len(), "Plan loaded");
    Ok(plan)
}

/// Look up a single free-form reference. Blank queries make no request.
pub async fn search_reference<S: VerseSource>(source: &S, query: &str) -> Option<Result<Passage>> {
    let query = query.trim();
    if query.is_empty() {
        return None;
    }
    Some(source.fetch_passage(query).await)
}

/// Heading for a day's reading: a few well-known chapters have names,
/// everything else is titled by its book.
pub fn section_title(reference: &str) -> Option<String> {
    let reference = reference.trim();
    let book = book_of(reference);
    if book.is_empty() {
        return None;
    }
    let chapter = reference[book.len()..]
        .trim()
        .split(':')
        .next()
        .and_then(|c| c.parse::<u32>().ok());

    let named = match (book, chapter) {
        ("Genesis", Some(1 | 2)) => Some("The Creation of the World"),
        ("Genesis", Some(3)) => Some("The Fall"),
        _ => None,
    };
    Some(named.map_or_else(|| book.to_string(), str::to_string))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    /// Answers every reference except those listed in `failing`.
    /// Earlier references are answered more slowly to scramble arrival order.
    struct FakeSource {
        failing: HashSet<String>,
        calls: AtomicUsize,
        arrivals: Mutex<Vec<String>>,
    }

    impl FakeSource {
        fn new(failing: &[&str]) -> Self {
            Self {
                failing: failing.iter().map(|s| s.to_string()).collect(),
                calls: AtomicUsize::new(0),
                arrivals: Mutex::new(Vec::new()),
            }
        }
    }

    impl VerseSource for FakeSource {
        async fn fetch_passage(&self, reference: &str) -> Result<Passage> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) as u64;
            tokio::time::sleep(Duration::from_millis(30u64.saturating_sub(n * 10))).await;
            self.arrivals.lock().unwrap().push(reference.to_string());
            if self.failing.contains(reference) {
                return Err(ApiError::from_status(500, "boom").into());
            }
            Ok(Passage {
                reference: reference.to_string(),
                verses: Vec::new(),
                text: Some(format!("text of {}", reference)),
                translation_name: None,
                cached_at: None,
            })
        }
    }

    fn plan(json: &str) -> ReadingPlan {
        ReadingPlan::from_json(json).unwrap()
    }

    fn references(reading: &DayReading) -> Vec<String> {
        match &reading.content {
            DayContent::Passages { sections, .. } => sections
                .iter()
                .map(|s| match s {
                    Section::Passage(p) => p.reference.clone(),
                    Section::Failed { reference, .. } => reference.clone(),
                })
                .collect(),
            other => panic!("expected passages, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_sections_keep_expansion_order() {
        let plan = plan(r#"[{"day":1,"verses":"Genesis 1-3"}]"#);
        let source = FakeSource::new(&[]);
        let reading = load_day(&plan, 1, &source).await;

        assert_eq!(references(&reading), vec!["Genesis 1", "Genesis 2", "Genesis 3"]);
        assert_eq!(reading.headline, "Genesis 1-3");
        let DayContent::Passages { title, .. } = &reading.content else {
            panic!("expected passages");
        };
        assert_eq!(title.as_deref(), Some("The Creation of the World"));
        // Fetches overlapped, so the last one finished first
        assert_eq!(source.arrivals.lock().unwrap().first().unwrap(), "Genesis 3");
    }

    #[tokio::test]
    async fn test_one_failure_does_not_affect_siblings() {
        let plan = plan(r#"[{"day":7,"verses":"Psalm 7, 27, 31"}]"#);
        let source = FakeSource::new(&["Psalm 27"]);
        let reading = load_day(&plan, 7, &source).await;

        assert_eq!(reading.failed_count(), 1);
        let DayContent::Passages { sections, .. } = &reading.content else {
            panic!("expected passages");
        };
        assert!(matches!(&sections[0], Section::Passage(p) if p.reference == "Psalm 7"));
        assert!(matches!(
            &sections[1],
            Section::Failed { reference, status: Some(500), .. } if reference == "Psalm 27"
        ));
        assert!(matches!(&sections[2], Section::Passage(p) if p.reference == "Psalm 31"));
    }

    #[tokio::test]
    async fn test_missing_day_makes_no_request() {
        let plan = plan(r#"[{"day":1,"verses":"Genesis 1"}]"#);
        let source = FakeSource::new(&[]);
        let reading = load_day(&plan, 200, &source).await;

        assert_eq!(reading.content, DayContent::NoData);
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_empty_reference_string() {
        let plan = plan(r#"[{"day":1,"verses":"\"\""},{"day":2,"verses":" ; "}]"#);
        let source = FakeSource::new(&[]);

        let empty = load_day(&plan, 1, &source).await;
        assert_eq!(empty.content, DayContent::NoVerses);
        assert_eq!(empty.headline, "Genesis 1");

        let blank = load_day(&plan, 2, &source).await;
        assert_eq!(blank.content, DayContent::NoReferences);
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_search_reference() {
        let source = FakeSource::new(&[]);
        assert!(search_reference(&source, "   ").await.is_none());
        let found = search_reference(&source, " John 3:16 ").await.unwrap().unwrap();
        assert_eq!(found.reference, "John 3:16");
    }

    #[tokio::test]
    async fn test_fetch_plan() {
        use crate::cache::{BucketStore, HttpResponse, Origins, ResponseSource};
        use reqwest::Request;

        struct PlanTransport;

        impl Transport for PlanTransport {
            async fn execute(&self, request: Request) -> Result<HttpResponse> {
                let (status, body) = match request.url().path() {
                    "/plan.json" => (200, r#"[{"day":1,"verses":"Genesis 1-3"}]"#),
                    "/broken.json" => (200, "<html>"),
                    _ => (404, "missing"),
                };
                Ok(HttpResponse {
                    url: request.url().to_string(),
                    status,
                    content_type: None,
                    body: body.as_bytes().to_vec(),
                    source: ResponseSource::Network,
                })
            }
        }

        let dir = tempfile::tempdir().unwrap();
        let base = Url::parse("https://plan.example.org/plan.json").unwrap();
        let origins = Origins::new(Some(&base), &Url::parse("https://bible-api.com").unwrap(), None);
        let router = CacheRouter::new(
            PlanTransport,
            BucketStore::new(dir.path().to_path_buf()).unwrap(),
            origins,
        );

        let plan = fetch_plan(&router, base.clone()).await.unwrap();
        assert_eq!(plan.len(), 1);

        let missing = fetch_plan(&router, base.join("other.json").unwrap()).await;
        assert!(missing.unwrap_err().to_string().contains("404"));
        assert!(fetch_plan(&router, base.join("broken.json").unwrap()).await.is_err());
    }

    #[test]
    fn test_section_title() {
        assert_eq!(section_title("Genesis 1").as_deref(), Some("The Creation of the World"));
        assert_eq!(section_title("Genesis 3").as_deref(), Some("The Fall"));
        assert_eq!(section_title("Genesis 4").as_deref(), Some("Genesis"));
        assert_eq!(section_title("1 Kings 15:1-24").as_deref(), Some("1 Kings"));
        assert_eq!(section_title(""), None);
    }
}
