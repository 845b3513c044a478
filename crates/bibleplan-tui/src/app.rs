//! Application state management for bibleplan.
//!
//! This module contains the core `App` struct that owns all application
//! state: the plan, the current day and its reading, completion progress,
//! reading preferences, and background task coordination.
//!
//! Only the UI loop touches `App`. Network work runs in spawned tasks that
//! report back over an mpsc channel drained once per frame.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

use bibleplan_core::api::VerseClient;
use bibleplan_core::auth::{Identity, Session};
use bibleplan_core::cache::{BucketStore, CacheRouter, Origins, ReqwestTransport};
use bibleplan_core::config::Config;
use bibleplan_core::models::{
    next_day, parse_day, previous_day, Passage, ReadingPlan, FIRST_DAY, LAST_DAY,
};
use bibleplan_core::preferences::TextSize;
use bibleplan_core::progress::ProgressTracker;
use bibleplan_core::reader::{self, DayContent, DayReading, Section};
use bibleplan_core::storage::LocalStorage;
use bibleplan_core::sync::ProgressSync;

// ============================================================================
// Constants
// ============================================================================

/// Buffer size for the background task message channel.
const CHANNEL_BUFFER_SIZE: usize = 32;

/// Number of lines to scroll on page up/down.
pub const PAGE_SCROLL_SIZE: u16 = 10;

/// Longest accepted go-to-day or search input.
const MAX_INPUT_LENGTH: usize = 64;

/// Directory under the data dir holding the cache buckets.
const CACHE_DIR: &str = "caches";

type Router = CacheRouter<ReqwestTransport>;

// ============================================================================
// UI State Types
// ============================================================================

/// Overall application state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppState {
    Normal,
    ShowingHelp,
    GoingToDay,
    Searching,
    ConfirmingQuit,
    Quitting,
}

/// A reference lookup shown in place of the day's reading.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchView {
    pub query: String,
    /// `None` while the lookup is in flight.
    pub result: Option<Result<Passage, String>>,
}

/// Tracks which day load is current.
///
/// Every load gets a new generation. A result is applied only when its
/// generation is still the latest, so a slow response for a day the user has
/// already left never overwrites the day now on screen.
#[derive(Debug, Default)]
pub struct DayLoads {
    generation: u64,
    loading: bool,
}

impl DayLoads {
    pub fn begin(&mut self) -> u64 {
        self.generation += 1;
        self.loading = true;
        self.generation
    }

    /// Returns whether a result for `generation` should be applied.
    pub fn finish(&mut self, generation: u64) -> bool {
        if generation != self.generation {
            return false;
        }
        self.loading = false;
        true
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }
}

// ============================================================================
// Background Task Results
// ============================================================================

/// Results sent back from spawned tasks to the UI loop.
enum BackgroundResult {
    Plan(Result<ReadingPlan, String>),
    Day { generation: u64, reading: DayReading },
    DayFailed { generation: u64, message: String },
    Search { query: String, result: Result<Passage, String> },
    RemoteProgress(Vec<u32>),
}

// ============================================================================
// Main Application Struct
// ============================================================================

pub struct App {
    // Core services
    pub config: Config,
    pub session: Session,
    identity: Option<Identity>,
    storage: LocalStorage,
    router: Arc<Router>,
    verses: VerseClient<ReqwestTransport>,
    sync: Option<ProgressSync<ReqwestTransport>>,

    // Plan and progress
    pub plan: Option<Arc<ReadingPlan>>,
    /// Set when the plan could not be loaded. Nothing else works without it.
    pub plan_error: Option<String>,
    pub progress: ProgressTracker,
    /// Set once the user toggles a day. The startup pull must not undo it.
    progress_edited: bool,
    /// Latest completion set for the push task, which sends one at a time.
    push_tx: Option<watch::Sender<Vec<u32>>>,

    // UI State
    pub state: AppState,
    pub current_day: u32,
    pub reading: Option<DayReading>,
    day_loads: DayLoads,
    pub scroll: u16,
    pub text_size: TextSize,
    pub input: String,
    pub search: Option<SearchView>,

    // Background task channel
    task_rx: Option<mpsc::Receiver<BackgroundResult>>,
    task_tx: mpsc::Sender<BackgroundResult>,

    // Status message
    pub status_message: Option<String>,
}

impl App {
    /// Create a new application instance from the stored configuration
    pub fn new(start_day: u32) -> Result<Self> {
        let config = match Config::load() {
            Ok(c) => c,
            Err(e) => {
                warn!(error = %e, "Failed to load config, using defaults");
                Config::default()
            }
        };
        let data_dir = config.data_dir()?;
        Self::with_config(config, data_dir, start_day)
    }

    pub fn with_config(config: Config, data_dir: PathBuf, start_day: u32) -> Result<Self> {
        debug!(?data_dir, "Data directory configured");

        let storage = LocalStorage::open(&data_dir)?;
        let progress = ProgressTracker::load(&storage);
        let text_size = TextSize::load(&storage);

        let mut session = Session::new(data_dir.clone());
        if let Err(e) = session.load() {
            warn!(error = %e, "Failed to load session");
        }
        let identity = session.identity();
        debug!(signed_in = session.user_id().is_some(), has_token = identity.is_some(), "Session loaded");

        let api_base = config.api_base_url()?;
        let plan_url = config.plan_url()?;
        let sync_url = config.sync_url()?;

        let origins = Origins::new(plan_url.as_ref(), &api_base, sync_url.as_ref());
        let store = BucketStore::new(data_dir.join(CACHE_DIR))?;
        let router = Arc::new(CacheRouter::new(ReqwestTransport::new()?, store, origins));

        let verses = VerseClient::new(Arc::clone(&router), api_base, &config.translation);
        let sync = sync_url.map(|url| ProgressSync::new(Arc::clone(&router), url));

        let (tx, rx) = mpsc::channel(CHANNEL_BUFFER_SIZE);

        Ok(Self {
            config,
            session,
            identity,
            storage,
            router,
            verses,
            sync,

            plan: None,
            plan_error: None,
            progress,
            progress_edited: false,
            push_tx: None,

            state: AppState::Normal,
            current_day: start_day.clamp(FIRST_DAY, LAST_DAY),
            reading: None,
            day_loads: DayLoads::default(),
            scroll: 0,
            text_size,
            input: String::new(),
            search: None,

            task_rx: Some(rx),
            task_tx: tx,

            status_message: None,
        })
    }

    // =========================================================================
    // Startup
    // =========================================================================

    /// Clear stale cache buckets, load the plan and pull remote progress.
    pub fn start(&mut self) {
        match self.router.activate() {
            Ok(deleted) if !deleted.is_empty() => info!(?deleted, "Removed old caches"),
            Ok(_) => {}
            Err(e) => warn!(error = %e, "Cache activation failed"),
        }

        self.load_plan();
        self.pull_remote_progress();
    }

    fn load_plan(&mut self) {
        let plan_url = match self.config.plan_url() {
            Ok(url) => url,
            Err(e) => {
                self.set_plan(Err(e.to_string()));
                return;
            }
        };

        let Some(url) = plan_url else {
            let plan = ReadingPlan::bundled().map_err(|e| e.to_string());
            self.set_plan(plan);
            return;
        };

        let router = Arc::clone(&self.router);
        let tx = self.task_tx.clone();
        tokio::spawn(async move {
            router.install(std::slice::from_ref(&url)).await;
            let plan = reader::fetch_plan(&router, url)
                .await
                .map_err(|e| format!("{:#}", e));
            Self::send_result(&tx, BackgroundResult::Plan(plan)).await;
        });
    }

    fn set_plan(&mut self, plan: Result<ReadingPlan, String>) {
        match plan {
            Ok(plan) => {
                info!(days = plan.len(), "Plan ready");
                self.plan = Some(Arc::new(plan));
                self.plan_error = None;
                self.load_current_day();
            }
            Err(message) => {
                error!(error = %message, "Failed to load plan");
                self.plan_error = Some(message);
            }
        }
    }

    fn pull_remote_progress(&self) {
        let (Some(sync), Some(identity)) = (self.sync.clone(), self.identity.clone()) else {
            return;
        };
        let tx = self.task_tx.clone();
        tokio::spawn(async move {
            match sync.pull(&identity).await {
                Ok(Some(days)) => {
                    Self::send_result(&tx, BackgroundResult::RemoteProgress(days)).await;
                }
                Ok(None) => debug!("No remote progress yet"),
                Err(e) => warn!(error = %e, "Failed to pull remote progress"),
            }
        });
    }

    // =========================================================================
    // Day navigation
    // =========================================================================

    pub fn is_loading(&self) -> bool {
        self.day_loads.is_loading()
    }

    /// Start loading `current_day` in the background.
    pub fn load_current_day(&mut self) {
        let Some(plan) = self.plan.clone() else {
            return;
        };
        let generation = self.day_loads.begin();
        let day = self.current_day;
        self.scroll = 0;
        self.search = None;

        let verses = self.verses.clone();
        let tx = self.task_tx.clone();
        debug!(day, generation, "Loading day");

        tokio::spawn(async move {
            // Inner task so a panic while loading still clears the loading state
            let load = tokio::spawn(async move { reader::load_day(&plan, day, &verses).await });
            let result = match load.await {
                Ok(reading) => BackgroundResult::Day { generation, reading },
                Err(e) => BackgroundResult::DayFailed {
                    generation,
                    message: e.to_string(),
                },
            };
            Self::send_result(&tx, result).await;
        });
    }

    pub fn go_to_day(&mut self, day: u32) {
        if day == self.current_day && self.reading.is_some() {
            return;
        }
        self.current_day = day;
        self.status_message = None;
        self.load_current_day();
    }

    pub fn previous_day(&mut self) {
        if let Some(day) = previous_day(self.current_day) {
            self.go_to_day(day);
        }
    }

    pub fn next_day(&mut self) {
        if let Some(day) = next_day(self.current_day) {
            self.go_to_day(day);
        }
    }

    /// Go to the day typed into the go-to-day prompt.
    pub fn submit_day_input(&mut self) {
        match parse_day(&self.input) {
            Some(day) => {
                self.state = AppState::Normal;
                self.input.clear();
                self.go_to_day(day);
            }
            None => {
                self.status_message =
                    Some(format!("Enter a day between {} and {}", FIRST_DAY, LAST_DAY));
            }
        }
    }

    // =========================================================================
    // Completion
    // =========================================================================

    /// Toggle the current day. Saved locally right away, pushed remotely in
    /// the background.
    pub fn toggle_complete(&mut self) {
        let day = self.current_day;
        let complete = self.progress.toggle(day);
        self.progress_edited = true;
        info!(day, complete, "Toggled completion");

        if let Err(e) = self.progress.persist_local(&mut self.storage) {
            warn!(error = %e, "Failed to save progress");
            self.status_message = Some("Could not save progress".to_string());
        }
        self.push_remote_progress();
    }

    pub fn is_current_day_complete(&self) -> bool {
        self.progress.is_complete(self.current_day)
    }

    /// Hand the current set to the push task, starting it on first use.
    fn push_remote_progress(&mut self) {
        let days = self.progress.days();
        if let Some(ref tx) = self.push_tx {
            if tx.send(days.clone()).is_ok() {
                return;
            }
        }

        let (Some(sync), Some(identity)) = (&self.sync, &self.identity) else {
            return;
        };
        let (tx, _) = sync.spawn_pusher(identity.clone(), days);
        self.push_tx = Some(tx);
    }

    // =========================================================================
    // Search
    // =========================================================================

    pub fn submit_search(&mut self) {
        let query = self.input.trim().to_string();
        self.state = AppState::Normal;
        self.input.clear();
        if query.is_empty() {
            return;
        }

        self.scroll = 0;
        self.search = Some(SearchView {
            query: query.clone(),
            result: None,
        });

        let verses = self.verses.clone();
        let tx = self.task_tx.clone();
        tokio::spawn(async move {
            let result = match reader::search_reference(&verses, &query).await {
                Some(Ok(passage)) => Ok(passage),
                Some(Err(e)) => Err(search_error(&query, &e)),
                None => return,
            };
            Self::send_result(&tx, BackgroundResult::Search { query, result }).await;
        });
    }

    pub fn close_search(&mut self) {
        if self.search.take().is_some() {
            self.scroll = 0;
        }
    }

    // =========================================================================
    // Reading preferences and scrolling
    // =========================================================================

    pub fn larger_text(&mut self) {
        self.set_text_size(self.text_size.larger());
    }

    pub fn smaller_text(&mut self) {
        self.set_text_size(self.text_size.smaller());
    }

    fn set_text_size(&mut self, size: TextSize) {
        if size == self.text_size {
            return;
        }
        self.text_size = size;
        self.status_message = Some(format!("Text size {}", size.label()));
        if let Err(e) = size.save(&mut self.storage) {
            warn!(error = %e, "Failed to save text size");
        }
    }

    pub fn scroll_down(&mut self, lines: u16) {
        let max = self.content_line_count();
        self.scroll = self.scroll.saturating_add(lines).min(max);
    }

    pub fn scroll_up(&mut self, lines: u16) {
        self.scroll = self.scroll.saturating_sub(lines);
    }

    /// Upper bound on how far the reading pane can scroll.
    fn content_line_count(&self) -> u16 {
        let lines = match (&self.search, &self.reading) {
            (Some(SearchView { result: Some(Ok(p)), .. }), _) => p.verse_lines().len() + 2,
            (Some(_), _) => 2,
            (None, Some(DayReading {
                content: DayContent::Passages { sections, .. },
                ..
            })) => sections
                .iter()
                .map(|s| match s {
                    Section::Passage(p) => p.verse_lines().len().max(1) + 2,
                    Section::Failed { .. } => 3,
                })
                .sum(),
            _ => 0,
        };
        u16::try_from(lines).unwrap_or(u16::MAX)
    }

    // =========================================================================
    // Input fields
    // =========================================================================

    pub fn open_prompt(&mut self, state: AppState) {
        self.input.clear();
        self.status_message = None;
        if state == AppState::GoingToDay {
            self.input = self.current_day.to_string();
        }
        self.state = state;
    }

    pub fn push_input_char(&mut self, c: char) {
        let allowed = match self.state {
            AppState::GoingToDay => c.is_ascii_digit(),
            AppState::Searching => !c.is_control(),
            _ => false,
        };
        if allowed && self.input.chars().count() < MAX_INPUT_LENGTH {
            self.input.push(c);
        }
    }

    // =========================================================================
    // Background results
    // =========================================================================

    async fn send_result(tx: &mpsc::Sender<BackgroundResult>, result: BackgroundResult) {
        if let Err(e) = tx.send(result).await {
            error!(error = %e, "Failed to send background result - channel closed");
        }
    }

    /// Check for completed background tasks and process results
    pub fn check_background_tasks(&mut self) {
        let results: Vec<BackgroundResult> = {
            if let Some(ref mut rx) = self.task_rx {
                let mut results = Vec::new();
                while let Ok(result) = rx.try_recv() {
                    results.push(result);
                }
                results
            } else {
                Vec::new()
            }
        };

        for result in results {
            self.process_result(result);
        }
    }

    fn process_result(&mut self, result: BackgroundResult) {
        match result {
            BackgroundResult::Plan(plan) => self.set_plan(plan),
            BackgroundResult::Day { generation, reading } => {
                if !self.day_loads.finish(generation) {
                    debug!(generation, day = reading.day, "Dropping stale day load");
                    return;
                }
                let failed = reading.failed_count();
                if failed > 0 {
                    self.status_message = Some(format!("{} passage(s) could not be loaded", failed));
                }
                self.reading = Some(reading);
            }
            BackgroundResult::DayFailed { generation, message } => {
                if !self.day_loads.finish(generation) {
                    debug!(generation, "Dropping stale day failure");
                    return;
                }
                error!(error = %message, day = self.current_day, "Day load failed");
                self.reading = None;
                self.status_message = Some(format!("Could not load day {}", self.current_day));
            }
            BackgroundResult::Search { query, result } => match self.search {
                Some(ref mut view) if view.query == query => view.result = Some(result),
                _ => debug!(query = %query, "Dropping search result for closed search"),
            },
            BackgroundResult::RemoteProgress(days) => {
                if self.progress_edited {
                    info!(remote = days.len(), "Keeping local progress edited since startup");
                    self.push_remote_progress();
                    return;
                }
                info!(days = days.len(), "Applying remote progress");
                self.progress.replace(days);
                if let Err(e) = self.progress.persist_local(&mut self.storage) {
                    warn!(error = %e, "Failed to save remote progress locally");
                }
            }
        }
    }
}

fn search_error(query: &str, error: &anyhow::Error) -> String {
    match error
        .downcast_ref::<bibleplan_core::api::ApiError>()
        .and_then(|e| e.status())
    {
        Some(status) => format!(
            "No results for \"{}\" (Status: {}). Try a reference like \"John 3:16\".",
            query, status
        ),
        None => format!("Search failed: {}", error),
    }
}

/// Resolve a sign-in from the command line: store the token and remember
/// the user.
pub fn sign_in(user_id: &str, token: &str) -> Result<()> {
    use bibleplan_core::auth::CredentialStore;

    let mut config = Config::load_stored().context("Failed to load config")?;
    let mut session = Session::new(config.data_dir()?);
    CredentialStore::store_token(user_id, token)?;
    session.sign_in(user_id);
    session.save()?;
    config.last_user = Some(user_id.to_string());
    config.save()?;
    info!(user_id, "Signed in");
    Ok(())
}

pub fn sign_out() -> Result<Option<String>> {
    use bibleplan_core::auth::CredentialStore;

    let config = Config::load().context("Failed to load config")?;
    let mut session = Session::new(config.data_dir()?);
    session.load()?;
    let user = session.user_id().map(str::to_string);
    if let Some(ref user_id) = user {
        CredentialStore::delete_token(user_id)?;
    }
    session.clear()?;
    info!(?user, "Signed out");
    Ok(user)
}
