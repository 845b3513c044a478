//! Completion tracking.
//!
//! The set of completed days lives in local storage under
//! [`PROGRESS_KEY`] as a JSON array of day numbers. Remote mirroring is
//! handled separately by [`crate::sync::ProgressSync`].

use std::collections::BTreeSet;

use anyhow::{Context, Result};
use tracing::warn;

use crate::storage::{LocalStorage, PROGRESS_KEY};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgressTracker {
    completed: BTreeSet<u32>,
}

impl ProgressTracker {
    pub fn from_days(days: impl IntoIterator<Item = u32>) -> Self {
        Self {
            completed: days.into_iter().collect(),
        }
    }

    /// Read the stored set. Missing or unreadable data is an empty set.
    pub fn load(storage: &LocalStorage) -> Self {
        let Some(raw) = storage.get_item(PROGRESS_KEY) else {
            return Self::default();
        };
        match serde_json::from_str::<Vec<u32>>(raw) {
            Ok(days) => Self::from_days(days),
            Err(e) => {
                warn!(error = %e, "Stored progress is corrupt, starting empty");
                Self::default()
            }
        }
    }

    pub fn persist_local(&self, storage: &mut LocalStorage) -> Result<()> {
        let raw = serde_json::to_string(&self.days())?;
        storage
            .set_item(PROGRESS_KEY, raw)
            .context("Failed to save progress")
    }

    /// Flip `day` and return whether it is now complete.
    pub fn toggle(&mut self, day: u32) -> bool {
        if self.completed.remove(&day) {
            false
        } else {
            self.completed.insert(day);
            true
        }
    }

    pub fn set_complete(&mut self, day: u32, complete: bool) {
        if complete {
            self.completed.insert(day);
        } else {
            self.completed.remove(&day);
        }
    }

    pub fn is_complete(&self, day: u32) -> bool {
        self.completed.contains(&day)
    }

    pub fn completed_count(&self) -> usize {
        self.completed.len()
    }

    /// Completed days in ascending order.
    pub fn days(&self) -> Vec<u32> {
        self.completed.iter().copied().collect()
    }

    /// Swap in a set received from elsewhere (remote pull).
    pub fn replace(&mut self, days: impl IntoIterator<Item = u32>) {
        self.completed = days.into_iter().collect();
    }
}
