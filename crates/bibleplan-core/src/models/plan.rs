use std::collections::BTreeMap;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

/// First day of the plan.
pub const FIRST_DAY: u32 = 1;

/// Last day of the plan.
pub const LAST_DAY: u32 = 365;

/// The plan that ships with the binary.
const BUNDLED_PLAN: &str = include_str!("../../assets/plan.json");

/// One day's scheduled reading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanEntry {
    pub day: u32,
    /// Semicolon-separated references, e.g. `"Genesis 1;Genesis 2-3"`.
    pub verses: String,
}

impl PlanEntry {
    /// The reference string with stray quotes removed and whitespace trimmed.
    pub fn clean_verses(&self) -> String {
        self.verses.replace('"', "").trim().to_string()
    }

    /// The first `;` segment, used as the day's headline.
    pub fn first_reference(&self) -> Option<String> {
        self.clean_verses()
            .split(';')
            .map(str::trim)
            .find(|s| !s.is_empty())
            .map(str::to_string)
    }
}

/// Immutable day -> entry lookup, loaded once per session.
#[derive(Debug, Clone, Default)]
pub struct ReadingPlan {
    entries: BTreeMap<u32, PlanEntry>,
}

impl ReadingPlan {
    /// Parse a JSON array of `{day, verses}` objects.
    pub fn from_json(json: &str) -> Result<Self> {
        let entries: Vec<PlanEntry> =
            serde_json::from_str(json).context("Failed to parse reading plan")?;
        Self::from_entries(entries)
    }

    pub fn from_entries(entries: Vec<PlanEntry>) -> Result<Self> {
        let mut by_day = BTreeMap::new();
        for entry in entries {
            if !(FIRST_DAY..=LAST_DAY).contains(&entry.day) {
                bail!("Plan entry has day {} outside {}..={}", entry.day, FIRST_DAY, LAST_DAY);
            }
            let day = entry.day;
            if by_day.insert(day, entry).is_some() {
                bail!("Plan lists day {} more than once", day);
            }
        }
        Ok(Self { entries: by_day })
    }

    /// The plan compiled into the binary.
    pub fn bundled() -> Result<Self> {
        Self::from_json(BUNDLED_PLAN)
    }

    pub fn entry(&self, day: u32) -> Option<&PlanEntry> {
        self.entries.get(&day)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Day before `day`, if still inside the plan range.
pub fn previous_day(day: u32) -> Option<u32> {
    (day > FIRST_DAY).then(|| day - 1)
}

/// Day after `day`, if still inside the plan range.
pub fn next_day(day: u32) -> Option<u32> {
    (day < LAST_DAY).then(|| day + 1)
}

/// Parse a typed day number, accepting only days inside the plan range.
pub fn parse_day(input: &str) -> Option<u32> {
    input
        .trim()
        .parse::<u32>()
        .ok()
        .filter(|day| (FIRST_DAY..=LAST_DAY).contains(day))
}
