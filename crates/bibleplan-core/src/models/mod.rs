//! Data models for the reading plan and verse API.
//!
//! - `ReadingPlan`, `PlanEntry`: the 365-day schedule
//! - `Passage`, `Verse`: text returned by the verse API

pub mod passage;
pub mod plan;

pub use passage::{Passage, Verse};
pub use plan::{next_day, parse_day, previous_day, PlanEntry, ReadingPlan, FIRST_DAY, LAST_DAY};
