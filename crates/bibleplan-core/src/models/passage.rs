use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single verse from the verse API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verse {
    #[serde(default)]
    pub book_name: Option<String>,
    #[serde(default)]
    pub chapter: Option<u32>,
    pub verse: u32,
    pub text: String,
}

/// A chapter or verse range as returned by `GET /<reference>`.
///
/// Most responses carry `verses`; some only have a combined `text`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Passage {
    pub reference: String,
    #[serde(default)]
    pub verses: Vec<Verse>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub translation_name: Option<String>,
    /// Set when the passage was served from the offline cache.
    #[serde(skip)]
    pub cached_at: Option<DateTime<Utc>>,
}

impl Passage {
    /// Verses with whitespace normalised (the API embeds newlines).
    pub fn verse_lines(&self) -> Vec<(u32, String)> {
        self.verses
            .iter()
            .map(|v| (v.verse, normalize_whitespace(&v.text)))
            .collect()
    }

    /// Combined text, used when the response has no `verses` list.
    pub fn fallback_text(&self) -> Option<String> {
        self.text
            .as_deref()
            .map(normalize_whitespace)
            .filter(|t| !t.is_empty())
    }
}

/// Strip the trailing chapter/verse token from a reference.
pub fn book_of(reference: &str) -> &str {
    let reference = reference.trim();
    match reference.rsplit_once(' ') {
        Some((book, last)) if last.starts_with(|c: char| c.is_ascii_digit()) => book.trim_end(),
        _ => reference,
    }
}

fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
