//! Scripture reference expansion.
//!
//! A plan entry lists its reading as a semicolon-delimited string such as
//! `"Genesis 1-3;Psalm 7, 27, 31;John 3:16-18"`. The verse API resolves one
//! chapter (or one verse range) per request, so the string is expanded into
//! individually fetchable references, in reading order:
//!
//! - `"Genesis 1-3"` becomes `"Genesis 1"`, `"Genesis 2"`, `"Genesis 3"`
//! - `"Psalm 7, 27, 31"` becomes `"Psalm 7"`, `"Psalm 27"`, `"Psalm 31"`
//! - anything else, including verse ranges like `"John 3:16-18"`, is kept as is
//!
//! Range expansion is checked first and only applies to chapter-level segments
//! (no `:`), so verse ranges are never mistaken for chapter ranges.

use std::iter::FlatMap;
use std::str::Split;

/// Largest chapter span a single range may expand to.
pub const MAX_RANGE_SPAN: u32 = 200;

/// Lazily expand a raw reference string. Empty input yields nothing.
pub fn expand_references<'a>(input: &'a str) -> ExpandedReferences<'a> {
    let segment: fn(&'a str) -> SegmentExpansion<'a> = expand_segment;
    ExpandedReferences {
        inner: input.split(';').flat_map(segment),
    }
}

/// Iterator returned by [`expand_references`].
pub struct ExpandedReferences<'a> {
    inner: FlatMap<Split<'a, char>, SegmentExpansion<'a>, fn(&'a str) -> SegmentExpansion<'a>>,
}

impl Iterator for ExpandedReferences<'_> {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        self.inner.next()
    }
}

/// Expansion of a single `;`-separated segment.
enum SegmentExpansion<'a> {
    Range {
        book: &'a str,
        next: Option<u32>,
        end: u32,
    },
    List { book: &'a str, parts: Split<'a, char> },
    Single(Option<&'a str>),
}

impl Iterator for SegmentExpansion<'_> {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        match self {
            SegmentExpansion::Range { book, next, end } => {
                let chapter = next.filter(|chapter| *chapter <= *end)?;
                // None once the last chapter is out, even at u32::MAX
                *next = chapter.checked_add(1);
                Some(format!("{} {}", book, chapter))
            }
            SegmentExpansion::List { book, parts } => parts
                .by_ref()
                .map(str::trim)
                .find(|part| !part.is_empty())
                .map(|part| format!("{} {}", book, part)),
            SegmentExpansion::Single(segment) => segment.take().map(str::to_string),
        }
    }
}

fn expand_segment(segment: &str) -> SegmentExpansion<'_> {
    let segment = segment.trim();
    if segment.is_empty() {
        return SegmentExpansion::Single(None);
    }

    if !segment.contains(':') {
        if let Some((book, start, end)) = parse_chapter_range(segment) {
            return SegmentExpansion::Range {
                book,
                next: Some(start),
                end,
            };
        }
    }

    if let Some((book, rest)) = split_book(segment) {
        if rest.contains(',') {
            return SegmentExpansion::List {
                book,
                parts: rest.split(','),
            };
        }
    }

    SegmentExpansion::Single(Some(segment))
}

/// Match `<Book> <N> - <M>` with `0 < N <= M` and a span of at most
/// [`MAX_RANGE_SPAN`] chapters.
fn parse_chapter_range(segment: &str) -> Option<(&str, u32, u32)> {
    let (left, right) = segment.rsplit_once('-')?;
    let end = parse_number(right.trim())?;

    let left = left.trim_end();
    let digits_at = left
        .char_indices()
        .rev()
        .take_while(|(_, c)| c.is_ascii_digit())
        .last()
        .map(|(i, _)| i)?;
    let start = parse_number(&left[digits_at..])?;

    let prefix = &left[..digits_at];
    if !prefix.ends_with(char::is_whitespace) {
        return None;
    }
    let book = prefix.trim();
    if book.is_empty() {
        return None;
    }

    if start == 0 || end < start || end - start > MAX_RANGE_SPAN {
        return None;
    }
    Some((book, start, end))
}

fn parse_number(s: &str) -> Option<u32> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

/// Split `"<1-3>? <Book words> <rest>"` into book and rest. The book is an
/// optional leading `1`, `2` or `3`, then letters and spaces.
fn split_book(segment: &str) -> Option<(&str, &str)> {
    let mut idx = 0;
    let bytes = segment.as_bytes();
    if matches!(bytes.first(), Some(b'1'..=b'3')) {
        idx += 1;
        if bytes.get(idx).is_some_and(u8::is_ascii_whitespace) {
            idx += 1;
        }
    }

    let name_start = idx;
    while bytes
        .get(idx)
        .is_some_and(|b| b.is_ascii_alphabetic() || *b == b' ')
    {
        idx += 1;
    }

    let head = &segment[..idx];
    let rest = segment[idx..].trim_start();
    let separated = head.ends_with(' ') || segment[idx..].starts_with(char::is_whitespace);
    let has_name = segment[name_start..idx].bytes().any(|b| b.is_ascii_alphabetic());

    if !separated || !has_name || rest.is_empty() {
        return None;
    }
    Some((head.trim(), rest))
}
