//! Inline Citation Scanner
//!
//! Splits text into prose and citation markers such as `[1]`, `[2, 3]` or
//! `[4-6]`. Markers are kept verbatim; numbers are never resolved to sources.

use std::sync::OnceLock;

use regex::Regex;

fn citation_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\[[\d ,\-]+\]").expect("valid citation regex"))
}

/// A run of text that is either prose or a citation marker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment<'a> {
    Text(&'a str),
    Citation(&'a str),
}

impl<'a> Segment<'a> {
    pub fn as_str(&self) -> &'a str {
        match self {
            Segment::Text(s) | Segment::Citation(s) => s,
        }
    }

    pub fn is_citation(&self) -> bool {
        matches!(self, Segment::Citation(_))
    }
}

/// Split `text` into ordered segments. Concatenating them gives back `text`.
pub fn split_citations(text: &str) -> Vec<Segment<'_>> {
    let mut segments = Vec::new();
    let mut last = 0;

    for m in citation_regex().find_iter(text) {
        if m.start() > last {
            segments.push(Segment::Text(&text[last..m.start()]));
        }
        segments.push(Segment::Citation(m.as_str()));
        last = m.end();
    }

    if last < text.len() {
        segments.push(Segment::Text(&text[last..]));
    }

    segments
}
