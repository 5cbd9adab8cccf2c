//! Report Parser
//!
//! Turns raw report markdown into a summary plus titled analysis sections.
//!
//! Grammar:
//! - Summary heading: a line starting with `##`, optional spaces, then
//!   `綜合摘要` or `Overall Summary` (case-insensitive). The summary runs
//!   until the next section heading or the end of the text.
//! - Section heading: a line starting with `###` followed by a title on the
//!   same line. The body runs until the next section heading or the end.
//! - A section body may end with `SECTION_SOURCES: [1, 4, 5]` on its last
//!   non-blank line. The bracket is kept verbatim and the line is removed.
//! - Text with neither a summary heading nor a section becomes the summary.
//!
//! Parsing is pure, so it can run on every streamed prefix. A trailing line
//! that is still being written and could turn into a heading or a sources
//! marker is ignored until it is complete.

use std::sync::OnceLock;

use regex::Regex;

use crate::models::session::{AnalysisSection, Report};

const SECTION_MARKER: &str = "###";
const SOURCES_PREFIX: &str = "SECTION_SOURCES:";
/// Lowercase summary heading labels
const SUMMARY_LABELS: [&str; 2] = ["綜合摘要", "overall summary"];

fn summary_heading_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?im)^##[ \t]*(?:綜合摘要|overall summary)").expect("valid summary regex")
    })
}

fn sources_marker_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^SECTION_SOURCES:[ \t]*(\[[ \t]*\d[\d \t,]*\])$").expect("valid marker regex")
    })
}

/// A located `###` heading line
#[derive(Debug)]
struct Heading<'a> {
    /// Byte offset of the line start
    start: usize,
    /// Byte offset just past the line (and its newline)
    body_start: usize,
    title: &'a str,
}

/// Parse report text. Sources are left empty.
pub fn parse_report(text: &str) -> Report {
    let text = without_partial_tail(text);
    let headings = locate_headings(text);

    let summary = summary_heading_regex().find(text).map(|m| {
        let end = headings
            .iter()
            .find(|h| h.start >= m.end())
            .map(|h| h.start)
            .unwrap_or(text.len());
        text[m.end()..end].trim().to_string()
    });

    let analysis: Vec<AnalysisSection> = headings
        .iter()
        .enumerate()
        .map(|(i, heading)| {
            let end = headings
                .get(i + 1)
                .map(|next| next.start)
                .unwrap_or(text.len());
            let (content, sources) = split_section_sources(&text[heading.body_start..end]);
            AnalysisSection {
                title: heading.title.to_string(),
                content,
                sources,
            }
        })
        .collect();

    let overall_summary = match summary {
        Some(summary) => summary,
        None if analysis.is_empty() => text.trim().to_string(),
        None => String::new(),
    };

    Report {
        overall_summary,
        analysis,
        sources: Vec::new(),
    }
}

/// First pass: every line that opens a titled section.
fn locate_headings(text: &str) -> Vec<Heading<'_>> {
    let mut headings = Vec::new();
    let mut offset = 0;

    for line in text.split_inclusive('\n') {
        let start = offset;
        offset += line.len();

        let Some(rest) = line.strip_prefix(SECTION_MARKER) else {
            continue;
        };
        let title = rest
            .trim_start_matches('#')
            .trim()
            .trim_end_matches('#')
            .trim_end();
        if title.is_empty() {
            continue;
        }
        headings.push(Heading {
            start,
            body_start: offset,
            title,
        });
    }

    headings
}

/// Split a trailing `SECTION_SOURCES:` line off a section body.
fn split_section_sources(body: &str) -> (String, Option<String>) {
    let body = body.trim_end();
    let (head, last_line) = match body.rfind('\n') {
        Some(i) => (&body[..i], &body[i + 1..]),
        None => ("", body),
    };

    match sources_marker_regex().captures(last_line.trim_end()) {
        Some(caps) => (head.trim().to_string(), Some(caps[1].to_string())),
        None => (body.trim().to_string(), None),
    }
}

/// Drop an unfinished final line that is only heading hashes, the start of
/// the summary heading, or the start of a sources marker.
fn without_partial_tail(text: &str) -> &str {
    if text.ends_with('\n') {
        return text;
    }
    let line_start = text.rfind('\n').map(|i| i + 1).unwrap_or(0);
    let last = text[line_start..].trim();
    if last.is_empty() {
        return text;
    }

    let only_hashes = last.chars().all(|c| c == '#');
    let partial_summary_heading = is_partial_summary_heading(last);
    let partial_marker = (SOURCES_PREFIX.starts_with(last) && last.len() >= 2)
        || (last.starts_with(SOURCES_PREFIX) && !last.contains(']'));

    if only_hashes || partial_summary_heading || partial_marker {
        &text[..line_start]
    } else {
        text
    }
}

/// `## 綜合摘` or `## overall sum`: a summary heading cut short.
fn is_partial_summary_heading(line: &str) -> bool {
    let Some(rest) = line.strip_prefix("##") else {
        return false;
    };
    let rest = rest.trim_start_matches(|c: char| c == ' ' || c == '\t').to_lowercase();
    !rest.is_empty()
        && SUMMARY_LABELS
            .iter()
            .any(|label| label.len() > rest.len() && label.starts_with(rest.as_str()))
}
