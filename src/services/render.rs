//! Content Rendering Helpers
//!
//! Converts section text into display lines for a presentation layer.

use crate::services::citations::{split_citations, Segment};

/// Kind of a display line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    Paragraph,
    Bullet,
    /// Spacing after a paragraph
    Break,
}

/// One display line with its citation segments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentLine<'a> {
    pub kind: LineKind,
    pub segments: Vec<Segment<'a>>,
}

impl ContentLine<'_> {
    /// Plain text with citation markers rendered as `style` wraps them.
    pub fn render_with(&self, style: impl Fn(&str) -> String) -> String {
        self.segments
            .iter()
            .map(|segment| match segment {
                Segment::Text(text) => text.to_string(),
                Segment::Citation(marker) => style(marker),
            })
            .collect()
    }
}

/// Split `content` into display lines.
///
/// Leading blank lines are dropped, `* ` and `- ` lines become bullets, and a
/// run of blank lines after text collapses into a single break.
pub fn content_lines(content: &str) -> Vec<ContentLine<'_>> {
    let lines: Vec<&str> = content
        .split('\n')
        .skip_while(|line| line.trim().is_empty())
        .collect();

    let mut out = Vec::new();
    for (index, &line) in lines.iter().enumerate() {
        let trimmed = line.trim();
        if let Some(item) = trimmed
            .strip_prefix("* ")
            .or_else(|| trimmed.strip_prefix("- "))
        {
            out.push(ContentLine {
                kind: LineKind::Bullet,
                segments: split_citations(item),
            });
        } else if !trimmed.is_empty() {
            out.push(ContentLine {
                kind: LineKind::Paragraph,
                segments: split_citations(trimmed),
            });
        } else if index > 0 && !lines[index - 1].trim().is_empty() {
            out.push(ContentLine {
                kind: LineKind::Break,
                segments: Vec::new(),
            });
        }
    }
    out
}
