//! Report Parsing Integration Tests
//!
//! Parses complete model-shaped reports and every streamed prefix of one,
//! then renders section content into display lines.

use research_desk::services::citations::Segment;
use research_desk::services::parse_report;
use research_desk::services::render::{content_lines, LineKind};

const REPORT: &str = "\
## 綜合摘要
台灣電動車市場仍在早期階段 [1]，政策補貼推動需求 [2, 3]。

### 市場規模與成長
* 2023 年銷量成長 40% [1]
* 充電樁密度仍低 [4-5]

整體而言成長可期。
SECTION_SOURCES: [1, 4, 5]

### 競爭格局
國際品牌與本土車廠並存 [2]。
SECTION_SOURCES: [2]

### 進入障礙
供應鏈認證週期長。
";

#[test]
fn test_complete_report() {
    let report = parse_report(REPORT);

    assert_eq!(
        report.overall_summary,
        "台灣電動車市場仍在早期階段 [1]，政策補貼推動需求 [2, 3]。"
    );
    let titles: Vec<_> = report.analysis.iter().map(|s| s.title.as_str()).collect();
    assert_eq!(titles, vec!["市場規模與成長", "競爭格局", "進入障礙"]);

    assert_eq!(
        report.analysis[0].content,
        "* 2023 年銷量成長 40% [1]\n* 充電樁密度仍低 [4-5]\n\n整體而言成長可期。"
    );
    assert_eq!(report.analysis[0].sources.as_deref(), Some("[1, 4, 5]"));
    assert_eq!(report.analysis[1].sources.as_deref(), Some("[2]"));
    assert!(report.analysis[2].sources.is_none());
    assert!(report.sources.is_empty());
}

#[test]
fn test_streamed_prefixes_only_grow_sections() {
    let full = parse_report(REPORT);
    let boundaries: Vec<usize> = REPORT
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(REPORT.len()))
        .collect();

    let mut seen = 0;
    for end in boundaries {
        let partial = parse_report(&REPORT[..end]);
        assert!(
            partial.analysis.len() >= seen,
            "section count shrank at byte {}",
            end
        );
        seen = partial.analysis.len();
        assert!(partial
            .analysis
            .iter()
            .all(|s| !s.content.contains("SECTION_SOURCES")));
    }
    assert_eq!(seen, full.analysis.len());
}

#[test]
fn test_text_without_headings_becomes_summary() {
    let report = parse_report("The model ignored the format [1].\nSecond line.");
    assert_eq!(
        report.overall_summary,
        "The model ignored the format [1].\nSecond line."
    );
    assert!(report.analysis.is_empty());
}

#[test]
fn test_sections_without_summary_keep_summary_empty() {
    let report = parse_report("Preamble\n### Only Section\nBody");
    assert_eq!(report.overall_summary, "");
    assert_eq!(report.analysis.len(), 1);
    assert_eq!(report.analysis[0].content, "Body");
}

#[test]
fn test_render_parsed_section() {
    let report = parse_report(REPORT);
    let lines = content_lines(&report.analysis[0].content);

    let kinds: Vec<_> = lines.iter().map(|l| l.kind).collect();
    assert_eq!(
        kinds,
        vec![
            LineKind::Bullet,
            LineKind::Bullet,
            LineKind::Break,
            LineKind::Paragraph
        ]
    );
    assert_eq!(
        lines[1].segments,
        vec![Segment::Text("充電樁密度仍低 "), Segment::Citation("[4-5]")]
    );
    assert_eq!(
        lines[0].render_with(|marker| format!("<{}>", marker)),
        "2023 年銷量成長 40% <[1]>"
    );
}
