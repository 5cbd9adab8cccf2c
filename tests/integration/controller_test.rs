//! Session Controller Integration Tests
//!
//! Drives the full research workflow against a scripted gateway:
//! - End-to-end pipeline with metadata enrichment
//! - Stopping mid-stream and during metadata extraction
//! - Stale events after a newer operation started
//! - Error mapping for failed and empty calls

use std::sync::Arc;
use std::time::Duration;

use research_desk::services::gateway::GatewayError;
use research_desk::services::research::EMPTY_SUGGESTIONS_MESSAGE;
use research_desk::storage::{FileSnapshotBackend, SessionStore};
use research_desk::{ResearchController, SessionEvent, SessionStatus, SourceMetadata};

use crate::support::{at_framework_selection, controller, reference, ScriptedGateway};

fn status(controller: &ResearchController) -> SessionStatus {
    controller.current_session().unwrap().status
}

fn summary(controller: &ResearchController) -> String {
    controller
        .current_session()
        .unwrap()
        .results
        .as_ref()
        .map(|r| r.overall_summary.clone())
        .unwrap_or_default()
}

// ============================================================================
// End to end
// ============================================================================

#[tokio::test]
async fn test_end_to_end_report_with_enriched_source() {
    let gateway = ScriptedGateway::new();
    let dir = tempfile::tempdir().unwrap();
    let backend = Arc::new(FileSnapshotBackend::new(dir.path()).unwrap());
    let mut controller = ResearchController::new(SessionStore::load(backend.clone()), gateway.clone());
    let mut events = controller.subscribe();

    gateway.push_frameworks(Ok(crate::support::frameworks(3)));
    controller.submit_topic("EV market").unwrap();
    controller.submit_goal("assess entry risk", "").unwrap();
    controller.run_until_settled().await;
    assert_eq!(status(&controller), SessionStatus::AwaitingFrameworkSelection);
    assert_eq!(controller.current_session().unwrap().frameworks.len(), 3);

    let stream = gateway.push_stream();
    gateway.push_metadata(Ok(vec![SourceMetadata {
        report_name: "2024 EV Market Outlook".to_string(),
        publication_date: Some("2024-03".to_string()),
    }]));
    controller.select_framework(1).unwrap();
    assert_eq!(status(&controller), SessionStatus::Generating);

    stream.chunk("## 綜合摘要\nA");
    stream.chunk("B");
    stream.chunk("\n### 優勢\nGood\nSECTION_SOURCES: [1]");
    stream.finish(vec![reference("https://example.com/ev.pdf", "example.com")]);
    controller.run_until_settled().await;

    let session = controller.current_session().unwrap();
    assert_eq!(session.status, SessionStatus::Success);
    assert!(session.error.is_none());
    assert_eq!(session.selected_framework.as_ref().unwrap().name_en, "Framework 2");

    let report = session.results.as_ref().unwrap();
    assert_eq!(report.overall_summary, "AB");
    assert_eq!(report.analysis.len(), 1);
    assert_eq!(report.analysis[0].title, "優勢");
    assert_eq!(report.analysis[0].content, "Good");
    assert_eq!(report.analysis[0].sources.as_deref(), Some("[1]"));
    assert_eq!(report.sources.len(), 1);
    assert_eq!(report.sources[0].web.uri, "https://example.com/ev.pdf");
    assert_eq!(report.sources[0].report_name, "2024 EV Market Outlook");
    assert_eq!(report.sources[0].publication_date.as_deref(), Some("2024-03"));

    assert_eq!(
        gateway.report_requests.lock().unwrap()[0],
        ("EV market".to_string(), "框架2 (Framework 2)".to_string())
    );
    assert_eq!(
        gateway.metadata_requests.lock().unwrap()[0],
        vec![reference("https://example.com/ev.pdf", "example.com")]
    );

    let mut streamed = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let SessionEvent::Chunk { text, .. } = event {
            streamed.push(text);
        }
    }
    assert_eq!(
        streamed,
        vec!["## 綜合摘要\nA", "B", "\n### 優勢\nGood\nSECTION_SOURCES: [1]"]
    );

    let id = session.id.clone();
    drop(controller);
    let reloaded = SessionStore::load(backend);
    let stored = reloaded.get(&id).unwrap();
    assert_eq!(stored.status, SessionStatus::Success);
    assert_eq!(
        stored.results.as_ref().unwrap().sources[0].report_name,
        "2024 EV Market Outlook"
    );
}

#[tokio::test]
async fn test_summary_grows_chunk_by_chunk() {
    let gateway = ScriptedGateway::new();
    let (mut controller, _) = at_framework_selection(&gateway, 2).await;
    let stream = gateway.push_stream();
    controller.select_framework(0).unwrap();
    assert_eq!(summary(&controller), "");

    stream.chunk("## 綜合摘要\n");
    assert!(controller.pump().await);
    assert_eq!(summary(&controller), "## 綜合摘要\n");

    stream.chunk("市場");
    assert!(controller.pump().await);
    assert_eq!(summary(&controller), "## 綜合摘要\n市場");
    assert_eq!(status(&controller), SessionStatus::Generating);
}

// ============================================================================
// Cancellation
// ============================================================================

#[tokio::test]
async fn test_stop_mid_stream_keeps_partial_report() {
    let gateway = ScriptedGateway::new();
    let (mut controller, _) = at_framework_selection(&gateway, 2).await;
    let stream = gateway.push_stream();
    controller.select_framework(0).unwrap();

    stream.chunk("## 綜合摘要\nA");
    controller.pump().await;
    stream.chunk("B\n### 風險");
    controller.pump().await;

    controller.stop().unwrap();
    assert!(!controller.is_busy());

    stream.chunk("\nlate text");
    stream.finish(vec![reference("https://late", "late")]);
    tokio::time::sleep(Duration::from_millis(20)).await;
    controller.run_until_settled().await;

    let session = controller.current_session().unwrap();
    assert_eq!(session.status, SessionStatus::Success);
    assert!(session.error.is_none());
    let report = session.results.as_ref().unwrap();
    assert_eq!(report.overall_summary, "AB");
    assert_eq!(report.analysis.len(), 1);
    assert_eq!(report.analysis[0].title, "風險");
    assert_eq!(report.analysis[0].content, "");
    assert!(report.sources.is_empty());
    assert!(gateway.metadata_requests.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_stop_during_metadata_keeps_preliminary_sources() {
    let gateway = ScriptedGateway::new();
    let (mut controller, _) = at_framework_selection(&gateway, 1).await;
    let stream = gateway.push_stream();
    let metadata = gateway.push_metadata_pending();
    controller.select_framework(0).unwrap();

    stream.chunk("## 綜合摘要\nDone");
    stream.finish(vec![
        reference("https://a", "Title A"),
        reference("https://b", "Title B"),
    ]);
    controller.pump().await;
    controller.pump().await;
    assert_eq!(status(&controller), SessionStatus::LoadingMetadata);
    assert!(controller.is_busy());

    controller.stop().unwrap();
    let _ = metadata.send(Ok(vec![SourceMetadata {
        report_name: "Should not apply".to_string(),
        publication_date: Some("2020".to_string()),
    }]));
    tokio::time::sleep(Duration::from_millis(20)).await;
    controller.run_until_settled().await;

    let session = controller.current_session().unwrap();
    assert_eq!(session.status, SessionStatus::Success);
    let report = session.results.as_ref().unwrap();
    assert_eq!(report.overall_summary, "Done");
    let names: Vec<_> = report.sources.iter().map(|s| s.report_name.as_str()).collect();
    assert_eq!(names, vec!["Title A", "Title B"]);
    assert!(report.sources.iter().all(|s| s.publication_date.is_none()));
}

#[tokio::test]
async fn test_new_operation_discards_old_stream() {
    let gateway = ScriptedGateway::new();
    let (mut controller, _) = at_framework_selection(&gateway, 2).await;
    let stream = gateway.push_stream();
    controller.select_framework(0).unwrap();

    stream.chunk("## 綜合摘要\nA");
    controller.pump().await;
    stream.chunk("B");
    tokio::time::sleep(Duration::from_millis(20)).await;

    controller.go_back().unwrap();
    assert_eq!(status(&controller), SessionStatus::AwaitingFrameworkSelection);
    gateway.push_frameworks(Ok(crate::support::frameworks(4)));
    controller.regenerate_frameworks().unwrap();
    assert_eq!(status(&controller), SessionStatus::LoadingFrameworks);

    stream.chunk("C");
    controller.run_until_settled().await;

    let session = controller.current_session().unwrap();
    assert_eq!(session.status, SessionStatus::AwaitingFrameworkSelection);
    assert_eq!(session.frameworks.len(), 4);
    assert_eq!(session.results.as_ref().unwrap().overall_summary, "A");
    assert!(controller.can_proceed());
}

#[tokio::test]
async fn test_new_research_settles_generating_session() {
    let gateway = ScriptedGateway::new();
    let (mut controller, _) = at_framework_selection(&gateway, 1).await;
    let stream = gateway.push_stream();
    controller.select_framework(0).unwrap();
    stream.chunk("partial text");
    controller.pump().await;

    let abandoned = controller.current_id().to_string();
    controller.new_research();
    assert!(!controller.is_busy());
    assert_eq!(status(&controller), SessionStatus::Idle);

    let old = controller.session(&abandoned).unwrap();
    assert_eq!(old.status, SessionStatus::Success);
    assert_eq!(old.results.as_ref().unwrap().overall_summary, "partial text");
}

#[tokio::test]
async fn test_submit_topic_while_loading_starts_fresh_session() {
    let gateway = ScriptedGateway::new();
    let (mut controller, _) = controller(&gateway);
    gateway.push_frameworks(Ok(crate::support::frameworks(2)));
    controller.submit_topic("EV market").unwrap();
    controller.submit_goal("assess entry risk", "Taiwan").unwrap();
    let first = controller.current_id().to_string();

    controller.submit_topic("Solar").unwrap();
    controller.run_until_settled().await;

    assert_eq!(status(&controller), SessionStatus::AwaitingGoalInput);
    assert_eq!(controller.current_session().unwrap().topic, "Solar");
    let old = controller.session(&first).unwrap();
    assert_eq!(old.status, SessionStatus::AwaitingGoalInput);
    assert_eq!(old.scope, "Taiwan");
    assert!(old.frameworks.is_empty());
}

// ============================================================================
// Errors
// ============================================================================

#[tokio::test]
async fn test_empty_suggestion_is_an_error_state() {
    let gateway = ScriptedGateway::new();
    let (mut controller, _) = controller(&gateway);
    gateway.push_frameworks(Ok(Vec::new()));
    controller.submit_topic("EV market").unwrap();
    controller.submit_goal("assess entry risk", "").unwrap();
    controller.run_until_settled().await;

    let session = controller.current_session().unwrap();
    assert_eq!(session.status, SessionStatus::Error);
    assert_eq!(session.error.as_deref(), Some(EMPTY_SUGGESTIONS_MESSAGE));

    gateway.push_frameworks(Ok(crate::support::frameworks(3)));
    controller.regenerate_frameworks().unwrap();
    assert!(controller.current_session().unwrap().error.is_none());
    controller.run_until_settled().await;
    assert_eq!(status(&controller), SessionStatus::AwaitingFrameworkSelection);
}

#[tokio::test]
async fn test_stream_failure_then_go_back_clears_error() {
    let gateway = ScriptedGateway::new();
    let (mut controller, _) = at_framework_selection(&gateway, 2).await;
    let stream = gateway.push_stream();
    controller.select_framework(0).unwrap();
    stream.chunk("## 綜合摘要\nA");
    stream.fail("Failed to generate report: Network error: reset");
    controller.run_until_settled().await;

    let session = controller.current_session().unwrap();
    assert_eq!(session.status, SessionStatus::Error);
    assert_eq!(
        session.error.as_deref(),
        Some("Failed to generate report: Network error: reset")
    );

    controller.go_back().unwrap();
    let session = controller.current_session().unwrap();
    assert_eq!(session.status, SessionStatus::AwaitingFrameworkSelection);
    assert!(session.error.is_none());
}

#[tokio::test]
async fn test_metadata_failure_falls_back_to_titles() {
    let gateway = ScriptedGateway::new();
    let (mut controller, _) = at_framework_selection(&gateway, 1).await;
    let stream = gateway.push_stream();
    gateway.push_metadata(Err(GatewayError::generation("malformed")));
    controller.select_framework(0).unwrap();
    stream.chunk("plain text report");
    stream.finish(vec![reference("https://a", "Title A")]);
    controller.run_until_settled().await;

    let session = controller.current_session().unwrap();
    assert_eq!(session.status, SessionStatus::Success);
    let report = session.results.as_ref().unwrap();
    assert_eq!(report.overall_summary, "plain text report");
    assert_eq!(report.sources[0].report_name, "Title A");
    assert!(report.sources[0].publication_date.is_none());
}

#[tokio::test]
async fn test_short_metadata_enriches_per_entry() {
    let gateway = ScriptedGateway::new();
    let (mut controller, _) = at_framework_selection(&gateway, 1).await;
    let stream = gateway.push_stream();
    gateway.push_metadata(Ok(vec![SourceMetadata {
        report_name: " ".to_string(),
        publication_date: Some("2023-11-02".to_string()),
    }]));
    controller.select_framework(0).unwrap();
    stream.finish(vec![
        reference("https://a", "Title A"),
        reference("https://b", "Title B"),
    ]);
    controller.run_until_settled().await;

    let sources = &controller.current_session().unwrap().results.as_ref().unwrap().sources;
    assert_eq!(sources[0].report_name, "Title A");
    assert_eq!(sources[0].publication_date.as_deref(), Some("2023-11-02"));
    assert_eq!(sources[1].report_name, "Title B");
    assert!(sources[1].publication_date.is_none());
}
