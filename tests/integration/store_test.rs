//! Snapshot Storage Integration Tests
//!
//! Loads snapshots from disk the way an earlier version wrote them, and
//! checks that a restarted controller picks up where the last one stopped.

use std::fs;
use std::sync::Arc;

use research_desk::storage::{FileSnapshotBackend, SessionStore, SESSIONS_KEY, SIDEBAR_KEY};
use research_desk::{ResearchController, ResearchSession, SessionStatus};

use crate::support::ScriptedGateway;

const LEGACY_SNAPSHOT: &str = r###"[
  {
    "id": "gen-1",
    "topic": "EV market",
    "status": 5,
    "frameworks": [{"name_zh": "五力", "name_en": "Five Forces", "advantage": "a"}],
    "selectedFramework": {"name_zh": "五力", "name_en": "Five Forces", "advantage": "a"},
    "results": {"overallSummary": "## 綜合摘要\nHalf done\n### 風險\nHigh", "analysis": [], "sources": []},
    "createdAt": 2000
  },
  {
    "id": "done-1",
    "topic": "Solar",
    "objective": "size the market",
    "status": "success",
    "frameworks": null,
    "selectedFramework": null,
    "results": {"overallSummary": "S", "analysis": [{"title": "T", "content": "C"}], "sources": null},
    "createdAt": 1000
  }
]"###;

fn file_path(dir: &std::path::Path, key: &str) -> std::path::PathBuf {
    dir.join(format!("{}.json", key))
}

#[test]
fn test_legacy_snapshot_loads() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(file_path(dir.path(), SESSIONS_KEY), LEGACY_SNAPSHOT).unwrap();
    fs::write(file_path(dir.path(), SIDEBAR_KEY), "false").unwrap();

    let store = SessionStore::load(Arc::new(FileSnapshotBackend::new(dir.path()).unwrap()));

    assert_eq!(store.len(), 2);
    assert!(!store.sidebar_open());

    let generating = store.get("gen-1").unwrap();
    assert_eq!(generating.status, SessionStatus::Generating);
    assert_eq!(generating.objective, "");
    assert_eq!(generating.scope, "");
    assert_eq!(generating.frameworks.len(), 1);

    let done = store.get("done-1").unwrap();
    assert_eq!(done.status, SessionStatus::Success);
    assert!(done.frameworks.is_empty());
    assert!(done.selected_framework.is_none());
    let report = done.results.as_ref().unwrap();
    assert!(report.sources.is_empty());
    assert!(report.analysis[0].sources.is_none());

    let ids: Vec<_> = store.by_recency().iter().map(|s| s.id.clone()).collect();
    assert_eq!(ids, vec!["gen-1", "done-1"]);
}

#[tokio::test]
async fn test_restart_settles_interrupted_generation() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(file_path(dir.path(), SESSIONS_KEY), LEGACY_SNAPSHOT).unwrap();
    let backend = Arc::new(FileSnapshotBackend::new(dir.path()).unwrap());

    let controller = ResearchController::new(SessionStore::load(backend.clone()), ScriptedGateway::new());
    assert_eq!(controller.current_id(), "gen-1");
    assert!(!controller.is_busy());

    let session = controller.current_session().unwrap();
    assert_eq!(session.status, SessionStatus::Success);
    let report = session.results.as_ref().unwrap();
    assert_eq!(report.overall_summary, "Half done");
    assert_eq!(report.analysis[0].title, "風險");
    assert_eq!(report.analysis[0].content, "High");
    drop(controller);

    let reloaded = SessionStore::load(backend);
    assert_eq!(reloaded.get("gen-1").unwrap().status, SessionStatus::Success);
    let saved = fs::read_to_string(file_path(dir.path(), SESSIONS_KEY)).unwrap();
    assert!(saved.contains("\"status\":\"success\""));
}

#[test]
fn test_corrupt_snapshot_starts_fresh() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(file_path(dir.path(), SESSIONS_KEY), "[{\"id\": ").unwrap();
    let backend = Arc::new(FileSnapshotBackend::new(dir.path()).unwrap());

    let controller = ResearchController::new(SessionStore::load(backend), ScriptedGateway::new());

    assert_eq!(controller.store().len(), 1);
    assert_eq!(
        controller.current_session().unwrap().status,
        SessionStatus::Idle
    );
    let saved = fs::read_to_string(file_path(dir.path(), SESSIONS_KEY)).unwrap();
    assert!(saved.contains(controller.current_id()));
}

#[test]
fn test_history_edits_survive_restart() {
    let dir = tempfile::tempdir().unwrap();
    let backend = Arc::new(FileSnapshotBackend::new(dir.path()).unwrap());

    let mut controller =
        ResearchController::new(SessionStore::load(backend.clone()), ScriptedGateway::new());
    controller.submit_topic("EV market").unwrap();
    let kept = controller.current_id().to_string();
    controller.new_research();
    let removed = controller.current_id().to_string();
    controller.rename_session(&kept, "EV market 2025").unwrap();
    controller.delete_session(&removed).unwrap();
    assert!(!controller.toggle_sidebar());
    drop(controller);

    let controller = ResearchController::new(SessionStore::load(backend), ScriptedGateway::new());
    assert_eq!(controller.store().len(), 1);
    assert_eq!(controller.current_id(), kept);
    let session = controller.current_session().unwrap();
    assert_eq!(session.topic, "EV market 2025");
    assert_eq!(session.status, SessionStatus::AwaitingGoalInput);
    assert!(!controller.sidebar_open());
}

#[test]
fn test_store_history_edits_without_controller() {
    let dir = tempfile::tempdir().unwrap();
    let backend = Arc::new(FileSnapshotBackend::new(dir.path()).unwrap());

    let mut store = SessionStore::load(backend.clone());
    let session = ResearchSession::with_topic("EV market");
    let id = session.id.clone();
    store.insert(session);
    store.rename(&id, "  EV market 2025 ").unwrap();
    drop(store);

    let mut store = SessionStore::load(backend.clone());
    assert_eq!(store.get(&id).unwrap().topic, "EV market 2025");
    assert!(store.remove(&id).is_some());
    assert!(store.remove(&id).is_none());
    drop(store);

    let store = SessionStore::load(backend);
    assert!(store.is_empty());
}
