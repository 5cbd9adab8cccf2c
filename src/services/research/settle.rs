//! Settling Interrupted Sessions
//!
//! A session can be left in a loading status when its operation is dropped:
//! focus moved elsewhere or the process exited mid-call. These helpers give
//! such a session the status it would have reached had the user stopped it.

use crate::models::session::{Report, ResearchSession, SessionStatus, SessionUpdate};
use crate::services::report_parser::parse_report;

/// Parse the text accumulated so far, keeping any sources already attached.
pub fn finalize_partial(results: Option<&Report>) -> Report {
    let Some(results) = results else {
        return Report::default();
    };
    Report {
        sources: results.sources.clone(),
        ..parse_report(&results.overall_summary)
    }
}

/// Update that moves an interrupted session out of its loading status, or
/// `None` when nothing was in flight.
///
/// - `Generating` keeps its partial report and becomes `Success`.
/// - `LoadingMetadata` keeps its preliminary sources and becomes `Success`.
/// - `LoadingFrameworks` returns to `AwaitingGoalInput`.
/// - `LoadingReport` returns to `AwaitingFrameworkSelection`.
pub fn settle_interrupted(session: &ResearchSession) -> Option<SessionUpdate> {
    match session.status {
        SessionStatus::Generating => Some(
            SessionUpdate::status(SessionStatus::Success)
                .with_results(Some(finalize_partial(session.results.as_ref()))),
        ),
        SessionStatus::LoadingMetadata => Some(SessionUpdate::status(SessionStatus::Success)),
        SessionStatus::LoadingFrameworks => {
            Some(SessionUpdate::status(SessionStatus::AwaitingGoalInput))
        }
        SessionStatus::LoadingReport => {
            Some(SessionUpdate::status(SessionStatus::AwaitingFrameworkSelection))
        }
        _ => None,
    }
}
