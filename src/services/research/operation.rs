//! In-flight Operation Tracking
//!
//! Gateway calls run in spawned tasks and report back as [`OperationEvent`]s.
//! The controller keeps one [`OperationToken`] for the operation it still
//! cares about; events carrying any other id are stale.

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::models::session::{Framework, GroundingReference, SourceMetadata};
use crate::services::gateway::{GatewayError, GatewayResult};

/// Error recorded when a spawned operation ends without reporting
pub const OPERATION_ABORTED_MESSAGE: &str = "The request ended unexpectedly. Please try again.";

pub type OperationId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    SuggestFrameworks,
    GenerateReport,
    ExtractMetadata,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::SuggestFrameworks => "suggest_frameworks",
            OperationKind::GenerateReport => "generate_report",
            OperationKind::ExtractMetadata => "extract_metadata",
        }
    }
}

/// Handle on the operation the controller is waiting for
#[derive(Debug, Clone)]
pub struct OperationToken {
    pub id: OperationId,
    pub session_id: String,
    pub kind: OperationKind,
    pub cancel: CancellationToken,
}

impl OperationToken {
    pub fn new(id: OperationId, session_id: impl Into<String>, kind: OperationKind) -> Self {
        Self {
            id,
            session_id: session_id.into(),
            kind,
            cancel: CancellationToken::new(),
        }
    }

    /// Whether an event from `op_id` may still change state.
    pub fn accepts(&self, op_id: OperationId) -> bool {
        self.id == op_id && !self.cancel.is_cancelled()
    }
}

/// What a spawned operation reports
#[derive(Debug)]
pub enum OperationEventKind {
    Frameworks(GatewayResult<Vec<Framework>>),
    Chunk(String),
    ReportFinished(GatewayResult<Vec<GroundingReference>>),
    Metadata(GatewayResult<Vec<SourceMetadata>>),
}

#[derive(Debug)]
pub struct OperationEvent {
    pub op_id: OperationId,
    pub session_id: String,
    pub kind: OperationEventKind,
}

impl OperationEvent {
    pub fn new(op_id: OperationId, session_id: impl Into<String>, kind: OperationEventKind) -> Self {
        Self {
            op_id,
            session_id: session_id.into(),
            kind,
        }
    }
}

/// Reporting side of a spawned operation.
///
/// Dropping it before [`finish`](Self::finish) or [`abandon`](Self::abandon),
/// as happens when the task panics, reports a failure for the operation so
/// the controller never waits on a dead task.
pub struct OperationReporter {
    events: mpsc::UnboundedSender<OperationEvent>,
    op_id: OperationId,
    session_id: String,
    kind: OperationKind,
    done: bool,
}

impl OperationReporter {
    pub fn new(token: &OperationToken, events: mpsc::UnboundedSender<OperationEvent>) -> Self {
        Self {
            events,
            op_id: token.id,
            session_id: token.session_id.clone(),
            kind: token.kind,
            done: false,
        }
    }

    fn send(&self, kind: OperationEventKind) {
        // The controller may be gone
        let _ = self
            .events
            .send(OperationEvent::new(self.op_id, self.session_id.clone(), kind));
    }

    pub fn chunk(&self, text: String) {
        self.send(OperationEventKind::Chunk(text));
    }

    /// Report the outcome.
    pub fn finish(mut self, kind: OperationEventKind) {
        self.done = true;
        self.send(kind);
    }

    /// End without an outcome, after cancellation.
    pub fn abandon(mut self) {
        self.done = true;
    }
}

impl Drop for OperationReporter {
    fn drop(&mut self) {
        if self.done {
            return;
        }
        warn!(
            op_id = self.op_id,
            kind = self.kind.as_str(),
            session_id = %self.session_id,
            "Operation task ended without a result"
        );
        let error = GatewayError::generation(OPERATION_ABORTED_MESSAGE);
        let kind = match self.kind {
            OperationKind::SuggestFrameworks => OperationEventKind::Frameworks(Err(error)),
            OperationKind::GenerateReport => OperationEventKind::ReportFinished(Err(error)),
            OperationKind::ExtractMetadata => OperationEventKind::Metadata(Err(error)),
        };
        self.send(kind);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_accepts_only_its_own_live_events() {
        let token = OperationToken::new(7, "s1", OperationKind::GenerateReport);
        assert!(token.accepts(7));
        assert!(!token.accepts(6));

        token.cancel.cancel();
        assert!(!token.accepts(7));
    }

    #[test]
    fn test_cloned_token_shares_cancellation() {
        let token = OperationToken::new(1, "s1", OperationKind::SuggestFrameworks);
        let clone = token.clone();
        token.cancel.cancel();
        assert!(clone.cancel.is_cancelled());
        assert_eq!(clone.kind.as_str(), "suggest_frameworks");
    }

    #[test]
    fn test_reporter_sends_outcome_once() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let token = OperationToken::new(3, "s1", OperationKind::GenerateReport);
        let reporter = OperationReporter::new(&token, tx);
        reporter.chunk("A".to_string());
        reporter.finish(OperationEventKind::ReportFinished(Ok(Vec::new())));

        assert!(matches!(rx.try_recv().unwrap().kind, OperationEventKind::Chunk(ref t) if t == "A"));
        let event = rx.try_recv().unwrap();
        assert_eq!(event.op_id, 3);
        assert!(matches!(event.kind, OperationEventKind::ReportFinished(Ok(_))));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_dropped_reporter_reports_failure() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let token = OperationToken::new(4, "s1", OperationKind::SuggestFrameworks);
        drop(OperationReporter::new(&token, tx.clone()));

        let event = rx.try_recv().unwrap();
        assert_eq!(event.session_id, "s1");
        match event.kind {
            OperationEventKind::Frameworks(Err(e)) => {
                assert_eq!(e.to_string(), OPERATION_ABORTED_MESSAGE)
            }
            other => panic!("unexpected event {:?}", other),
        }

        OperationReporter::new(&token, tx).abandon();
        assert!(rx.try_recv().is_err());
    }
}
