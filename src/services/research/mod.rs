//! Research Workflow
//!
//! The session state machine and the plumbing around it:
//! - `controller`: user operations, operation events, focus handling
//! - `operation`: in-flight operation tokens and their events
//! - `events`: change notifications for a presentation layer
//! - `settle`: recovery of sessions left in a loading status

pub mod controller;
pub mod events;
pub mod operation;
pub mod settle;

pub use controller::{ResearchController, EMPTY_SUGGESTIONS_MESSAGE};
pub use events::SessionEvent;
pub use operation::{
    OperationEvent, OperationEventKind, OperationId, OperationKind, OperationReporter,
    OperationToken, OPERATION_ABORTED_MESSAGE,
};
pub use settle::{finalize_partial, settle_interrupted};
