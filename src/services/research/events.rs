//! Session change notifications for a presentation layer

use serde::Serialize;

use crate::models::session::SessionStatus;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    /// A different session is now focused
    Focused { session_id: String },
    /// Stored fields of a session changed
    Updated {
        session_id: String,
        status: SessionStatus,
    },
    /// Report text appended while generating
    Chunk { session_id: String, text: String },
    Removed { session_id: String },
}

impl SessionEvent {
    pub fn session_id(&self) -> &str {
        match self {
            SessionEvent::Focused { session_id }
            | SessionEvent::Updated { session_id, .. }
            | SessionEvent::Chunk { session_id, .. }
            | SessionEvent::Removed { session_id } => session_id,
        }
    }
}
