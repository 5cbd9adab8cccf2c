//! Session Store
//!
//! Owns every stored research session plus the sidebar flag, and writes a
//! snapshot through a [`SnapshotBackend`] after each mutation. The store has
//! no notion of a focused session.
//!
//! Persistence never fails an operation: load problems fall back to an empty
//! store and write problems are logged while memory stays authoritative.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::models::session::{ResearchSession, SessionUpdate};
use crate::storage::snapshot::{SnapshotBackend, SESSIONS_KEY, SIDEBAR_KEY};
use crate::utils::error::{AppError, AppResult};

/// Minimum spacing between snapshot writes caused by streamed text alone
pub const CHUNK_PERSIST_INTERVAL: Duration = Duration::from_secs(1);

/// In-memory session collection, newest first, with snapshot persistence
pub struct SessionStore {
    sessions: Vec<ResearchSession>,
    sidebar_open: bool,
    backend: Arc<dyn SnapshotBackend>,
    /// Streamed text not yet written
    unsaved_chunks: bool,
    last_chunk_persist: Option<Instant>,
}

impl SessionStore {
    /// Restore the store from its snapshot
    pub fn load(backend: Arc<dyn SnapshotBackend>) -> Self {
        let sessions = Self::read_sessions(backend.as_ref());
        let sidebar_open = Self::read_sidebar(backend.as_ref());
        debug!(count = sessions.len(), sidebar_open, "Loaded session snapshot");
        Self {
            sessions,
            sidebar_open,
            backend,
            unsaved_chunks: false,
            last_chunk_persist: None,
        }
    }

    fn read_sessions(backend: &dyn SnapshotBackend) -> Vec<ResearchSession> {
        let raw = match backend.read(SESSIONS_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Vec::new(),
            Err(e) => {
                warn!(error = %e, "Failed to read session snapshot, starting empty");
                return Vec::new();
            }
        };

        let entries: Vec<serde_json::Value> = match serde_json::from_str(&raw) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(error = %e, "Corrupt session snapshot, starting empty");
                return Vec::new();
            }
        };

        entries
            .into_iter()
            .filter_map(|entry| match serde_json::from_value::<ResearchSession>(entry) {
                Ok(session) => Some(session),
                Err(e) => {
                    warn!(error = %e, "Skipping unreadable session record");
                    None
                }
            })
            .collect()
    }

    fn read_sidebar(backend: &dyn SnapshotBackend) -> bool {
        match backend.read(SIDEBAR_KEY) {
            Ok(Some(raw)) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                warn!(error = %e, "Corrupt sidebar flag, using default");
                true
            }),
            Ok(None) => true,
            Err(e) => {
                warn!(error = %e, "Failed to read sidebar flag, using default");
                true
            }
        }
    }

    fn persist_sessions(&mut self) {
        self.unsaved_chunks = false;
        let result = serde_json::to_string(&self.sessions)
            .map_err(AppError::from)
            .and_then(|json| self.backend.write(SESSIONS_KEY, &json));
        if let Err(e) = result {
            warn!(error = %e, "Failed to persist sessions");
        }
    }

    fn persist_sidebar(&self) {
        let value = if self.sidebar_open { "true" } else { "false" };
        if let Err(e) = self.backend.write(SIDEBAR_KEY, value) {
            warn!(error = %e, "Failed to persist sidebar flag");
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&ResearchSession> {
        self.sessions.iter().find(|s| s.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    /// Sessions in storage order (newest inserted first)
    pub fn sessions(&self) -> &[ResearchSession] {
        &self.sessions
    }

    /// Sessions ordered by creation time, newest first
    pub fn by_recency(&self) -> Vec<&ResearchSession> {
        let mut sorted: Vec<&ResearchSession> = self.sessions.iter().collect();
        sorted.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        sorted
    }

    pub fn most_recent(&self) -> Option<&ResearchSession> {
        self.by_recency().into_iter().next()
    }

    /// Add a session at the front
    pub fn insert(&mut self, session: ResearchSession) {
        self.sessions.insert(0, session);
        self.persist_sessions();
    }

    /// Shallow-merge `update` into one session
    pub fn update(&mut self, id: &str, update: SessionUpdate) -> AppResult<&ResearchSession> {
        let index = self
            .sessions
            .iter()
            .position(|s| s.id == id)
            .ok_or_else(|| AppError::not_found(format!("Session {}", id)))?;
        self.sessions[index].apply_update(update);
        self.persist_sessions();
        Ok(&self.sessions[index])
    }

    /// Append streamed text to the session's report summary.
    ///
    /// Snapshot writes for chunks are spaced by [`CHUNK_PERSIST_INTERVAL`];
    /// any other mutation, [`flush`](Self::flush) or drop writes the rest.
    pub fn append_summary(&mut self, id: &str, chunk: &str) -> AppResult<()> {
        let session = self
            .sessions
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or_else(|| AppError::not_found(format!("Session {}", id)))?;
        session
            .results
            .get_or_insert_with(Default::default)
            .overall_summary
            .push_str(chunk);

        let due = self
            .last_chunk_persist
            .map_or(true, |at| at.elapsed() >= CHUNK_PERSIST_INTERVAL);
        if due {
            self.last_chunk_persist = Some(Instant::now());
            self.persist_sessions();
        } else {
            self.unsaved_chunks = true;
        }
        Ok(())
    }

    /// Write streamed text still held back by the chunk interval.
    pub fn flush(&mut self) {
        if self.unsaved_chunks {
            self.persist_sessions();
        }
    }

    /// Rename a session. The name is trimmed and must not be blank.
    pub fn rename(&mut self, id: &str, name: &str) -> AppResult<&ResearchSession> {
        let name = name.trim();
        if name.is_empty() {
            return Err(AppError::validation("Session name cannot be empty"));
        }
        self.update(id, SessionUpdate::default().with_topic(name))
    }

    pub fn remove(&mut self, id: &str) -> Option<ResearchSession> {
        let index = self.sessions.iter().position(|s| s.id == id)?;
        let removed = self.sessions.remove(index);
        self.persist_sessions();
        Some(removed)
    }

    pub fn sidebar_open(&self) -> bool {
        self.sidebar_open
    }

    pub fn set_sidebar_open(&mut self, open: bool) {
        self.sidebar_open = open;
        self.persist_sidebar();
    }
}

impl Drop for SessionStore {
    fn drop(&mut self) {
        self.flush();
    }
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("sessions", &self.sessions.len())
            .field("sidebar_open", &self.sidebar_open)
            .finish()
    }
}
