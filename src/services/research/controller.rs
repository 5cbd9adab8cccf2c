//! Session Controller
//!
//! Owns the research workflow state machine. User operations are synchronous
//! `&mut self` calls; the gateway calls they start run in spawned tasks and
//! report back through an internal channel that [`ResearchController::pump`]
//! drains. At most one operation is in flight, always for the focused
//! session, and starting one cancels its predecessor.

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use super::events::SessionEvent;
use super::operation::{
    OperationEvent, OperationEventKind, OperationId, OperationKind, OperationReporter,
    OperationToken,
};
use super::settle::{finalize_partial, settle_interrupted};
use crate::models::session::{
    Framework, GroundingReference, Report, ResearchSession, SessionStatus, SessionUpdate,
    SourceMetadata, StructuredSource,
};
use crate::services::gateway::{GatewayResult, ResearchGateway};
use crate::services::report_parser::parse_report;
use crate::storage::session_store::SessionStore;
use crate::utils::error::{AppError, AppResult};

/// Error shown when the model suggests no frameworks
pub const EMPTY_SUGGESTIONS_MESSAGE: &str =
    "The AI could not suggest any analysis frameworks for this topic. Please try rephrasing.";

const NOTIFY_CAPACITY: usize = 256;
const CHUNK_BUFFER: usize = 64;

pub struct ResearchController {
    store: SessionStore,
    gateway: Arc<dyn ResearchGateway>,
    /// Focused session
    current_id: String,
    operation: Option<OperationToken>,
    next_op_id: OperationId,
    events_tx: mpsc::UnboundedSender<OperationEvent>,
    events_rx: mpsc::UnboundedReceiver<OperationEvent>,
    notifier: broadcast::Sender<SessionEvent>,
}

impl ResearchController {
    /// Take ownership of a loaded store.
    ///
    /// Sessions saved mid-operation are settled first. Focus goes to the most
    /// recent session, or to a fresh one when the store is empty.
    pub fn new(mut store: SessionStore, gateway: Arc<dyn ResearchGateway>) -> Self {
        let interrupted: Vec<(String, SessionUpdate)> = store
            .sessions()
            .iter()
            .filter_map(|s| settle_interrupted(s).map(|update| (s.id.clone(), update)))
            .collect();
        for (id, update) in interrupted {
            info!(session_id = %id, "Settling session interrupted by shutdown");
            if let Err(e) = store.update(&id, update) {
                warn!(session_id = %id, error = %e, "Failed to settle session");
            }
        }

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (notifier, _) = broadcast::channel(NOTIFY_CAPACITY);
        let mut controller = Self {
            store,
            gateway,
            current_id: String::new(),
            operation: None,
            next_op_id: 0,
            events_tx,
            events_rx,
            notifier,
        };

        match controller.store.most_recent().map(|s| s.id.clone()) {
            Some(id) => controller.focus(id),
            None => controller.create_session(ResearchSession::new()),
        }
        controller
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn current_id(&self) -> &str {
        &self.current_id
    }

    pub fn current_session(&self) -> Option<&ResearchSession> {
        self.store.get(&self.current_id)
    }

    pub fn session(&self, id: &str) -> Option<&ResearchSession> {
        self.store.get(id)
    }

    /// Stored sessions, newest first
    pub fn sessions_by_recency(&self) -> Vec<&ResearchSession> {
        self.store.by_recency()
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.notifier.subscribe()
    }

    /// Whether an operation is in flight
    pub fn is_busy(&self) -> bool {
        self.operation.is_some()
    }

    pub fn sidebar_open(&self) -> bool {
        self.store.sidebar_open()
    }

    /// Whether `go_next` may surface an earlier report.
    pub fn can_proceed(&self) -> bool {
        self.current_session().is_some_and(|s| {
            s.status == SessionStatus::AwaitingFrameworkSelection && s.has_report()
        })
    }

    // ========================================================================
    // User operations
    // ========================================================================

    /// Abandon the focused session and focus a fresh empty one.
    pub fn new_research(&mut self) {
        self.abandon_current();
        self.create_session(ResearchSession::new());
    }

    /// Set the topic of an Idle session, or start a new session with it from
    /// any other status.
    pub fn submit_topic(&mut self, topic: &str) -> AppResult<()> {
        let topic = topic.trim();
        if topic.is_empty() {
            return Err(AppError::validation("Topic cannot be empty"));
        }

        let status = self.current()?.status;
        if status == SessionStatus::Idle {
            self.update_current(
                SessionUpdate::status(SessionStatus::AwaitingGoalInput).with_topic(topic),
            )
        } else {
            self.abandon_current();
            self.create_session(ResearchSession::with_topic(topic));
            Ok(())
        }
    }

    /// Store the research goals and start suggesting frameworks.
    pub fn submit_goal(&mut self, objective: &str, scope: &str) -> AppResult<()> {
        self.require_status(&[SessionStatus::AwaitingGoalInput], "submit research goals")?;
        let objective = objective.trim();
        if objective.is_empty() {
            return Err(AppError::validation("Research objective cannot be empty"));
        }
        self.start_suggestion(SessionUpdate::default().with_goal(objective, scope.trim()))
    }

    /// Ask for a fresh set of frameworks with the stored goals.
    pub fn regenerate_frameworks(&mut self) -> AppResult<()> {
        let session = self.require_status(
            &[SessionStatus::AwaitingFrameworkSelection, SessionStatus::Error],
            "regenerate frameworks",
        )?;
        if session.objective.trim().is_empty() {
            return Err(AppError::validation("Submit a research objective first"));
        }
        self.start_suggestion(SessionUpdate::default())
    }

    /// Commit to the framework at `index` and start streaming the report.
    pub fn select_framework(&mut self, index: usize) -> AppResult<()> {
        let session = self.require_status(
            &[SessionStatus::AwaitingFrameworkSelection],
            "select a framework",
        )?;
        let framework = session.frameworks.get(index).cloned().ok_or_else(|| {
            AppError::validation(format!("No framework at position {}", index + 1))
        })?;
        let topic = session.topic.clone();
        let label = framework.prompt_label();

        let token = self.begin_operation(OperationKind::GenerateReport);
        self.update_current(
            SessionUpdate::status(SessionStatus::Generating)
                .with_selected_framework(Some(framework))
                .with_results(Some(Report::default()))
                .clear_error(),
        )?;
        info!(session_id = %token.session_id, framework = %label, "Generating report");
        self.spawn_report(token, topic, label);
        Ok(())
    }

    /// Stop generation, keeping the partial report. Outside generation this
    /// starts a new research instead.
    pub fn stop(&mut self) -> AppResult<()> {
        let status = self.current()?.status;
        match status {
            SessionStatus::Generating | SessionStatus::LoadingMetadata => {
                self.cancel_operation();
                match self.current_session().and_then(settle_interrupted) {
                    Some(update) => self.update_current(update),
                    None => Ok(()),
                }
            }
            _ => {
                self.new_research();
                Ok(())
            }
        }
    }

    /// Step back one screen, cancelling whatever is in flight.
    pub fn go_back(&mut self) -> AppResult<()> {
        let session = self.current()?;
        let status = session.status;
        let partial = (status == SessionStatus::Generating)
            .then(|| finalize_partial(session.results.as_ref()));

        match status {
            SessionStatus::Generating
            | SessionStatus::LoadingMetadata
            | SessionStatus::LoadingReport
            | SessionStatus::Success
            | SessionStatus::Error => {
                self.cancel_operation();
                let mut update =
                    SessionUpdate::status(SessionStatus::AwaitingFrameworkSelection).clear_error();
                if partial.is_some() {
                    update = update.with_results(partial);
                }
                self.update_current(update)
            }
            SessionStatus::AwaitingFrameworkSelection | SessionStatus::LoadingFrameworks => {
                self.cancel_operation();
                self.update_current(
                    SessionUpdate::status(SessionStatus::AwaitingGoalInput)
                        .with_frameworks(Vec::new())
                        .clear_error(),
                )
            }
            SessionStatus::AwaitingGoalInput => {
                self.new_research();
                Ok(())
            }
            SessionStatus::Idle => Ok(()),
        }
    }

    /// Return from framework selection to the report already generated.
    pub fn go_next(&mut self) -> AppResult<()> {
        if !self.can_proceed() {
            return Err(AppError::validation("There is no earlier report to return to"));
        }
        self.update_current(SessionUpdate::status(SessionStatus::Success))
    }

    pub fn select_session(&mut self, id: &str) -> AppResult<()> {
        if !self.store.contains(id) {
            return Err(AppError::not_found(format!("Session {}", id)));
        }
        if id == self.current_id {
            return Ok(());
        }
        self.abandon_current();
        self.focus(id.to_string());
        Ok(())
    }

    /// Delete a stored session. Deleting the focused one moves focus to the
    /// most recent remaining session or a new one.
    pub fn delete_session(&mut self, id: &str) -> AppResult<()> {
        if self
            .operation
            .as_ref()
            .is_some_and(|token| token.session_id == id)
        {
            self.cancel_operation();
        }
        self.store
            .remove(id)
            .ok_or_else(|| AppError::not_found(format!("Session {}", id)))?;
        info!(session_id = %id, "Deleted session");
        self.notify(SessionEvent::Removed {
            session_id: id.to_string(),
        });

        if id == self.current_id {
            match self.store.most_recent().map(|s| s.id.clone()) {
                Some(next) => self.focus(next),
                None => self.create_session(ResearchSession::new()),
            }
        }
        Ok(())
    }

    pub fn rename_session(&mut self, id: &str, topic: &str) -> AppResult<()> {
        let status = self.store.rename(id, topic)?.status;
        self.notify(SessionEvent::Updated {
            session_id: id.to_string(),
            status,
        });
        Ok(())
    }

    /// Flip the sidebar flag and return the new value.
    pub fn toggle_sidebar(&mut self) -> bool {
        let open = !self.store.sidebar_open();
        self.store.set_sidebar_open(open);
        open
    }

    // ========================================================================
    // Operation events
    // ========================================================================

    /// Wait for the next event of the in-flight operation and apply it.
    ///
    /// Returns `false` once nothing is in flight. Stale events are skipped.
    /// Cancel-safe, so it can sit in a `select!` next to user input.
    pub async fn pump(&mut self) -> bool {
        while self.operation.is_some() {
            let Some(event) = self.events_rx.recv().await else {
                return false;
            };
            if self.apply(event) {
                return true;
            }
        }
        false
    }

    /// Apply events until no operation is in flight.
    pub async fn run_until_settled(&mut self) {
        while self.pump().await {}
    }

    fn apply(&mut self, event: OperationEvent) -> bool {
        let accepted = self
            .operation
            .as_ref()
            .is_some_and(|token| token.accepts(event.op_id));
        if !accepted {
            debug!(
                op_id = event.op_id,
                session_id = %event.session_id,
                "Discarding stale operation event"
            );
            return false;
        }

        let session_id = event.session_id;
        match event.kind {
            OperationEventKind::Chunk(text) => self.apply_chunk(&session_id, text),
            OperationEventKind::Frameworks(result) => {
                self.operation = None;
                self.finish_suggestion(&session_id, result);
            }
            OperationEventKind::ReportFinished(result) => {
                self.operation = None;
                self.finish_report(&session_id, result);
            }
            OperationEventKind::Metadata(result) => {
                self.operation = None;
                self.finish_metadata(&session_id, result);
            }
        }
        true
    }

    fn apply_chunk(&mut self, session_id: &str, text: String) {
        if let Err(e) = self.store.append_summary(session_id, &text) {
            warn!(session_id, error = %e, "Failed to apply report chunk");
            return;
        }
        debug!(session_id, chunk_len = text.len(), "Applied report chunk");
        self.notify(SessionEvent::Chunk {
            session_id: session_id.to_string(),
            text,
        });
    }

    fn finish_suggestion(&mut self, session_id: &str, result: GatewayResult<Vec<Framework>>) {
        let update = match result {
            Ok(frameworks) if !frameworks.is_empty() => {
                info!(session_id, count = frameworks.len(), "Frameworks suggested");
                SessionUpdate::status(SessionStatus::AwaitingFrameworkSelection)
                    .with_frameworks(frameworks)
            }
            Ok(_) => {
                warn!(session_id, "No frameworks suggested");
                SessionUpdate::status(SessionStatus::Error).with_error(EMPTY_SUGGESTIONS_MESSAGE)
            }
            Err(e) => {
                warn!(session_id, error = %e, "Framework suggestion failed");
                SessionUpdate::status(SessionStatus::Error).with_error(e.to_string())
            }
        };
        self.commit(session_id, update);
    }

    fn finish_report(&mut self, session_id: &str, result: GatewayResult<Vec<GroundingReference>>) {
        let references = match result {
            Ok(references) => references,
            Err(e) => {
                warn!(session_id, error = %e, "Report generation failed");
                self.commit(
                    session_id,
                    SessionUpdate::status(SessionStatus::Error).with_error(e.to_string()),
                );
                return;
            }
        };

        let Some(session) = self.store.get(session_id) else {
            warn!(session_id, "Report finished for a missing session");
            return;
        };
        let raw = session
            .results
            .as_ref()
            .map(|r| r.overall_summary.as_str())
            .unwrap_or_default();
        let mut report = parse_report(raw);
        report.sources = references
            .iter()
            .cloned()
            .map(StructuredSource::preliminary)
            .collect();
        info!(
            session_id,
            sections = report.analysis.len(),
            sources = report.sources.len(),
            "Report stream complete"
        );

        let token = self.begin_operation(OperationKind::ExtractMetadata);
        self.commit(
            session_id,
            SessionUpdate::status(SessionStatus::LoadingMetadata).with_results(Some(report)),
        );
        self.spawn_metadata(token, references);
    }

    fn finish_metadata(&mut self, session_id: &str, result: GatewayResult<Vec<SourceMetadata>>) {
        let metadata = result.unwrap_or_else(|e| {
            warn!(session_id, error = %e, "Source metadata extraction failed, keeping titles");
            Vec::new()
        });

        let Some(Report {
            overall_summary,
            analysis,
            sources,
        }) = self.store.get(session_id).and_then(|s| s.results.clone())
        else {
            warn!(session_id, "Metadata finished for a session without a report");
            return;
        };
        let sources = sources
            .into_iter()
            .enumerate()
            .map(|(i, source)| source.enriched(metadata.get(i)))
            .collect();

        self.commit(
            session_id,
            SessionUpdate::status(SessionStatus::Success).with_results(Some(Report {
                overall_summary,
                analysis,
                sources,
            })),
        );
    }

    // ========================================================================
    // Internals
    // ========================================================================

    fn current(&self) -> AppResult<&ResearchSession> {
        self.current_session()
            .ok_or_else(|| AppError::not_found(format!("Session {}", self.current_id)))
    }

    fn require_status(
        &self,
        allowed: &[SessionStatus],
        action: &str,
    ) -> AppResult<&ResearchSession> {
        let session = self.current()?;
        if allowed.contains(&session.status) {
            Ok(session)
        } else {
            Err(AppError::validation(format!(
                "Cannot {} while {}",
                action,
                session.status.label().to_lowercase()
            )))
        }
    }

    fn start_suggestion(&mut self, base: SessionUpdate) -> AppResult<()> {
        let token = self.begin_operation(OperationKind::SuggestFrameworks);
        let update = SessionUpdate {
            status: Some(SessionStatus::LoadingFrameworks),
            frameworks: Some(Vec::new()),
            error: Some(None),
            ..base
        };
        self.update_current(update)?;

        let session = self.current()?;
        let (topic, objective, scope) = (
            session.topic.clone(),
            session.objective.clone(),
            session.scope.clone(),
        );
        info!(session_id = %token.session_id, "Suggesting frameworks");
        self.spawn_suggestion(token, topic, objective, scope);
        Ok(())
    }

    /// Replace the current operation with a new one for the focused session.
    fn begin_operation(&mut self, kind: OperationKind) -> OperationToken {
        self.cancel_operation();
        self.next_op_id += 1;
        let token = OperationToken::new(self.next_op_id, self.current_id.clone(), kind);
        debug!(
            op_id = token.id,
            kind = kind.as_str(),
            session_id = %token.session_id,
            "Started operation"
        );
        self.operation = Some(token.clone());
        token
    }

    fn cancel_operation(&mut self) {
        if let Some(token) = self.operation.take() {
            token.cancel.cancel();
            debug!(
                op_id = token.id,
                kind = token.kind.as_str(),
                session_id = %token.session_id,
                "Cancelled operation"
            );
        }
    }

    /// Cancel the in-flight operation and settle the focused session so it
    /// is not left in a loading status.
    fn abandon_current(&mut self) {
        self.cancel_operation();
        if let Some(update) = self.current_session().and_then(settle_interrupted) {
            let id = self.current_id.clone();
            debug!(session_id = %id, "Settling abandoned session");
            self.commit(&id, update);
        }
    }

    fn create_session(&mut self, session: ResearchSession) {
        let id = session.id.clone();
        info!(session_id = %id, status = %session.status, "Created session");
        self.store.insert(session);
        self.focus(id);
    }

    fn focus(&mut self, id: String) {
        self.current_id = id.clone();
        self.notify(SessionEvent::Focused { session_id: id });
    }

    fn update_current(&mut self, update: SessionUpdate) -> AppResult<()> {
        let id = self.current_id.clone();
        self.update_session(&id, update)
    }

    fn update_session(&mut self, id: &str, update: SessionUpdate) -> AppResult<()> {
        let status = self.store.update(id, update)?.status;
        debug!(session_id = %id, %status, "Session updated");
        self.notify(SessionEvent::Updated {
            session_id: id.to_string(),
            status,
        });
        Ok(())
    }

    /// Update from an operation completion. Failures are logged only.
    fn commit(&mut self, id: &str, update: SessionUpdate) {
        if let Err(e) = self.update_session(id, update) {
            warn!(session_id = %id, error = %e, "Failed to update session");
        }
    }

    fn notify(&self, event: SessionEvent) {
        // No subscribers is fine
        let _ = self.notifier.send(event);
    }

    // ========================================================================
    // Spawned gateway calls
    // ========================================================================

    fn spawn_suggestion(
        &self,
        token: OperationToken,
        topic: String,
        objective: String,
        scope: String,
    ) {
        let gateway = Arc::clone(&self.gateway);
        let reporter = OperationReporter::new(&token, self.events_tx.clone());
        tokio::spawn(async move {
            let result = tokio::select! {
                _ = token.cancel.cancelled() => None,
                result = gateway.suggest_frameworks(&topic, &objective, &scope) => Some(result),
            };
            match result {
                Some(result) => reporter.finish(OperationEventKind::Frameworks(result)),
                None => reporter.abandon(),
            }
        });
    }

    fn spawn_report(&self, token: OperationToken, topic: String, label: String) {
        let gateway = Arc::clone(&self.gateway);
        let reporter = OperationReporter::new(&token, self.events_tx.clone());
        tokio::spawn(async move {
            let (chunk_tx, mut chunk_rx) = mpsc::channel::<String>(CHUNK_BUFFER);
            let forward = async {
                while let Some(text) = chunk_rx.recv().await {
                    reporter.chunk(text);
                }
            };
            let (result, ()) = tokio::join!(
                gateway.generate_report_stream(&topic, &label, chunk_tx, token.cancel.clone()),
                forward
            );
            if token.cancel.is_cancelled() {
                reporter.abandon();
            } else {
                reporter.finish(OperationEventKind::ReportFinished(result));
            }
        });
    }

    fn spawn_metadata(&self, token: OperationToken, references: Vec<GroundingReference>) {
        let gateway = Arc::clone(&self.gateway);
        let reporter = OperationReporter::new(&token, self.events_tx.clone());
        tokio::spawn(async move {
            let result = tokio::select! {
                _ = token.cancel.cancelled() => None,
                result = gateway.extract_source_metadata(&references) => Some(result),
            };
            match result {
                Some(result) => reporter.finish(OperationEventKind::Metadata(result)),
                None => reporter.abandon(),
            }
        });
    }
}

impl std::fmt::Debug for ResearchController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResearchController")
            .field("current_id", &self.current_id)
            .field("operation", &self.operation)
            .field("store", &self.store)
            .finish()
    }
}
