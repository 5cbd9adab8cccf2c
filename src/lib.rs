//! Research Desk
//!
//! Interactive research-report generator. A topic and research goals go in,
//! the model suggests analysis frameworks, and the chosen framework yields a
//! streamed, web-grounded report with per-section source summaries.
//!
//! It includes:
//! - Session controller driving the research state machine
//! - AI gateway over the Gemini provider
//! - Report parser and citation helpers
//! - Storage layer (JSON config, session snapshots)
//! - Data models and utilities

pub mod models;
pub mod services;
pub mod state;
pub mod storage;
pub mod utils;

pub use models::session::{
    AnalysisSection, Framework, GroundingReference, Report, ResearchSession, SessionStatus,
    SessionUpdate, SourceMetadata, StructuredSource,
};
pub use models::settings::{AppConfig, SettingsUpdate};
pub use services::research::{ResearchController, SessionEvent};
pub use state::AppState;
pub use utils::error::{AppError, AppResult};
