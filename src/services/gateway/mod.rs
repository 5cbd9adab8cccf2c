//! Research Gateway
//!
//! The model-facing seam of the workflow: framework suggestion, streamed
//! report generation with grounding references, and source metadata
//! extraction. The controller only talks to [`ResearchGateway`], so tests can
//! script every outcome.

pub mod llm_gateway;
pub mod prompts;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::models::session::{Framework, GroundingReference, SourceMetadata};

pub use llm_gateway::{LlmGateway, LlmGatewayOptions};

/// Failure of a gateway call. The message is shown to the user as-is.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    #[error("{0}")]
    Generation(String),
}

impl GatewayError {
    pub fn generation(message: impl Into<String>) -> Self {
        Self::Generation(message.into())
    }
}

pub type GatewayResult<T> = Result<T, GatewayError>;

#[async_trait]
pub trait ResearchGateway: Send + Sync {
    /// Suggest analysis frameworks for the topic. An empty list is a valid
    /// answer.
    async fn suggest_frameworks(
        &self,
        topic: &str,
        objective: &str,
        scope: &str,
    ) -> GatewayResult<Vec<Framework>>;

    /// Stream the report text into `chunks` in order and return the
    /// grounding references once the stream ends.
    ///
    /// When `cancel` fires, emission stops promptly and the call returns
    /// `Ok` with no references.
    async fn generate_report_stream(
        &self,
        topic: &str,
        framework_label: &str,
        chunks: mpsc::Sender<String>,
        cancel: CancellationToken,
    ) -> GatewayResult<Vec<GroundingReference>>;

    /// Clean names and dates for `references`, one entry per reference in
    /// order. Callers fall back per entry when the result is short or fails.
    async fn extract_source_metadata(
        &self,
        references: &[GroundingReference],
    ) -> GatewayResult<Vec<SourceMetadata>>;
}
