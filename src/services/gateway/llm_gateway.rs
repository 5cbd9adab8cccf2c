//! LLM-backed Gateway
//!
//! Implements [`ResearchGateway`] on top of any [`LlmProvider`]. Suggestions
//! and metadata use structured JSON output; the report is streamed with web
//! search grounding.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use research_desk_core::streaming::{SearchCitationEntry, UnifiedStreamEvent};
use research_desk_llm::{LlmProvider, LlmRequestOptions, LlmResponse, Message};

use super::prompts::{
    framework_prompt, framework_schema, metadata_prompt, metadata_schema, report_prompt,
    ANALYST_SYSTEM_PROMPT,
};
use super::{GatewayError, GatewayResult, ResearchGateway};
use crate::models::session::{Framework, GroundingReference, SourceMetadata};

const SUGGEST_ERROR_PREFIX: &str = "Failed to suggest frameworks";
const REPORT_ERROR_PREFIX: &str = "Failed to generate report";

/// Buffer between the provider stream and the chunk sink
const STREAM_BUFFER: usize = 64;

/// Tuning for report generation
#[derive(Debug, Clone, PartialEq)]
pub struct LlmGatewayOptions {
    pub report_temperature: f32,
    pub enable_search: bool,
}

impl Default for LlmGatewayOptions {
    fn default() -> Self {
        Self {
            report_temperature: 0.2,
            enable_search: true,
        }
    }
}

pub struct LlmGateway {
    provider: Arc<dyn LlmProvider>,
    options: LlmGatewayOptions,
}

impl LlmGateway {
    pub fn new(provider: Arc<dyn LlmProvider>, options: LlmGatewayOptions) -> Self {
        Self { provider, options }
    }

    pub fn provider(&self) -> &Arc<dyn LlmProvider> {
        &self.provider
    }

    fn report_options(&self) -> LlmRequestOptions {
        let mut options = LlmRequestOptions::grounded(Some(self.options.report_temperature));
        options.enable_search = self.options.enable_search && self.provider.supports_native_search();
        options
    }

    /// Schema-constrained output when the provider honours it. Otherwise the
    /// prompt alone asks for JSON and the reply is scanned for the array.
    fn json_options(&self, schema: serde_json::Value) -> LlmRequestOptions {
        if self.provider.supports_structured_output() {
            LlmRequestOptions::json(schema)
        } else {
            LlmRequestOptions::default()
        }
    }

    async fn send_json(&self, prompt: String, schema: serde_json::Value) -> Result<LlmResponse, String> {
        self.provider
            .send_message(
                vec![Message::user(prompt)],
                Some(ANALYST_SYSTEM_PROMPT.to_string()),
                self.json_options(schema),
            )
            .await
            .map_err(|e| e.to_string())
    }
}

#[async_trait]
impl ResearchGateway for LlmGateway {
    async fn suggest_frameworks(
        &self,
        topic: &str,
        objective: &str,
        scope: &str,
    ) -> GatewayResult<Vec<Framework>> {
        let response = self
            .send_json(framework_prompt(topic, objective, scope), framework_schema())
            .await
            .map_err(|e| GatewayError::generation(format!("{}: {}", SUGGEST_ERROR_PREFIX, e)))?;

        let frameworks = parse_frameworks(response.text())
            .map_err(|e| GatewayError::generation(format!("{}: {}", SUGGEST_ERROR_PREFIX, e)))?;
        tracing::info!(
            count = frameworks.len(),
            model = %response.model,
            "Framework suggestions received"
        );
        Ok(frameworks)
    }

    async fn generate_report_stream(
        &self,
        topic: &str,
        framework_label: &str,
        chunks: mpsc::Sender<String>,
        cancel: CancellationToken,
    ) -> GatewayResult<Vec<GroundingReference>> {
        if cancel.is_cancelled() {
            return Ok(Vec::new());
        }

        let (tx, mut rx) = mpsc::channel::<UnifiedStreamEvent>(STREAM_BUFFER);
        let stream = self.provider.stream_message(
            vec![Message::user(report_prompt(topic, framework_label))],
            Some(ANALYST_SYSTEM_PROMPT.to_string()),
            tx,
            self.report_options(),
        );
        let forward = async move {
            while let Some(event) = rx.recv().await {
                if let UnifiedStreamEvent::TextDelta { content } = event {
                    if chunks.send(content).await.is_err() {
                        break;
                    }
                }
            }
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::debug!(topic, "Report stream cancelled");
                Ok(Vec::new())
            }
            (result, ()) = async { tokio::join!(stream, forward) } => {
                let response = result.map_err(|e| {
                    GatewayError::generation(format!("{}: {}", REPORT_ERROR_PREFIX, e))
                })?;
                let references = grounding_references(&response.citations);
                tracing::info!(
                    references = references.len(),
                    output_tokens = response.usage.output_tokens,
                    "Report stream finished"
                );
                Ok(references)
            }
        }
    }

    async fn extract_source_metadata(
        &self,
        references: &[GroundingReference],
    ) -> GatewayResult<Vec<SourceMetadata>> {
        if references.is_empty() {
            return Ok(Vec::new());
        }

        let response = self
            .send_json(metadata_prompt(references), metadata_schema())
            .await
            .map_err(GatewayError::generation)?;
        let metadata: Vec<SourceMetadata> = serde_json::from_str(&extract_json_array(response.text()))
            .map_err(|e| GatewayError::generation(format!("Malformed source metadata: {}", e)))?;

        if metadata.len() != references.len() {
            tracing::warn!(
                expected = references.len(),
                received = metadata.len(),
                "Source metadata count mismatch"
            );
        }
        Ok(metadata)
    }
}

/// Web sources with both a link and a title, in provider order.
fn grounding_references(citations: &[SearchCitationEntry]) -> Vec<GroundingReference> {
    citations
        .iter()
        .filter_map(|citation| {
            let title = citation.title.as_deref()?.trim();
            let uri = citation.url.trim();
            (!title.is_empty() && !uri.is_empty()).then(|| GroundingReference {
                uri: uri.to_string(),
                title: title.to_string(),
            })
        })
        .collect()
}

/// Parse a JSON framework list. `[]` is a valid empty answer.
fn parse_frameworks(response_text: &str) -> Result<Vec<Framework>, String> {
    if response_text.trim().is_empty() {
        return Err("model returned an empty response".to_string());
    }

    serde_json::from_str(&extract_json_array(response_text))
        .map_err(|e| format!("malformed framework list: {}", e))
}

/// Pull a JSON array out of a response that may be wrapped in code fences
/// or prose.
fn extract_json_array(response_text: &str) -> String {
    let trimmed = response_text.trim();

    if let Some(start) = trimmed.find("```") {
        let after_fence = &trimmed[start + 3..];
        let content_start = after_fence.find('\n').map(|nl| nl + 1).unwrap_or(0);
        let content = &after_fence[content_start..];
        if let Some(end) = content.find("```") {
            return content[..end].trim().to_string();
        }
    }

    if let (Some(start), Some(end)) = (trimmed.find('['), trimmed.rfind(']')) {
        if start <= end {
            return trimmed[start..=end].to_string();
        }
    }

    trimmed.to_string()
}
