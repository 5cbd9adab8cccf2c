//! LLM Provider Trait
//!
//! Defines the common interface for generative-model providers.

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::types::{LlmError, LlmRequestOptions, LlmResponse, LlmResult, Message, ProviderConfig};
use research_desk_core::streaming::UnifiedStreamEvent;

/// Trait that all LLM providers must implement.
///
/// Provides a unified interface for:
/// - Single message completions (send_message)
/// - Streaming completions (stream_message)
/// - Health checking
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Returns the provider name for identification.
    fn name(&self) -> &'static str;

    /// Returns the current model being used.
    fn model(&self) -> &str;

    /// Returns whether this provider can ground answers with web search.
    fn supports_native_search(&self) -> bool {
        false
    }

    /// Returns whether this provider honours `response_schema`.
    fn supports_structured_output(&self) -> bool {
        false
    }

    /// Send a message and get a complete response.
    async fn send_message(
        &self,
        messages: Vec<Message>,
        system: Option<String>,
        request_options: LlmRequestOptions,
    ) -> LlmResult<LlmResponse>;

    /// Stream a message response via a channel.
    ///
    /// `TextDelta` and `SearchCitations` events are forwarded to `tx` as they
    /// arrive. If the receiver goes away the stream is abandoned and whatever
    /// was accumulated so far is returned.
    async fn stream_message(
        &self,
        messages: Vec<Message>,
        system: Option<String>,
        tx: mpsc::Sender<UnifiedStreamEvent>,
        request_options: LlmRequestOptions,
    ) -> LlmResult<LlmResponse>;

    /// Check if the provider is healthy and reachable.
    async fn health_check(&self) -> LlmResult<()>;

    /// Get the configuration for this provider.
    fn config(&self) -> &ProviderConfig;

    /// List available models (if supported by provider).
    async fn list_models(&self) -> LlmResult<Option<Vec<String>>> {
        Ok(None)
    }
}

/// Helper function to create an error for missing API key
pub fn missing_api_key_error(provider: &str) -> LlmError {
    LlmError::AuthenticationFailed {
        message: format!("API key not configured for {}", provider),
    }
}

/// Helper function to parse HTTP error status codes
pub fn parse_http_error(status: u16, body: &str, provider: &str) -> LlmError {
    match status {
        401 => LlmError::AuthenticationFailed {
            message: format!("{}: Invalid API key", provider),
        },
        403 => LlmError::AuthenticationFailed {
            message: format!("{}: Access denied", provider),
        },
        404 => LlmError::ModelNotFound {
            model: body.to_string(),
        },
        429 => LlmError::RateLimited {
            message: body.to_string(),
            retry_after: None,
        },
        400 => LlmError::InvalidRequest {
            message: body.to_string(),
        },
        500..=599 => LlmError::ServerError {
            message: body.to_string(),
            status: Some(status),
        },
        _ => LlmError::Other {
            message: format!("HTTP {}: {}", status, body),
        },
    }
}
