//! Unified Stream Event Types
//!
//! Provider-agnostic event types and adapter trait for processing streamed
//! model output. Shared by the LLM crate (provider implementations) and the
//! application crate (research gateway).

use serde::{Deserialize, Serialize};

/// Unified streaming event that provider adapters convert to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UnifiedStreamEvent {
    /// Text content delta from the model
    TextDelta { content: String },

    /// Token usage information
    Usage {
        input_tokens: u32,
        output_tokens: u32,
    },

    /// Web sources the provider used to ground the response.
    /// Each event carries the full list known so far.
    SearchCitations {
        citations: Vec<SearchCitationEntry>,
    },

    /// Error during streaming
    Error {
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        code: Option<String>,
    },

    /// Stream complete
    Complete {
        #[serde(skip_serializing_if = "Option::is_none")]
        stop_reason: Option<String>,
    },
}

/// One web source from provider-native search grounding.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchCitationEntry {
    /// Citation index (1-based position in the grounding list)
    pub index: i32,
    /// Title of the search result
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// URL of the search result
    pub url: String,
}

/// Errors that can occur during stream adaptation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum AdapterError {
    /// Invalid format that couldn't be parsed
    InvalidFormat(String),
    /// JSON/data parsing error
    ParseError(String),
    /// Event type not handled by the adapter
    UnsupportedEvent(String),
}

impl std::fmt::Display for AdapterError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AdapterError::InvalidFormat(msg) => write!(f, "Invalid format: {}", msg),
            AdapterError::ParseError(msg) => write!(f, "Parse error: {}", msg),
            AdapterError::UnsupportedEvent(msg) => write!(f, "Unsupported event: {}", msg),
        }
    }
}

impl std::error::Error for AdapterError {}

/// Trait for adapting provider-specific stream formats to unified events.
pub trait StreamAdapter: Send + Sync {
    /// Returns the provider name for logging and identification.
    fn provider_name(&self) -> &'static str;

    /// Returns whether the provider can attach web-search grounding.
    fn supports_search(&self) -> bool;

    /// Adapt a raw stream line/chunk to unified events.
    ///
    /// A single input line may produce zero, one, or multiple events.
    fn adapt(&mut self, input: &str) -> Result<Vec<UnifiedStreamEvent>, AdapterError>;

    /// Reset adapter state for a new stream.
    fn reset(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_delta_serialization() {
        let event = UnifiedStreamEvent::TextDelta {
            content: "Hello".to_string(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"text_delta\""));
        assert!(json.contains("\"content\":\"Hello\""));

        let parsed: UnifiedStreamEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(event, parsed);
    }

    #[test]
    fn test_search_citations_serialization() {
        let event = UnifiedStreamEvent::SearchCitations {
            citations: vec![SearchCitationEntry {
                index: 1,
                title: None,
                url: "https://example.com".to_string(),
            }],
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"search_citations\""));
        assert!(!json.contains("\"title\""));
    }

    #[test]
    fn test_complete_without_reason() {
        let parsed: UnifiedStreamEvent = serde_json::from_str(r#"{"type":"complete"}"#).unwrap();
        assert_eq!(parsed, UnifiedStreamEvent::Complete { stop_reason: None });
    }

    #[test]
    fn test_adapter_error_display() {
        let err = AdapterError::InvalidFormat("bad json".to_string());
        assert_eq!(err.to_string(), "Invalid format: bad json");

        let err = AdapterError::ParseError("unexpected token".to_string());
        assert_eq!(err.to_string(), "Parse error: unexpected token");

        let err = AdapterError::UnsupportedEvent("ping".to_string());
        assert_eq!(err.to_string(), "Unsupported event: ping");
    }
}
