//! Gemini SSE Stream Adapter
//!
//! Handles `streamGenerateContent?alt=sse` chunks. Each `data:` line carries a
//! complete `GenerateContentResponse`, so the same adapter also decodes the
//! single body returned by `generateContent`.

use research_desk_core::streaming::{
    AdapterError, SearchCitationEntry, StreamAdapter, UnifiedStreamEvent,
};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiChunk {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    usage_metadata: Option<UsageMetadata>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
    #[serde(default)]
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
    #[serde(default)]
    finish_reason: Option<String>,
    #[serde(default)]
    grounding_metadata: Option<GroundingMetadata>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    #[serde(default)]
    text: Option<String>,
    /// Thought summaries are never part of the answer.
    #[serde(default)]
    thought: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GroundingMetadata {
    #[serde(default)]
    grounding_chunks: Vec<GroundingChunk>,
}

#[derive(Debug, Deserialize)]
struct GroundingChunk {
    #[serde(default)]
    web: Option<WebSource>,
}

#[derive(Debug, Deserialize)]
struct WebSource {
    #[serde(default)]
    uri: Option<String>,
    #[serde(default)]
    title: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: Option<String>,
}

/// Adapter for the Gemini `GenerateContentResponse` format
pub struct GeminiAdapter {
    model: String,
}

impl GeminiAdapter {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
        }
    }

    fn citations(metadata: &GroundingMetadata) -> Vec<SearchCitationEntry> {
        metadata
            .grounding_chunks
            .iter()
            .enumerate()
            .filter_map(|(i, chunk)| {
                let web = chunk.web.as_ref()?;
                let url = web.uri.clone().filter(|u| !u.is_empty())?;
                Some(SearchCitationEntry {
                    index: i as i32 + 1,
                    title: web.title.clone(),
                    url,
                })
            })
            .collect()
    }
}

impl StreamAdapter for GeminiAdapter {
    fn provider_name(&self) -> &'static str {
        "gemini"
    }

    fn supports_search(&self) -> bool {
        // Search grounding is available on 1.5 and newer
        !self.model.starts_with("gemini-1.0")
    }

    fn adapt(&mut self, input: &str) -> Result<Vec<UnifiedStreamEvent>, AdapterError> {
        let trimmed = input.trim();

        // Handle SSE format: "data: {...}"; other SSE fields carry nothing useful
        let json_str = if let Some(data) = trimmed.strip_prefix("data:") {
            data.trim_start()
        } else if trimmed.is_empty()
            || trimmed.starts_with(':')
            || trimmed.starts_with("event:")
            || trimmed.starts_with("id:")
            || trimmed.starts_with("retry:")
        {
            return Ok(vec![]);
        } else {
            trimmed
        };

        if json_str.is_empty() {
            return Ok(vec![]);
        }

        let chunk: GeminiChunk = serde_json::from_str(json_str)
            .map_err(|e| AdapterError::ParseError(format!("{}: {}", e, json_str)))?;

        let mut events = Vec::new();

        if let Some(error) = chunk.error {
            events.push(UnifiedStreamEvent::Error {
                message: error.message,
                code: error.status,
            });
            return Ok(events);
        }

        if let Some(reason) = chunk.prompt_feedback.and_then(|f| f.block_reason) {
            events.push(UnifiedStreamEvent::Error {
                message: format!("Prompt blocked: {}", reason),
                code: Some("blocked".to_string()),
            });
            return Ok(events);
        }

        if let Some(candidate) = chunk.candidates.into_iter().next() {
            if let Some(content) = candidate.content {
                for part in content.parts {
                    if part.thought {
                        continue;
                    }
                    if let Some(text) = part.text.filter(|t| !t.is_empty()) {
                        events.push(UnifiedStreamEvent::TextDelta { content: text });
                    }
                }
            }

            if let Some(metadata) = candidate.grounding_metadata {
                let citations = Self::citations(&metadata);
                if !citations.is_empty() {
                    events.push(UnifiedStreamEvent::SearchCitations { citations });
                }
            }

            if let Some(usage) = &chunk.usage_metadata {
                events.push(UnifiedStreamEvent::Usage {
                    input_tokens: usage.prompt_token_count,
                    output_tokens: usage.candidates_token_count,
                });
            }

            if let Some(reason) = candidate.finish_reason {
                events.push(UnifiedStreamEvent::Complete {
                    stop_reason: Some(reason),
                });
            }
        } else if let Some(usage) = chunk.usage_metadata {
            events.push(UnifiedStreamEvent::Usage {
                input_tokens: usage.prompt_token_count,
                output_tokens: usage.candidates_token_count,
            });
        }

        Ok(events)
    }
}
