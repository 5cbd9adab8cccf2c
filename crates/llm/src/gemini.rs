//! Gemini Provider
//!
//! Implementation of the LlmProvider trait for the Gemini `generateContent`
//! REST API. Supports structured JSON output and Google Search grounding.

use async_trait::async_trait;
use futures_util::StreamExt;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::provider::{missing_api_key_error, parse_http_error, LlmProvider};
use super::types::{
    LlmError, LlmRequestOptions, LlmResponse, LlmResult, Message, MessageRole, ProviderConfig,
    StopReason, UsageStats,
};
use crate::http_client::build_http_client;
use crate::streaming_adapters::GeminiAdapter;
use research_desk_core::streaming::{SearchCitationEntry, StreamAdapter, UnifiedStreamEvent};

/// Default Gemini API endpoint
const GEMINI_API_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Gemini provider
pub struct GeminiProvider {
    config: ProviderConfig,
    client: reqwest::Client,
}

impl GeminiProvider {
    /// Create a new Gemini provider with the given configuration
    pub fn new(config: ProviderConfig) -> LlmResult<Self> {
        let timeout = config.timeout_secs.map(Duration::from_secs);
        let client = build_http_client(config.proxy.as_ref(), timeout)?;
        Ok(Self { config, client })
    }

    /// Get the API base URL
    fn base_url(&self) -> &str {
        self.config
            .base_url
            .as_deref()
            .unwrap_or(GEMINI_API_URL)
            .trim_end_matches('/')
    }

    fn endpoint(&self, method: &str) -> String {
        format!("{}/models/{}:{}", self.base_url(), self.config.model, method)
    }

    fn api_key(&self) -> LlmResult<&str> {
        self.config
            .api_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| missing_api_key_error("gemini"))
    }

    /// Build the request body for the API
    fn build_request_body(
        &self,
        messages: &[Message],
        system: Option<&str>,
        request_options: &LlmRequestOptions,
    ) -> serde_json::Value {
        let mut instructions: Vec<&str> = system.into_iter().collect();
        let mut contents: Vec<serde_json::Value> = Vec::new();

        for msg in messages {
            let role = match msg.role {
                MessageRole::System => {
                    instructions.push(&msg.content);
                    continue;
                }
                MessageRole::User => "user",
                MessageRole::Assistant => "model",
            };
            contents.push(serde_json::json!({
                "role": role,
                "parts": [{ "text": msg.content }]
            }));
        }

        let mut generation_config = serde_json::json!({
            "temperature": request_options
                .temperature_override
                .unwrap_or(self.config.temperature),
            "maxOutputTokens": self.config.max_tokens,
        });

        if let Some(schema) = &request_options.response_schema {
            generation_config["responseMimeType"] = serde_json::json!("application/json");
            generation_config["responseSchema"] = schema.clone();
        }

        let mut body = serde_json::json!({
            "contents": contents,
            "generationConfig": generation_config,
        });

        if !instructions.is_empty() {
            body["systemInstruction"] = serde_json::json!({
                "parts": [{ "text": instructions.join("\n\n") }]
            });
        }

        if request_options.enable_search && self.supports_native_search() {
            body["tools"] = serde_json::json!([{ "google_search": {} }]);
        }

        body
    }

    async fn post(&self, url: &str, body: &serde_json::Value) -> LlmResult<reqwest::Response> {
        let api_key = self.api_key()?;

        let response = self
            .client
            .post(url)
            .header("x-goog-api-key", api_key)
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| LlmError::NetworkError {
                message: e.to_string(),
            })?;

        let status = response.status().as_u16();
        if status != 200 {
            let body_text = response.text().await.map_err(|e| LlmError::NetworkError {
                message: e.to_string(),
            })?;
            return Err(parse_http_error(status, &body_text, "gemini"));
        }

        Ok(response)
    }
}

/// Folds unified events into a final response.
#[derive(Default)]
struct ResponseAccumulator {
    content: String,
    citations: Vec<SearchCitationEntry>,
    usage: UsageStats,
    stop_reason: Option<StopReason>,
}

impl ResponseAccumulator {
    fn apply(&mut self, event: &UnifiedStreamEvent) -> LlmResult<()> {
        match event {
            UnifiedStreamEvent::TextDelta { content } => self.content.push_str(content),
            UnifiedStreamEvent::SearchCitations { citations } => {
                // Later chunks repeat the full list; keep the newest non-empty one
                if !citations.is_empty() {
                    self.citations = citations.clone();
                }
            }
            UnifiedStreamEvent::Usage {
                input_tokens,
                output_tokens,
            } => {
                self.usage.input_tokens = *input_tokens;
                self.usage.output_tokens = *output_tokens;
            }
            UnifiedStreamEvent::Complete { stop_reason } => {
                self.stop_reason = stop_reason.as_deref().map(StopReason::from);
            }
            UnifiedStreamEvent::Error { message, code } => {
                return Err(match code.as_deref() {
                    Some("blocked") => LlmError::ContentBlocked {
                        message: message.clone(),
                    },
                    Some("RESOURCE_EXHAUSTED") => LlmError::RateLimited {
                        message: message.clone(),
                        retry_after: None,
                    },
                    _ => LlmError::ServerError {
                        message: message.clone(),
                        status: None,
                    },
                });
            }
        }
        Ok(())
    }

    fn finish(self, model: &str) -> LlmResult<LlmResponse> {
        let stop_reason = self.stop_reason.unwrap_or(StopReason::EndTurn);
        if stop_reason == StopReason::Safety && self.content.is_empty() {
            return Err(LlmError::ContentBlocked {
                message: "Response withheld by safety filters".to_string(),
            });
        }
        Ok(LlmResponse {
            content: if self.content.is_empty() {
                None
            } else {
                Some(self.content)
            },
            citations: self.citations,
            stop_reason,
            usage: self.usage,
            model: model.to_string(),
        })
    }
}

#[async_trait]
impl LlmProvider for GeminiProvider {
    fn name(&self) -> &'static str {
        "gemini"
    }

    fn model(&self) -> &str {
        &self.config.model
    }

    fn supports_native_search(&self) -> bool {
        GeminiAdapter::new(&self.config.model).supports_search()
    }

    fn supports_structured_output(&self) -> bool {
        true
    }

    async fn send_message(
        &self,
        messages: Vec<Message>,
        system: Option<String>,
        request_options: LlmRequestOptions,
    ) -> LlmResult<LlmResponse> {
        let body = self.build_request_body(&messages, system.as_deref(), &request_options);
        let response = self.post(&self.endpoint("generateContent"), &body).await?;

        let body_text = response.text().await.map_err(|e| LlmError::NetworkError {
            message: e.to_string(),
        })?;

        let mut adapter = GeminiAdapter::new(&self.config.model);
        let events = adapter
            .adapt(&body_text)
            .map_err(|e| LlmError::ParseError {
                message: e.to_string(),
            })?;

        let mut acc = ResponseAccumulator::default();
        for event in &events {
            acc.apply(event)?;
        }
        acc.finish(&self.config.model)
    }

    async fn stream_message(
        &self,
        messages: Vec<Message>,
        system: Option<String>,
        tx: mpsc::Sender<UnifiedStreamEvent>,
        request_options: LlmRequestOptions,
    ) -> LlmResult<LlmResponse> {
        let body = self.build_request_body(&messages, system.as_deref(), &request_options);
        let url = format!("{}?alt=sse", self.endpoint("streamGenerateContent"));
        let response = self.post(&url, &body).await?;

        // Process SSE stream
        let mut adapter = GeminiAdapter::new(&self.config.model);
        let mut acc = ResponseAccumulator::default();
        let mut stream = response.bytes_stream();

        // Lines are split on raw bytes so multi-byte characters spanning
        // network chunks are decoded whole.
        let mut buffer: Vec<u8> = Vec::new();
        let mut receiver_gone = false;

        'read: while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| LlmError::NetworkError {
                message: e.to_string(),
            })?;
            buffer.extend_from_slice(&chunk);

            while let Some(line_end) = buffer.iter().position(|b| *b == b'\n') {
                let raw: Vec<u8> = buffer.drain(..=line_end).collect();
                let line = String::from_utf8_lossy(&raw);
                if line.trim().is_empty() {
                    continue;
                }

                let events = match adapter.adapt(&line) {
                    Ok(events) => events,
                    Err(e) => {
                        warn!(error = %e, "Skipping malformed Gemini stream line");
                        continue;
                    }
                };

                for event in events {
                    acc.apply(&event)?;
                    if matches!(
                        &event,
                        UnifiedStreamEvent::TextDelta { .. }
                            | UnifiedStreamEvent::SearchCitations { .. }
                    ) && tx.send(event).await.is_err()
                    {
                        receiver_gone = true;
                        break 'read;
                    }
                }
            }
        }

        if !receiver_gone && !buffer.is_empty() {
            let line = String::from_utf8_lossy(&buffer).into_owned();
            if let Ok(events) = adapter.adapt(&line) {
                for event in events {
                    acc.apply(&event)?;
                    if matches!(&event, UnifiedStreamEvent::TextDelta { .. }) {
                        let _ = tx.send(event).await;
                    }
                }
            }
        }

        if receiver_gone {
            debug!(model = %self.config.model, "Stream receiver dropped, abandoning response");
        }

        acc.finish(&self.config.model)
    }

    async fn health_check(&self) -> LlmResult<()> {
        let api_key = self.api_key()?;

        let response = self
            .client
            .get(format!("{}/models/{}", self.base_url(), self.config.model))
            .header("x-goog-api-key", api_key)
            .send()
            .await
            .map_err(|e| LlmError::NetworkError {
                message: e.to_string(),
            })?;

        let status = response.status().as_u16();
        if status == 200 {
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(parse_http_error(status, &body, "gemini"))
        }
    }

    fn config(&self) -> &ProviderConfig {
        &self.config
    }

    async fn list_models(&self) -> LlmResult<Option<Vec<String>>> {
        let api_key = self.api_key()?;

        let response = self
            .client
            .get(format!("{}/models", self.base_url()))
            .header("x-goog-api-key", api_key)
            .send()
            .await
            .map_err(|e| LlmError::NetworkError {
                message: e.to_string(),
            })?;

        let status = response.status().as_u16();
        if status != 200 {
            let body = response.text().await.unwrap_or_default();
            return Err(parse_http_error(status, &body, "gemini"));
        }

        let body: serde_json::Value = response.json().await.map_err(|e| LlmError::ParseError {
            message: e.to_string(),
        })?;

        let models = body["models"]
            .as_array()
            .map(|arr| {
                arr.iter()
                    .filter_map(|m| m["name"].as_str())
                    .map(|name| name.trim_start_matches("models/").to_string())
                    .filter(|id| id.starts_with("gemini"))
                    .collect()
            })
            .unwrap_or_default();

        Ok(Some(models))
    }
}
