//! Research Desk LLM
//!
//! Provides a unified interface for generative-model providers. The Gemini
//! provider is the one shipped: structured JSON output, streamed text, and
//! Google Search grounding.
//!
//! Also includes provider-specific streaming adapters and the HTTP client factory.

pub mod gemini;
pub mod http_client;
pub mod provider;
pub mod streaming_adapters;
pub mod types;

// Re-export main types
pub use gemini::GeminiProvider;
pub use http_client::build_http_client;
pub use provider::LlmProvider;
pub use types::*;

// Re-export streaming adapters
pub use streaming_adapters::GeminiAdapter;
