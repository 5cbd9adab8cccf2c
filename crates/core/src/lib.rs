//! Research Desk Core
//!
//! Foundational types for the Research Desk workspace. This crate has zero
//! dependencies on application-level code (session store, controller, LLM
//! providers, etc.).
//!
//! ## Module Organization
//!
//! - `error` - Core error types (`CoreError`, `CoreResult`)
//! - `proxy` - Proxy configuration data types shared across workspace crates
//! - `streaming` - Unified stream event types and adapter trait
//!
//! ## Design Principles
//!
//! 1. **Few dependencies** - serde, thiserror, and url for proxy parsing
//! 2. **Unidirectional dependency** - this crate depends on nothing else in the workspace

pub mod error;
pub mod proxy;
pub mod streaming;

// ── Error Types ────────────────────────────────────────────────────────
pub use error::{CoreError, CoreResult};

// ── Proxy Types ────────────────────────────────────────────────────────
pub use proxy::{ProxyConfig, ProxyProtocol};

// ── Streaming ──────────────────────────────────────────────────────────
pub use streaming::{AdapterError, SearchCitationEntry, StreamAdapter, UnifiedStreamEvent};
