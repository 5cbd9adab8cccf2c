//! Services
//!
//! Business logic for the research workflow. The controller drives the
//! gateway and the store; the parser and rendering helpers are pure.

pub mod citations;
pub mod gateway;
pub mod render;
pub mod report_parser;
pub mod research;

pub use gateway::{GatewayError, GatewayResult, LlmGateway, LlmGatewayOptions, ResearchGateway};
pub use report_parser::parse_report;
pub use research::{ResearchController, SessionEvent};
