//! Data Models
//!
//! Contains all data structures used throughout the application.

pub mod session;
pub mod settings;

pub use session::*;
pub use settings::*;
