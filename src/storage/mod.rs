//! Storage Layer
//!
//! Handles all data persistence: JSON config, snapshot backends, and the
//! session store built on them.

pub mod config;
pub mod session_store;
pub mod snapshot;

pub use config::*;
pub use session_store::*;
pub use snapshot::*;
