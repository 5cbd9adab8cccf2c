//! Integration Tests Module
//!
//! Exercises the research workflow through the public API: the controller
//! against a scripted gateway, report parsing and rendering, and snapshot
//! storage on disk.

// Scripted gateway and controller fixtures
mod support;

// Session controller workflow tests
mod controller_test;

// Report parser and rendering tests
mod parser_test;

// Snapshot loading and restart tests
mod store_test;
