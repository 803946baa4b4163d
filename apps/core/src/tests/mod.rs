//! Test Module
//!
//! Cross-module test suites for Parlot.
//!
//! ## Test Categories
//! - `brain_tests`: vocabulary, encoding and responder policy end to end
//! - `pipeline_tests`: training and reloading artifacts on disk
//! - `server_tests`: websocket round trips
