//! Parlot: a small intent-classification chat responder.
//!
//! Train a model from an intent catalog, then answer sentences from the
//! console or over a websocket.

pub mod brain;
pub mod config;
pub mod console;
pub mod error;
pub mod fs_manager;
pub mod server;
pub mod telemetry;

pub use error::AppError;

#[cfg(test)]
mod tests;
