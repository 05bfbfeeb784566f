//! Error types for Synheart Circadian
//!
//! Only genuine failures live here. "Not enough history yet" and degenerate
//! input are expected states and are reported inside the result structures.

use thiserror::Error;

/// Errors that can occur during computation
#[derive(Debug, Error)]
pub enum ComputeError {
    #[error("Failed to parse input: {0}")]
    ParseError(String),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Invalid sleep record at index {index}: {reason}")]
    InvalidRecord { index: usize, reason: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Encoding error: {0}")]
    EncodingError(String),

    #[error("Unsupported sleep source: {0}")]
    UnsupportedSource(String),
}
