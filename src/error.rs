//! Error types for the query orchestrator

use crate::models::Domain;
use thiserror::Error;

/// Result type alias for orchestrator operations
pub type Result<T> = std::result::Result<T, OrchestratorError>;

#[derive(Error, Debug)]
pub enum OrchestratorError {

    // =============================
    // Core Pipeline Errors
    // =============================

    #[error("Classification failure: {0}")]
    ClassificationFailure(String),

    #[error("Reasoning service error: {0}")]
    ReasoningError(String),

    #[error("Handler timeout: {domain} handler timed out after {waited_ms} ms")]
    HandlerTimeout { domain: Domain, waited_ms: u64 },

    #[error("Handler error ({domain}): {detail}")]
    HandlerError { domain: Domain, detail: String },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    // =============================
    // External Library Conversions
    // =============================

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("HTTP client error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}
