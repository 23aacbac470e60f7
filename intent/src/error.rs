//! Error types for the intent registry.

use thiserror::Error;

/// Error type for intent registration and matching.
#[derive(Error, Debug)]
pub enum IntentError {
    /// Name or skill id is empty, blank, or contains the key separator.
    #[error("intent: invalid name: {0:?}")]
    InvalidName(String),

    /// A namespaced key did not decode into exactly (name, skill_id).
    #[error("intent: malformed key: {0:?}")]
    MalformedKey(String),

    /// A sample could not be compiled by the engine.
    #[error("intent: bad template for {key}: {reason}")]
    Template { key: String, reason: String },

    /// Skill manifest is structurally invalid.
    #[error("intent: manifest: {0}")]
    Manifest(String),

    /// Service configuration is invalid.
    #[error("intent: config: {0}")]
    Config(String),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML decoding error.
    #[error("intent: yaml: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON decoding error.
    #[error("intent: json: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for intent operations.
pub type Result<T> = std::result::Result<T, IntentError>;
