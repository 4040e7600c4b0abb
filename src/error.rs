use thiserror::Error;

use crate::engine::EngineKind;

/// Why the gateway could not produce a result from either backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnavailableReason {
    /// Neither backend reported healthy, nothing was attempted
    NoHealthyBackend,
    /// The last attempted backend refused the connection
    Unreachable,
    /// A backend was reachable but had no usable model
    MissingCapability,
    /// Generic failure of every attempted backend
    Failed,
}

#[derive(Error, Debug)]
pub enum NeuralError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Input text is empty")]
    EmptyInput,

    #[error("Language detection failed: {0}")]
    DetectionFailed(String),

    #[error("Cannot connect to {engine} at {endpoint}")]
    ConnectionRefused { engine: EngineKind, endpoint: String },

    #[error("{engine} has no suitable model: {message}")]
    MissingCapability { engine: EngineKind, message: String },

    #[error("{engine} request failed: {message}")]
    Transport { engine: EngineKind, message: String },

    #[error("No translation engine available ({0:?})")]
    EngineUnavailable(UnavailableReason),

    #[error("Unknown language: {0}")]
    UnknownLanguage(String),

    #[error("Language swap requires a manually selected source language")]
    SwapUnavailable,

    #[error("Clipboard error: {0}")]
    Clipboard(String),

    #[error("History error: {0}")]
    History(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl NeuralError {
    /// Reason to report when this error was the last failed backend attempt
    pub fn unavailable_reason(&self) -> UnavailableReason {
        match self {
            NeuralError::ConnectionRefused { .. } => UnavailableReason::Unreachable,
            NeuralError::MissingCapability { .. } => UnavailableReason::MissingCapability,
            NeuralError::EngineUnavailable(reason) => *reason,
            NeuralError::Http(e) if e.is_connect() => UnavailableReason::Unreachable,
            _ => UnavailableReason::Failed,
        }
    }

    /// Single human-readable line shown in place of a translation
    pub fn user_message(&self) -> String {
        match self.unavailable_reason() {
            UnavailableReason::NoHealthyBackend | UnavailableReason::Unreachable => {
                "Cannot connect to a translation engine. Please make sure Ollama or the accelerated server is running.".to_string()
            }
            UnavailableReason::MissingCapability => {
                "No suitable translation model available. Please install one, e.g. `ollama pull aya:8b`.".to_string()
            }
            UnavailableReason::Failed => {
                "Translation failed. Please try again.".to_string()
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, NeuralError>;
