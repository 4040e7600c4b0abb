// Interchangeable inference backends
//
// Two implementations share the Engine contract:
// - Accelerated: local OpenAI-compatible server (llama.cpp, MLX, ...)
// - Ollama: baseline local Ollama daemon
//
// The gateway only sees `dyn Engine`, so fallback logic never branches on
// which backend it is talking to.

pub mod common;
pub mod ollama;
pub mod accelerated;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

pub use common::*;
use crate::config::EnginesConfig;
use crate::error::Result;
use crate::language::Language;

/// Identity of a backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    Accelerated,
    Ollama,
}

impl EngineKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EngineKind::Accelerated => "accelerated",
            EngineKind::Ollama => "ollama",
        }
    }

    /// The backend used as fallback for this one
    pub fn other(&self) -> EngineKind {
        match self {
            EngineKind::Accelerated => EngineKind::Ollama,
            EngineKind::Ollama => EngineKind::Accelerated,
        }
    }
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EngineKind {
    type Err = crate::error::NeuralError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "accelerated" | "ml" => Ok(EngineKind::Accelerated),
            "ollama" => Ok(EngineKind::Ollama),
            _ => Err(crate::error::NeuralError::Config(format!(
                "Invalid engine '{}'. Valid engines: accelerated, ollama",
                s
            ))),
        }
    }
}

/// Contract every inference backend implements
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Engine: Send + Sync {
    /// Which backend this is
    fn kind(&self) -> EngineKind;

    /// Detect the language of a text
    async fn detect_language(&self, text: &str) -> Result<Language>;

    /// Translate text between two concrete languages
    async fn translate(&self, text: &str, from: Language, to: Language) -> Result<String>;

    /// Proofread text without changing its language
    async fn improve(&self, text: &str, language: Language) -> Result<String>;

    /// Probe whether the backend is reachable and able to translate
    async fn check_health(&self) -> bool;
}

/// Factory for creating engine instances
pub struct EngineFactory;

impl EngineFactory {
    /// Create one backend sharing the given HTTP client
    pub fn create_engine(kind: EngineKind, config: &EnginesConfig, client: Client) -> Arc<dyn Engine> {
        match kind {
            EngineKind::Accelerated => {
                Arc::new(accelerated::AcceleratedEngine::new(config.accelerated.clone(), client))
            }
            EngineKind::Ollama => {
                Arc::new(ollama::OllamaEngine::new(config.ollama.clone(), client))
            }
        }
    }

    /// Create both backends, accelerated first
    pub fn create_pair(config: &EnginesConfig) -> Result<(Arc<dyn Engine>, Arc<dyn Engine>)> {
        let client = create_http_client(config)?;
        Ok((
            Self::create_engine(EngineKind::Accelerated, config, client.clone()),
            Self::create_engine(EngineKind::Ollama, config, client),
        ))
    }
}
