use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use crate::engine::EngineKind;
use crate::error::{Result, NeuralError};
use crate::language::{Language, SourceSelection};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub engines: EnginesConfig,
    #[serde(default)]
    pub preferences: PreferencesConfig,
    #[serde(default)]
    pub triggers: TriggerConfig,
    #[serde(default)]
    pub history: HistoryConfig,
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EnginesConfig {
    /// HTTP timeout applied to every backend call, in seconds
    pub request_timeout_secs: u64,
    /// Seconds between background health probes
    pub health_interval_secs: u64,
    pub ollama: OllamaConfig,
    pub accelerated: AcceleratedConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OllamaConfig {
    /// Ollama endpoint URL
    pub endpoint: String,
    /// Candidate models, tried in order until one answers
    pub models: Vec<String>,
    pub temperature: f32,
    pub top_p: f32,
    pub num_predict: i32,
    /// Sequences that end generation early
    pub stop: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AcceleratedConfig {
    /// OpenAI-compatible local server (llama.cpp server, mlx_lm.server, ...)
    pub endpoint: String,
    /// Model name sent with each request
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PreferencesConfig {
    /// The user's own language
    pub native_language: Language,
    /// Backend attempted first when both are healthy
    pub preferred_engine: EngineKind,
    /// Initial source selection
    pub source: SourceSelection,
    /// Initial target language
    pub target: Language,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TriggerConfig {
    /// Quiet period after the last keystroke before translating
    pub debounce_ms: u64,
    /// Clipboard polling interval in auto mode
    pub clipboard_poll_ms: u64,
    /// Start with clipboard auto mode enabled
    pub auto_mode: bool,
    /// Require a double tap of the shortcut signal
    pub double_tap: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    pub enabled: bool,
    /// Directory holding translation_history.json (platform default when unset)
    pub directory: Option<PathBuf>,
    pub max_entries: usize,
    pub record_cache_hits: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Number of translations kept in memory
    pub cache_capacity: usize,
    /// Drop completions older than the most recently applied one
    pub discard_stale_results: bool,
}

impl Default for EnginesConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: 60,
            health_interval_secs: 30,
            ollama: OllamaConfig::default(),
            accelerated: AcceleratedConfig::default(),
        }
    }
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:11434".to_string(),
            models: vec![
                "aya:8b".to_string(),               // Translation-specialized multilingual
                "qwen2.5:3b".to_string(),           // Lightweight
                "llama3.3:8b-instruct".to_string(), // Instruction following
                "llama3.1:8b".to_string(),
                "gemma3:3b".to_string(),
                "phi4-mini".to_string(),
            ],
            temperature: 0.3,
            top_p: 0.9,
            num_predict: 1024,
            stop: vec![
                "\n\n".to_string(),
                "Translation:".to_string(),
                "Explanation:".to_string(),
                "Note:".to_string(),
                "Context:".to_string(),
            ],
        }
    }
}

impl Default for AcceleratedConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8080".to_string(),
            model: "default".to_string(),
            temperature: 0.3,
            max_tokens: 1024,
        }
    }
}

impl Default for PreferencesConfig {
    fn default() -> Self {
        Self {
            native_language: Language::Japanese,
            preferred_engine: EngineKind::Accelerated,
            source: SourceSelection::Auto,
            target: Language::English,
        }
    }
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 500,
            clipboard_poll_ms: 1000,
            auto_mode: false,
            double_tap: false,
        }
    }
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            directory: None,
            max_entries: 1000,
            record_cache_hits: false,
        }
    }
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            cache_capacity: crate::cache::DEFAULT_CAPACITY,
            discard_stale_results: false,
        }
    }
}

impl HistoryConfig {
    /// Configured directory, or the platform data directory
    pub fn resolved_directory(&self) -> PathBuf {
        match &self.directory {
            Some(dir) => dir.clone(),
            None => dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("neural"),
        }
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| NeuralError::Config(format!("Failed to read config file: {}", e)))?;

        toml::from_str(&content)
            .map_err(|e| NeuralError::Config(format!("Failed to parse config file: {}", e)))
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| NeuralError::Config(format!("Failed to serialize config: {}", e)))?;

        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        std::fs::write(path, content)
            .map_err(|e| NeuralError::Config(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }

    /// Per-user config location (~/.config/neural/config.toml on Linux)
    pub fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("neural").join("config.toml"))
    }

    /// Explicit path, then ./neural.toml, then the user config file, then defaults
    pub fn discover(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }

        let local = Path::new("neural.toml");
        if local.exists() {
            return Self::from_file(local);
        }

        if let Some(path) = Self::user_config_path() {
            if path.exists() {
                return Self::from_file(path);
            }
        }

        Ok(Self::default())
    }
}
