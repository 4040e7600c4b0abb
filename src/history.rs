use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::config::HistoryConfig;
use crate::engine::EngineKind;
use crate::error::{Result, NeuralError};
use crate::language::Language;

const HISTORY_FILE_NAME: &str = "translation_history.json";
const HISTORY_FORMAT_VERSION: &str = "1.0";

/// What the orchestrator forwards after a settled translation
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryRecord {
    pub source_text: String,
    pub translated_text: String,
    pub from_language: Language,
    pub to_language: Language,
    /// None for cache hits
    pub engine: Option<EngineKind>,
    pub latency_ms: Option<u64>,
    pub from_cache: bool,
}

/// Destination for settled translations; failures are logged by the caller
#[async_trait]
pub trait HistorySink: Send + Sync {
    async fn append(&self, record: HistoryRecord) -> Result<()>;
}

/// Sink that records nothing
pub struct NoHistory;

#[async_trait]
impl HistorySink for NoHistory {
    async fn append(&self, _record: HistoryRecord) -> Result<()> {
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HistoryEntry {
    pub id: String,
    pub timestamp: i64,
    pub source_text: String,
    pub translated_text: String,
    pub from_language: Language,
    pub to_language: Language,
    /// "accelerated", "ollama" or "cache"
    pub engine: String,
    pub latency_ms: Option<u64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HistoryFile {
    pub version: String,
    pub created_at: i64,
    pub updated_at: i64,
    pub translations: Vec<HistoryEntry>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct HistoryStats {
    pub total_translations: usize,
    pub created_at: Option<i64>,
    pub updated_at: Option<i64>,
    pub version: Option<String>,
}

/// JSON-file history keeping the most recent entries
pub struct JsonHistoryStore {
    path: PathBuf,
    max_entries: usize,
    record_cache_hits: bool,
    // Serializes read-modify-write cycles from overlapping translations
    write_lock: Mutex<()>,
}

impl JsonHistoryStore {
    pub fn new<P: AsRef<Path>>(directory: P, max_entries: usize, record_cache_hits: bool) -> Self {
        Self {
            path: directory.as_ref().join(HISTORY_FILE_NAME),
            max_entries: max_entries.max(1),
            record_cache_hits,
            write_lock: Mutex::new(()),
        }
    }

    pub fn from_config(config: &HistoryConfig) -> Self {
        Self::new(config.resolved_directory(), config.max_entries, config.record_cache_hits)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_file(&self) -> Result<Option<HistoryFile>> {
        if !fs::try_exists(&self.path).await? {
            return Ok(None);
        }

        let content = fs::read_to_string(&self.path).await?;
        let file = serde_json::from_str::<HistoryFile>(&content)
            .map_err(|e| NeuralError::History(format!("Failed to parse history file: {}", e)))?;
        Ok(Some(file))
    }

    /// Entries newest first, optionally truncated
    pub async fn load(&self, limit: Option<usize>) -> Result<Vec<HistoryEntry>> {
        let mut translations = match self.read_file().await? {
            Some(file) => file.translations,
            None => return Ok(Vec::new()),
        };

        translations.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        if let Some(limit) = limit {
            translations.truncate(limit);
        }

        Ok(translations)
    }

    pub async fn clear(&self) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        if fs::try_exists(&self.path).await? {
            fs::remove_file(&self.path).await?;
            info!("Cleared translation history at {}", self.path.display());
        }
        Ok(())
    }

    pub async fn stats(&self) -> Result<HistoryStats> {
        Ok(match self.read_file().await? {
            Some(file) => HistoryStats {
                total_translations: file.translations.len(),
                created_at: Some(file.created_at),
                updated_at: Some(file.updated_at),
                version: Some(file.version),
            },
            None => HistoryStats {
                total_translations: 0,
                created_at: None,
                updated_at: None,
                version: None,
            },
        })
    }

    fn new_entry_id(timestamp: i64) -> String {
        let suffix: String = uuid::Uuid::new_v4().simple().to_string().chars().take(8).collect();
        format!("{}_{}", timestamp, suffix)
    }
}

#[async_trait]
impl HistorySink for JsonHistoryStore {
    async fn append(&self, record: HistoryRecord) -> Result<()> {
        if record.from_cache && !self.record_cache_hits {
            debug!("Skipping history for cache hit");
            return Ok(());
        }

        let _guard = self.write_lock.lock().await;
        let timestamp = Utc::now().timestamp();

        let mut file = self.read_file().await?.unwrap_or_else(|| HistoryFile {
            version: HISTORY_FORMAT_VERSION.to_string(),
            created_at: timestamp,
            updated_at: timestamp,
            translations: Vec::new(),
        });

        file.translations.push(HistoryEntry {
            id: Self::new_entry_id(timestamp),
            timestamp,
            source_text: record.source_text,
            translated_text: record.translated_text,
            from_language: record.from_language,
            to_language: record.to_language,
            engine: record
                .engine
                .map(|e| e.as_str().to_string())
                .unwrap_or_else(|| "cache".to_string()),
            latency_ms: record.latency_ms,
        });
        file.updated_at = timestamp;

        if file.translations.len() > self.max_entries {
            let excess = file.translations.len() - self.max_entries;
            file.translations.drain(0..excess);
        }

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let content = serde_json::to_string_pretty(&file)?;
        fs::write(&self.path, content).await?;

        debug!("Appended history entry ({} total)", file.translations.len());
        Ok(())
    }
}
