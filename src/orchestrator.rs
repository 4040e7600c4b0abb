//! Request orchestrator
//!
//! Every trigger ends up in [`Orchestrator::handle`], which walks one request
//! through detection, pair resolution, the cache and the engine gateway, and
//! publishes the outcome through a `watch` channel.
//!
//! Calls are never queued or cancelled. By default the last completion wins;
//! with `discard_stale_results` a request stops publishing as soon as a newer
//! one has published anything.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::cache::{fingerprint, TranslationCache};
use crate::config::Config;
use crate::engine::EngineKind;
use crate::error::{Result, NeuralError};
use crate::gateway::EngineGateway;
use crate::history::{HistoryRecord, HistorySink};
use crate::language::{Language, SourceSelection, TranslationRequest};
use crate::resolver::{resolve, ResolvedPair, SourceHint};

/// Source assumed when detection fails before anything was ever detected
pub const UNKNOWN_SOURCE: Language = Language::English;

/// Position of the most recent request in the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Phase {
    Idle,
    Detecting,
    Resolving,
    CacheCheck,
    Translating,
    Settled,
    Error,
}

/// Freshly computed translation with its metadata
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TranslationResult {
    pub translated_text: String,
    pub engine_used: EngineKind,
    pub latency_ms: u64,
}

/// Everything the presentation layer renders
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ViewState {
    pub input_text: String,
    pub source: SourceSelection,
    /// Last language detected in Auto mode
    pub detected_language: Option<Language>,
    pub target: Language,
    pub result_text: String,
    pub error_message: Option<String>,
    /// Engine and latency of the last fresh translation; None for cache hits
    pub last_result: Option<TranslationResult>,
    pub from_cache: bool,
    pub phase: Phase,
    pub is_translating: bool,
}

impl ViewState {
    fn new(source: SourceSelection, target: Language) -> Self {
        Self {
            input_text: String::new(),
            source,
            detected_language: None,
            target,
            result_text: String::new(),
            error_message: None,
            last_result: None,
            from_cache: false,
            phase: Phase::Idle,
            is_translating: false,
        }
    }

    /// Manual language, or the detected one in Auto mode
    pub fn declared_source(&self) -> Option<Language> {
        match self.source {
            SourceSelection::Manual(lang) => Some(lang),
            SourceSelection::Auto => self.detected_language,
        }
    }

    /// Swapping needs two concrete languages
    pub fn can_swap(&self) -> bool {
        !self.source.is_auto()
    }
}

#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    pub native_language: Language,
    pub source: SourceSelection,
    pub target: Language,
    pub cache_capacity: usize,
    pub discard_stale_results: bool,
}

impl OrchestratorSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            native_language: config.preferences.native_language,
            source: config.preferences.source,
            target: config.preferences.target,
            cache_capacity: config.orchestrator.cache_capacity,
            discard_stale_results: config.orchestrator.discard_stale_results,
        }
    }
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

pub struct Orchestrator {
    gateway: Arc<EngineGateway>,
    cache: TranslationCache,
    history: Arc<dyn HistorySink>,
    native_language: RwLock<Language>,
    state: watch::Sender<ViewState>,
    sequence: AtomicU64,
    last_applied: AtomicU64,
    discard_stale: bool,
}

impl Orchestrator {
    pub fn new(gateway: Arc<EngineGateway>, history: Arc<dyn HistorySink>, settings: OrchestratorSettings) -> Self {
        let (state, _) = watch::channel(ViewState::new(settings.source, settings.target));
        Self {
            gateway,
            cache: TranslationCache::with_capacity(settings.cache_capacity),
            history,
            native_language: RwLock::new(settings.native_language),
            state,
            sequence: AtomicU64::new(0),
            last_applied: AtomicU64::new(0),
            discard_stale: settings.discard_stale_results,
        }
    }

    pub fn gateway(&self) -> &Arc<EngineGateway> {
        &self.gateway
    }

    pub fn cache(&self) -> &TranslationCache {
        &self.cache
    }

    pub fn subscribe(&self) -> watch::Receiver<ViewState> {
        self.state.subscribe()
    }

    pub fn snapshot(&self) -> ViewState {
        self.state.borrow().clone()
    }

    pub fn native_language(&self) -> Language {
        match self.native_language.read() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    pub fn set_native_language(&self, language: Language) {
        let mut guard = match self.native_language.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *guard = language;
    }

    pub fn set_source(&self, source: SourceSelection) {
        self.state.send_modify(|state| state.source = source);
    }

    pub fn set_target(&self, target: Language) {
        self.state.send_modify(|state| state.target = target);
    }

    /// Record typed input without translating it
    pub fn set_input_text(&self, text: &str) {
        self.state.send_modify(|state| state.input_text = text.to_string());
    }

    /// Swap input/result text and the language pair in one update.
    ///
    /// Returns the new input text, which the caller feeds to the debounce path.
    pub fn swap_languages(&self) -> Result<String> {
        let mut swapped = Err(NeuralError::SwapUnavailable);
        self.state.send_if_modified(|state| {
            let SourceSelection::Manual(from) = state.source else {
                return false;
            };
            state.source = SourceSelection::Manual(state.target);
            state.target = from;
            std::mem::swap(&mut state.input_text, &mut state.result_text);
            state.error_message = None;
            state.last_result = None;
            state.from_cache = false;
            swapped = Ok(state.input_text.clone());
            true
        });
        swapped
    }

    /// Publish a state change unless a newer request already published
    fn apply<F: FnOnce(&mut ViewState)>(&self, seq: u64, update: F) -> bool {
        self.state.send_if_modified(|state| {
            if self.discard_stale {
                let newest = self.last_applied.load(Ordering::SeqCst);
                if seq < newest {
                    debug!("Dropping update from stale request #{} (newest #{})", seq, newest);
                    return false;
                }
                self.last_applied.store(seq, Ordering::SeqCst);
            }
            update(state);
            true
        })
    }

    /// Single entry point for every trigger
    pub async fn handle(&self, raw_text: &str) {
        if raw_text.trim().is_empty() {
            debug!("{}, ignoring", NeuralError::EmptyInput);
            return;
        }

        let seq = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        let request = {
            let state = self.state.borrow();
            TranslationRequest::new(raw_text, state.source, state.target)
        };
        debug!("Request #{}: {} chars, {} -> {}", seq, request.text.chars().count(), request.from, request.to);

        self.apply(seq, |state| {
            state.input_text = request.text.clone();
            state.phase = Phase::Idle;
        });

        let hint = self.detect(seq, &request).await;

        let pair = resolve(hint, request.to, self.native_language());
        debug!("Request #{} resolved to {} -> {}", seq, pair.from, pair.to);
        self.apply(seq, |state| {
            state.phase = Phase::Resolving;
            state.target = pair.to;
        });

        let key = fingerprint(&request.text, &pair);
        self.apply(seq, |state| state.phase = Phase::CacheCheck);
        if let Some(cached) = self.cache.get(&key) {
            debug!("Request #{} served from cache", seq);
            let applied = self.apply(seq, |state| {
                state.result_text = cached.clone();
                state.error_message = None;
                state.last_result = None;
                state.from_cache = true;
                state.phase = Phase::Settled;
                // Older requests still in flight will never publish again
                if self.discard_stale {
                    state.is_translating = false;
                }
            });
            if applied {
                self.record_history(&request.text, cached, pair, None).await;
            }
            return;
        }

        self.translate(seq, &request.text, pair, key).await;
    }

    async fn detect(&self, seq: u64, request: &TranslationRequest) -> SourceHint {
        if let SourceSelection::Manual(language) = request.from {
            return SourceHint::Manual(language);
        }

        self.apply(seq, |state| state.phase = Phase::Detecting);
        match self.gateway.detect_language(&request.text).await {
            Ok(output) => {
                debug!("Detected {} via {}", output.value, output.engine);
                self.apply(seq, |state| state.detected_language = Some(output.value));
                SourceHint::Detected(output.value)
            }
            Err(e) => {
                let fallback = self.state.borrow().detected_language.unwrap_or(UNKNOWN_SOURCE);
                warn!("{}; continuing with {}", e, fallback);
                SourceHint::Manual(fallback)
            }
        }
    }

    async fn translate(&self, seq: u64, text: &str, pair: ResolvedPair, key: String) {
        self.apply(seq, |state| {
            state.phase = Phase::Translating;
            state.is_translating = true;
        });

        match self.gateway.translate(text, pair.from, pair.to).await {
            Ok(output) => {
                self.cache.put(key, output.value.clone());
                let result = TranslationResult {
                    translated_text: output.value,
                    engine_used: output.engine,
                    latency_ms: latency_millis(output.latency),
                };
                info!(
                    "Translated {} -> {} with {} in {}ms",
                    pair.from, pair.to, result.engine_used, result.latency_ms
                );

                let applied = self.apply(seq, |state| {
                    state.result_text = result.translated_text.clone();
                    state.error_message = None;
                    state.last_result = Some(result.clone());
                    state.from_cache = false;
                    state.phase = Phase::Settled;
                    state.is_translating = false;
                });
                if applied {
                    self.record_history(text, result.translated_text.clone(), pair, Some(&result)).await;
                }
            }
            Err(e) => {
                warn!("Request #{} failed: {}", seq, e);
                let message = e.user_message();
                self.apply(seq, |state| {
                    state.result_text.clear();
                    state.error_message = Some(message);
                    state.last_result = None;
                    state.from_cache = false;
                    state.phase = Phase::Error;
                    state.is_translating = false;
                });
            }
        }
    }

    async fn record_history(
        &self,
        source_text: &str,
        translated_text: String,
        pair: ResolvedPair,
        result: Option<&TranslationResult>,
    ) {
        let record = HistoryRecord {
            source_text: source_text.to_string(),
            translated_text,
            from_language: pair.from,
            to_language: pair.to,
            engine: result.map(|r| r.engine_used),
            latency_ms: result.map(|r| r.latency_ms),
            from_cache: result.is_none(),
        };

        if let Err(e) = self.history.append(record).await {
            warn!("Failed to record translation history: {}", e);
        }
    }
}

/// Whole milliseconds, saturating at `u64::MAX`
fn latency_millis(latency: Duration) -> u64 {
    u64::try_from(latency.as_millis()).unwrap_or(u64::MAX)
}
