use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

use neural::engine::{Engine, EngineKind};
use neural::error::{NeuralError, Result};
use neural::gateway::{EngineGateway, EngineHealth};
use neural::history::{HistoryRecord, HistorySink};
use neural::language::{detect_by_script, Language, SourceSelection};
use neural::orchestrator::{Orchestrator, OrchestratorSettings, Phase};
use neural::trigger::{dispatch, DebouncedInput, DEFAULT_QUIET_PERIOD};

/// Deterministic backend: "[<target code>] <text>", optional per-text delay
struct ScriptedEngine {
    kind: EngineKind,
    delays: HashMap<String, Duration>,
    detection_delay: Duration,
    translations: AtomicUsize,
}

impl ScriptedEngine {
    fn new(kind: EngineKind) -> Self {
        Self {
            kind,
            delays: HashMap::new(),
            detection_delay: Duration::ZERO,
            translations: AtomicUsize::new(0),
        }
    }

    fn with_delay(mut self, text: &str, delay: Duration) -> Self {
        self.delays.insert(text.to_string(), delay);
        self
    }

    fn with_detection_delay(mut self, delay: Duration) -> Self {
        self.detection_delay = delay;
        self
    }

    fn translations(&self) -> usize {
        self.translations.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Engine for ScriptedEngine {
    fn kind(&self) -> EngineKind {
        self.kind
    }

    async fn detect_language(&self, text: &str) -> Result<Language> {
        if !self.detection_delay.is_zero() {
            tokio::time::sleep(self.detection_delay).await;
        }
        Ok(detect_by_script(text))
    }

    async fn translate(&self, text: &str, _from: Language, to: Language) -> Result<String> {
        self.translations.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delays.get(text) {
            tokio::time::sleep(*delay).await;
        }
        Ok(format!("[{}] {}", to.code(), text))
    }

    async fn improve(&self, text: &str, language: Language) -> Result<String> {
        Ok(format!("[{} edit] {}", language.code(), text))
    }

    async fn check_health(&self) -> bool {
        true
    }
}

#[derive(Default)]
struct RecordingHistory {
    records: Mutex<Vec<HistoryRecord>>,
}

impl RecordingHistory {
    fn records(&self) -> Vec<HistoryRecord> {
        self.records.lock().unwrap().clone()
    }
}

#[async_trait]
impl HistorySink for RecordingHistory {
    async fn append(&self, record: HistoryRecord) -> Result<()> {
        self.records.lock().unwrap().push(record);
        Ok(())
    }
}

struct FailingHistory;

#[async_trait]
impl HistorySink for FailingHistory {
    async fn append(&self, _record: HistoryRecord) -> Result<()> {
        Err(NeuralError::History("disk full".to_string()))
    }
}

struct Harness {
    orchestrator: Arc<Orchestrator>,
    accelerated: Arc<ScriptedEngine>,
    ollama: Arc<ScriptedEngine>,
    history: Arc<RecordingHistory>,
}

fn harness(accelerated: ScriptedEngine, health: (bool, bool), settings: OrchestratorSettings) -> Harness {
    let accelerated = Arc::new(accelerated);
    let ollama = Arc::new(ScriptedEngine::new(EngineKind::Ollama));
    let history = Arc::new(RecordingHistory::default());
    let gateway = EngineGateway::with_health(
        accelerated.clone(),
        ollama.clone(),
        EngineKind::Accelerated,
        Arc::new(EngineHealth::new(health.0, health.1)),
    );
    let orchestrator = Arc::new(Orchestrator::new(Arc::new(gateway), history.clone(), settings));
    Harness {
        orchestrator,
        accelerated,
        ollama,
        history,
    }
}

fn default_harness() -> Harness {
    harness(ScriptedEngine::new(EngineKind::Accelerated), (true, true), OrchestratorSettings::default())
}

#[tokio::test]
async fn test_hello_uses_preferred_engine_and_native_target() {
    let h = default_harness();
    h.orchestrator.handle("Hello").await;

    let state = h.orchestrator.snapshot();
    assert_eq!(state.phase, Phase::Settled);
    assert_eq!(state.detected_language, Some(Language::English));
    assert_eq!(state.target, Language::Japanese);
    assert_eq!(state.result_text, "[ja] Hello");
    assert!(!state.is_translating);
    let result = state.last_result.unwrap();
    assert_eq!(result.engine_used, EngineKind::Accelerated);

    assert_eq!(
        h.orchestrator.cache().get("Hello§English§Japanese").as_deref(),
        Some("[ja] Hello")
    );

    let records = h.history.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].engine, Some(EngineKind::Accelerated));
    assert!(!records[0].from_cache);
}

#[tokio::test]
async fn test_repeated_request_is_served_from_cache() {
    let h = default_harness();
    h.orchestrator.handle("Good morning").await;
    let first = h.orchestrator.snapshot();

    h.orchestrator.handle("Good morning").await;
    let second = h.orchestrator.snapshot();

    assert_eq!(h.accelerated.translations(), 1);
    assert_eq!(second.result_text, first.result_text);
    assert!(second.from_cache);
    assert_eq!(second.last_result, None);

    let records = h.history.records();
    assert_eq!(records.len(), 2);
    assert!(records[1].from_cache);
    assert_eq!(records[1].latency_ms, None);
}

#[tokio::test]
async fn test_unhealthy_preferred_falls_back_to_ollama() {
    let h = harness(ScriptedEngine::new(EngineKind::Accelerated), (false, true), OrchestratorSettings::default());
    h.orchestrator.handle("Hello").await;

    let state = h.orchestrator.snapshot();
    assert_eq!(state.last_result.unwrap().engine_used, EngineKind::Ollama);
    assert_eq!(h.accelerated.translations(), 0);
    assert_eq!(h.ollama.translations(), 1);
}

#[tokio::test]
async fn test_no_healthy_engine_reports_error_without_side_effects() {
    let h = harness(ScriptedEngine::new(EngineKind::Accelerated), (false, false), OrchestratorSettings::default());
    h.orchestrator.handle("Hello").await;

    let state = h.orchestrator.snapshot();
    assert_eq!(state.phase, Phase::Error);
    assert!(!state.is_translating);
    assert!(state.error_message.unwrap().starts_with("Cannot connect"));
    assert!(h.orchestrator.cache().is_empty());
    assert!(h.history.records().is_empty());
}

#[tokio::test]
async fn test_detected_language_drives_target() {
    let h = default_harness();

    h.orchestrator.handle("こんにちは").await;
    assert_eq!(h.orchestrator.snapshot().target, Language::English);
    assert_eq!(h.orchestrator.snapshot().detected_language, Some(Language::Japanese));

    h.orchestrator.handle("我是学生的").await;
    let state = h.orchestrator.snapshot();
    assert_eq!(state.detected_language, Some(Language::Chinese));
    assert_eq!(state.target, Language::Japanese);
    // Detection never overwrites the declared source
    assert_eq!(state.source, SourceSelection::Auto);
}

#[tokio::test]
async fn test_history_failure_does_not_affect_result() {
    let accelerated: Arc<dyn Engine> = Arc::new(ScriptedEngine::new(EngineKind::Accelerated));
    let ollama: Arc<dyn Engine> = Arc::new(ScriptedEngine::new(EngineKind::Ollama));
    let gateway = EngineGateway::with_health(
        accelerated,
        ollama,
        EngineKind::Accelerated,
        Arc::new(EngineHealth::new(true, true)),
    );
    let orchestrator = Orchestrator::new(Arc::new(gateway), Arc::new(FailingHistory), OrchestratorSettings::default());

    orchestrator.handle("Hello").await;
    let state = orchestrator.snapshot();
    assert_eq!(state.phase, Phase::Settled);
    assert_eq!(state.result_text, "[ja] Hello");
}

#[tokio::test(start_paused = true)]
async fn test_overlapping_requests_last_completion_wins() {
    let engine = ScriptedEngine::new(EngineKind::Accelerated)
        .with_delay("slow request", Duration::from_secs(2))
        .with_delay("fast request", Duration::from_millis(100));
    let h = harness(engine, (true, true), OrchestratorSettings::default());

    tokio::join!(h.orchestrator.handle("slow request"), async {
        tokio::time::sleep(Duration::from_millis(10)).await;
        h.orchestrator.handle("fast request").await;
    });

    let state = h.orchestrator.snapshot();
    assert_eq!(state.result_text, "[ja] slow request");
    assert_eq!(h.orchestrator.cache().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_stale_results_discarded_when_enabled() {
    let engine = ScriptedEngine::new(EngineKind::Accelerated)
        .with_delay("slow request", Duration::from_secs(2))
        .with_delay("fast request", Duration::from_millis(100));
    let settings = OrchestratorSettings {
        discard_stale_results: true,
        ..OrchestratorSettings::default()
    };
    let h = harness(engine, (true, true), settings);

    tokio::join!(h.orchestrator.handle("slow request"), async {
        tokio::time::sleep(Duration::from_millis(10)).await;
        h.orchestrator.handle("fast request").await;
    });

    let state = h.orchestrator.snapshot();
    assert_eq!(state.result_text, "[ja] fast request");
    assert_eq!(state.input_text, "fast request");
    // The stale result is still cached, but never shown or recorded
    assert_eq!(h.orchestrator.cache().len(), 2);
    let records = h.history.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].source_text, "fast request");
}

#[tokio::test(start_paused = true)]
async fn test_cache_hit_clears_translating_left_by_stale_request() {
    let engine = ScriptedEngine::new(EngineKind::Accelerated)
        .with_delay("slow request", Duration::from_secs(2))
        .with_delay("fast request", Duration::from_millis(100));
    let settings = OrchestratorSettings {
        discard_stale_results: true,
        ..OrchestratorSettings::default()
    };
    let h = harness(engine, (true, true), settings);
    h.orchestrator.handle("fast request").await;

    tokio::join!(h.orchestrator.handle("slow request"), async {
        tokio::time::sleep(Duration::from_millis(10)).await;
        h.orchestrator.handle("fast request").await;
    });

    let state = h.orchestrator.snapshot();
    assert_eq!(state.phase, Phase::Settled);
    assert_eq!(state.result_text, "[ja] fast request");
    assert!(state.from_cache);
    assert!(!state.is_translating);
}

#[tokio::test(start_paused = true)]
async fn test_in_flight_phases_are_published() {
    let engine = ScriptedEngine::new(EngineKind::Accelerated)
        .with_detection_delay(Duration::from_millis(500))
        .with_delay("Hello", Duration::from_secs(2));
    let h = harness(engine, (true, true), OrchestratorSettings::default());
    let mut states = h.orchestrator.subscribe();
    let started = tokio::time::Instant::now();

    let orchestrator = h.orchestrator.clone();
    let request = tokio::spawn(async move { orchestrator.handle("Hello").await });

    tokio::time::sleep(Duration::from_millis(100)).await;
    let detecting = h.orchestrator.snapshot();
    assert_eq!(detecting.phase, Phase::Detecting);
    assert_eq!(detecting.input_text, "Hello");
    assert!(!detecting.is_translating);

    let translating = states.wait_for(|state| state.phase == Phase::Translating).await.unwrap().clone();
    assert!(translating.is_translating);
    assert_eq!(translating.detected_language, Some(Language::English));
    assert!(translating.result_text.is_empty());
    assert!(started.elapsed() < Duration::from_secs(2));

    request.await.unwrap();
    let settled = h.orchestrator.snapshot();
    assert_eq!(settled.phase, Phase::Settled);
    assert!(!settled.is_translating);
    assert_eq!(settled.result_text, "[ja] Hello");
}

#[tokio::test]
async fn test_improve_falls_back_like_translate() {
    let h = harness(ScriptedEngine::new(EngineKind::Accelerated), (false, true), OrchestratorSettings::default());

    let output = h.orchestrator.gateway().improve("helo world", Language::English).await.unwrap();
    assert_eq!(output.engine, EngineKind::Ollama);
    assert_eq!(output.value, "[en edit] helo world");
}

#[tokio::test(start_paused = true)]
async fn test_debounced_typing_runs_one_pass() {
    let h = default_harness();
    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let dispatcher = dispatch(h.orchestrator.clone(), events_rx);

    let (typing_tx, typing_rx) = mpsc::channel(16);
    let debouncer = DebouncedInput::spawn(DEFAULT_QUIET_PERIOD, typing_rx, events_tx);

    for partial in ["H", "He", "Hel", "Hell", "Hello"] {
        typing_tx.send(partial.to_string()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    assert_eq!(h.accelerated.translations(), 0);

    // The quiet period elapses while the input is still open
    tokio::time::sleep(DEFAULT_QUIET_PERIOD).await;
    assert_eq!(h.accelerated.translations(), 1);

    drop(typing_tx);
    debouncer.await.unwrap();
    dispatcher.await.unwrap();

    assert_eq!(h.accelerated.translations(), 1);
    assert_eq!(h.orchestrator.snapshot().result_text, "[ja] Hello");
}

#[tokio::test]
async fn test_swap_feeds_previous_result_back() {
    let settings = OrchestratorSettings {
        source: SourceSelection::Manual(Language::English),
        target: Language::French,
        ..OrchestratorSettings::default()
    };
    let h = harness(ScriptedEngine::new(EngineKind::Accelerated), (true, true), settings);

    h.orchestrator.handle("Hello").await;
    let new_input = tokio_test::assert_ok!(h.orchestrator.swap_languages());
    assert_eq!(new_input, "[fr] Hello");

    h.orchestrator.handle(&new_input).await;
    let state = h.orchestrator.snapshot();
    assert_eq!(state.source, SourceSelection::Manual(Language::French));
    assert_eq!(state.target, Language::English);
    assert_eq!(state.result_text, "[en] [fr] Hello");
}
