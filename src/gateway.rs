//! Engine gateway
//!
//! Picks a backend per call (preferred first, the other one as a single
//! fallback) and reports which backend answered and how long that call took.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::engine::{Engine, EngineKind};
use crate::error::{Result, NeuralError, UnavailableReason};
use crate::language::Language;

/// Health flag per backend, written by probes and read by the gateway
#[derive(Debug)]
pub struct EngineHealth {
    accelerated: AtomicBool,
    ollama: AtomicBool,
}

impl EngineHealth {
    pub fn new(accelerated: bool, ollama: bool) -> Self {
        Self {
            accelerated: AtomicBool::new(accelerated),
            ollama: AtomicBool::new(ollama),
        }
    }

    fn flag(&self, kind: EngineKind) -> &AtomicBool {
        match kind {
            EngineKind::Accelerated => &self.accelerated,
            EngineKind::Ollama => &self.ollama,
        }
    }

    pub fn is_healthy(&self, kind: EngineKind) -> bool {
        self.flag(kind).load(Ordering::SeqCst)
    }

    /// Store a probe result, returning the previous value
    pub fn set(&self, kind: EngineKind, healthy: bool) -> bool {
        self.flag(kind).swap(healthy, Ordering::SeqCst)
    }
}

/// Result of one probe round
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthSnapshot {
    pub accelerated: bool,
    pub ollama: bool,
}

/// Successful backend call
#[derive(Debug, Clone)]
pub struct EngineOutput<T> {
    pub value: T,
    pub engine: EngineKind,
    /// Duration of the succeeding call only
    pub latency: Duration,
}

pub struct EngineGateway {
    accelerated: Arc<dyn Engine>,
    ollama: Arc<dyn Engine>,
    health: Arc<EngineHealth>,
    preferred: RwLock<EngineKind>,
}

impl EngineGateway {
    /// Backends start unhealthy until the first probe
    pub fn new(accelerated: Arc<dyn Engine>, ollama: Arc<dyn Engine>, preferred: EngineKind) -> Self {
        Self::with_health(accelerated, ollama, preferred, Arc::new(EngineHealth::new(false, false)))
    }

    pub fn with_health(
        accelerated: Arc<dyn Engine>,
        ollama: Arc<dyn Engine>,
        preferred: EngineKind,
        health: Arc<EngineHealth>,
    ) -> Self {
        Self {
            accelerated,
            ollama,
            health,
            preferred: RwLock::new(preferred),
        }
    }

    fn engine(&self, kind: EngineKind) -> Arc<dyn Engine> {
        match kind {
            EngineKind::Accelerated => Arc::clone(&self.accelerated),
            EngineKind::Ollama => Arc::clone(&self.ollama),
        }
    }

    pub fn health(&self) -> &Arc<EngineHealth> {
        &self.health
    }

    pub fn preferred(&self) -> EngineKind {
        match self.preferred.read() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    pub fn set_preferred(&self, kind: EngineKind) {
        let mut guard = match self.preferred.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *guard = kind;
        info!("Preferred engine set to {}", kind);
    }

    /// Preferred backend first, then the other one
    pub fn attempt_order(&self) -> [EngineKind; 2] {
        let preferred = self.preferred();
        [preferred, preferred.other()]
    }

    /// Run `op` on each healthy backend in order until one succeeds
    async fn with_fallback<T, F, Fut>(&self, operation: &str, op: F) -> std::result::Result<EngineOutput<T>, Option<NeuralError>>
    where
        F: Fn(Arc<dyn Engine>) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut last_error: Option<NeuralError> = None;

        for kind in self.attempt_order() {
            if !self.health.is_healthy(kind) {
                debug!("Skipping {} for {}: unhealthy", kind, operation);
                continue;
            }

            let started = Instant::now();
            match op(self.engine(kind)).await {
                Ok(value) => {
                    let latency = started.elapsed();
                    if last_error.is_some() {
                        info!("{} succeeded on fallback engine {}", operation, kind);
                    }
                    return Ok(EngineOutput { value, engine: kind, latency });
                }
                Err(e) => {
                    warn!("{} failed on {}: {}", operation, kind, e);
                    last_error = Some(e);
                }
            }
        }

        Err(last_error)
    }

    pub async fn detect_language(&self, text: &str) -> Result<EngineOutput<Language>> {
        self.with_fallback("detection", |engine| async move { engine.detect_language(text).await })
            .await
            .map_err(|last| match last {
                Some(e) => NeuralError::DetectionFailed(e.to_string()),
                None => NeuralError::DetectionFailed("no healthy engine".to_string()),
            })
    }

    pub async fn translate(&self, text: &str, from: Language, to: Language) -> Result<EngineOutput<String>> {
        self.with_fallback("translation", |engine| async move { engine.translate(text, from, to).await })
            .await
            .map_err(|last| match last {
                Some(e) => NeuralError::EngineUnavailable(e.unavailable_reason()),
                None => NeuralError::EngineUnavailable(UnavailableReason::NoHealthyBackend),
            })
    }

    /// Same-language proofreading, with the same fallback rules as `translate`
    pub async fn improve(&self, text: &str, language: Language) -> Result<EngineOutput<String>> {
        self.with_fallback("improvement", |engine| async move { engine.improve(text, language).await })
            .await
            .map_err(|last| match last {
                Some(e) => NeuralError::EngineUnavailable(e.unavailable_reason()),
                None => NeuralError::EngineUnavailable(UnavailableReason::NoHealthyBackend),
            })
    }

    /// Probe both backends concurrently and store the results
    pub async fn refresh_health(&self) -> HealthSnapshot {
        let (accelerated, ollama) = tokio::join!(
            self.accelerated.check_health(),
            self.ollama.check_health()
        );

        for (kind, healthy) in [(EngineKind::Accelerated, accelerated), (EngineKind::Ollama, ollama)] {
            let previous = self.health.set(kind, healthy);
            if previous != healthy {
                info!("Engine {} is now {}", kind, if healthy { "healthy" } else { "unhealthy" });
            }
        }

        HealthSnapshot { accelerated, ollama }
    }
}

/// Background probe keeping the health flags fresh
pub struct HealthMonitor;

impl HealthMonitor {
    pub fn spawn(gateway: Arc<EngineGateway>, interval: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval.max(Duration::from_millis(100)));
            loop {
                ticker.tick().await;
                let snapshot = gateway.refresh_health().await;
                debug!("Health probe: {:?}", snapshot);
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::MockEngine;

    fn translating(result: &'static str) -> MockEngine {
        let mut engine = MockEngine::new();
        engine
            .expect_translate()
            .times(1)
            .returning(move |_, _, _| Ok(result.to_string()));
        engine
    }

    fn failing(error: fn() -> NeuralError) -> MockEngine {
        let mut engine = MockEngine::new();
        engine.expect_translate().times(1).returning(move |_, _, _| Err(error()));
        engine
    }

    fn untouched() -> MockEngine {
        let mut engine = MockEngine::new();
        engine.expect_translate().never();
        engine.expect_detect_language().never();
        engine.expect_improve().never();
        engine
    }

    fn gateway(accelerated: MockEngine, ollama: MockEngine, preferred: EngineKind, health: (bool, bool)) -> EngineGateway {
        EngineGateway::with_health(
            Arc::new(accelerated),
            Arc::new(ollama),
            preferred,
            Arc::new(EngineHealth::new(health.0, health.1)),
        )
    }

    #[tokio::test]
    async fn test_preferred_engine_used_when_healthy() {
        let gw = gateway(translating("fast"), untouched(), EngineKind::Accelerated, (true, true));
        let output = gw.translate("Hello", Language::English, Language::Japanese).await.unwrap();
        assert_eq!(output.value, "fast");
        assert_eq!(output.engine, EngineKind::Accelerated);
    }

    #[tokio::test]
    async fn test_preference_flag_switches_order() {
        let gw = gateway(untouched(), translating("base"), EngineKind::Accelerated, (true, true));
        gw.set_preferred(EngineKind::Ollama);
        let output = gw.translate("Hello", Language::English, Language::Japanese).await.unwrap();
        assert_eq!(output.engine, EngineKind::Ollama);
    }

    #[tokio::test]
    async fn test_unhealthy_preferred_uses_alternate() {
        let gw = gateway(untouched(), translating("base"), EngineKind::Accelerated, (false, true));
        let output = gw.translate("Hello", Language::English, Language::Japanese).await.unwrap();
        assert_eq!(output.value, "base");
        assert_eq!(output.engine, EngineKind::Ollama);
    }

    #[tokio::test]
    async fn test_failure_falls_back_once() {
        let gw = gateway(
            failing(|| NeuralError::Transport {
                engine: EngineKind::Accelerated,
                message: "boom".to_string(),
            }),
            translating("base"),
            EngineKind::Accelerated,
            (true, true),
        );
        let output = gw.translate("Hello", Language::English, Language::Japanese).await.unwrap();
        assert_eq!(output.engine, EngineKind::Ollama);
        assert_eq!(output.value, "base");
    }

    #[tokio::test]
    async fn test_both_unhealthy_is_unavailable() {
        let gw = gateway(untouched(), untouched(), EngineKind::Accelerated, (false, false));
        let err = gw.translate("Hello", Language::English, Language::Japanese).await.unwrap_err();
        assert!(matches!(err, NeuralError::EngineUnavailable(UnavailableReason::NoHealthyBackend)));
    }

    #[tokio::test]
    async fn test_both_failed_reports_last_classification() {
        let gw = gateway(
            failing(|| NeuralError::Transport {
                engine: EngineKind::Accelerated,
                message: "boom".to_string(),
            }),
            failing(|| NeuralError::ConnectionRefused {
                engine: EngineKind::Ollama,
                endpoint: "http://localhost:11434".to_string(),
            }),
            EngineKind::Accelerated,
            (true, true),
        );
        let err = gw.translate("Hello", Language::English, Language::Japanese).await.unwrap_err();
        assert!(matches!(err, NeuralError::EngineUnavailable(UnavailableReason::Unreachable)));
    }

    #[tokio::test]
    async fn test_missing_capability_surfaces() {
        let gw = gateway(
            untouched(),
            failing(|| NeuralError::MissingCapability {
                engine: EngineKind::Ollama,
                message: "no models".to_string(),
            }),
            EngineKind::Ollama,
            (false, true),
        );
        let err = gw.translate("Hello", Language::English, Language::Japanese).await.unwrap_err();
        assert!(matches!(err, NeuralError::EngineUnavailable(UnavailableReason::MissingCapability)));
    }

    #[tokio::test]
    async fn test_improve_falls_back_and_keeps_language() {
        let mut accelerated = MockEngine::new();
        accelerated
            .expect_improve()
            .times(1)
            .returning(|_, _| Err(NeuralError::Transport {
                engine: EngineKind::Accelerated,
                message: "boom".to_string(),
            }));
        let mut ollama = MockEngine::new();
        ollama
            .expect_improve()
            .times(1)
            .withf(|text, language| text == "he go home" && *language == Language::English)
            .returning(|_, _| Ok("He goes home.".to_string()));

        let gw = gateway(accelerated, ollama, EngineKind::Accelerated, (true, true));
        let output = gw.improve("he go home", Language::English).await.unwrap();
        assert_eq!(output.value, "He goes home.");
        assert_eq!(output.engine, EngineKind::Ollama);
    }

    #[tokio::test]
    async fn test_improve_without_healthy_engine_is_unavailable() {
        let gw = gateway(untouched(), untouched(), EngineKind::Accelerated, (false, false));
        let err = gw.improve("he go home", Language::English).await.unwrap_err();
        assert!(matches!(err, NeuralError::EngineUnavailable(UnavailableReason::NoHealthyBackend)));
    }

    #[tokio::test]
    async fn test_detection_failure_is_detection_failed() {
        let mut accelerated = MockEngine::new();
        accelerated
            .expect_detect_language()
            .times(1)
            .returning(|_| Err(NeuralError::Transport {
                engine: EngineKind::Accelerated,
                message: "boom".to_string(),
            }));
        let gw = gateway(accelerated, untouched(), EngineKind::Accelerated, (true, false));
        let err = gw.detect_language("Hello").await.unwrap_err();
        assert!(matches!(err, NeuralError::DetectionFailed(_)));
    }

    #[tokio::test]
    async fn test_refresh_health_updates_flags() {
        let mut accelerated = MockEngine::new();
        accelerated.expect_check_health().returning(|| false);
        let mut ollama = MockEngine::new();
        ollama.expect_check_health().returning(|| true);

        let gw = gateway(accelerated, ollama, EngineKind::Accelerated, (true, false));
        let snapshot = gw.refresh_health().await;

        assert_eq!(snapshot, HealthSnapshot { accelerated: false, ollama: true });
        assert!(!gw.health().is_healthy(EngineKind::Accelerated));
        assert!(gw.health().is_healthy(EngineKind::Ollama));
    }
}
