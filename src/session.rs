use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, info, warn};

use crate::clipboard::{Clipboard, SystemClipboard};
use crate::config::Config;
use crate::engine::EngineFactory;
use crate::error::{Result, NeuralError};
use crate::gateway::{EngineGateway, EngineOutput, HealthMonitor};
use crate::history::{HistorySink, JsonHistoryStore, NoHistory};
use crate::language::{detect_by_script, Language, SourceSelection};
use crate::orchestrator::{Orchestrator, OrchestratorSettings, Phase, ViewState};
use crate::trigger::{dispatch, ClipboardPoller, DebouncedInput, ShortcutListener};

/// One line of interactive input
#[derive(Debug, Clone, PartialEq)]
pub enum SessionCommand {
    Text(String),
    Swap,
    Auto(bool),
    From(SourceSelection),
    To(Language),
    Copy,
    Quit,
}

impl SessionCommand {
    /// Lines starting with ':' are commands, anything else is typed text
    pub fn parse(line: &str) -> Result<Self> {
        let Some(command) = line.trim().strip_prefix(':') else {
            return Ok(SessionCommand::Text(line.to_string()));
        };

        let mut parts = command.split_whitespace();
        let name = parts.next().unwrap_or_default();
        let argument = parts.next();

        match (name, argument) {
            ("swap", None) => Ok(SessionCommand::Swap),
            ("copy", None) => Ok(SessionCommand::Copy),
            ("quit" | "q", None) => Ok(SessionCommand::Quit),
            ("auto", Some("on")) => Ok(SessionCommand::Auto(true)),
            ("auto", Some("off")) => Ok(SessionCommand::Auto(false)),
            ("from", Some(lang)) => Ok(SessionCommand::From(lang.parse()?)),
            ("to", Some(lang)) => Ok(SessionCommand::To(lang.parse()?)),
            _ => Err(NeuralError::Config(format!("Unknown command ':{}'", command))),
        }
    }
}

/// Fully wired translator: engines, gateway, history, orchestrator, clipboard
pub struct Session {
    config: Config,
    orchestrator: Arc<Orchestrator>,
    clipboard: Arc<dyn Clipboard>,
}

impl Session {
    pub fn new(config: Config) -> Result<Self> {
        let (accelerated, ollama) = EngineFactory::create_pair(&config.engines)?;
        let gateway = Arc::new(EngineGateway::new(accelerated, ollama, config.preferences.preferred_engine));

        let sink: Arc<dyn HistorySink> = if config.history.enabled {
            Arc::new(JsonHistoryStore::from_config(&config.history))
        } else {
            Arc::new(NoHistory)
        };

        let clipboard: Arc<dyn Clipboard> = Arc::new(SystemClipboard::new());
        let orchestrator = Arc::new(Orchestrator::new(gateway, sink, OrchestratorSettings::from_config(&config)));

        Ok(Self {
            config,
            orchestrator,
            clipboard,
        })
    }

    pub fn gateway(&self) -> &Arc<EngineGateway> {
        self.orchestrator.gateway()
    }

    /// Probe engines, then run a single request to completion
    pub async fn translate_once(&self, text: &str) -> ViewState {
        let health = self.gateway().refresh_health().await;
        debug!("Engine health before translating: {:?}", health);
        self.orchestrator.handle(text).await;
        self.orchestrator.snapshot()
    }

    /// Probe engines, then proofread `text` in `language` or its detected language
    pub async fn improve_once(&self, text: &str, language: Option<Language>) -> Result<EngineOutput<String>> {
        if text.trim().is_empty() {
            return Err(NeuralError::EmptyInput);
        }
        let health = self.gateway().refresh_health().await;
        debug!("Engine health before improving: {:?}", health);

        let language = match language {
            Some(language) => language,
            None => match self.gateway().detect_language(text).await {
                Ok(output) => output.value,
                Err(e) => {
                    warn!("{}; falling back to script detection", e);
                    detect_by_script(text)
                }
            },
        };
        info!("Improving {} chars of {}", text.chars().count(), language);
        self.gateway().improve(text, language).await
    }

    /// Interactive loop over `input` until EOF or `:quit`.
    ///
    /// `shortcut` carries payload-less signals, e.g. from SIGUSR1.
    pub async fn run_interactive<R>(&self, input: R, auto_mode: bool, shortcut: Option<mpsc::Receiver<()>>) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
    {
        let triggers = &self.config.triggers;
        let monitor = HealthMonitor::spawn(
            Arc::clone(self.gateway()),
            Duration::from_secs(self.config.engines.health_interval_secs),
        );

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let dispatcher = dispatch(Arc::clone(&self.orchestrator), events_rx);

        let (typing_tx, typing_rx) = mpsc::channel(64);
        let debouncer = DebouncedInput::spawn(Duration::from_millis(triggers.debounce_ms), typing_rx, events_tx.clone());

        let poller = Arc::new(ClipboardPoller::new(Arc::clone(&self.clipboard), auto_mode || triggers.auto_mode));
        poller.prime().await;
        let poll_task = Arc::clone(&poller).spawn(Duration::from_millis(triggers.clipboard_poll_ms), events_tx.clone());

        let shortcut_task = shortcut.map(|signals| {
            let listener = Arc::new(ShortcutListener::new(Arc::clone(&self.clipboard), triggers.double_tap));
            listener.spawn(signals, events_tx.clone())
        });
        drop(events_tx);

        let (stop_render, render_stopped) = oneshot::channel();
        let renderer = tokio::spawn(render_changes(self.orchestrator.subscribe(), render_stopped));

        info!("Interactive session started (auto mode: {})", poller.is_auto_mode());
        let mut lines = input.lines();
        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }

            let command = match SessionCommand::parse(&line) {
                Ok(command) => command,
                Err(e) => {
                    eprintln!("{}", e);
                    continue;
                }
            };

            match command {
                SessionCommand::Text(text) => {
                    self.orchestrator.set_input_text(&text);
                    let _ = typing_tx.send(text).await;
                }
                SessionCommand::Swap => match self.orchestrator.swap_languages() {
                    Ok(text) => {
                        let _ = typing_tx.send(text).await;
                    }
                    Err(e) => eprintln!("{}", e),
                },
                SessionCommand::Auto(enabled) => poller.set_auto_mode(enabled),
                SessionCommand::From(source) => self.orchestrator.set_source(source),
                SessionCommand::To(target) => self.orchestrator.set_target(target),
                SessionCommand::Copy => {
                    let result = self.orchestrator.snapshot().result_text;
                    if result.is_empty() {
                        eprintln!("Nothing to copy");
                    } else if let Err(e) = self.clipboard.write_text(&result).await {
                        warn!("Copy failed: {}", e);
                    }
                }
                SessionCommand::Quit => break,
            }
        }

        // Let pending typing fire, stop the background sources, then let in-flight requests settle
        drop(typing_tx);
        let _ = debouncer.await;
        poll_task.abort();
        let _ = poll_task.await;
        if let Some(task) = shortcut_task {
            task.abort();
            let _ = task.await;
        }
        let _ = dispatcher.await;
        monitor.abort();

        let _ = stop_render.send(());
        let _ = renderer.await;
        info!("Interactive session ended");
        Ok(())
    }
}

/// Print each settled or failed state once
async fn render_changes(mut states: watch::Receiver<ViewState>, mut stop: oneshot::Receiver<()>) {
    let mut last_printed: Option<ViewState> = None;
    loop {
        tokio::select! {
            changed = states.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = states.borrow_and_update().clone();
                print_state(&state, &mut last_printed);
            }
            _ = &mut stop => {
                if states.has_changed().unwrap_or(false) {
                    let state = states.borrow_and_update().clone();
                    print_state(&state, &mut last_printed);
                }
                break;
            }
        }
    }
}

fn print_state(state: &ViewState, last_printed: &mut Option<ViewState>) {
    if !matches!(state.phase, Phase::Settled | Phase::Error) {
        return;
    }
    let unchanged = last_printed.as_ref().is_some_and(|last| {
        last.input_text == state.input_text
            && last.result_text == state.result_text
            && last.error_message == state.error_message
    });
    if unchanged {
        return;
    }

    println!("{}", format_state(state));
    *last_printed = Some(state.clone());
}

/// Human-readable result line
pub fn format_state(state: &ViewState) -> String {
    if let Some(message) = &state.error_message {
        return format!("error: {}", message);
    }

    let source = state
        .declared_source()
        .map(|lang| lang.name().to_string())
        .unwrap_or_else(|| "?".to_string());
    let origin = match (&state.last_result, state.from_cache) {
        (_, true) => "cache".to_string(),
        (Some(result), false) => format!("{}, {}ms", result.engine_used, result.latency_ms),
        (None, false) => "-".to_string(),
    };
    format!("[{} -> {} | {}] {}", source, state.target.name(), origin, state.result_text)
}
