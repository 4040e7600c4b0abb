// Trigger sources
//
// Every way a translation can start ends up as a TriggerEvent:
// - Typing: debounced text changes
// - Clipboard: auto-mode polling of the system clipboard
// - Shortcut: a payload-less signal that reads the clipboard itself
//
// `dispatch` turns each event into an independent orchestrator call.

pub mod debounce;
pub mod clipboard_poll;
pub mod shortcut;

use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};
use tracing::debug;

pub use clipboard_poll::ClipboardPoller;
pub use debounce::{DebouncedInput, DEFAULT_QUIET_PERIOD};
pub use shortcut::{DoubleTapDetector, ShortcutListener};
use crate::orchestrator::Orchestrator;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerOrigin {
    Typing,
    Clipboard,
    Shortcut,
}

impl fmt::Display for TriggerOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TriggerOrigin::Typing => "typing",
            TriggerOrigin::Clipboard => "clipboard",
            TriggerOrigin::Shortcut => "shortcut",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerEvent {
    pub text: String,
    pub origin: TriggerOrigin,
}

impl TriggerEvent {
    pub fn new(text: impl Into<String>, origin: TriggerOrigin) -> Self {
        Self { text: text.into(), origin }
    }
}

/// Feed trigger events to the orchestrator, one task per event.
///
/// Requests are neither queued behind each other nor cancelled. Once every
/// sender is gone the loop waits for in-flight requests and ends.
pub fn dispatch(orchestrator: Arc<Orchestrator>, mut events: mpsc::UnboundedReceiver<TriggerEvent>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut in_flight = JoinSet::new();
        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Some(event) => {
                        debug!("Trigger from {}", event.origin);
                        let orchestrator = Arc::clone(&orchestrator);
                        in_flight.spawn(async move {
                            orchestrator.handle(&event.text).await;
                        });
                    }
                    None => break,
                },
                Some(_) = in_flight.join_next(), if !in_flight.is_empty() => {}
            }
        }

        while in_flight.join_next().await.is_some() {}
        debug!("Trigger channel closed");
    })
}
