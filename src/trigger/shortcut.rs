use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::{TriggerEvent, TriggerOrigin};
use crate::clipboard::Clipboard;

/// Taps closer than this are key repeat
pub const MIN_TAP_INTERVAL: Duration = Duration::from_millis(50);
/// Maximum gap between the two taps of a double tap
pub const DOUBLE_TAP_TIMEOUT: Duration = Duration::from_millis(300);

#[derive(Debug, Default)]
pub struct DoubleTapDetector {
    first_tap: Option<Instant>,
}

impl DoubleTapDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true when `now` completes a double tap
    pub fn register_tap(&mut self, now: Instant) -> bool {
        let Some(first) = self.first_tap else {
            self.first_tap = Some(now);
            return false;
        };

        let elapsed = now.saturating_duration_since(first);
        if elapsed > DOUBLE_TAP_TIMEOUT {
            debug!("Double-tap window expired, treating as first tap");
            self.first_tap = Some(now);
            false
        } else if elapsed > MIN_TAP_INTERVAL {
            self.first_tap = None;
            true
        } else {
            debug!("Tap {}ms after the first, ignoring", elapsed.as_millis());
            false
        }
    }
}

/// Turns payload-less shortcut signals into clipboard translations
pub struct ShortcutListener {
    clipboard: Arc<dyn Clipboard>,
    double_tap: Option<Mutex<DoubleTapDetector>>,
}

impl ShortcutListener {
    pub fn new(clipboard: Arc<dyn Clipboard>, double_tap: bool) -> Self {
        Self {
            clipboard,
            double_tap: double_tap.then(|| Mutex::new(DoubleTapDetector::new())),
        }
    }

    fn accepts(&self, now: Instant) -> bool {
        match &self.double_tap {
            None => true,
            Some(detector) => {
                let mut detector = match detector.lock() {
                    Ok(guard) => guard,
                    Err(poisoned) => poisoned.into_inner(),
                };
                detector.register_tap(now)
            }
        }
    }

    /// Handle one signal received at `now`
    pub async fn on_signal(&self, now: Instant) -> Option<TriggerEvent> {
        if !self.accepts(now) {
            return None;
        }

        match self.clipboard.read_text().await {
            Ok(text) if !text.trim().is_empty() => Some(TriggerEvent::new(text, TriggerOrigin::Shortcut)),
            Ok(_) => {
                debug!("Shortcut fired with an empty clipboard");
                None
            }
            Err(e) => {
                warn!("Shortcut could not read the clipboard: {}", e);
                None
            }
        }
    }

    pub fn spawn(
        self: Arc<Self>,
        mut signals: mpsc::Receiver<()>,
        events: mpsc::UnboundedSender<TriggerEvent>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            while signals.recv().await.is_some() {
                if let Some(event) = self.on_signal(Instant::now()).await {
                    if events.send(event).is_err() {
                        break;
                    }
                }
            }
        })
    }
}
