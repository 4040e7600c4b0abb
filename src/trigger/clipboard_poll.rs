use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::{TriggerEvent, TriggerOrigin};
use crate::clipboard::Clipboard;

/// Watches the clipboard while auto mode is on
pub struct ClipboardPoller {
    clipboard: Arc<dyn Clipboard>,
    auto_mode: Arc<AtomicBool>,
    last_seen: Mutex<Option<String>>,
}

impl ClipboardPoller {
    pub fn new(clipboard: Arc<dyn Clipboard>, auto_mode: bool) -> Self {
        Self {
            clipboard,
            auto_mode: Arc::new(AtomicBool::new(auto_mode)),
            last_seen: Mutex::new(None),
        }
    }

    pub fn is_auto_mode(&self) -> bool {
        self.auto_mode.load(Ordering::SeqCst)
    }

    pub fn set_auto_mode(&self, enabled: bool) {
        if self.auto_mode.swap(enabled, Ordering::SeqCst) != enabled {
            info!("Clipboard auto mode {}", if enabled { "enabled" } else { "disabled" });
        }
    }

    /// Remember the current clipboard so only later copies trigger
    pub async fn prime(&self) {
        if let Ok(text) = self.clipboard.read_text().await {
            *self.lock_last_seen() = Some(text);
        }
    }

    fn lock_last_seen(&self) -> std::sync::MutexGuard<'_, Option<String>> {
        match self.last_seen.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Compare-and-set against the last snapshot; returns text only when it changed
    fn observe(&self, text: String) -> Option<String> {
        if text.trim().is_empty() {
            return None;
        }

        let mut last_seen = self.lock_last_seen();
        if last_seen.as_deref() == Some(text.as_str()) {
            return None;
        }
        *last_seen = Some(text.clone());
        Some(text)
    }

    /// One poll tick
    pub async fn poll_once(&self) -> Option<String> {
        if !self.is_auto_mode() {
            return None;
        }

        match self.clipboard.read_text().await {
            Ok(text) => self.observe(text),
            Err(e) => {
                debug!("Clipboard poll failed: {}", e);
                None
            }
        }
    }

    pub fn spawn(self: Arc<Self>, interval: Duration, events: mpsc::UnboundedSender<TriggerEvent>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                if let Some(text) = self.poll_once().await {
                    debug!("Clipboard changed ({} chars)", text.chars().count());
                    if events.send(TriggerEvent::new(text, TriggerOrigin::Clipboard)).is_err() {
                        break;
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{NeuralError, Result};
    use async_trait::async_trait;

    /// In-memory clipboard for tests
    #[derive(Default)]
    struct MemoryClipboard {
        content: Mutex<Option<String>>,
    }

    impl MemoryClipboard {
        fn copy(&self, text: &str) {
            *self.content.lock().unwrap() = Some(text.to_string());
        }
    }

    #[async_trait]
    impl Clipboard for MemoryClipboard {
        async fn read_text(&self) -> Result<String> {
            self.content
                .lock()
                .unwrap()
                .clone()
                .ok_or_else(|| NeuralError::Clipboard("empty".to_string()))
        }

        async fn write_text(&self, text: &str) -> Result<()> {
            self.copy(text);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_emits_only_on_change() {
        let clipboard = Arc::new(MemoryClipboard::default());
        let poller = ClipboardPoller::new(clipboard.clone(), true);

        assert_eq!(poller.poll_once().await, None);

        clipboard.copy("Hello");
        assert_eq!(poller.poll_once().await.as_deref(), Some("Hello"));
        assert_eq!(poller.poll_once().await, None);

        clipboard.copy("World");
        assert_eq!(poller.poll_once().await.as_deref(), Some("World"));
    }

    #[tokio::test]
    async fn test_disabled_auto_mode_reads_nothing() {
        let clipboard = Arc::new(MemoryClipboard::default());
        clipboard.copy("Hello");
        let poller = ClipboardPoller::new(clipboard.clone(), false);

        assert_eq!(poller.poll_once().await, None);

        poller.set_auto_mode(true);
        assert_eq!(poller.poll_once().await.as_deref(), Some("Hello"));
    }

    #[tokio::test]
    async fn test_blank_content_is_skipped() {
        let clipboard = Arc::new(MemoryClipboard::default());
        clipboard.copy("  \n");
        let poller = ClipboardPoller::new(clipboard.clone(), true);
        assert_eq!(poller.poll_once().await, None);
    }

    #[tokio::test]
    async fn test_prime_ignores_existing_content() {
        let clipboard = Arc::new(MemoryClipboard::default());
        clipboard.copy("already there");
        let poller = ClipboardPoller::new(clipboard.clone(), true);
        poller.prime().await;

        assert_eq!(poller.poll_once().await, None);
        clipboard.copy("fresh");
        assert_eq!(poller.poll_once().await.as_deref(), Some("fresh"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_spawned_poller_sends_clipboard_events() {
        let clipboard = Arc::new(MemoryClipboard::default());
        clipboard.copy("Bonjour");
        let poller = Arc::new(ClipboardPoller::new(clipboard, true));
        let (tx, mut rx) = mpsc::unbounded_channel();

        let handle = poller.spawn(Duration::from_millis(1000), tx);
        let event = rx.recv().await.unwrap();
        assert_eq!(event, TriggerEvent::new("Bonjour", TriggerOrigin::Clipboard));
        handle.abort();
    }
}
