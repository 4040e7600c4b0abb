use async_trait::async_trait;
use cli_clipboard::{ClipboardContext, ClipboardProvider};
use tracing::debug;

use crate::error::{Result, NeuralError};

/// System clipboard access used by trigger adapters and copy actions
#[async_trait]
pub trait Clipboard: Send + Sync {
    async fn read_text(&self) -> Result<String>;
    async fn write_text(&self, text: &str) -> Result<()>;
}

/// The desktop clipboard through `cli-clipboard`.
///
/// Providers block on the window system, so every call runs on the blocking
/// pool with a fresh context.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClipboard;

impl SystemClipboard {
    pub fn new() -> Self {
        Self
    }
}

/// Run a clipboard operation off the async workers
async fn run_blocking<T, F>(action: &'static str, op: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> std::result::Result<T, String> + Send + 'static,
{
    match tokio::task::spawn_blocking(op).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(message)) => Err(NeuralError::Clipboard(format!("Failed to {} clipboard: {}", action, message))),
        Err(e) => Err(NeuralError::Clipboard(format!("Clipboard {} task failed: {}", action, e))),
    }
}

#[async_trait]
impl Clipboard for SystemClipboard {
    async fn read_text(&self) -> Result<String> {
        let text = run_blocking("read", || {
            ClipboardContext::new()
                .and_then(|mut ctx| ctx.get_contents())
                .map_err(|e| e.to_string())
        })
        .await?;
        debug!("Read {} chars from clipboard", text.chars().count());
        Ok(text)
    }

    async fn write_text(&self, text: &str) -> Result<()> {
        let text = text.to_string();
        let chars = text.chars().count();
        run_blocking("write", move || {
            ClipboardContext::new()
                .and_then(|mut ctx| ctx.set_contents(text))
                .map_err(|e| e.to_string())
        })
        .await?;
        debug!("Wrote {} chars to clipboard", chars);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_provider_error_is_clipboard_error() {
        let err = run_blocking::<String, _>("read", || Err("no display".to_string()))
            .await
            .unwrap_err();
        match err {
            NeuralError::Clipboard(message) => assert_eq!(message, "Failed to read clipboard: no display"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_panicking_provider_is_clipboard_error() {
        let err = run_blocking::<(), _>("write", || panic!("provider crashed")).await.unwrap_err();
        assert!(matches!(err, NeuralError::Clipboard(ref m) if m.starts_with("Clipboard write task failed")));
    }

    #[tokio::test]
    async fn test_system_clipboard_never_panics_without_display() {
        // Headless machines have no clipboard; either way the call returns
        if let Err(e) = SystemClipboard::new().read_text().await {
            assert!(matches!(e, NeuralError::Clipboard(_)));
        }
    }
}
