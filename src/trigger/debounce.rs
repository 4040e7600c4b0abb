use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::debug;

use super::{TriggerEvent, TriggerOrigin};

pub const DEFAULT_QUIET_PERIOD: Duration = Duration::from_millis(500);

/// Emits the latest text once input has been quiet for a full period
pub struct DebouncedInput;

impl DebouncedInput {
    /// Each received text restarts the quiet period. Text still pending when
    /// the input channel closes is emitted when its timer runs out.
    pub fn spawn(
        quiet: Duration,
        mut input: mpsc::Receiver<String>,
        events: mpsc::UnboundedSender<TriggerEvent>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut pending: Option<(String, Instant)> = None;

            loop {
                let deadline = pending.as_ref().map(|(_, deadline)| *deadline);
                let received = match deadline {
                    Some(deadline) => {
                        tokio::select! {
                            text = input.recv() => text,
                            _ = tokio::time::sleep_until(deadline) => {
                                if let Some((text, _)) = pending.take() {
                                    if events.send(TriggerEvent::new(text, TriggerOrigin::Typing)).is_err() {
                                        break;
                                    }
                                }
                                continue;
                            }
                        }
                    }
                    None => input.recv().await,
                };

                match received {
                    Some(text) => pending = Some((text, Instant::now() + quiet)),
                    None => {
                        if let Some((text, deadline)) = pending.take() {
                            tokio::time::sleep_until(deadline).await;
                            let _ = events.send(TriggerEvent::new(text, TriggerOrigin::Typing));
                        }
                        break;
                    }
                }
            }

            debug!("Debounced input stopped");
        })
    }
}
