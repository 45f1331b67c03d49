use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use groupflow_core::config::HostConfig;
use groupflow_core::event::{EventBus, RunnerEvent};
use groupflow_core::types::JobId;

const RECONNECT_DELAY: Duration = Duration::from_secs(2);

/// Translates the host's websocket event stream into bus notifications.
///
/// This is the one subscription shim at the system boundary: nothing else
/// touches the host's broadcast transport. Delivery is best-effort; the
/// runner's fallback poll covers dropped frames and connection gaps.
pub struct EventPump {
    url: String,
    events: Arc<EventBus>,
    cancel: CancellationToken,
}

impl EventPump {
    pub fn new(
        config: &HostConfig,
        client_id: &str,
        events: Arc<EventBus>,
        cancel: CancellationToken,
    ) -> Self {
        let ws_base = ws_base_url(&config.base_url);
        Self {
            url: format!("{}/ws?clientId={}", ws_base, client_id),
            events,
            cancel,
        }
    }

    /// Run the connect/read/reconnect loop. Blocks until cancelled.
    pub async fn run(&self) {
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    info!("Event pump shutting down");
                    return;
                }
                result = connect_async(self.url.clone()) => {
                    match result {
                        Ok((mut stream, _)) => {
                            info!(url = %self.url, "Host event stream connected");
                            loop {
                                tokio::select! {
                                    _ = self.cancel.cancelled() => {
                                        info!("Event pump shutting down");
                                        return;
                                    }
                                    msg = stream.next() => match msg {
                                        Some(Ok(Message::Text(text))) => self.handle_frame(text.as_str()),
                                        Some(Ok(_)) => {} // binary preview frames, pings
                                        Some(Err(e)) => {
                                            warn!(error = %e, "Event stream error");
                                            break;
                                        }
                                        None => {
                                            warn!("Event stream closed by host");
                                            break;
                                        }
                                    }
                                }
                            }
                        }
                        Err(e) => warn!(url = %self.url, error = %e, "Event stream connect failed"),
                    }
                }
            }

            tokio::select! {
                _ = self.cancel.cancelled() => return,
                _ = tokio::time::sleep(RECONNECT_DELAY) => {}
            }
        }
    }

    fn handle_frame(&self, raw: &str) {
        let Ok(frame) = serde_json::from_str::<serde_json::Value>(raw) else {
            debug!("Non-JSON event frame ignored");
            return;
        };
        let kind = frame
            .get("type")
            .and_then(serde_json::Value::as_str)
            .unwrap_or_default();
        let job = frame
            .pointer("/data/prompt_id")
            .and_then(serde_json::Value::as_str)
            .map(JobId::new);

        match kind {
            // Errored prompts land in history too; both are terminal.
            "execution_success" | "execution_error" => {
                if let Some(job) = job {
                    debug!(job = %job, kind, "Job reached terminal state");
                    self.events.publish(RunnerEvent::JobFinished { job });
                }
            }
            "execution_interrupted" => {
                debug!("Host interruption observed");
                self.events.publish(RunnerEvent::JobInterrupted { job });
            }
            _ => {}
        }
    }
}

fn ws_base_url(base_url: &str) -> String {
    let trimmed = base_url.trim_end_matches('/');
    if let Some(rest) = trimmed.strip_prefix("https://") {
        format!("wss://{}", rest)
    } else if let Some(rest) = trimmed.strip_prefix("http://") {
        format!("ws://{}", rest)
    } else {
        trimmed.to_string()
    }
}
