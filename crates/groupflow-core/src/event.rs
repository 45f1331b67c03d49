use crate::types::{JobId, TaskStatus};

/// Event broadcast to all subscribers.
///
/// Host adapters feed the job notifications; the task runner publishes the
/// run-progress variants. Delivery is best-effort; the runner never relies
/// on a notification arriving and always keeps a fallback poll.
#[derive(Debug, Clone)]
pub enum RunnerEvent {
    /// A submitted job reached a terminal state on the host.
    JobFinished { job: JobId },
    /// The host interrupted execution; `None` means a global interrupt with
    /// no job id attached.
    JobInterrupted { job: Option<JobId> },
    /// A plan started running.
    RunStarted { submitter: String },
    /// A group entry started (step/total exclude delay entries).
    EntryStarted {
        submitter: String,
        group: String,
        step: u32,
        total: u32,
    },
    /// A delay (sentinel or inter-iteration) started.
    EntryDelay { submitter: String, seconds: f64 },
    /// A plan reached a terminal status.
    RunFinished {
        submitter: String,
        status: TaskStatus,
    },
}

/// Event bus using tokio broadcast channel.
/// All subscribers receive all events.
pub struct EventBus {
    tx: tokio::sync::broadcast::Sender<RunnerEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = tokio::sync::broadcast::channel(capacity);
        Self { tx }
    }

    pub fn publish(&self, event: RunnerEvent) {
        // Ignore error if no receivers
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<RunnerEvent> {
        self.tx.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
