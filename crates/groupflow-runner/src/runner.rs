use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::broadcast::error::RecvError;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use groupflow_core::config::RunnerConfig;
use groupflow_core::event::{EventBus, RunnerEvent};
use groupflow_core::graph::GraphSnapshot;
use groupflow_core::traits::{HostClient, NodeCatalog};
use groupflow_core::types::{
    EntryReport, ExecutionEntry, ExecutionPlan, JobId, JobState, RunReport, TaskStatus,
};
use groupflow_graph::build_request;

/// Per-submitter run state. Lives in the handle table, mutated only under
/// its lock. A terminal handle is never resurrected; a new run replaces it.
struct TaskHandle {
    status: TaskStatus,
    cancel_requested: bool,
    report: Option<RunReport>,
}

enum Flow {
    Continue,
    Stop,
}

enum WaitOutcome {
    Finished,
    Interrupted,
    Cancelled,
}

/// Drives execution plans against the host queue, one background worker
/// per active submitter id.
///
/// `start` and `cancel` return immediately; all blocking (delays,
/// wait-for-completion) happens on the worker. Waiting combines the event
/// bus subscription with a bounded-interval poll of host state, so dropped
/// notifications cannot hang a worker and cancellation is observed within
/// one interval.
pub struct TaskRunner {
    inner: Arc<Inner>,
}

struct Inner {
    host: Arc<dyn HostClient>,
    catalog: Arc<dyn NodeCatalog>,
    events: Arc<EventBus>,
    config: RunnerConfig,
    handles: Mutex<HashMap<String, TaskHandle>>,
}

impl TaskRunner {
    pub fn new(
        host: Arc<dyn HostClient>,
        catalog: Arc<dyn NodeCatalog>,
        events: Arc<EventBus>,
        config: RunnerConfig,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                host,
                catalog,
                events,
                config,
                handles: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Start running a plan for `submitter_id`. Returns false (without
    /// queueing) when that submitter already has a running plan.
    pub fn start(&self, submitter_id: &str, plan: ExecutionPlan, snapshot: GraphSnapshot) -> bool {
        {
            let mut handles = self.inner.handles.lock().unwrap();
            if let Some(handle) = handles.get(submitter_id) {
                if handle.status == TaskStatus::Running {
                    warn!(submitter = submitter_id, "Plan already running, start rejected");
                    return false;
                }
            }
            handles.insert(
                submitter_id.to_string(),
                TaskHandle {
                    status: TaskStatus::Running,
                    cancel_requested: false,
                    report: None,
                },
            );
        }

        info!(
            submitter = submitter_id,
            entries = plan.entries.len(),
            "Plan started"
        );
        self.inner.events.publish(RunnerEvent::RunStarted {
            submitter: submitter_id.to_string(),
        });

        let inner = self.inner.clone();
        let submitter = submitter_id.to_string();
        tokio::spawn(async move {
            inner.run_plan(submitter, plan, snapshot).await;
        });
        true
    }

    /// Request cancellation of a running plan. Also fires the host's global
    /// interrupt so in-flight host-side work actually stops, not just
    /// future submissions. Returns false when no running plan exists.
    pub fn cancel(&self, submitter_id: &str) -> bool {
        let found = {
            let mut handles = self.inner.handles.lock().unwrap();
            match handles.get_mut(submitter_id) {
                Some(handle) if handle.status == TaskStatus::Running => {
                    handle.cancel_requested = true;
                    true
                }
                _ => false,
            }
        };

        if found {
            info!(submitter = submitter_id, "Cancellation requested");
            let host = self.inner.host.clone();
            tokio::spawn(async move {
                if let Err(e) = host.interrupt().await {
                    warn!(error = %e, "Host interrupt failed");
                }
            });
        } else {
            warn!(submitter = submitter_id, "No running plan to cancel");
        }
        found
    }

    pub fn status(&self, submitter_id: &str) -> Option<TaskStatus> {
        self.inner
            .handles
            .lock()
            .unwrap()
            .get(submitter_id)
            .map(|h| h.status)
    }

    pub fn report(&self, submitter_id: &str) -> Option<RunReport> {
        self.inner
            .handles
            .lock()
            .unwrap()
            .get(submitter_id)
            .and_then(|h| h.report.clone())
    }
}

impl Inner {
    fn cancel_requested(&self, submitter: &str) -> bool {
        self.handles
            .lock()
            .unwrap()
            .get(submitter)
            .map(|h| h.cancel_requested)
            .unwrap_or(false)
    }

    async fn run_plan(&self, submitter: String, plan: ExecutionPlan, snapshot: GraphSnapshot) {
        let started_at = Utc::now();
        let total = plan.group_entry_count() as u32;
        let mut step = 0u32;
        let mut entries = Vec::new();

        for entry in &plan.entries {
            if self.cancel_requested(&submitter) {
                break;
            }

            if entry.is_delay() {
                self.events.publish(RunnerEvent::EntryDelay {
                    submitter: submitter.clone(),
                    seconds: entry.delay_seconds,
                });
                if !self.sleep_cancellable(&submitter, entry.delay_seconds).await {
                    break;
                }
                continue;
            }

            step += 1;
            self.events.publish(RunnerEvent::EntryStarted {
                submitter: submitter.clone(),
                group: entry.group_name.clone(),
                step,
                total,
            });

            let (report, flow) = self.run_entry(&submitter, entry, &snapshot).await;
            entries.push(report);
            if matches!(flow, Flow::Stop) {
                break;
            }
        }

        let status = self.finish(&submitter, started_at, entries);
        info!(submitter = %submitter, status = %status, "Plan finished");
    }

    async fn run_entry(
        &self,
        submitter: &str,
        entry: &ExecutionEntry,
        snapshot: &GraphSnapshot,
    ) -> (EntryReport, Flow) {
        let mut report = EntryReport::new(&entry.group_name);

        for iteration in 0..entry.repeat_count {
            if self.cancel_requested(submitter) {
                return (report, Flow::Stop);
            }
            report.iterations_attempted += 1;

            let item = match build_request(snapshot, &entry.group_name, self.catalog.as_ref()) {
                Ok(item) => item,
                Err(e) => {
                    warn!(
                        submitter,
                        group = %entry.group_name,
                        iteration,
                        error = %e,
                        "Request build failed, skipping iteration"
                    );
                    report.failures.push(e.to_string());
                    continue;
                }
            };

            let job = match self.host.submit(&item).await {
                Ok(job) => job,
                Err(e) => {
                    warn!(
                        submitter,
                        group = %entry.group_name,
                        iteration,
                        error = %e,
                        "Submission failed, skipping iteration"
                    );
                    report.failures.push(e.to_string());
                    continue;
                }
            };
            report.iterations_submitted += 1;
            debug!(submitter, job = %job, group = %entry.group_name, "Work item submitted");

            match self.wait_for_job(submitter, &job).await {
                WaitOutcome::Finished => {}
                WaitOutcome::Interrupted => {
                    info!(submitter, job = %job, "Host interrupted, stopping plan");
                    return (report, Flow::Stop);
                }
                WaitOutcome::Cancelled => {
                    if let Err(e) = self.host.cancel_pending(std::slice::from_ref(&job)).await {
                        warn!(job = %job, error = %e, "Failed to drop pending submission");
                    }
                    return (report, Flow::Stop);
                }
            }

            if iteration + 1 < entry.repeat_count && entry.delay_seconds > 0.0 {
                self.events.publish(RunnerEvent::EntryDelay {
                    submitter: submitter.to_string(),
                    seconds: entry.delay_seconds,
                });
                if !self.sleep_cancellable(submitter, entry.delay_seconds).await {
                    return (report, Flow::Stop);
                }
            }
        }

        (report, Flow::Continue)
    }

    /// Block until the job finishes, the host interrupts, or our own cancel
    /// flag fires, whichever first. Host notifications may race or drop;
    /// the interval poll of queue/history state is the correctness
    /// backstop, not an optimization.
    async fn wait_for_job(&self, submitter: &str, job: &JobId) -> WaitOutcome {
        let mut rx = self.events.subscribe();
        let poll = self.config.poll_interval();
        let mut next_poll = Instant::now() + poll;

        loop {
            if self.cancel_requested(submitter) {
                return WaitOutcome::Cancelled;
            }

            let now = Instant::now();
            if now >= next_poll {
                next_poll = now + poll;
                match self.host.job_state(job).await {
                    Ok(state) if state.is_terminal() => {
                        if state == JobState::Gone {
                            warn!(job = %job, "Job absent from queue and history, treating as finished");
                        }
                        self.settle().await;
                        return WaitOutcome::Finished;
                    }
                    Ok(_) => {}
                    Err(e) => warn!(job = %job, error = %e, "Queue poll failed"),
                }
                continue;
            }

            match tokio::time::timeout(next_poll - now, rx.recv()).await {
                Ok(Ok(RunnerEvent::JobFinished { job: id })) if id == *job => {
                    self.settle().await;
                    return WaitOutcome::Finished;
                }
                Ok(Ok(RunnerEvent::JobInterrupted { job: id }))
                    if id.is_none() || id.as_ref() == Some(job) =>
                {
                    return WaitOutcome::Interrupted;
                }
                Ok(Ok(_)) => {}
                Ok(Err(RecvError::Lagged(skipped))) => {
                    debug!(skipped, "Event stream lagged, relying on poll fallback");
                }
                Ok(Err(RecvError::Closed)) => {
                    tokio::time::sleep_until(next_poll).await;
                }
                Err(_) => {}
            }
        }
    }

    /// Brief pause after completion detection so host queue state settles
    /// before the next submission.
    async fn settle(&self) {
        let delay = self.config.settle_delay();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }

    /// Sleep in slices, re-checking the cancel flag each slice. Returns
    /// false when cancellation was observed.
    async fn sleep_cancellable(&self, submitter: &str, seconds: f64) -> bool {
        if seconds <= 0.0 {
            return !self.cancel_requested(submitter);
        }
        let slice = self.config.sleep_slice();
        let mut remaining = Duration::from_secs_f64(seconds);
        while !remaining.is_zero() {
            if self.cancel_requested(submitter) {
                return false;
            }
            let step = remaining.min(slice);
            tokio::time::sleep(step).await;
            remaining -= step;
        }
        !self.cancel_requested(submitter)
    }

    /// Set the terminal status exactly once: cancelled iff the cancel flag
    /// was raised, completed otherwise.
    fn finish(
        &self,
        submitter: &str,
        started_at: DateTime<Utc>,
        entries: Vec<EntryReport>,
    ) -> TaskStatus {
        let status = {
            let mut handles = self.handles.lock().unwrap();
            match handles.get_mut(submitter) {
                Some(handle) => {
                    let status = if handle.cancel_requested {
                        TaskStatus::Cancelled
                    } else {
                        TaskStatus::Completed
                    };
                    handle.status = status;
                    handle.report = Some(RunReport {
                        submitter: submitter.to_string(),
                        status,
                        started_at,
                        finished_at: Some(Utc::now()),
                        entries,
                    });
                    status
                }
                None => TaskStatus::Completed,
            }
        };

        self.events.publish(RunnerEvent::RunFinished {
            submitter: submitter.to_string(),
            status,
        });
        status
    }
}
