use futures::future::BoxFuture;

use crate::error::Result;
use crate::types::{JobId, JobState, NodeSchema, WorkItem};

/// Host execution engine capability: submission, queue probing and
/// interruption. Injected explicitly wherever it is needed; never reached
/// through ambient globals.
pub trait HostClient: Send + Sync + 'static {
    /// Submit a work item for execution. A rejection by the host's own
    /// validation surfaces as `Validation`, a queueing fault as
    /// `Submission`.
    fn submit(&self, item: &WorkItem) -> BoxFuture<'_, Result<JobId>>;

    /// Probe the host queue/history for a submitted job.
    fn job_state(&self, job: &JobId) -> BoxFuture<'_, Result<JobState>>;

    /// Remove not-yet-started submissions from the pending queue.
    fn cancel_pending(&self, jobs: &[JobId]) -> BoxFuture<'_, Result<()>>;

    /// Request a global interrupt of whatever the host is executing.
    fn interrupt(&self) -> BoxFuture<'_, Result<()>>;

    /// Ask the host to release memory (model offload and/or cache flush).
    fn free_memory(&self, unload_models: bool, free_cache: bool) -> BoxFuture<'_, Result<()>>;
}

/// Node-type registry capability: which classes produce externally visible
/// output, and each class's parameter schema in declaration order.
pub trait NodeCatalog: Send + Sync + 'static {
    fn is_output_node(&self, class: &str) -> bool;

    fn schema(&self, class: &str) -> Option<NodeSchema>;
}
