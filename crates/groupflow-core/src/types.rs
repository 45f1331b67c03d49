use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Node identifier as assigned by the graph editor.
pub type NodeId = u64;

/// Opaque identifier the host assigns to a submitted work item.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct JobId(pub String);

impl JobId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Where a submitted job currently sits on the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    /// Waiting in the pending queue.
    Queued,
    /// Currently executing.
    Running,
    /// Present in history; execution reached a terminal state.
    Finished,
    /// Neither queued nor in history.
    Gone,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Finished | JobState::Gone)
    }
}

/// One input binding inside a work item: either a reference to another
/// node's output slot or a literal value.
///
/// Serialized untagged so a link renders as `["4", 0]`, the host wire
/// format. Link must come first: a two-element array deserializes as a
/// reference, everything else as a literal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InputBinding {
    Link(String, u32),
    Literal(serde_json::Value),
}

/// A single node entry in a work item.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkItemNode {
    pub class_type: String,
    #[serde(default)]
    pub inputs: BTreeMap<String, InputBinding>,
}

/// A fully resolved, self-contained unit of work submittable to the host,
/// keyed by node id rendered as a decimal string. Immutable once submitted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkItem(pub BTreeMap<String, WorkItemNode>);

impl WorkItem {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn get(&self, id: NodeId) -> Option<&WorkItemNode> {
        self.0.get(&id.to_string())
    }

    pub fn insert(&mut self, id: NodeId, node: WorkItemNode) {
        self.0.insert(id.to_string(), node);
    }
}

/// Group name that marks a pure-delay entry: no submission, just a pause.
pub const DELAY_SENTINEL: &str = "__delay__";

/// The atomic unit a plan is made of: run one named group `repeat_count`
/// times with `delay_seconds` between iterations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionEntry {
    pub group_name: String,
    #[serde(default = "default_repeat_count")]
    pub repeat_count: u32,
    #[serde(default)]
    pub delay_seconds: f64,
}

fn default_repeat_count() -> u32 {
    1
}

impl ExecutionEntry {
    pub fn group(name: impl Into<String>) -> Self {
        Self {
            group_name: name.into(),
            repeat_count: 1,
            delay_seconds: 0.0,
        }
    }

    pub fn with_repeat(mut self, count: u32) -> Self {
        self.repeat_count = count.max(1);
        self
    }

    pub fn with_delay(mut self, seconds: f64) -> Self {
        self.delay_seconds = seconds.max(0.0);
        self
    }

    /// A standalone pause between groups.
    pub fn delay(seconds: f64) -> Self {
        Self {
            group_name: DELAY_SENTINEL.to_string(),
            repeat_count: 1,
            delay_seconds: seconds.max(0.0),
        }
    }

    pub fn is_delay(&self) -> bool {
        self.group_name == DELAY_SENTINEL
    }
}

/// Ordered sequence of execution entries. The one canonical plan
/// representation; there is no record-or-list dual form.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionPlan {
    pub entries: Vec<ExecutionEntry>,
}

impl ExecutionPlan {
    pub fn new(entries: Vec<ExecutionEntry>) -> Self {
        Self { entries }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of entries that actually submit work (delay sentinels excluded).
    pub fn group_entry_count(&self) -> usize {
        self.entries.iter().filter(|e| !e.is_delay()).count()
    }
}

/// Lifecycle of a running plan. Terminal states are never resurrected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Running,
    Completed,
    Cancelled,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TaskStatus::Running)
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TaskStatus::Running => "running",
            TaskStatus::Completed => "completed",
            TaskStatus::Cancelled => "cancelled",
        };
        write!(f, "{}", s)
    }
}

/// Per-entry outcome in a run report. Failed iterations are recorded and
/// skipped, not fatal; the counts make silent misconfiguration visible.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntryReport {
    pub group_name: String,
    pub iterations_attempted: u32,
    pub iterations_submitted: u32,
    #[serde(default)]
    pub failures: Vec<String>,
}

impl EntryReport {
    pub fn new(group_name: impl Into<String>) -> Self {
        Self {
            group_name: group_name.into(),
            iterations_attempted: 0,
            iterations_submitted: 0,
            failures: Vec::new(),
        }
    }
}

/// Final outcome of one plan run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub submitter: String,
    pub status: TaskStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub entries: Vec<EntryReport>,
}

impl RunReport {
    /// Total failures across all entries.
    pub fn failure_count(&self) -> usize {
        self.entries.iter().map(|e| e.failures.len()).sum()
    }
}

/// One parameter of a node class, in declaration order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamSpec {
    pub name: String,
    /// The parameter's widget value is followed by an auxiliary
    /// regenerate-control value in the serialized widget list, so it
    /// consumes two slots instead of one.
    #[serde(default)]
    pub control_after_generate: bool,
}

impl ParamSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            control_after_generate: false,
        }
    }

    pub fn with_control(mut self) -> Self {
        self.control_after_generate = true;
        self
    }
}

/// Parameter schema of a node class, in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeSchema {
    pub params: Vec<ParamSpec>,
}

impl NodeSchema {
    pub fn new(params: Vec<ParamSpec>) -> Self {
        Self { params }
    }
}
