use std::sync::Arc;

use groupflow_runner::{PlanStore, TaskRunner};

/// Shared state for gateway routes.
pub struct AppState {
    pub runner: Arc<TaskRunner>,
    pub plans: Arc<PlanStore>,
}
