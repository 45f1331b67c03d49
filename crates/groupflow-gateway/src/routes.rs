use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use tracing::info;

use groupflow_core::error::GroupflowError;
use groupflow_core::graph::GraphSnapshot;
use groupflow_core::types::ExecutionPlan;

use crate::state::AppState;

// GET /api/health
pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

// GET /api/plans
pub async fn list_plans(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(serde_json::json!({ "plans": state.plans.list() }))
}

#[derive(Deserialize)]
pub struct SavePlanBody {
    pub name: String,
    pub plan: ExecutionPlan,
}

// POST /api/plans
pub async fn save_plan(
    State(state): State<Arc<AppState>>,
    Json(body): Json<SavePlanBody>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    match state.plans.save(&body.name, &body.plan) {
        Ok(stored) => Ok(Json(serde_json::json!({ "name": stored }))),
        Err(GroupflowError::InvalidPlanName(_)) => Err(StatusCode::BAD_REQUEST),
        Err(_) => Err(StatusCode::INTERNAL_SERVER_ERROR),
    }
}

// GET /api/plans/:name
pub async fn get_plan(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<ExecutionPlan>, StatusCode> {
    match state.plans.load(&name) {
        Ok(plan) => Ok(Json(plan)),
        Err(GroupflowError::PlanNotFound(_)) => Err(StatusCode::NOT_FOUND),
        Err(GroupflowError::InvalidPlanName(_)) => Err(StatusCode::BAD_REQUEST),
        Err(_) => Err(StatusCode::INTERNAL_SERVER_ERROR),
    }
}

// DELETE /api/plans/:name
pub async fn delete_plan(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    match state.plans.delete(&name) {
        Ok(deleted) => Ok(Json(serde_json::json!({ "deleted": deleted }))),
        Err(GroupflowError::InvalidPlanName(_)) => Err(StatusCode::BAD_REQUEST),
        Err(_) => Err(StatusCode::INTERNAL_SERVER_ERROR),
    }
}

#[derive(Deserialize)]
pub struct RunBody {
    pub submitter_id: String,
    #[serde(default)]
    pub plan: Option<ExecutionPlan>,
    #[serde(default)]
    pub plan_name: Option<String>,
    pub snapshot: GraphSnapshot,
}

// POST /api/run
pub async fn start_run(
    State(state): State<Arc<AppState>>,
    Json(body): Json<RunBody>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    let plan = match (body.plan, body.plan_name) {
        (Some(plan), _) => plan,
        (None, Some(name)) => match state.plans.load(&name) {
            Ok(plan) => plan,
            Err(GroupflowError::PlanNotFound(_)) => return Err(StatusCode::NOT_FOUND),
            Err(_) => return Err(StatusCode::BAD_REQUEST),
        },
        (None, None) => return Err(StatusCode::BAD_REQUEST),
    };

    if plan.is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }

    info!(submitter = %body.submitter_id, entries = plan.entries.len(), "Run requested");
    let accepted = state.runner.start(&body.submitter_id, plan, body.snapshot);
    Ok(Json(serde_json::json!({ "accepted": accepted })))
}

// POST /api/runs/:id/cancel
pub async fn cancel_run(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Json<serde_json::Value> {
    let found = state.runner.cancel(&id);
    Json(serde_json::json!({ "found": found }))
}

// GET /api/runs/:id
pub async fn run_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    match state.runner.status(&id) {
        Some(status) => Ok(Json(serde_json::json!({
            "status": status,
            "report": state.runner.report(&id),
        }))),
        None => Err(StatusCode::NOT_FOUND),
    }
}
