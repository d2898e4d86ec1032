//! Scheduler status HTTP endpoint.
//!
//! GET /api/v1/runs/status returns the state of both background loops and
//! the summaries of their latest runs.

use axum::extract::State;
use axum::Json;

use crate::services::scheduler::{SchedulerState, SharedSchedulerState};

/// Get the current scheduler status.
///
/// Returns per-loop timing (next_run_at, last_run_completed_at, total_runs)
/// and the last forecast and analytics run summaries with per-location outcomes.
#[utoipa::path(
    get,
    path = "/api/v1/runs/status",
    tag = "Runs",
    responses(
        (status = 200, description = "Current scheduler status", body = SchedulerState),
    )
)]
pub async fn get_run_status(State(state): State<SharedSchedulerState>) -> Json<SchedulerState> {
    let s = state.read().await;
    Json(s.clone())
}
