use axum::extract::State;
use axum::Json;
use serde::Serialize;
use sqlx::PgPool;
use utoipa::ToSchema;

use crate::services::scheduler::SharedSchedulerState;

/// State for the health route: the pool to ping and the scheduler flag.
#[derive(Clone)]
pub struct HealthState {
    pub pool: PgPool,
    pub scheduler: SharedSchedulerState,
}

/// Health check response.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Service status ("ok" when healthy, "degraded" when DB is unreachable)
    pub status: String,
    /// API version
    pub version: String,
    /// Whether the database is reachable
    pub database: bool,
    /// Whether the background forecast / analytics loops are running
    pub scheduler: bool,
}

fn overall_status(database: bool) -> &'static str {
    if database {
        "ok"
    } else {
        "degraded"
    }
}

/// Health check endpoint.
///
/// Verifies database connectivity with a simple query. Returns status
/// "degraded" (still 200) if the DB is unreachable.
#[utoipa::path(
    get,
    path = "/api/v1/health",
    tag = "Health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
    )
)]
pub async fn health_check(State(state): State<HealthState>) -> Json<HealthResponse> {
    let db_ok = sqlx::query_scalar::<_, i32>("SELECT 1")
        .fetch_one(&state.pool)
        .await
        .is_ok();
    let scheduler = state.scheduler.read().await.active;

    Json(HealthResponse {
        status: overall_status(db_ok).to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        database: db_ok,
        scheduler,
    })
}
