//! Background scheduler for forecast and analytics runs.
//!
//! Two independent loops share nothing but the store:
//! - the forecast loop runs a full forecast pass every `FORECAST_INTERVAL_SECS`
//! - the analytics loop derives surf conditions every `ANALYTICS_INTERVAL_SECS`
//!
//! Each loop publishes its last summary into [`SchedulerState`]
//! (`Arc<RwLock<_>>`), which the status endpoint serves. State is in-memory
//! only; after a restart both loops run immediately.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tokio::sync::RwLock;
use utoipa::ToSchema;

use crate::config::AppConfig;
use crate::db::ConditionStore;
use crate::services::analytics_run::{run_analytics, AnalyticsRequest, AnalyticsRunSummary};
use crate::services::forecast_run::{
    run_forecasts, ForecastPools, ForecastRequest, ForecastRunSummary,
};
use crate::services::forecaster::ForecasterFactory;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Floor on the sleep between runs (seconds).
const SCHEDULER_MIN_SLEEP_SECS: u64 = 60;

// ---------------------------------------------------------------------------
// Scheduler state (in-memory, shared via Arc<RwLock<>>)
// ---------------------------------------------------------------------------

/// Timing of one loop.
#[derive(Debug, Clone, Default, Serialize, ToSchema)]
pub struct LoopStatus {
    pub running: bool,
    pub next_run_at: Option<DateTime<Utc>>,
    pub last_run_completed_at: Option<DateTime<Utc>>,
    pub last_run_duration_ms: Option<u64>,
    pub total_runs: u64,
}

impl LoopStatus {
    fn started(&mut self) {
        self.running = true;
        self.next_run_at = None;
    }

    fn finished(&mut self, started_at: DateTime<Utc>, sleep_secs: u64) {
        let now = Utc::now();
        self.running = false;
        self.total_runs += 1;
        self.last_run_completed_at = Some(now);
        self.last_run_duration_ms = Some((now - started_at).num_milliseconds().max(0) as u64);
        self.next_run_at = Some(now + Duration::seconds(sleep_secs as i64));
    }
}

/// Global scheduler state, exposed via the status endpoint.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SchedulerState {
    pub active: bool,
    pub forecast: LoopStatus,
    pub analytics: LoopStatus,
    pub last_forecast: Option<ForecastRunSummary>,
    pub last_analytics: Option<AnalyticsRunSummary>,
}

impl SchedulerState {
    pub fn new(active: bool) -> Self {
        Self {
            active,
            forecast: LoopStatus::default(),
            analytics: LoopStatus::default(),
            last_forecast: None,
            last_analytics: None,
        }
    }
}

/// Shared scheduler state handle.
pub type SharedSchedulerState = Arc<RwLock<SchedulerState>>;

fn interval_secs(configured: u64) -> u64 {
    configured.max(SCHEDULER_MIN_SLEEP_SECS)
}

async fn sleep_secs(secs: u64) {
    tokio::time::sleep(StdDuration::from_secs(secs)).await;
}

// ---------------------------------------------------------------------------
// Loops
// ---------------------------------------------------------------------------

/// Spawn both loops. They run until process exit.
pub fn spawn(
    store: Arc<dyn ConditionStore>,
    factory: ForecasterFactory,
    config: AppConfig,
    state: SharedSchedulerState,
) {
    tokio::spawn(run_forecast_loop(
        store.clone(),
        factory,
        config.clone(),
        state.clone(),
    ));
    tokio::spawn(run_analytics_loop(store, config, state));
}

/// Forecast every active location, then sleep for the configured interval.
pub async fn run_forecast_loop(
    store: Arc<dyn ConditionStore>,
    factory: ForecasterFactory,
    config: AppConfig,
    state: SharedSchedulerState,
) {
    let sleep = interval_secs(config.forecast_interval_secs);
    tracing::info!(
        "Forecast scheduler started (model={}, every {} seconds)",
        factory.name(),
        sleep
    );

    loop {
        let started_at = Utc::now();
        state.write().await.forecast.started();

        let request = ForecastRequest::starting_after(started_at, config.forecast_horizon);
        let summary = run_forecasts(
            store.clone(),
            factory.clone(),
            request,
            ForecastPools {
                location_workers: config.forecast_workers,
                column_workers: config.column_workers,
            },
        )
        .await;

        {
            let mut s = state.write().await;
            s.forecast.finished(started_at, sleep);
            s.last_forecast = Some(summary);
        }
        tracing::debug!("Forecast scheduler: sleeping {} seconds", sleep);
        sleep_secs(sleep).await;
    }
}

/// Recompute surf analytics for the configured window, then sleep.
pub async fn run_analytics_loop(
    store: Arc<dyn ConditionStore>,
    config: AppConfig,
    state: SharedSchedulerState,
) {
    let sleep = interval_secs(config.analytics_interval_secs);
    tracing::info!("Analytics scheduler started (every {} seconds)", sleep);

    loop {
        let started_at = Utc::now();
        state.write().await.analytics.started();

        let request = AnalyticsRequest::from_today(started_at, config.analytics_window_days);
        let summary = run_analytics(store.clone(), request, config.analytics_workers).await;

        {
            let mut s = state.write().await;
            s.analytics.finished(started_at, sleep);
            s.last_analytics = Some(summary);
        }
        tracing::debug!("Analytics scheduler: sleeping {} seconds", sleep);
        sleep_secs(sleep).await;
    }
}
