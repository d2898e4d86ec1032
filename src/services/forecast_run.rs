//! Forecast run: fan out across locations, then across signal columns.
//!
//! A run loads the requested locations, drops those without usable
//! coordinates, and splits the rest round-robin into shards. Each shard is one
//! outer worker with its own store session; its locations are processed one
//! after another. Inside a location every signal column is fitted on the
//! blocking pool, and all column results are collected before the hourly
//! rows are assembled and upserted in one batch.
//!
//! Nothing here is fatal: failures are recorded on the location's outcome and
//! the run always returns a [`ForecastRunSummary`].

use std::collections::BTreeMap;
use std::convert::Infallible;
use std::sync::Arc;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::db::{ConditionStore, StoreSession};
use crate::domain::{Location, ObservedCondition, PredictedCondition, SeaState, SignalColumn};
use crate::errors::{InvalidLocation, StoreError};
use crate::helpers::{hourly_steps, next_midnight};
use crate::services::forecaster::{fit_and_predict, ForecastError, ForecasterFactory};
use crate::services::worker_pool::WorkerPool;

// ---------------------------------------------------------------------------
// Run inputs
// ---------------------------------------------------------------------------

/// What to forecast in one run.
#[derive(Debug, Clone)]
pub struct ForecastRequest {
    /// `None` forecasts every active location.
    pub location_ids: Option<Vec<i32>>,
    pub horizon: usize,
    pub columns: Vec<SignalColumn>,
    /// First forecast hour. Normally the next midnight.
    pub start: NaiveDateTime,
}

impl ForecastRequest {
    /// All columns, starting at the first midnight after `now`.
    pub fn starting_after(now: DateTime<Utc>, horizon: usize) -> Self {
        Self {
            location_ids: None,
            horizon,
            columns: SignalColumn::ALL.to_vec(),
            start: next_midnight(now),
        }
    }

    pub fn with_locations(mut self, ids: Vec<i32>) -> Self {
        self.location_ids = Some(ids);
        self
    }
}

/// Pool sizes for the two parallelism tiers.
#[derive(Debug, Clone, Copy)]
pub struct ForecastPools {
    /// Upper bound on shards (outer workers).
    pub location_workers: usize,
    /// Concurrent column fits inside one location.
    pub column_workers: usize,
}

/// One location's unit of work for a run.
#[derive(Debug, Clone)]
pub struct ForecastJob {
    pub location: Location,
    pub columns: Arc<[SignalColumn]>,
    pub horizon: usize,
    pub start: NaiveDateTime,
}

// ---------------------------------------------------------------------------
// Run outputs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum LocationPhase {
    Fetching,
    Forecasting,
    Assembling,
    Persisting,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum LocationStatus {
    Done,
    PartialFailure,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct ColumnFailure {
    pub column: SignalColumn,
    pub reason: String,
}

/// A location that was never dispatched.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct ExcludedLocation {
    pub location_id: i32,
    pub reason: String,
}

impl From<&InvalidLocation> for ExcludedLocation {
    fn from(err: &InvalidLocation) -> Self {
        Self {
            location_id: err.location_id(),
            reason: err.to_string(),
        }
    }
}

/// Terminal state of one dispatched location.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct LocationOutcome {
    pub location_id: i32,
    pub status: LocationStatus,
    /// Phase in which the location stopped short of `done`.
    pub failed_phase: Option<LocationPhase>,
    pub column_failures: Vec<ColumnFailure>,
    pub rows_written: usize,
    pub error: Option<String>,
}

impl LocationOutcome {
    fn new(location_id: i32) -> Self {
        Self {
            location_id,
            status: LocationStatus::Done,
            failed_phase: None,
            column_failures: Vec::new(),
            rows_written: 0,
            error: None,
        }
    }

    fn fail(mut self, phase: LocationPhase, error: impl ToString) -> Self {
        self.status = LocationStatus::PartialFailure;
        self.failed_phase = Some(phase);
        self.error = Some(error.to_string());
        self
    }
}

/// Aggregate result of one forecast run.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ForecastRunSummary {
    pub run_id: Uuid,
    pub model: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub horizon: usize,
    pub first_hour: NaiveDateTime,
    pub dispatched: usize,
    pub done: usize,
    pub partial_failure: usize,
    pub excluded: Vec<ExcludedLocation>,
    pub outcomes: Vec<LocationOutcome>,
    /// Set when the run could not dispatch at all.
    pub error: Option<String>,
}

impl ForecastRunSummary {
    fn finish(
        run_id: Uuid,
        model: &str,
        started_at: DateTime<Utc>,
        request: &ForecastRequest,
        excluded: Vec<ExcludedLocation>,
        mut outcomes: Vec<LocationOutcome>,
        error: Option<String>,
    ) -> Self {
        outcomes.sort_by_key(|o| o.location_id);
        let done = outcomes
            .iter()
            .filter(|o| o.status == LocationStatus::Done)
            .count();
        Self {
            run_id,
            model: model.to_string(),
            started_at,
            finished_at: Utc::now(),
            horizon: request.horizon,
            first_hour: request.start,
            dispatched: outcomes.len(),
            done,
            partial_failure: outcomes.len() - done,
            excluded,
            outcomes,
            error,
        }
    }
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

/// Round-robin split into at most `n` non-empty shards: item `i` goes to shard `i % n`.
/// A worker count of zero is treated as one.
pub fn partition_shards<T: Clone>(items: &[T], n: usize) -> Vec<Vec<T>> {
    let n = n.max(1).min(items.len());
    if n == 0 {
        return Vec::new();
    }
    let mut shards = vec![Vec::new(); n];
    for (i, item) in items.iter().enumerate() {
        shards[i % n].push(item.clone());
    }
    shards
}

/// Load the requested locations and split them into dispatchable and excluded.
async fn load_dispatchable(
    session: &mut dyn StoreSession,
    location_ids: Option<&[i32]>,
) -> Result<(Vec<Location>, Vec<InvalidLocation>), StoreError> {
    let (locations, mut invalid) = match location_ids {
        Some(ids) => {
            let found = session.load_locations(ids).await?;
            let mut missing: Vec<i32> = ids
                .iter()
                .copied()
                .filter(|id| !found.iter().any(|l| l.id == *id))
                .collect();
            missing.sort_unstable();
            missing.dedup();
            let unknown = missing
                .into_iter()
                .map(|location_id| InvalidLocation::Unknown { location_id })
                .collect::<Vec<_>>();
            (found, unknown)
        }
        None => (session.list_locations().await?, Vec::new()),
    };

    let mut valid = Vec::with_capacity(locations.len());
    for location in locations {
        if !location.is_active() {
            invalid.push(InvalidLocation::Unknown {
                location_id: location.id,
            });
            continue;
        }
        match location.coordinates() {
            Ok(_) => valid.push(location),
            Err(e) => invalid.push(e),
        }
    }
    Ok((valid, invalid))
}

/// Run a full forecast pass. Always returns a summary.
pub async fn run_forecasts(
    store: Arc<dyn ConditionStore>,
    factory: ForecasterFactory,
    request: ForecastRequest,
    pools: ForecastPools,
) -> ForecastRunSummary {
    let run_id = Uuid::new_v4();
    let started_at = Utc::now();
    tracing::info!(
        "Forecast run {} started: model={}, horizon={}, first hour {}",
        run_id,
        factory.name(),
        request.horizon,
        request.start
    );

    let dispatch = match store.open_session().await {
        Ok(mut session) => {
            load_dispatchable(session.as_mut(), request.location_ids.as_deref()).await
        }
        Err(e) => Err(e),
    };
    let (locations, invalid) = match dispatch {
        Ok(v) => v,
        Err(e) => {
            tracing::error!("Forecast run {}: could not load locations: {}", run_id, e);
            return ForecastRunSummary::finish(
                run_id,
                factory.name(),
                started_at,
                &request,
                Vec::new(),
                Vec::new(),
                Some(e.to_string()),
            );
        }
    };

    for err in &invalid {
        tracing::warn!("Forecast run {}: excluding {}", run_id, err);
    }
    let excluded: Vec<ExcludedLocation> = invalid.iter().map(ExcludedLocation::from).collect();

    let columns: Arc<[SignalColumn]> = request.columns.clone().into();
    let shards = partition_shards(&locations, pools.location_workers);

    let mut shard_members: BTreeMap<usize, Vec<i32>> = BTreeMap::new();
    let mut outer: WorkerPool<usize, Vec<LocationOutcome>, Infallible> =
        WorkerPool::new("location", shards.len());
    for (index, shard) in shards.into_iter().enumerate() {
        shard_members.insert(index, shard.iter().map(|l| l.id).collect());
        let jobs: Vec<ForecastJob> = shard
            .into_iter()
            .map(|location| ForecastJob {
                location,
                columns: columns.clone(),
                horizon: request.horizon,
                start: request.start,
            })
            .collect();
        let store = store.clone();
        let factory = factory.clone();
        let column_workers = pools.column_workers;
        outer.submit(index, async move {
            Ok(run_shard(store, factory, jobs, column_workers).await)
        });
    }
    if outer.is_empty() {
        tracing::info!("Forecast run {}: no locations to dispatch", run_id);
    } else {
        tracing::debug!(
            "Forecast run {}: {} locations across {} shards",
            run_id,
            locations.len(),
            outer.len()
        );
    }

    let mut outcomes = Vec::new();
    for (index, result) in outer.join_all().await {
        match result {
            Ok(shard_outcomes) => outcomes.extend(shard_outcomes),
            Err(failure) => {
                tracing::error!("Forecast run {}: shard {} failed: {}", run_id, index, failure);
                // Locations already reported by this shard are lost with it.
                let ids = shard_members.remove(&index).unwrap_or_default();
                outcomes.extend(ids.into_iter().map(|id| {
                    LocationOutcome::new(id).fail(LocationPhase::Forecasting, &failure)
                }));
            }
        }
    }

    let summary = ForecastRunSummary::finish(
        run_id,
        factory.name(),
        started_at,
        &request,
        excluded,
        outcomes,
        None,
    );
    tracing::info!(
        "Forecast run {} finished: {} done, {} partial failure, {} excluded",
        run_id,
        summary.done,
        summary.partial_failure,
        summary.excluded.len()
    );
    summary
}

// ---------------------------------------------------------------------------
// Per shard / per location
// ---------------------------------------------------------------------------

/// Process one shard's locations in order on a single session.
///
/// The session is opened lazily and discarded after an unavailable-store
/// error so the next location starts on a fresh connection.
async fn run_shard(
    store: Arc<dyn ConditionStore>,
    factory: ForecasterFactory,
    jobs: Vec<ForecastJob>,
    column_workers: usize,
) -> Vec<LocationOutcome> {
    let mut session: Option<Box<dyn StoreSession>> = None;
    let mut outcomes = Vec::with_capacity(jobs.len());

    for job in jobs {
        let location_id = job.location.id;
        if session.is_none() {
            match store.open_session().await {
                Ok(s) => session = Some(s),
                Err(e) => {
                    tracing::error!("Location {}: cannot open store session: {}", location_id, e);
                    outcomes.push(LocationOutcome::new(location_id).fail(LocationPhase::Fetching, e));
                    continue;
                }
            }
        }
        let Some(active) = session.as_mut() else {
            continue;
        };

        let (outcome, connection_lost) =
            forecast_location(active.as_mut(), &factory, &job, column_workers).await;
        if connection_lost {
            session = None;
        }
        outcomes.push(outcome);
    }
    outcomes
}

fn lost(err: &StoreError) -> bool {
    matches!(err, StoreError::Unavailable(_))
}

/// Fetch → Forecast → Assemble → Persist for one location.
///
/// Returns the outcome and whether the session should be discarded.
pub async fn forecast_location(
    session: &mut dyn StoreSession,
    factory: &ForecasterFactory,
    job: &ForecastJob,
    column_workers: usize,
) -> (LocationOutcome, bool) {
    let location_id = job.location.id;
    let mut outcome = LocationOutcome::new(location_id);

    let history = match session.fetch_recent_observations(&job.location).await {
        Ok(h) => h,
        Err(e) => {
            tracing::error!("Location {}: failed to fetch observations: {}", location_id, e);
            let lost = lost(&e);
            return (outcome.fail(LocationPhase::Fetching, e), lost);
        }
    };
    tracing::debug!(
        "Location {}: {} observations loaded",
        location_id,
        history.len()
    );

    let mut results =
        forecast_columns(factory, &history, &job.columns, job.horizon, column_workers).await;
    outcome.column_failures = std::mem::take(&mut results.failures);
    for failure in &outcome.column_failures {
        tracing::warn!(
            "Location {}: column {} skipped: {}",
            location_id,
            failure.column,
            failure.reason
        );
    }

    if results.values.is_empty() {
        let reason = if job.columns.is_empty() {
            "no columns requested"
        } else {
            "every column failed"
        };
        return (outcome.fail(LocationPhase::Forecasting, reason), false);
    }

    let rows = assemble_rows(location_id, job.start, job.horizon, &results.values);
    if rows.is_empty() {
        return (
            outcome.fail(LocationPhase::Assembling, "horizon of zero hours"),
            false,
        );
    }

    if let Err(e) = session.upsert_predictions(&rows).await {
        tracing::error!("Location {}: failed to persist predictions: {}", location_id, e);
        let lost = lost(&e);
        return (outcome.fail(LocationPhase::Persisting, e), lost);
    }
    outcome.rows_written = rows.len();

    if !outcome.column_failures.is_empty() {
        outcome.status = LocationStatus::PartialFailure;
        outcome.failed_phase = Some(LocationPhase::Forecasting);
    }
    tracing::info!(
        "Location {}: wrote {} rows ({} of {} columns)",
        location_id,
        outcome.rows_written,
        results.values.len(),
        job.columns.len()
    );
    (outcome, false)
}

/// Successful column forecasts and the reasons the others failed.
#[derive(Debug, Default)]
pub struct ColumnForecasts {
    pub values: BTreeMap<SignalColumn, Vec<f64>>,
    pub failures: Vec<ColumnFailure>,
}

/// Fit every column on the blocking pool and wait for all of them.
pub async fn forecast_columns(
    factory: &ForecasterFactory,
    history: &[ObservedCondition],
    columns: &[SignalColumn],
    horizon: usize,
    column_workers: usize,
) -> ColumnForecasts {
    let mut pool: WorkerPool<SignalColumn, Vec<f64>, ForecastError> =
        WorkerPool::new("column", column_workers);
    for &column in columns {
        let series = column.series(history);
        let factory = factory.clone();
        pool.submit_blocking(column, move || {
            let mut model = factory.create();
            fit_and_predict(model.as_mut(), &series, horizon)
        });
    }

    let mut forecasts = ColumnForecasts::default();
    for (column, result) in pool.join_all().await {
        match result {
            Ok(values) => {
                forecasts.values.insert(column, values);
            }
            Err(failure) => forecasts.failures.push(ColumnFailure {
                column,
                reason: failure.to_string(),
            }),
        }
    }
    forecasts.failures.sort_by_key(|f| f.column);
    forecasts
}

/// One row per forecast hour from `start`. Columns without a forecast stay empty.
pub fn assemble_rows(
    location_id: i32,
    start: NaiveDateTime,
    horizon: usize,
    values: &BTreeMap<SignalColumn, Vec<f64>>,
) -> Vec<PredictedCondition> {
    hourly_steps(start, horizon)
        .into_iter()
        .enumerate()
        .map(|(step, at)| {
            let mut state = SeaState::default();
            for (column, series) in values {
                if let Some(&value) = series.get(step) {
                    column.apply(&mut state, value);
                }
            }
            PredictedCondition {
                location_id,
                date: at.date(),
                time_of_day: at.time(),
                state,
            }
        })
        .collect()
}
