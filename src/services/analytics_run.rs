//! Analytics run: derive surf conditions from stored predictions.
//!
//! Each eligible location walks a window of hourly steps starting at today's
//! midnight. The predicted rows for a date are read once and reused for that
//! date's steps. Hours without a predicted row are skipped; rows missing an
//! analyser input are counted and skipped. A store failure stops only the
//! location it happened in.

use std::convert::Infallible;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::db::{ConditionStore, StoreSession};
use crate::domain::{ComputedCondition, PredictedCondition};
use crate::errors::{InvalidLocation, StoreError};
use crate::helpers::{hourly_steps, today_midnight};
use crate::services::analyzer::{surf_difficulty, wave_quality, wind_impact, ConditionInputs};
use crate::services::forecast_run::{ExcludedLocation, LocationStatus};
use crate::services::recommendation::recommend;
use crate::services::worker_pool::WorkerPool;

#[derive(Debug, Clone)]
pub struct AnalyticsRequest {
    /// `None` analyses every active location.
    pub location_ids: Option<Vec<i32>>,
    pub window_start: NaiveDateTime,
    pub window_hours: usize,
}

impl AnalyticsRequest {
    /// `days` of hourly steps from today's midnight.
    pub fn from_today(now: DateTime<Utc>, days: usize) -> Self {
        Self {
            location_ids: None,
            window_start: today_midnight(now),
            window_hours: days * 24,
        }
    }

    pub fn with_locations(mut self, ids: Vec<i32>) -> Self {
        self.location_ids = Some(ids);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct AnalyticsOutcome {
    pub location_id: i32,
    pub status: LocationStatus,
    pub written: usize,
    /// Hours with no predicted row.
    pub skipped_hours: usize,
    /// Predicted rows missing at least one analyser input.
    pub incomplete_rows: usize,
    pub error: Option<String>,
}

impl AnalyticsOutcome {
    fn new(location_id: i32) -> Self {
        Self {
            location_id,
            status: LocationStatus::Done,
            written: 0,
            skipped_hours: 0,
            incomplete_rows: 0,
            error: None,
        }
    }

    fn fail(&mut self, error: impl ToString) {
        self.status = LocationStatus::PartialFailure;
        self.error = Some(error.to_string());
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AnalyticsRunSummary {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub window_start: NaiveDateTime,
    pub window_hours: usize,
    pub dispatched: usize,
    pub done: usize,
    pub partial_failure: usize,
    pub excluded: Vec<ExcludedLocation>,
    pub outcomes: Vec<AnalyticsOutcome>,
    pub error: Option<String>,
}

/// Derive the computed record for one predicted hour.
pub fn analyze(
    location_id: i32,
    time_of_day: NaiveDateTime,
    inputs: &ConditionInputs,
    computed_at: DateTime<Utc>,
) -> ComputedCondition {
    let difficulty = surf_difficulty(inputs);
    let quality = wave_quality(inputs);
    ComputedCondition {
        location_id,
        time_of_day,
        surf_difficulty: difficulty,
        wave_quality: quality,
        wind_impact: wind_impact(inputs),
        recommendation: recommend(difficulty, quality),
        computed_at,
    }
}

async fn eligible_locations(
    session: &mut dyn StoreSession,
    location_ids: Option<&[i32]>,
) -> Result<(Vec<i32>, Vec<ExcludedLocation>), StoreError> {
    let locations = match location_ids {
        Some(ids) => session.load_locations(ids).await?,
        None => session.list_locations().await?,
    };
    let mut eligible = Vec::with_capacity(locations.len());
    let mut excluded: Vec<ExcludedLocation> = Vec::new();
    if let Some(ids) = location_ids {
        for &id in ids {
            if !locations.iter().any(|l| l.id == id) {
                excluded.push(ExcludedLocation::from(&InvalidLocation::Unknown { location_id: id }));
            }
        }
    }
    for location in &locations {
        if !location.is_active() {
            excluded.push(ExcludedLocation::from(&InvalidLocation::Unknown {
                location_id: location.id,
            }));
            continue;
        }
        match location.coordinates() {
            Ok(_) => eligible.push(location.id),
            Err(e) => excluded.push(ExcludedLocation::from(&e)),
        }
    }
    excluded.sort_by_key(|e| e.location_id);
    excluded.dedup_by_key(|e| e.location_id);
    Ok((eligible, excluded))
}

/// Run one analytics pass. Always returns a summary.
pub async fn run_analytics(
    store: Arc<dyn ConditionStore>,
    request: AnalyticsRequest,
    workers: usize,
) -> AnalyticsRunSummary {
    let run_id = Uuid::new_v4();
    let started_at = Utc::now();
    tracing::info!(
        "Analytics run {} started: {} hours from {}",
        run_id,
        request.window_hours,
        request.window_start
    );

    let summary = |excluded, mut outcomes: Vec<AnalyticsOutcome>, error| {
        outcomes.sort_by_key(|o| o.location_id);
        let done = outcomes
            .iter()
            .filter(|o| o.status == LocationStatus::Done)
            .count();
        AnalyticsRunSummary {
            run_id,
            started_at,
            finished_at: Utc::now(),
            window_start: request.window_start,
            window_hours: request.window_hours,
            dispatched: outcomes.len(),
            done,
            partial_failure: outcomes.len() - done,
            excluded,
            outcomes,
            error,
        }
    };

    let dispatch = match store.open_session().await {
        Ok(mut session) => {
            eligible_locations(session.as_mut(), request.location_ids.as_deref()).await
        }
        Err(e) => Err(e),
    };
    let (location_ids, excluded) = match dispatch {
        Ok(v) => v,
        Err(e) => {
            tracing::error!("Analytics run {}: could not load locations: {}", run_id, e);
            return summary(Vec::new(), Vec::new(), Some(e.to_string()));
        }
    };

    let steps: Arc<[NaiveDateTime]> = hourly_steps(request.window_start, request.window_hours).into();
    let mut pool: WorkerPool<i32, AnalyticsOutcome, Infallible> =
        WorkerPool::new("analytics", workers);
    for location_id in location_ids {
        let store = store.clone();
        let steps = steps.clone();
        pool.submit(location_id, async move {
            let mut outcome = AnalyticsOutcome::new(location_id);
            match store.open_session().await {
                Ok(mut session) => analyze_location(session.as_mut(), &steps, &mut outcome).await,
                Err(e) => {
                    tracing::error!("Location {}: cannot open store session: {}", location_id, e);
                    outcome.fail(e);
                }
            }
            Ok(outcome)
        });
    }

    let mut outcomes = Vec::new();
    for (location_id, result) in pool.join_all().await {
        match result {
            Ok(outcome) => outcomes.push(outcome),
            Err(failure) => {
                tracing::error!("Location {}: analytics worker failed: {}", location_id, failure);
                let mut outcome = AnalyticsOutcome::new(location_id);
                outcome.fail(failure);
                outcomes.push(outcome);
            }
        }
    }

    let summary = summary(excluded, outcomes, None);
    tracing::info!(
        "Analytics run {} finished: {} done, {} partial failure",
        run_id,
        summary.done,
        summary.partial_failure
    );
    summary
}

/// Walk the hourly steps for one location, writing a computed row per
/// predicted hour.
pub async fn analyze_location(
    session: &mut dyn StoreSession,
    steps: &[NaiveDateTime],
    outcome: &mut AnalyticsOutcome,
) {
    let location_id = outcome.location_id;
    let computed_at = Utc::now();
    let mut batch: Option<(NaiveDate, Vec<PredictedCondition>)> = None;

    for &step in steps {
        let date = step.date();
        if batch.as_ref().map(|(d, _)| *d) != Some(date) {
            match session.predictions_for_date(location_id, date).await {
                Ok(rows) => batch = Some((date, rows)),
                Err(e) => {
                    tracing::error!(
                        "Location {}: failed to read predictions for {}: {}",
                        location_id,
                        date,
                        e
                    );
                    outcome.fail(e);
                    return;
                }
            }
        }
        let Some((_, rows)) = batch.as_ref() else {
            continue;
        };

        let Some(row) = rows.iter().find(|r| r.time_of_day == step.time()) else {
            outcome.skipped_hours += 1;
            continue;
        };

        let inputs = match ConditionInputs::try_from(row) {
            Ok(inputs) => inputs,
            Err(field) => {
                tracing::debug!(
                    "Location {}: prediction at {} has no {}, skipping",
                    location_id,
                    step,
                    field
                );
                outcome.incomplete_rows += 1;
                continue;
            }
        };

        let computed = analyze(location_id, step, &inputs, computed_at);
        if let Err(e) = session.upsert_computed(&computed).await {
            tracing::error!(
                "Location {}: failed to write computed conditions at {}: {}",
                location_id,
                step,
                e
            );
            outcome.fail(e);
            return;
        }
        outcome.written += 1;
    }

    tracing::debug!(
        "Location {}: {} computed rows, {} hours skipped, {} incomplete",
        location_id,
        outcome.written,
        outcome.skipped_hours,
        outcome.incomplete_rows
    );
}
