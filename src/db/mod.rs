//! Persistence seam for the forecast and analytics pipelines.
//!
//! A [`ConditionStore`] hands out [`StoreSession`]s. Each worker opens its own
//! session and owns it until the worker finishes; sessions are never shared
//! between workers and are released when dropped.

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::domain::{ComputedCondition, Location, ObservedCondition, PredictedCondition};
use crate::errors::StoreError;

#[cfg(test)]
pub mod memory;
pub mod models;
pub mod postgres;
pub mod queries;

#[async_trait]
pub trait LocationReader: Send {
    /// All non-deleted locations, ordered by id.
    async fn list_locations(&mut self) -> Result<Vec<Location>, StoreError>;

    /// The non-deleted locations among `ids`. Unknown ids are left out.
    async fn load_locations(&mut self, ids: &[i32]) -> Result<Vec<Location>, StoreError>;
}

#[async_trait]
pub trait ObservationSource: Send {
    /// Observed history for `location`, ordered by (date, time_of_day).
    async fn fetch_recent_observations(
        &mut self,
        location: &Location,
    ) -> Result<Vec<ObservedCondition>, StoreError>;
}

#[async_trait]
pub trait PredictionWriter: Send {
    /// Upsert one location's predicted rows as a single batch.
    ///
    /// Either every row is written or none is.
    async fn upsert_predictions(&mut self, rows: &[PredictedCondition]) -> Result<(), StoreError>;
}

#[async_trait]
pub trait PredictionReader: Send {
    /// Predicted rows for one (location, date), ordered by time_of_day.
    async fn predictions_for_date(
        &mut self,
        location_id: i32,
        date: NaiveDate,
    ) -> Result<Vec<PredictedCondition>, StoreError>;
}

#[async_trait]
pub trait ComputedConditionWriter: Send {
    async fn upsert_computed(&mut self, row: &ComputedCondition) -> Result<(), StoreError>;
}

/// Everything a pipeline worker needs from one scoped connection.
pub trait StoreSession:
    LocationReader
    + ObservationSource
    + PredictionWriter
    + PredictionReader
    + ComputedConditionWriter
    + Send
{
}

impl<T> StoreSession for T where
    T: LocationReader
        + ObservationSource
        + PredictionWriter
        + PredictionReader
        + ComputedConditionWriter
        + Send
{
}

#[async_trait]
pub trait ConditionStore: Send + Sync {
    async fn open_session(&self) -> Result<Box<dyn StoreSession>, StoreError>;
}
