//! Postgres-backed store. One pooled connection per session.

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::pool::PoolConnection;
use sqlx::{Connection, PgPool, Postgres};

use super::models::{ConditionRow, UpsertComputedParams};
use super::{
    queries, ComputedConditionWriter, ConditionStore, LocationReader, ObservationSource,
    PredictionReader, PredictionWriter, StoreSession,
};
use crate::domain::{ComputedCondition, Location, ObservedCondition, PredictedCondition};
use crate::errors::StoreError;

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ConditionStore for PgStore {
    async fn open_session(&self) -> Result<Box<dyn StoreSession>, StoreError> {
        let conn = self.pool.acquire().await?;
        Ok(Box::new(PgSession { conn }))
    }
}

/// Holds its connection until dropped, which returns it to the pool.
pub struct PgSession {
    conn: PoolConnection<Postgres>,
}

#[async_trait]
impl LocationReader for PgSession {
    async fn list_locations(&mut self) -> Result<Vec<Location>, StoreError> {
        let rows = queries::list_locations(&mut *self.conn).await?;
        Ok(rows.into_iter().map(Location::from).collect())
    }

    async fn load_locations(&mut self, ids: &[i32]) -> Result<Vec<Location>, StoreError> {
        let rows = queries::get_locations(&mut *self.conn, ids).await?;
        Ok(rows.into_iter().map(Location::from).collect())
    }
}

#[async_trait]
impl ObservationSource for PgSession {
    async fn fetch_recent_observations(
        &mut self,
        location: &Location,
    ) -> Result<Vec<ObservedCondition>, StoreError> {
        let rows = queries::get_observations(&mut *self.conn, location.id).await?;
        Ok(rows.into_iter().map(ObservedCondition::from).collect())
    }
}

#[async_trait]
impl PredictionWriter for PgSession {
    async fn upsert_predictions(&mut self, rows: &[PredictedCondition]) -> Result<(), StoreError> {
        let mut tx = self.conn.begin().await?;
        for row in rows {
            queries::upsert_prediction(&mut *tx, &ConditionRow::from(row)).await?;
        }
        tx.commit().await?;
        Ok(())
    }
}

#[async_trait]
impl PredictionReader for PgSession {
    async fn predictions_for_date(
        &mut self,
        location_id: i32,
        date: NaiveDate,
    ) -> Result<Vec<PredictedCondition>, StoreError> {
        let rows = queries::get_predictions_for_date(&mut *self.conn, location_id, date).await?;
        Ok(rows.into_iter().map(PredictedCondition::from).collect())
    }
}

#[async_trait]
impl ComputedConditionWriter for PgSession {
    async fn upsert_computed(&mut self, row: &ComputedCondition) -> Result<(), StoreError> {
        queries::upsert_computed(&mut *self.conn, &UpsertComputedParams::from(row)).await?;
        Ok(())
    }
}
