//! In-memory store for pipeline tests.
//!
//! Tables are keyed by their natural keys so upserts behave like the
//! Postgres `ON CONFLICT` path. Reads and writes can be made to fail per
//! location, and open sessions are counted so tests can check release.

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Utc};

use super::{
    ComputedConditionWriter, ConditionStore, LocationReader, ObservationSource, PredictionReader,
    PredictionWriter, StoreSession,
};
use crate::domain::{ComputedCondition, Location, ObservedCondition, PredictedCondition};
use crate::errors::StoreError;

#[derive(Debug, Default)]
struct Tables {
    locations: BTreeMap<i32, Location>,
    observations: BTreeMap<i32, Vec<ObservedCondition>>,
    predictions: BTreeMap<PredictionKey, PredictedCondition>,
    computed: BTreeMap<ComputedKey, ComputedCondition>,
}

#[derive(Debug, Default)]
struct Faults {
    fail_sessions: bool,
    fail_reads: HashSet<i32>,
    fail_prediction_writes: HashSet<i32>,
    fail_computed_writes: HashSet<i32>,
}

#[derive(Debug, Default)]
struct Shared {
    tables: Mutex<Tables>,
    faults: Mutex<Faults>,
    sessions_opened: AtomicUsize,
    sessions_open: AtomicUsize,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    shared: Arc<Shared>,
}

type PredictionKey = (NaiveDate, NaiveTime, i32);
type ComputedKey = (i32, NaiveDateTime);

fn prediction_key(row: &PredictedCondition) -> PredictionKey {
    (row.date, row.time_of_day, row.location_id)
}

fn computed_key(row: &ComputedCondition) -> ComputedKey {
    (row.location_id, row.time_of_day)
}

fn unavailable() -> StoreError {
    StoreError::Unavailable(sqlx::Error::PoolTimedOut)
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> MutexGuard<'_, Tables> {
        self.shared.tables.lock().unwrap()
    }

    fn faults(&self) -> MutexGuard<'_, Faults> {
        self.shared.faults.lock().unwrap()
    }

    pub fn add_location(&self, id: i32, latitude: Option<f64>, longitude: Option<f64>) {
        self.tables().locations.insert(
            id,
            Location {
                id,
                name: format!("Spot {}", id),
                latitude,
                longitude,
                created_at: Utc::now(),
                deleted_at: None,
            },
        );
    }

    pub fn delete_location(&self, id: i32) {
        if let Some(location) = self.tables().locations.get_mut(&id) {
            location.deleted_at = Some(Utc::now());
        }
    }

    pub fn add_observations(&self, rows: Vec<ObservedCondition>) {
        let mut tables = self.tables();
        for row in rows {
            tables
                .observations
                .entry(row.location_id)
                .or_default()
                .push(row);
        }
    }

    pub fn insert_prediction(&self, row: PredictedCondition) {
        self.tables().predictions.insert(prediction_key(&row), row);
    }

    pub fn fail_sessions(&self) {
        self.faults().fail_sessions = true;
    }

    pub fn fail_reads_for(&self, location_id: i32) {
        self.faults().fail_reads.insert(location_id);
    }

    pub fn fail_prediction_writes_for(&self, location_id: i32) {
        self.faults().fail_prediction_writes.insert(location_id);
    }

    pub fn fail_computed_writes_for(&self, location_id: i32) {
        self.faults().fail_computed_writes.insert(location_id);
    }

    pub fn predictions(&self) -> Vec<PredictedCondition> {
        self.tables().predictions.values().cloned().collect()
    }

    pub fn predictions_for(&self, location_id: i32) -> Vec<PredictedCondition> {
        self.tables()
            .predictions
            .values()
            .filter(|p| p.location_id == location_id)
            .cloned()
            .collect()
    }

    pub fn computed(&self) -> Vec<ComputedCondition> {
        self.tables().computed.values().cloned().collect()
    }

    pub fn computed_for(&self, location_id: i32) -> Vec<ComputedCondition> {
        self.tables()
            .computed
            .values()
            .filter(|c| c.location_id == location_id)
            .cloned()
            .collect()
    }

    pub fn sessions_opened(&self) -> usize {
        self.shared.sessions_opened.load(Ordering::SeqCst)
    }

    pub fn sessions_open(&self) -> usize {
        self.shared.sessions_open.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ConditionStore for MemoryStore {
    async fn open_session(&self) -> Result<Box<dyn StoreSession>, StoreError> {
        if self.faults().fail_sessions {
            return Err(unavailable());
        }
        self.shared.sessions_opened.fetch_add(1, Ordering::SeqCst);
        self.shared.sessions_open.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MemorySession {
            store: self.clone(),
        }))
    }
}

pub struct MemorySession {
    store: MemoryStore,
}

impl Drop for MemorySession {
    fn drop(&mut self) {
        self.store.shared.sessions_open.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl LocationReader for MemorySession {
    async fn list_locations(&mut self) -> Result<Vec<Location>, StoreError> {
        Ok(self
            .store
            .tables()
            .locations
            .values()
            .filter(|l| l.is_active())
            .cloned()
            .collect())
    }

    async fn load_locations(&mut self, ids: &[i32]) -> Result<Vec<Location>, StoreError> {
        Ok(self
            .store
            .tables()
            .locations
            .values()
            .filter(|l| l.is_active() && ids.contains(&l.id))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl ObservationSource for MemorySession {
    async fn fetch_recent_observations(
        &mut self,
        location: &Location,
    ) -> Result<Vec<ObservedCondition>, StoreError> {
        if self.store.faults().fail_reads.contains(&location.id) {
            return Err(unavailable());
        }
        let mut rows = self
            .store
            .tables()
            .observations
            .get(&location.id)
            .cloned()
            .unwrap_or_default();
        rows.sort_by_key(|r| (r.date, r.time_of_day));
        Ok(rows)
    }
}

#[async_trait]
impl PredictionWriter for MemorySession {
    async fn upsert_predictions(&mut self, rows: &[PredictedCondition]) -> Result<(), StoreError> {
        {
            let faults = self.store.faults();
            if rows
                .iter()
                .any(|r| faults.fail_prediction_writes.contains(&r.location_id))
            {
                return Err(unavailable());
            }
        }
        let mut tables = self.store.tables();
        for row in rows {
            tables.predictions.insert(prediction_key(row), row.clone());
        }
        Ok(())
    }
}

#[async_trait]
impl PredictionReader for MemorySession {
    async fn predictions_for_date(
        &mut self,
        location_id: i32,
        date: NaiveDate,
    ) -> Result<Vec<PredictedCondition>, StoreError> {
        if self.store.faults().fail_reads.contains(&location_id) {
            return Err(unavailable());
        }
        let mut rows: Vec<PredictedCondition> = self
            .store
            .tables()
            .predictions
            .values()
            .filter(|p| p.location_id == location_id && p.date == date)
            .cloned()
            .collect();
        rows.sort_by_key(|p| p.time_of_day);
        Ok(rows)
    }
}

#[async_trait]
impl ComputedConditionWriter for MemorySession {
    async fn upsert_computed(&mut self, row: &ComputedCondition) -> Result<(), StoreError> {
        if self
            .store
            .faults()
            .fail_computed_writes
            .contains(&row.location_id)
        {
            return Err(unavailable());
        }
        self.store.tables().computed.insert(computed_key(row), row.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::SeaState;

    fn prediction(hour: u32, wave_height: f64) -> PredictedCondition {
        PredictedCondition {
            location_id: 1,
            date: NaiveDate::from_ymd_opt(2024, 6, 2).unwrap(),
            time_of_day: NaiveTime::from_hms_opt(hour, 0, 0).unwrap(),
            state: SeaState {
                wave_height: Some(wave_height),
                ..Default::default()
            },
        }
    }

    #[tokio::test]
    async fn test_upsert_is_idempotent() {
        let store = MemoryStore::new();
        let rows = vec![prediction(0, 1.0), prediction(1, 1.1)];
        {
            let mut session = store.open_session().await.unwrap();
            session.upsert_predictions(&rows).await.unwrap();
            session.upsert_predictions(&rows).await.unwrap();
        }
        assert_eq!(store.predictions(), rows);
    }

    #[tokio::test]
    async fn test_upsert_overwrites_on_key_conflict() {
        let store = MemoryStore::new();
        let mut session = store.open_session().await.unwrap();
        session
            .upsert_predictions(&[prediction(3, 1.0)])
            .await
            .unwrap();
        session
            .upsert_predictions(&[prediction(3, 2.0)])
            .await
            .unwrap();
        let stored = store.predictions();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].state.wave_height, Some(2.0));
    }

    #[tokio::test]
    async fn test_failed_batch_writes_nothing() {
        let store = MemoryStore::new();
        store.fail_prediction_writes_for(1);
        let mut session = store.open_session().await.unwrap();
        assert!(session
            .upsert_predictions(&[prediction(0, 1.0)])
            .await
            .is_err());
        assert!(store.predictions().is_empty());
    }

    #[tokio::test]
    async fn test_session_counts() {
        let store = MemoryStore::new();
        let a = store.open_session().await.unwrap();
        let b = store.open_session().await.unwrap();
        assert_eq!(store.sessions_open(), 2);
        drop(a);
        drop(b);
        assert_eq!(store.sessions_open(), 0);
        assert_eq!(store.sessions_opened(), 2);
    }

    #[tokio::test]
    async fn test_deleted_locations_are_hidden() {
        let store = MemoryStore::new();
        store.add_location(1, Some(38.7), Some(-9.4));
        store.add_location(2, Some(43.4), Some(-1.6));
        store.delete_location(2);
        let mut session = store.open_session().await.unwrap();
        let listed = session.list_locations().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert!(session.load_locations(&[2]).await.unwrap().is_empty());
    }
}
