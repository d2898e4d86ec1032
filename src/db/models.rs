use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::Decimal;
use sqlx::FromRow;

use crate::domain::{ComputedCondition, Location, ObservedCondition, PredictedCondition, SeaState};
use crate::helpers::{f64_to_decimal, opt_dec_to_f64, opt_f64_to_decimal};

/// A surf spot. Latitude and longitude are pulled out of the `coordinates`
/// JSON column and are each NULL when missing.
#[derive(Debug, Clone, FromRow)]
pub struct LocationRow {
    pub location_id: i32,
    pub location_name: String,
    pub latitude: Option<Decimal>,
    pub longitude: Option<Decimal>,
    pub created_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl From<LocationRow> for Location {
    fn from(row: LocationRow) -> Self {
        Location {
            id: row.location_id,
            name: row.location_name,
            latitude: opt_dec_to_f64(row.latitude),
            longitude: opt_dec_to_f64(row.longitude),
            created_at: row.created_at,
            deleted_at: row.deleted_at,
        }
    }
}

/// One hourly row of `sea_conditions` or `predicted_sea_conditions`.
///
/// Both tables share this shape; the predicted table adds a unique
/// constraint on (date, time_of_day, location_id).
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct ConditionRow {
    pub date: NaiveDate,
    pub time_of_day: NaiveTime,
    pub location_id: i32,
    pub wave_height: Option<Decimal>,
    pub wind_wave_height: Option<Decimal>,
    pub swell_wave_height: Option<Decimal>,
    pub wave_direction: Option<Decimal>,
    pub wind_wave_direction: Option<Decimal>,
    pub swell_wave_direction: Option<Decimal>,
    pub wave_period: Option<Decimal>,
    pub wind_wave_period: Option<Decimal>,
    pub swell_wave_period: Option<Decimal>,
    pub wind_wave_peak_period: Option<Decimal>,
    pub swell_wave_peak_period: Option<Decimal>,
    pub wind_speed: Option<Decimal>,
    pub wind_direction: Option<String>,
    pub weather: Option<String>,
}

impl ConditionRow {
    fn state(&self) -> SeaState {
        SeaState {
            wave_height: opt_dec_to_f64(self.wave_height),
            wind_wave_height: opt_dec_to_f64(self.wind_wave_height),
            swell_wave_height: opt_dec_to_f64(self.swell_wave_height),
            wave_direction: opt_dec_to_f64(self.wave_direction),
            wind_wave_direction: opt_dec_to_f64(self.wind_wave_direction),
            swell_wave_direction: opt_dec_to_f64(self.swell_wave_direction),
            wave_period: opt_dec_to_f64(self.wave_period),
            wind_wave_period: opt_dec_to_f64(self.wind_wave_period),
            swell_wave_period: opt_dec_to_f64(self.swell_wave_period),
            wind_wave_peak_period: opt_dec_to_f64(self.wind_wave_peak_period),
            swell_wave_peak_period: opt_dec_to_f64(self.swell_wave_peak_period),
            wind_speed: opt_dec_to_f64(self.wind_speed),
            wind_direction: self.wind_direction.clone(),
            weather: self.weather.clone(),
        }
    }
}

impl From<ConditionRow> for ObservedCondition {
    fn from(row: ConditionRow) -> Self {
        ObservedCondition {
            location_id: row.location_id,
            date: row.date,
            time_of_day: row.time_of_day,
            state: row.state(),
        }
    }
}

impl From<ConditionRow> for PredictedCondition {
    fn from(row: ConditionRow) -> Self {
        PredictedCondition {
            location_id: row.location_id,
            date: row.date,
            time_of_day: row.time_of_day,
            state: row.state(),
        }
    }
}

impl From<&PredictedCondition> for ConditionRow {
    fn from(p: &PredictedCondition) -> Self {
        let s = &p.state;
        ConditionRow {
            date: p.date,
            time_of_day: p.time_of_day,
            location_id: p.location_id,
            wave_height: opt_f64_to_decimal(s.wave_height),
            wind_wave_height: opt_f64_to_decimal(s.wind_wave_height),
            swell_wave_height: opt_f64_to_decimal(s.swell_wave_height),
            wave_direction: opt_f64_to_decimal(s.wave_direction),
            wind_wave_direction: opt_f64_to_decimal(s.wind_wave_direction),
            swell_wave_direction: opt_f64_to_decimal(s.swell_wave_direction),
            wave_period: opt_f64_to_decimal(s.wave_period),
            wind_wave_period: opt_f64_to_decimal(s.wind_wave_period),
            swell_wave_period: opt_f64_to_decimal(s.swell_wave_period),
            wind_wave_peak_period: opt_f64_to_decimal(s.wind_wave_peak_period),
            swell_wave_peak_period: opt_f64_to_decimal(s.swell_wave_peak_period),
            wind_speed: opt_f64_to_decimal(s.wind_speed),
            wind_direction: s.wind_direction.clone(),
            weather: s.weather.clone(),
        }
    }
}

/// Parameters for upserting a computed surf-condition record.
pub struct UpsertComputedParams {
    pub location_id: i32,
    pub time_of_day: NaiveDateTime,
    pub surf_difficulty: &'static str,
    pub wave_quality: &'static str,
    pub wind_impact: Decimal,
    pub recommendation: &'static str,
    pub computed_at: DateTime<Utc>,
}

impl From<&ComputedCondition> for UpsertComputedParams {
    fn from(c: &ComputedCondition) -> Self {
        UpsertComputedParams {
            location_id: c.location_id,
            time_of_day: c.time_of_day,
            surf_difficulty: c.surf_difficulty.as_str(),
            wave_quality: c.wave_quality.as_str(),
            wind_impact: f64_to_decimal(c.wind_impact),
            recommendation: c.recommendation.as_str(),
            computed_at: c.computed_at,
        }
    }
}
