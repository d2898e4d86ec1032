//! Domain records shared by the forecast and analytics pipelines.
//!
//! These are the `f64`-based shapes the pipeline works with. The database
//! rows in `db::models` carry `Decimal` columns and are converted into these
//! at the persistence boundary.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::errors::InvalidLocation;
use crate::services::analyzer::{SurfDifficulty, WaveQuality};
use crate::services::compass;
use crate::services::recommendation::Recommendation;

const MAX_LATITUDE: f64 = 90.0;
const MAX_LONGITUDE: f64 = 180.0;

/// A validated geographic coordinate pair (WGS84).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, ToSchema)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

/// A surf spot as provisioned by the location registry.
///
/// Coordinates are stored loosely (either half may be missing); use
/// [`Location::coordinates`] before doing any work that needs them.
#[derive(Debug, Clone, PartialEq)]
pub struct Location {
    pub id: i32,
    pub name: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Location {
    /// Soft-deleted locations are never dispatched.
    pub fn is_active(&self) -> bool {
        self.deleted_at.is_none()
    }

    /// Validated coordinates: both halves present and within WGS84 bounds.
    pub fn coordinates(&self) -> Result<Coordinates, InvalidLocation> {
        match (self.latitude, self.longitude) {
            (Some(latitude), Some(longitude))
                if latitude.abs() <= MAX_LATITUDE && longitude.abs() <= MAX_LONGITUDE =>
            {
                Ok(Coordinates {
                    latitude,
                    longitude,
                })
            }
            (Some(latitude), Some(longitude)) => Err(InvalidLocation::OutOfRange {
                location_id: self.id,
                latitude,
                longitude,
            }),
            (None, None) => Err(InvalidLocation::MissingCoordinates {
                location_id: self.id,
            }),
            (latitude, longitude) => Err(InvalidLocation::PartialCoordinates {
                location_id: self.id,
                latitude,
                longitude,
            }),
        }
    }
}

/// The 14-field sea-condition bundle shared by observed and predicted rows.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SeaState {
    pub wave_height: Option<f64>,
    pub wind_wave_height: Option<f64>,
    pub swell_wave_height: Option<f64>,
    pub wave_direction: Option<f64>,
    pub wind_wave_direction: Option<f64>,
    pub swell_wave_direction: Option<f64>,
    pub wave_period: Option<f64>,
    pub wind_wave_period: Option<f64>,
    pub swell_wave_period: Option<f64>,
    pub wind_wave_peak_period: Option<f64>,
    pub swell_wave_peak_period: Option<f64>,
    pub wind_speed: Option<f64>,
    /// 16-point compass label ("N", "NNE", ...).
    pub wind_direction: Option<String>,
    /// Free-text weather descriptor. Ingestion stores the air temperature here.
    pub weather: Option<String>,
}

/// One observed hour at a location (training history).
#[derive(Debug, Clone, PartialEq)]
pub struct ObservedCondition {
    pub location_id: i32,
    pub date: NaiveDate,
    pub time_of_day: NaiveTime,
    pub state: SeaState,
}

/// One forecast hour at a location. Natural key: (date, time_of_day, location_id).
#[derive(Debug, Clone, PartialEq)]
pub struct PredictedCondition {
    pub location_id: i32,
    pub date: NaiveDate,
    pub time_of_day: NaiveTime,
    pub state: SeaState,
}

/// Derived surf analytics for one forecast hour. Natural key: (location_id, time_of_day).
#[derive(Debug, Clone, PartialEq)]
pub struct ComputedCondition {
    pub location_id: i32,
    pub time_of_day: NaiveDateTime,
    pub surf_difficulty: SurfDifficulty,
    pub wave_quality: WaveQuality,
    pub wind_impact: f64,
    pub recommendation: Recommendation,
    pub computed_at: DateTime<Utc>,
}

/// A named numeric time series tracked per location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SignalColumn {
    WaveHeight,
    WindWaveHeight,
    SwellWaveHeight,
    WaveDirection,
    WindWaveDirection,
    SwellWaveDirection,
    WavePeriod,
    WindWavePeriod,
    SwellWavePeriod,
    WindWavePeakPeriod,
    SwellWavePeakPeriod,
    WindSpeed,
    WindDirection,
    Weather,
}

impl SignalColumn {
    /// Every column forecast by a default run, in table order.
    pub const ALL: [SignalColumn; 14] = [
        SignalColumn::WaveHeight,
        SignalColumn::WindWaveHeight,
        SignalColumn::SwellWaveHeight,
        SignalColumn::WaveDirection,
        SignalColumn::WindWaveDirection,
        SignalColumn::SwellWaveDirection,
        SignalColumn::WavePeriod,
        SignalColumn::WindWavePeriod,
        SignalColumn::SwellWavePeriod,
        SignalColumn::WindWavePeakPeriod,
        SignalColumn::SwellWavePeakPeriod,
        SignalColumn::WindSpeed,
        SignalColumn::WindDirection,
        SignalColumn::Weather,
    ];

    /// Column name as stored in the condition tables.
    pub fn as_str(self) -> &'static str {
        match self {
            SignalColumn::WaveHeight => "wave_height",
            SignalColumn::WindWaveHeight => "wind_wave_height",
            SignalColumn::SwellWaveHeight => "swell_wave_height",
            SignalColumn::WaveDirection => "wave_direction",
            SignalColumn::WindWaveDirection => "wind_wave_direction",
            SignalColumn::SwellWaveDirection => "swell_wave_direction",
            SignalColumn::WavePeriod => "wave_period",
            SignalColumn::WindWavePeriod => "wind_wave_period",
            SignalColumn::SwellWavePeriod => "swell_wave_period",
            SignalColumn::WindWavePeakPeriod => "wind_wave_peak_period",
            SignalColumn::SwellWavePeakPeriod => "swell_wave_peak_period",
            SignalColumn::WindSpeed => "wind_speed",
            SignalColumn::WindDirection => "wind_direction",
            SignalColumn::Weather => "weather",
        }
    }

    /// Numeric value of this column in `state`, if present and usable.
    ///
    /// Wind direction is a compass label and is mapped to its angle; weather is
    /// free text and only counts when it parses as a number.
    pub fn value(self, state: &SeaState) -> Option<f64> {
        match self {
            SignalColumn::WaveHeight => state.wave_height,
            SignalColumn::WindWaveHeight => state.wind_wave_height,
            SignalColumn::SwellWaveHeight => state.swell_wave_height,
            SignalColumn::WaveDirection => state.wave_direction,
            SignalColumn::WindWaveDirection => state.wind_wave_direction,
            SignalColumn::SwellWaveDirection => state.swell_wave_direction,
            SignalColumn::WavePeriod => state.wave_period,
            SignalColumn::WindWavePeriod => state.wind_wave_period,
            SignalColumn::SwellWavePeriod => state.swell_wave_period,
            SignalColumn::WindWavePeakPeriod => state.wind_wave_peak_period,
            SignalColumn::SwellWavePeakPeriod => state.swell_wave_peak_period,
            SignalColumn::WindSpeed => state.wind_speed,
            SignalColumn::WindDirection => state
                .wind_direction
                .as_deref()
                .and_then(compass::direction_to_angle),
            SignalColumn::Weather => state
                .weather
                .as_deref()
                .and_then(|w| w.trim().parse::<f64>().ok()),
        }
        .filter(|v| v.is_finite())
    }

    /// Write a forecast value for this column into `state`.
    pub fn apply(self, state: &mut SeaState, value: f64) {
        match self {
            SignalColumn::WaveHeight => state.wave_height = Some(value),
            SignalColumn::WindWaveHeight => state.wind_wave_height = Some(value),
            SignalColumn::SwellWaveHeight => state.swell_wave_height = Some(value),
            SignalColumn::WaveDirection => state.wave_direction = Some(value),
            SignalColumn::WindWaveDirection => state.wind_wave_direction = Some(value),
            SignalColumn::SwellWaveDirection => state.swell_wave_direction = Some(value),
            SignalColumn::WavePeriod => state.wave_period = Some(value),
            SignalColumn::WindWavePeriod => state.wind_wave_period = Some(value),
            SignalColumn::SwellWavePeriod => state.swell_wave_period = Some(value),
            SignalColumn::WindWavePeakPeriod => state.wind_wave_peak_period = Some(value),
            SignalColumn::SwellWavePeakPeriod => state.swell_wave_peak_period = Some(value),
            SignalColumn::WindSpeed => state.wind_speed = Some(value),
            SignalColumn::WindDirection => {
                state.wind_direction = Some(compass::angle_to_compass_label(value).to_string())
            }
            SignalColumn::Weather => state.weather = Some(format!("{:.1}", value)),
        }
    }

    /// Extract this column's series from an ordered history, dropping missing values.
    pub fn series(self, history: &[ObservedCondition]) -> Vec<f64> {
        history
            .iter()
            .filter_map(|obs| self.value(&obs.state))
            .collect()
    }
}

impl std::fmt::Display for SignalColumn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
