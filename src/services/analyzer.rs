//! Surf-condition rule tables.
//!
//! Each table is evaluated top-down and the first matching rule wins. Every
//! threshold is a strict inequality, so a value sitting exactly on a
//! threshold falls through to the next tier.

use crate::domain::{PredictedCondition, SeaState};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfDifficulty {
    High,
    Medium,
    Low,
}

impl SurfDifficulty {
    pub fn as_str(self) -> &'static str {
        match self {
            SurfDifficulty::High => "High",
            SurfDifficulty::Medium => "Medium",
            SurfDifficulty::Low => "Low",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaveQuality {
    Excellent,
    Good,
    Fair,
    Poor,
}

impl WaveQuality {
    pub fn as_str(self) -> &'static str {
        match self {
            WaveQuality::Excellent => "Excellent",
            WaveQuality::Good => "Good",
            WaveQuality::Fair => "Fair",
            WaveQuality::Poor => "Poor",
        }
    }
}

/// The fields the rule tables read, all required.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConditionInputs {
    pub wave_height: f64,
    pub wind_speed: f64,
    pub swell_wave_height: f64,
    pub wave_period: f64,
    pub swell_wave_period: f64,
    pub wind_wave_height: f64,
}

impl ConditionInputs {
    /// Pull the analyser inputs out of a sea state, naming the first missing field.
    pub fn from_state(state: &SeaState) -> Result<Self, &'static str> {
        Ok(Self {
            wave_height: state.wave_height.ok_or("wave_height")?,
            wind_speed: state.wind_speed.ok_or("wind_speed")?,
            swell_wave_height: state.swell_wave_height.ok_or("swell_wave_height")?,
            wave_period: state.wave_period.ok_or("wave_period")?,
            swell_wave_period: state.swell_wave_period.ok_or("swell_wave_period")?,
            wind_wave_height: state.wind_wave_height.ok_or("wind_wave_height")?,
        })
    }
}

impl TryFrom<&PredictedCondition> for ConditionInputs {
    type Error = &'static str;

    fn try_from(row: &PredictedCondition) -> Result<Self, Self::Error> {
        Self::from_state(&row.state)
    }
}

struct DifficultyRule {
    tier: SurfDifficulty,
    wave_height_above: f64,
    wind_speed_above: f64,
    swell_wave_height_above: f64,
}

const DIFFICULTY_RULES: [DifficultyRule; 2] = [
    DifficultyRule {
        tier: SurfDifficulty::High,
        wave_height_above: 2.0,
        wind_speed_above: 5.0,
        swell_wave_height_above: 2.0,
    },
    DifficultyRule {
        tier: SurfDifficulty::Medium,
        wave_height_above: 1.0,
        wind_speed_above: 3.0,
        swell_wave_height_above: 1.0,
    },
];

const DIFFICULTY_FALLBACK: SurfDifficulty = SurfDifficulty::Low;

struct QualityRule {
    tier: WaveQuality,
    wave_height_above: f64,
    wave_period_above: f64,
    swell_wave_period_above: f64,
    wind_wave_height_below: f64,
}

const QUALITY_RULES: [QualityRule; 3] = [
    QualityRule {
        tier: WaveQuality::Excellent,
        wave_height_above: 2.0,
        wave_period_above: 10.0,
        swell_wave_period_above: 10.0,
        wind_wave_height_below: 1.5,
    },
    QualityRule {
        tier: WaveQuality::Good,
        wave_height_above: 1.0,
        wave_period_above: 7.0,
        swell_wave_period_above: 7.0,
        wind_wave_height_below: 2.0,
    },
    QualityRule {
        tier: WaveQuality::Fair,
        wave_height_above: 1.0,
        wave_period_above: 5.0,
        swell_wave_period_above: 5.0,
        wind_wave_height_below: 3.0,
    },
];

const QUALITY_FALLBACK: WaveQuality = WaveQuality::Poor;

/// Strong wind over a developed wind sea weighs more heavily.
const STRONG_WIND_SPEED_ABOVE: f64 = 5.0;
const STRONG_WIND_WAVE_HEIGHT_ABOVE: f64 = 2.0;
const STRONG_WIND_FACTOR: f64 = 0.8;
const WIND_FACTOR: f64 = 0.5;

pub fn surf_difficulty(c: &ConditionInputs) -> SurfDifficulty {
    DIFFICULTY_RULES
        .iter()
        .find(|r| {
            c.wave_height > r.wave_height_above
                && c.wind_speed > r.wind_speed_above
                && c.swell_wave_height > r.swell_wave_height_above
        })
        .map(|r| r.tier)
        .unwrap_or(DIFFICULTY_FALLBACK)
}

pub fn wave_quality(c: &ConditionInputs) -> WaveQuality {
    QUALITY_RULES
        .iter()
        .find(|r| {
            c.wave_height > r.wave_height_above
                && c.wave_period > r.wave_period_above
                && c.swell_wave_period > r.swell_wave_period_above
                && c.wind_wave_height < r.wind_wave_height_below
        })
        .map(|r| r.tier)
        .unwrap_or(QUALITY_FALLBACK)
}

pub fn wind_impact(c: &ConditionInputs) -> f64 {
    if c.wind_speed > STRONG_WIND_SPEED_ABOVE && c.wind_wave_height > STRONG_WIND_WAVE_HEIGHT_ABOVE
    {
        c.wind_speed * STRONG_WIND_FACTOR
    } else {
        c.wind_speed * WIND_FACTOR
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inputs() -> ConditionInputs {
        ConditionInputs {
            wave_height: 0.5,
            wind_speed: 1.0,
            swell_wave_height: 0.5,
            wave_period: 4.0,
            swell_wave_period: 4.0,
            wind_wave_height: 0.2,
        }
    }

    #[test]
    fn test_difficulty_high() {
        let c = ConditionInputs {
            wave_height: 2.5,
            wind_speed: 6.0,
            swell_wave_height: 2.1,
            ..inputs()
        };
        assert_eq!(surf_difficulty(&c), SurfDifficulty::High);
    }

    #[test]
    fn test_difficulty_wave_height_boundary_is_medium() {
        let c = ConditionInputs {
            wave_height: 2.0,
            wind_speed: 6.0,
            swell_wave_height: 2.5,
            ..inputs()
        };
        assert_eq!(surf_difficulty(&c), SurfDifficulty::Medium);
    }

    #[test]
    fn test_difficulty_medium_boundaries_fall_to_low() {
        let c = ConditionInputs {
            wave_height: 1.5,
            wind_speed: 3.0,
            swell_wave_height: 1.5,
            ..inputs()
        };
        assert_eq!(surf_difficulty(&c), SurfDifficulty::Low);
    }

    #[test]
    fn test_difficulty_low() {
        assert_eq!(surf_difficulty(&inputs()), SurfDifficulty::Low);
    }

    #[test]
    fn test_quality_excellent() {
        let c = ConditionInputs {
            wave_height: 2.2,
            wave_period: 12.0,
            swell_wave_period: 11.0,
            wind_wave_height: 1.0,
            ..inputs()
        };
        assert_eq!(wave_quality(&c), WaveQuality::Excellent);
    }

    #[test]
    fn test_quality_choppy_excellent_swell_drops_to_good() {
        // Wind-wave height 1.5 is not < 1.5, so Excellent is skipped.
        let c = ConditionInputs {
            wave_height: 2.2,
            wave_period: 12.0,
            swell_wave_period: 11.0,
            wind_wave_height: 1.5,
            ..inputs()
        };
        assert_eq!(wave_quality(&c), WaveQuality::Good);
    }

    #[test]
    fn test_quality_fair() {
        let c = ConditionInputs {
            wave_height: 1.2,
            wave_period: 6.0,
            swell_wave_period: 6.0,
            wind_wave_height: 2.5,
            ..inputs()
        };
        assert_eq!(wave_quality(&c), WaveQuality::Fair);
    }

    #[test]
    fn test_quality_period_boundary_is_poor() {
        let c = ConditionInputs {
            wave_height: 1.2,
            wave_period: 5.0,
            swell_wave_period: 6.0,
            wind_wave_height: 0.5,
            ..inputs()
        };
        assert_eq!(wave_quality(&c), WaveQuality::Poor);
    }

    #[test]
    fn test_wind_impact_strong() {
        let c = ConditionInputs {
            wind_speed: 10.0,
            wind_wave_height: 2.5,
            ..inputs()
        };
        assert!((wind_impact(&c) - 8.0).abs() < 1e-12);
    }

    #[test]
    fn test_wind_impact_boundary_uses_low_factor() {
        let c = ConditionInputs {
            wind_speed: 5.0,
            wind_wave_height: 3.0,
            ..inputs()
        };
        assert!((wind_impact(&c) - 2.5).abs() < 1e-12);
    }

    #[test]
    fn test_inputs_name_missing_field() {
        let state = SeaState {
            wave_height: Some(1.0),
            wind_speed: Some(2.0),
            swell_wave_height: Some(1.0),
            wave_period: None,
            swell_wave_period: Some(8.0),
            wind_wave_height: Some(0.5),
            ..Default::default()
        };
        assert_eq!(ConditionInputs::from_state(&state), Err("wave_period"));
    }
}
