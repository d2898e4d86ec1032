//! Additive Holt-Winters smoothing.
//!
//! Sea state is strongly diurnal (sea breeze, tides averaged per hour), so the
//! default season is one day of hourly observations.
//!
//! - Level: `l_t = α(y_t − s_{t−m}) + (1−α)(l_{t−1} + b_{t−1})`
//! - Trend: `b_t = β(l_t − l_{t−1}) + (1−β) b_{t−1}`
//! - Season: `s_t = γ(y_t − l_t) + (1−γ) s_{t−m}`
//! - Forecast: `ŷ_{n+h} = l_n + h·b_n + s_{n+h−m}`

use super::{ForecastError, Forecaster};

/// Hourly observations per day.
const DAILY_PERIOD: usize = 24;

#[derive(Debug, Clone)]
pub struct SeasonalSmoothing {
    period: usize,
    alpha: f64,
    beta: f64,
    gamma: f64,
    state: Option<FittedState>,
}

#[derive(Debug, Clone)]
struct FittedState {
    level: f64,
    trend: f64,
    seasonals: Vec<f64>,
    n: usize,
}

impl SeasonalSmoothing {
    pub fn new(period: usize, alpha: f64, beta: f64, gamma: f64) -> Self {
        Self {
            period: period.max(1),
            alpha: alpha.clamp(0.0001, 0.9999),
            beta: beta.clamp(0.0001, 0.9999),
            gamma: gamma.clamp(0.0001, 0.9999),
            state: None,
        }
    }

    /// Daily season with conservative smoothing.
    pub fn daily() -> Self {
        Self::new(DAILY_PERIOD, 0.3, 0.05, 0.1)
    }

    /// Level from the first season, trend from the change between the first
    /// two seasons, seasonal indices as deviations from the first level.
    fn initial_state(&self, values: &[f64]) -> (f64, f64, Vec<f64>) {
        let m = self.period;
        let first: f64 = values[..m].iter().sum::<f64>() / m as f64;
        let second: f64 = values[m..2 * m].iter().sum::<f64>() / m as f64;
        let trend = (second - first) / m as f64;
        let seasonals = values[..m].iter().map(|v| v - first).collect();
        (first, trend, seasonals)
    }
}

impl Default for SeasonalSmoothing {
    fn default() -> Self {
        Self::daily()
    }
}

impl Forecaster for SeasonalSmoothing {
    fn fit(&mut self, series: &[f64]) -> Result<(), ForecastError> {
        let needed = self.min_history();
        if series.len() < needed {
            return Err(ForecastError::InsufficientHistory {
                needed,
                got: series.len(),
            });
        }

        let m = self.period;
        let (mut level, mut trend, mut seasonals) = self.initial_state(series);

        for (t, &y) in series.iter().enumerate() {
            let idx = t % m;
            let s = seasonals[idx];
            let level_prev = level;
            level = self.alpha * (y - s) + (1.0 - self.alpha) * (level_prev + trend);
            trend = self.beta * (level - level_prev) + (1.0 - self.beta) * trend;
            seasonals[idx] = self.gamma * (y - level) + (1.0 - self.gamma) * s;
        }

        if !level.is_finite() || !trend.is_finite() || seasonals.iter().any(|s| !s.is_finite()) {
            self.state = None;
            return Err(ForecastError::Divergence(
                "seasonal smoothing state is not finite".to_string(),
            ));
        }

        self.state = Some(FittedState {
            level,
            trend,
            seasonals,
            n: series.len(),
        });
        Ok(())
    }

    fn predict(&self, steps: usize) -> Result<Vec<f64>, ForecastError> {
        let state = self.state.as_ref().ok_or(ForecastError::NotFitted)?;
        let m = self.period;
        Ok((1..=steps)
            .map(|h| {
                let idx = (state.n + h - 1) % m;
                state.level + h as f64 * state.trend + state.seasonals[idx]
            })
            .collect())
    }

    fn min_history(&self) -> usize {
        2 * self.period
    }

    fn name(&self) -> &str {
        "SeasonalSmoothing"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn diurnal(days: usize, base: f64, amplitude: f64) -> Vec<f64> {
        (0..days * DAILY_PERIOD)
            .map(|t| {
                let phase = (t % DAILY_PERIOD) as f64 / DAILY_PERIOD as f64;
                base + amplitude * (phase * std::f64::consts::TAU).sin()
            })
            .collect()
    }

    #[test]
    fn test_requires_two_seasons() {
        let mut model = SeasonalSmoothing::daily();
        assert_eq!(
            model.fit(&diurnal(1, 1.0, 0.5)),
            Err(ForecastError::InsufficientHistory { needed: 48, got: 24 })
        );
    }

    #[test]
    fn test_predict_before_fit() {
        let model = SeasonalSmoothing::daily();
        assert_eq!(model.predict(5), Err(ForecastError::NotFitted));
    }

    #[test]
    fn test_constant_series_stays_constant() {
        let mut model = SeasonalSmoothing::daily();
        model.fit(&vec![1.8; 96]).unwrap();
        let forecast = model.predict(72).unwrap();
        assert_eq!(forecast.len(), 72);
        for v in forecast {
            assert!((v - 1.8).abs() < 1e-9, "expected 1.8, got {}", v);
        }
    }

    #[test]
    fn test_tracks_daily_shape() {
        let history = diurnal(7, 2.0, 0.5);
        let mut model = SeasonalSmoothing::daily();
        model.fit(&history).unwrap();
        let forecast = model.predict(24).unwrap();
        // Next day should repeat the pattern closely.
        for (h, v) in forecast.iter().enumerate() {
            let expected = history[h];
            assert!(
                (v - expected).abs() < 0.15,
                "hour {}: expected ~{}, got {}",
                h,
                expected,
                v
            );
        }
    }

    #[test]
    fn test_non_finite_input_diverges() {
        let mut series = vec![1.0; 48];
        series[30] = f64::INFINITY;
        let mut model = SeasonalSmoothing::daily();
        assert!(matches!(
            model.fit(&series),
            Err(ForecastError::Divergence(_))
        ));
    }
}
