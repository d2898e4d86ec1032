//! Pluggable forecasting capability.
//!
//! The orchestrator only sees [`Forecaster`]: fit a fresh instance on one
//! column's history, then predict `steps` values. Instances are created per
//! column unit by a [`ForecasterFactory`] and dropped when the unit ends, so
//! no model state is ever shared between concurrent fits.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

mod lag_regression;
mod seasonal;

pub use lag_regression::LagRegression;
pub use seasonal::SeasonalSmoothing;

/// Errors raised while fitting or predicting.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ForecastError {
    /// The series is shorter than the model's minimum history.
    #[error("insufficient history: need at least {needed} observations, got {got}")]
    InsufficientHistory { needed: usize, got: usize },

    /// The fit failed numerically or produced non-finite output.
    #[error("forecast diverged: {0}")]
    Divergence(String),

    /// `predict` was called before a successful `fit`.
    #[error("model must be fitted before prediction")]
    NotFitted,
}

/// Common interface for the forecasting models.
///
/// Fitting is CPU-bound and may take a while; callers run it on the blocking
/// pool. `predict` must return exactly `steps` values, each depending only on
/// the fitted history and earlier predictions.
pub trait Forecaster: Send {
    fn fit(&mut self, series: &[f64]) -> Result<(), ForecastError>;

    fn predict(&self, steps: usize) -> Result<Vec<f64>, ForecastError>;

    /// Minimum series length accepted by `fit`.
    fn min_history(&self) -> usize;

    fn name(&self) -> &str;
}

/// Type alias for boxed forecaster trait objects.
pub type BoxedForecaster = Box<dyn Forecaster>;

/// Which model a run uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForecastModel {
    /// Additive Holt-Winters with a daily season.
    Seasonal,
    /// Autoregression over a fixed look-back window.
    LagRegression,
}

impl FromStr for ForecastModel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "seasonal" | "holt_winters" => Ok(ForecastModel::Seasonal),
            "lag_regression" | "sequence" => Ok(ForecastModel::LagRegression),
            other => Err(format!("unknown forecast model '{}'", other)),
        }
    }
}

/// Creates a fresh, independently owned model for every column unit.
#[derive(Clone)]
pub struct ForecasterFactory {
    name: &'static str,
    build: Arc<dyn Fn() -> BoxedForecaster + Send + Sync>,
}

impl ForecasterFactory {
    pub fn new<F>(name: &'static str, build: F) -> Self
    where
        F: Fn() -> BoxedForecaster + Send + Sync + 'static,
    {
        Self {
            name,
            build: Arc::new(build),
        }
    }

    pub fn for_model(model: ForecastModel) -> Self {
        match model {
            ForecastModel::Seasonal => {
                Self::new("seasonal", || Box::new(SeasonalSmoothing::daily()))
            }
            ForecastModel::LagRegression => {
                Self::new("lag_regression", || Box::new(LagRegression::default()))
            }
        }
    }

    pub fn create(&self) -> BoxedForecaster {
        (self.build)()
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl fmt::Debug for ForecasterFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ForecasterFactory")
            .field("name", &self.name)
            .finish()
    }
}

/// Fit a fresh model on `series` and predict `steps` values, checking the output.
///
/// Any non-finite prediction or a wrong-length result is reported as
/// divergence whichever model produced it.
pub fn fit_and_predict(
    model: &mut dyn Forecaster,
    series: &[f64],
    steps: usize,
) -> Result<Vec<f64>, ForecastError> {
    if series.len() < model.min_history() {
        return Err(ForecastError::InsufficientHistory {
            needed: model.min_history(),
            got: series.len(),
        });
    }
    model.fit(series)?;
    let values = model.predict(steps)?;
    if values.len() != steps {
        return Err(ForecastError::Divergence(format!(
            "{} returned {} values for {} steps",
            model.name(),
            values.len(),
            steps
        )));
    }
    if let Some(step) = values.iter().position(|v| !v.is_finite()) {
        return Err(ForecastError::Divergence(format!(
            "{} produced a non-finite value at step {}",
            model.name(),
            step + 1
        )));
    }
    Ok(values)
}
