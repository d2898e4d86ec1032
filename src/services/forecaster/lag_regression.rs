//! Autoregressive sequence model over a fixed look-back window.
//!
//! Each value is regressed on the `look_back` values before it. The series is
//! mean-centred and the normal equations carry a small ridge term so flat or
//! perfectly periodic histories stay solvable. Multi-step forecasts are rolled
//! forward recursively, feeding each prediction back into the window.

use super::{ForecastError, Forecaster};

const DEFAULT_LOOK_BACK: usize = 16;
const DEFAULT_RIDGE: f64 = 1e-4;
const PIVOT_EPSILON: f64 = 1e-12;

#[derive(Debug, Clone)]
pub struct LagRegression {
    look_back: usize,
    ridge: f64,
    fitted: Option<FittedLags>,
}

#[derive(Debug, Clone)]
struct FittedLags {
    mean: f64,
    /// `coefficients[i]` weights the value `i + 1` steps back.
    coefficients: Vec<f64>,
    /// The last `look_back` centred observations, oldest first.
    window: Vec<f64>,
}

impl LagRegression {
    pub fn new(look_back: usize, ridge: f64) -> Self {
        Self {
            look_back: look_back.max(1),
            ridge: ridge.max(0.0),
            fitted: None,
        }
    }
}

impl Default for LagRegression {
    fn default() -> Self {
        Self::new(DEFAULT_LOOK_BACK, DEFAULT_RIDGE)
    }
}

impl Forecaster for LagRegression {
    fn fit(&mut self, series: &[f64]) -> Result<(), ForecastError> {
        let needed = self.min_history();
        if series.len() < needed {
            return Err(ForecastError::InsufficientHistory {
                needed,
                got: series.len(),
            });
        }

        let p = self.look_back;
        let mean = series.iter().sum::<f64>() / series.len() as f64;
        if !mean.is_finite() {
            self.fitted = None;
            return Err(ForecastError::Divergence(
                "series mean is not finite".to_string(),
            ));
        }
        let centred: Vec<f64> = series.iter().map(|v| v - mean).collect();

        // Normal equations (XᵀX + λI) φ = Xᵀy, row t uses lags t-1 .. t-p.
        let mut xtx = vec![vec![0.0; p]; p];
        let mut xty = vec![0.0; p];
        for t in p..centred.len() {
            let y = centred[t];
            for i in 0..p {
                let xi = centred[t - 1 - i];
                xty[i] += xi * y;
                for j in 0..p {
                    xtx[i][j] += xi * centred[t - 1 - j];
                }
            }
        }
        for (i, row) in xtx.iter_mut().enumerate() {
            row[i] += self.ridge;
        }

        let coefficients = solve_linear_system(xtx, xty).ok_or_else(|| {
            ForecastError::Divergence("lag regression normal equations are singular".to_string())
        })?;
        if coefficients.iter().any(|c| !c.is_finite()) {
            self.fitted = None;
            return Err(ForecastError::Divergence(
                "lag regression coefficients are not finite".to_string(),
            ));
        }

        self.fitted = Some(FittedLags {
            mean,
            coefficients,
            window: centred[centred.len() - p..].to_vec(),
        });
        Ok(())
    }

    fn predict(&self, steps: usize) -> Result<Vec<f64>, ForecastError> {
        let fitted = self.fitted.as_ref().ok_or(ForecastError::NotFitted)?;
        let mut window = fitted.window.clone();
        let mut out = Vec::with_capacity(steps);
        for _ in 0..steps {
            let next: f64 = fitted
                .coefficients
                .iter()
                .zip(window.iter().rev())
                .map(|(c, x)| c * x)
                .sum();
            window.remove(0);
            window.push(next);
            out.push(next + fitted.mean);
        }
        Ok(out)
    }

    fn min_history(&self) -> usize {
        2 * self.look_back + 1
    }

    fn name(&self) -> &str {
        "LagRegression"
    }
}

/// Gaussian elimination with partial pivoting. `None` when the system is singular.
fn solve_linear_system(mut a: Vec<Vec<f64>>, mut b: Vec<f64>) -> Option<Vec<f64>> {
    let n = b.len();
    for col in 0..n {
        let pivot_row = (col..n).max_by(|&i, &j| {
            a[i][col]
                .abs()
                .partial_cmp(&a[j][col].abs())
                .unwrap_or(std::cmp::Ordering::Equal)
        })?;
        if a[pivot_row][col].abs() < PIVOT_EPSILON || !a[pivot_row][col].is_finite() {
            return None;
        }
        a.swap(col, pivot_row);
        b.swap(col, pivot_row);

        for row in (col + 1)..n {
            let factor = a[row][col] / a[col][col];
            if factor == 0.0 {
                continue;
            }
            for k in col..n {
                a[row][k] -= factor * a[col][k];
            }
            b[row] -= factor * b[col];
        }
    }

    let mut x = vec![0.0; n];
    for row in (0..n).rev() {
        let tail: f64 = ((row + 1)..n).map(|k| a[row][k] * x[k]).sum();
        x[row] = (b[row] - tail) / a[row][row];
    }
    Some(x)
}
