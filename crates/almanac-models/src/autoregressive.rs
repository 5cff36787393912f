use almanac_core::{
    AlgorithmKind, AlmanacError, FeatureFrame, Forecaster, IntervalForecast, ParamSet, Result,
};
use tracing::debug;

use crate::interval;

/// Autoregressive-integrated statistical forecaster: d-order
/// differencing followed by an AR(p) fit via least squares.
///
/// Date-indexed like [`crate::TrendSeasonalForecaster`]; the engineered
/// matrix is ignored and predicting h rows forecasts h steps past the
/// training series.
pub struct AutoRegressiveForecaster {
    p: usize,
    d: usize,
    fitted: Option<ArState>,
}

struct ArState {
    /// Intercept followed by the p lag coefficients.
    coefficients: Vec<f64>,
    /// Last p values of the differenced series, oldest first.
    tail: Vec<f64>,
    /// Last value of each integration level, level 0 (original) first.
    levels: Vec<f64>,
    residual_std: f64,
}

impl AutoRegressiveForecaster {
    pub fn new(p: usize, d: usize) -> Self {
        Self {
            p: p.max(1),
            d,
            fitted: None,
        }
    }

    pub fn from_params(params: &ParamSet) -> Result<Box<dyn Forecaster>> {
        let p = params.int("p", 1);
        let d = params.int("d", 1);
        if p < 1 || d < 0 {
            return Err(AlmanacError::InvalidInput(format!(
                "AR order p={p}, d={d} out of range"
            )));
        }
        Ok(Box::new(Self::new(p as usize, d as usize)))
    }

    fn fitted(&self) -> Result<&ArState> {
        self.fitted
            .as_ref()
            .ok_or_else(|| AlmanacError::NotFitted(self.name().into()))
    }
}

impl Forecaster for AutoRegressiveForecaster {
    fn name(&self) -> &str {
        "autoregressive-integrated"
    }

    fn kind(&self) -> AlgorithmKind {
        AlgorithmKind::Statistical
    }

    fn fit(&mut self, _frame: &FeatureFrame, target: &[f64]) -> Result<()> {
        let required = self.p + self.d + 2;
        if target.len() < required {
            return Err(AlmanacError::InsufficientData {
                required,
                available: target.len(),
            });
        }

        // Difference d times, remembering the last value at every level
        // so forecasts can be integrated back to the original scale.
        let mut series = target.to_vec();
        let mut levels = Vec::with_capacity(self.d);
        for _ in 0..self.d {
            levels.push(*series.last().expect("non-empty after length check"));
            series = series.windows(2).map(|w| w[1] - w[0]).collect();
        }

        debug!(
            p = self.p,
            d = self.d,
            differenced_length = series.len(),
            "autoregressive fitting"
        );

        let coefficients = fit_ar(&series, self.p)?;

        // In-sample one-step residuals on the differenced scale
        let mut actual = Vec::new();
        let mut predicted = Vec::new();
        for t in self.p..series.len() {
            actual.push(series[t]);
            predicted.push(ar_step(&coefficients, &series[..t]));
        }
        let residual_std = interval::residual_std(&actual, &predicted);

        let tail = series[series.len() - self.p..].to_vec();
        self.fitted = Some(ArState {
            coefficients,
            tail,
            levels,
            residual_std,
        });
        Ok(())
    }

    fn predict(&self, frame: &FeatureFrame) -> Result<Vec<f64>> {
        let state = self.fitted()?;
        let horizon = frame.len();

        // Recursive forecast on the differenced scale
        let mut buffer = state.tail.clone();
        let mut differenced = Vec::with_capacity(horizon);
        for _ in 0..horizon {
            let next = ar_step(&state.coefficients, &buffer);
            differenced.push(next);
            buffer.push(next);
        }

        // Integrate back, innermost difference first
        let mut forecast = differenced;
        for &level in state.levels.iter().rev() {
            let mut running = level;
            for value in forecast.iter_mut() {
                running += *value;
                *value = running;
            }
        }
        Ok(forecast)
    }

    fn predict_interval(&self, frame: &FeatureFrame, confidence: f64) -> Result<IntervalForecast> {
        let state = self.fitted()?;
        let point = self.predict(frame)?;
        interval::residual_interval(point, state.residual_std, confidence)
    }
}

/// One-step AR prediction from the last p values of `history`.
fn ar_step(coefficients: &[f64], history: &[f64]) -> f64 {
    let p = coefficients.len() - 1;
    let mut value = coefficients[0];
    for j in 1..=p {
        value += coefficients[j] * history[history.len() - j];
    }
    value
}

/// Least-squares AR(p) fit via the normal equations.
///
/// A flat series carries no lag structure and makes the normal
/// equations singular; it is fit as intercept-only instead, which
/// keeps pure trends fittable after differencing.
fn fit_ar(series: &[f64], p: usize) -> Result<Vec<f64>> {
    let cols = p + 1;

    let mean = series.iter().sum::<f64>() / series.len() as f64;
    let spread = series
        .iter()
        .fold(0.0_f64, |acc, v| acc.max((v - mean).abs()));
    if spread <= 1e-9 * mean.abs().max(1.0) {
        let mut coefficients = vec![0.0; cols];
        coefficients[0] = mean;
        return Ok(coefficients);
    }

    // X'X and X'y accumulated directly; the design row for time t is
    // [1, w[t-1], ..., w[t-p]].
    let mut xtx = vec![vec![0.0; cols]; cols];
    let mut xty = vec![0.0; cols];
    for t in p..series.len() {
        let mut row = Vec::with_capacity(cols);
        row.push(1.0);
        for j in 1..=p {
            row.push(series[t - j]);
        }
        for i in 0..cols {
            xty[i] += row[i] * series[t];
            for j in 0..cols {
                xtx[i][j] += row[i] * row[j];
            }
        }
    }

    solve(xtx, xty)
}

/// Gaussian elimination with partial pivoting for the small (p+1)²
/// normal-equation system.
fn solve(mut a: Vec<Vec<f64>>, mut b: Vec<f64>) -> Result<Vec<f64>> {
    let n = b.len();
    for col in 0..n {
        let pivot = (col..n)
            .max_by(|&i, &j| {
                a[i][col]
                    .abs()
                    .partial_cmp(&a[j][col].abs())
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .expect("non-empty range");
        if a[pivot][col].abs() < 1e-12 {
            return Err(AlmanacError::ModelError(
                "AR normal equations are singular (constant or degenerate series)".into(),
            ));
        }
        a.swap(col, pivot);
        b.swap(col, pivot);

        for row in col + 1..n {
            let factor = a[row][col] / a[col][col];
            for k in col..n {
                a[row][k] -= factor * a[col][k];
            }
            b[row] -= factor * b[col];
        }
    }

    let mut x = vec![0.0; n];
    for row in (0..n).rev() {
        let mut sum = b[row];
        for k in row + 1..n {
            sum -= a[row][k] * x[k];
        }
        x[row] = sum / a[row][row];
    }
    Ok(x)
}
