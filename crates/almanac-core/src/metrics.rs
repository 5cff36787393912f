use serde::{Deserialize, Serialize};

use crate::{AlmanacError, Result};

/// The scalar used to rank trials and algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Mape,
    Rmse,
    Mae,
    R2,
}

impl Default for Metric {
    fn default() -> Self {
        Metric::Mape
    }
}

impl std::fmt::Display for Metric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Metric::Mape => "mape",
            Metric::Rmse => "rmse",
            Metric::Mae => "mae",
            Metric::R2 => "r2",
        };
        f.write_str(name)
    }
}

impl std::str::FromStr for Metric {
    type Err = AlmanacError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "mape" => Ok(Metric::Mape),
            "rmse" => Ok(Metric::Rmse),
            "mae" => Ok(Metric::Mae),
            "r2" => Ok(Metric::R2),
            other => Err(AlmanacError::InvalidInput(format!(
                "unknown metric '{other}'"
            ))),
        }
    }
}

/// Evaluation metrics for one (actual, predicted) comparison.
///
/// A metric is `None` when it is undefined for the given inputs, e.g.
/// MAPE over an all-zero actual vector, or any metric over zero retained
/// pairs. Undefined is reported as absent, never as zero or infinity.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct MetricSet {
    pub mape: Option<f64>,
    pub rmse: Option<f64>,
    pub mae: Option<f64>,
    pub r2: Option<f64>,
}

impl MetricSet {
    pub fn get(&self, metric: Metric) -> Option<f64> {
        match metric {
            Metric::Mape => self.mape,
            Metric::Rmse => self.rmse,
            Metric::Mae => self.mae,
            Metric::R2 => self.r2,
        }
    }
}

/// Compute MAPE, RMSE, MAE and R² over paired actual/predicted values.
///
/// Pairs where either side is NaN are excluded from every metric. MAPE
/// additionally skips pairs with a zero actual value.
pub fn evaluate(actual: &[f64], predicted: &[f64]) -> MetricSet {
    let pairs: Vec<(f64, f64)> = actual
        .iter()
        .zip(predicted)
        .filter(|(a, p)| !a.is_nan() && !p.is_nan())
        .map(|(a, p)| (*a, *p))
        .collect();

    if pairs.is_empty() {
        return MetricSet::default();
    }

    let n = pairs.len() as f64;

    let mae = pairs.iter().map(|(a, p)| (a - p).abs()).sum::<f64>() / n;
    let mse = pairs.iter().map(|(a, p)| (a - p) * (a - p)).sum::<f64>() / n;
    let rmse = mse.sqrt();

    // MAPE only over non-zero actuals
    let nonzero: Vec<&(f64, f64)> = pairs.iter().filter(|(a, _)| *a != 0.0).collect();
    let mape = if nonzero.is_empty() {
        None
    } else {
        let sum: f64 = nonzero.iter().map(|(a, p)| ((a - p) / a).abs()).sum();
        Some(sum / nonzero.len() as f64 * 100.0)
    };

    // R²: undefined for a zero-variance actual vector
    let mean_actual = pairs.iter().map(|(a, _)| a).sum::<f64>() / n;
    let ss_tot: f64 = pairs
        .iter()
        .map(|(a, _)| (a - mean_actual) * (a - mean_actual))
        .sum();
    let r2 = if ss_tot > 0.0 {
        let ss_res: f64 = pairs.iter().map(|(a, p)| (a - p) * (a - p)).sum();
        Some(1.0 - ss_res / ss_tot)
    } else {
        None
    };

    MetricSet {
        mape,
        rmse: Some(rmse),
        mae: Some(mae),
        r2,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mape_known_value() {
        let m = evaluate(&[10.0, 20.0], &[11.0, 18.0]);
        // ((1/10) + (2/20)) / 2 * 100 = 10.0
        assert!((m.mape.unwrap() - 10.0).abs() < 1e-12);
    }

    #[test]
    fn test_mape_all_zero_actuals_undefined() {
        let m = evaluate(&[0.0, 0.0, 0.0], &[1.0, 2.0, 3.0]);
        assert!(m.mape.is_none());
        // RMSE/MAE stay defined
        assert!(m.rmse.is_some());
        assert!(m.mae.is_some());
    }

    #[test]
    fn test_nan_pairs_excluded() {
        let m = evaluate(&[10.0, f64::NAN, 30.0], &[12.0, 20.0, f64::NAN]);
        // Only the first pair survives
        assert!((m.mae.unwrap() - 2.0).abs() < 1e-12);
        assert!((m.rmse.unwrap() - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_empty_after_filtering() {
        let m = evaluate(&[f64::NAN], &[1.0]);
        assert!(m.mape.is_none());
        assert!(m.rmse.is_none());
        assert!(m.mae.is_none());
        assert!(m.r2.is_none());
    }

    #[test]
    fn test_perfect_prediction() {
        let actual = [1.0, 2.0, 3.0, 4.0];
        let m = evaluate(&actual, &actual);
        assert_eq!(m.rmse, Some(0.0));
        assert_eq!(m.mae, Some(0.0));
        assert!((m.r2.unwrap() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_r2_constant_actuals_undefined() {
        let m = evaluate(&[5.0, 5.0, 5.0], &[4.0, 5.0, 6.0]);
        assert!(m.r2.is_none());
    }

    #[test]
    fn test_metric_from_str() {
        assert_eq!("MAPE".parse::<Metric>().unwrap(), Metric::Mape);
        assert_eq!("rmse".parse::<Metric>().unwrap(), Metric::Rmse);
        assert!("wape".parse::<Metric>().is_err());
    }
}
