use almanac_core::{AlmanacError, IntervalForecast, Result};
use statrs::distribution::{ContinuousCDF, Normal};

/// Two-sided normal quantile for a confidence level in (0, 1), e.g.
/// 1.96 for 95% and 1.645 for 90%.
pub fn normal_quantile(confidence: f64) -> Result<f64> {
    if !(0.0..1.0).contains(&confidence) || confidence <= 0.0 {
        return Err(AlmanacError::InvalidInput(format!(
            "confidence must be in (0, 1), got {confidence}"
        )));
    }
    let normal = Normal::new(0.0, 1.0)
        .map_err(|e| AlmanacError::ModelError(format!("normal quantile: {e}")))?;
    Ok(normal.inverse_cdf(0.5 + confidence / 2.0))
}

/// Symmetric interval around the point forecast, scaled from the
/// fit-time residual standard deviation. The fallback for models with
/// no native quantile output.
pub fn residual_interval(
    point: Vec<f64>,
    residual_std: f64,
    confidence: f64,
) -> Result<IntervalForecast> {
    let half_width = normal_quantile(confidence)? * residual_std;
    let lower = point.iter().map(|p| p - half_width).collect();
    let upper = point.iter().map(|p| p + half_width).collect();
    Ok(IntervalForecast {
        point,
        lower,
        upper,
    })
}

/// Sample standard deviation of fit-time residuals.
pub fn residual_std(actual: &[f64], predicted: &[f64]) -> f64 {
    let n = actual.len();
    if n < 2 {
        return 0.0;
    }
    let residuals: Vec<f64> = actual.iter().zip(predicted).map(|(a, p)| a - p).collect();
    let mean = residuals.iter().sum::<f64>() / n as f64;
    let ss: f64 = residuals.iter().map(|r| (r - mean) * (r - mean)).sum();
    (ss / (n - 1) as f64).sqrt()
}
