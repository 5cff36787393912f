use almanac_core::{
    AlgorithmKind, AlmanacError, FeatureFrame, Forecaster, IntervalForecast, ParamSet, Result,
};
use augurs::prelude::*;
use tracing::debug;

use crate::interval;

type FittedEts = <augurs::ets::AutoETS as Fit>::Fitted;

/// Trend/seasonal statistical forecaster wrapping augurs AutoETS.
///
/// Date-indexed: consumes the target series only and ignores the
/// engineered feature matrix. Predicting h rows after fit means
/// forecasting h steps beyond the end of the training series.
pub struct TrendSeasonalForecaster {
    season_length: usize,
    with_trend: bool,
    fitted: Option<FittedState>,
}

struct FittedState {
    model: FittedEts,
    residual_std: f64,
}

impl TrendSeasonalForecaster {
    pub fn new(season_length: usize, with_trend: bool) -> Self {
        Self {
            season_length: season_length.max(1),
            with_trend,
            fitted: None,
        }
    }

    pub fn from_params(params: &ParamSet) -> Result<Box<dyn Forecaster>> {
        let season_length = params.int("season_length", 1);
        if season_length < 1 {
            return Err(AlmanacError::InvalidInput(format!(
                "season_length must be >= 1, got {season_length}"
            )));
        }
        let with_trend = params.text("trend", "auto") != "none";
        Ok(Box::new(Self::new(season_length as usize, with_trend)))
    }

    /// ETS component spec: auto error, auto/no trend, auto/no season.
    fn spec(&self) -> &'static str {
        match (self.season_length > 1, self.with_trend) {
            (true, true) => "ZZZ",
            (true, false) => "ZNZ",
            (false, true) => "ZZN",
            (false, false) => "ZNN",
        }
    }

    fn fitted(&self) -> Result<&FittedState> {
        self.fitted
            .as_ref()
            .ok_or_else(|| AlmanacError::NotFitted(self.name().into()))
    }
}

impl Forecaster for TrendSeasonalForecaster {
    fn name(&self) -> &str {
        "trend-seasonal"
    }

    fn kind(&self) -> AlgorithmKind {
        AlgorithmKind::Statistical
    }

    fn fit(&mut self, _frame: &FeatureFrame, target: &[f64]) -> Result<()> {
        if target.len() < 3 {
            return Err(AlmanacError::InsufficientData {
                required: 3,
                available: target.len(),
            });
        }

        let spec = self.spec();
        debug!(
            season_length = self.season_length,
            spec = spec,
            data_length = target.len(),
            "trend-seasonal fitting"
        );

        let auto = augurs::ets::AutoETS::new(self.season_length, spec)
            .map_err(|e| AlmanacError::ModelError(format!("ETS init: {e}")))?;
        let model = auto
            .fit(target)
            .map_err(|e| AlmanacError::ModelError(format!("ETS fit: {e}")))?;

        // One-step naive residual proxy; only used when augurs returns
        // no native interval for a prediction.
        let diffs: Vec<f64> = target.windows(2).map(|w| w[1] - w[0]).collect();
        let zeros = vec![0.0; diffs.len()];
        let residual_std = interval::residual_std(&diffs, &zeros);

        self.fitted = Some(FittedState {
            model,
            residual_std,
        });
        Ok(())
    }

    fn predict(&self, frame: &FeatureFrame) -> Result<Vec<f64>> {
        let fitted = self.fitted()?;
        if frame.is_empty() {
            return Ok(Vec::new());
        }
        let forecast = fitted
            .model
            .predict(frame.len(), None)
            .map_err(|e| AlmanacError::ModelError(format!("ETS predict: {e}")))?;
        Ok(forecast.point)
    }

    fn predict_interval(&self, frame: &FeatureFrame, confidence: f64) -> Result<IntervalForecast> {
        let fitted = self.fitted()?;
        if frame.is_empty() {
            return Ok(IntervalForecast {
                point: Vec::new(),
                lower: Vec::new(),
                upper: Vec::new(),
            });
        }
        let forecast = fitted
            .model
            .predict(frame.len(), confidence)
            .map_err(|e| AlmanacError::ModelError(format!("ETS predict: {e}")))?;

        match forecast.intervals {
            Some(iv) => Ok(IntervalForecast {
                point: forecast.point,
                lower: iv.lower,
                upper: iv.upper,
            }),
            None => interval::residual_interval(forecast.point, fitted.residual_std, confidence),
        }
    }
}
