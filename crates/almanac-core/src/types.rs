use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{AlmanacError, MetricSet, ParamSet, Result, SearchSpace};

/// One column of a tabular dataset.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Column {
    Numeric(Vec<f64>),
    Date(Vec<NaiveDate>),
}

impl Column {
    pub fn len(&self) -> usize {
        match self {
            Column::Numeric(v) => v.len(),
            Column::Date(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Column-oriented tabular dataset, the engine's only raw input.
///
/// Callers pass pre-sorted, de-duplicated series; [`Dataset::dates`]
/// rejects a date column that is not strictly increasing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Dataset {
    columns: BTreeMap<String, Column>,
}

impl Dataset {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of rows (all columns share it).
    pub fn rows(&self) -> usize {
        self.columns.values().next().map_or(0, Column::len)
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    /// Add a column, enforcing equal length with existing columns.
    pub fn insert(&mut self, name: impl Into<String>, column: Column) -> Result<()> {
        let name = name.into();
        if !self.columns.is_empty() && column.len() != self.rows() {
            return Err(AlmanacError::InvalidInput(format!(
                "column '{}' has {} rows, expected {}",
                name,
                column.len(),
                self.rows()
            )));
        }
        self.columns.insert(name, column);
        Ok(())
    }

    pub fn numeric(&self, name: &str) -> Result<&[f64]> {
        match self.columns.get(name) {
            Some(Column::Numeric(v)) => Ok(v),
            Some(Column::Date(_)) => Err(AlmanacError::InvalidInput(format!(
                "column '{name}' is a date column, expected numeric"
            ))),
            None => Err(AlmanacError::InvalidInput(format!(
                "no column named '{name}'"
            ))),
        }
    }

    /// A strictly increasing date column (duplicates rejected).
    pub fn dates(&self, name: &str) -> Result<&[NaiveDate]> {
        let dates = match self.columns.get(name) {
            Some(Column::Date(v)) => v,
            Some(Column::Numeric(_)) => {
                return Err(AlmanacError::InvalidInput(format!(
                    "column '{name}' is numeric, expected dates"
                )))
            }
            None => {
                return Err(AlmanacError::InvalidInput(format!(
                    "no column named '{name}'"
                )))
            }
        };
        if dates.windows(2).any(|w| w[0] >= w[1]) {
            return Err(AlmanacError::InvalidInput(format!(
                "date column '{name}' must be strictly increasing with no duplicates"
            )));
        }
        Ok(dates)
    }
}

/// An engineered feature matrix with its parallel date axis.
///
/// Invariant: `rows.len() == dates.len()` and every row has
/// `names.len()` values. Statistical forecasters read only `dates`;
/// tabular forecasters read the full matrix.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureFrame {
    pub names: Vec<String>,
    pub rows: Vec<Vec<f64>>,
    pub dates: Vec<NaiveDate>,
}

impl FeatureFrame {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn width(&self) -> usize {
        self.names.len()
    }

    /// Copy out the rows in `range`, keeping matrix and dates aligned.
    pub fn slice(&self, range: std::ops::Range<usize>) -> FeatureFrame {
        FeatureFrame {
            names: self.names.clone(),
            rows: self.rows[range.clone()].to_vec(),
            dates: self.dates[range].to_vec(),
        }
    }
}

/// Output of the feature derivation engine: frame plus aligned target.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DerivedFeatures {
    pub frame: FeatureFrame,
    pub target: Vec<f64>,
}

impl DerivedFeatures {
    pub fn len(&self) -> usize {
        self.target.len()
    }

    pub fn is_empty(&self) -> bool {
        self.target.is_empty()
    }

    pub fn slice(&self, range: std::ops::Range<usize>) -> DerivedFeatures {
        DerivedFeatures {
            frame: self.frame.slice(range.clone()),
            target: self.target[range].to_vec(),
        }
    }

    /// Ordered train/validation split at `ratio` (no shuffling).
    pub fn split(&self, ratio: f64) -> (DerivedFeatures, DerivedFeatures) {
        let cut = (self.len() as f64 * ratio) as usize;
        (self.slice(0..cut), self.slice(cut..self.len()))
    }
}

/// Family of a forecaster, deciding which part of the frame it consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlgorithmKind {
    /// Date-indexed: fits on the target with the date axis only.
    Statistical,
    /// Feature-indexed: fits on the engineered matrix.
    TabularRegression,
}

/// Point forecast with a symmetric or native confidence interval.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntervalForecast {
    pub point: Vec<f64>,
    pub lower: Vec<f64>,
    pub upper: Vec<f64>,
}

/// Contract implemented by every algorithm family.
///
/// `fit` must precede `predict`/`predict_interval`; calling out of order
/// fails with [`AlmanacError::NotFitted`]. Tabular variants fail with
/// [`AlmanacError::IncompatibleShape`] when the predict-time column set
/// diverges from fit time.
pub trait Forecaster: Send {
    fn name(&self) -> &str;

    fn kind(&self) -> AlgorithmKind;

    fn fit(&mut self, frame: &FeatureFrame, target: &[f64]) -> Result<()>;

    /// Point predictions, one per input row.
    fn predict(&self, frame: &FeatureFrame) -> Result<Vec<f64>>;

    /// Predictions with a confidence interval at `confidence` (0..1).
    ///
    /// Models without native interval output derive a symmetric interval
    /// from the fit-time residual standard deviation scaled by the normal
    /// quantile for the requested confidence.
    fn predict_interval(&self, frame: &FeatureFrame, confidence: f64) -> Result<IntervalForecast>;

    /// Feature name → non-negative weight, for tabular variants.
    fn feature_importance(&self) -> Option<BTreeMap<String, f64>> {
        None
    }

    fn evaluate(&self, actual: &[f64], predicted: &[f64]) -> MetricSet {
        crate::metrics::evaluate(actual, predicted)
    }
}

/// A candidate algorithm: its family, search space and constructor.
pub struct AlgorithmSpec {
    pub name: &'static str,
    pub kind: AlgorithmKind,
    pub space: SearchSpace,
    pub build: fn(&ParamSet) -> Result<Box<dyn Forecaster>>,
}

impl AlgorithmSpec {
    pub fn build(&self, params: &ParamSet) -> Result<Box<dyn Forecaster>> {
        (self.build)(params)
    }
}

impl std::fmt::Debug for AlgorithmSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlgorithmSpec")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("space", &self.space)
            .finish()
    }
}
