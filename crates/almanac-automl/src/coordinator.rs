use std::sync::Arc;
use std::time::{Duration, Instant};

use almanac_core::{
    AlmanacError, AutoMlConfig, Dataset, DerivedFeatures, FeatureConfig, Forecaster, Result,
};
use almanac_features::{FeatureEngine, HolidayCalendar};
use almanac_models::registry;
use almanac_search::{AdaptiveSearch, SearchResult, SearchScheduler, SearchStatus, TrialBudget};
use tracing::{info, warn};

/// Result of one full AutoML run over a set of candidate algorithms.
///
/// `requested` is the caller's algorithm list verbatim; `executed` is
/// the subset that reached the search stage. `results` contains one
/// entry per requested algorithm, ranked by score with failures last.
pub struct AutoMlOutcome {
    pub best_algorithm: Option<String>,
    pub best_score: Option<f64>,
    pub best_model: Option<Box<dyn Forecaster>>,
    pub results: Vec<SearchResult>,
    pub total_secs: f64,
    pub requested: Vec<String>,
    pub executed: Vec<String>,
}

/// Orchestrates feature derivation, per-algorithm hyperparameter search
/// and final model selection.
///
/// The trial and wall-clock budgets are split evenly across the
/// requested algorithms. A failing algorithm is recorded and skipped;
/// the run itself errors only on invalid input or failed feature
/// derivation.
pub struct AutoMl {
    config: AutoMlConfig,
    features: FeatureConfig,
    holidays: Option<Arc<dyn HolidayCalendar>>,
}

impl AutoMl {
    pub fn new(config: AutoMlConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            features: FeatureConfig::default(),
            holidays: None,
        })
    }

    pub fn with_feature_config(mut self, features: FeatureConfig) -> Result<Self> {
        features.validate()?;
        self.features = features;
        Ok(self)
    }

    /// Supply the holiday lookup backing the `is_holiday` feature.
    pub fn with_holidays(mut self, calendar: Arc<dyn HolidayCalendar>) -> Self {
        self.holidays = Some(calendar);
        self
    }

    pub fn run(
        &self,
        dataset: &Dataset,
        date_column: &str,
        target_column: &str,
        extra_columns: &[String],
        algorithms: &[String],
    ) -> Result<AutoMlOutcome> {
        if algorithms.is_empty() {
            return Err(AlmanacError::InvalidInput(
                "no candidate algorithms requested".into(),
            ));
        }
        let start = Instant::now();

        let derived = self.derive(dataset, date_column, target_column, extra_columns)?;
        let (train, validation) = derived.split(self.config.train_ratio);
        if validation.is_empty() {
            return Err(AlmanacError::InsufficientData {
                required: (1.0 / (1.0 - self.config.train_ratio)).ceil() as usize,
                available: derived.len(),
            });
        }
        info!(
            derived_rows = derived.len(),
            train_rows = train.len(),
            validation_rows = validation.len(),
            algorithms = algorithms.len(),
            metric = %self.config.metric,
            "starting automl run"
        );

        let share = algorithms.len() as u64;
        let budget = TrialBudget {
            max_trials: (self.config.max_trials / algorithms.len()).max(1),
            timeout: Duration::from_secs_f64(self.config.timeout_secs as f64 / share as f64),
        };

        let mut results: Vec<SearchResult> = Vec::new();
        let mut executed: Vec<String> = Vec::new();
        let mut candidates: Vec<(String, f64, Box<dyn Forecaster>)> = Vec::new();

        for (index, name) in algorithms.iter().enumerate() {
            let spec = match registry::algorithm(name) {
                Ok(spec) => spec,
                Err(err) => {
                    warn!(algorithm = %name, error = %err, "unknown algorithm, skipping");
                    results.push(failed_result(name, &err.to_string()));
                    continue;
                }
            };
            executed.push(name.clone());

            let strategy = AdaptiveSearch::new(
                self.config.seed.wrapping_add(index as u64),
                (budget.max_trials / 5).max(5),
            );
            let mut scheduler = SearchScheduler::new(self.config.metric, Box::new(strategy));
            let outcome = scheduler.run(&spec, &train, &validation, &budget);

            if outcome.result.status == SearchStatus::Completed {
                if let (Some(score), Some(model)) = (outcome.result.best_score, outcome.model) {
                    candidates.push((name.clone(), score, model));
                }
            }
            results.push(outcome.result);
        }

        let best = select_best(candidates);

        // Rank by score ascending, failures at the end in encounter order.
        results.sort_by(|a, b| {
            let rank = |r: &SearchResult| (r.status == SearchStatus::Failed) as u8;
            rank(a).cmp(&rank(b)).then_with(|| {
                match (a.best_score, b.best_score) {
                    (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(std::cmp::Ordering::Equal),
                    (Some(_), None) => std::cmp::Ordering::Less,
                    (None, Some(_)) => std::cmp::Ordering::Greater,
                    (None, None) => std::cmp::Ordering::Equal,
                }
            })
        });

        let total_secs = start.elapsed().as_secs_f64();
        match &best {
            Some((name, score, _)) => {
                info!(best_algorithm = %name, best_score = score, total_secs, "automl run finished")
            }
            None => warn!(total_secs, "automl run finished with no successful algorithm"),
        }

        let (best_algorithm, best_score, best_model) = match best {
            Some((name, score, model)) => (Some(name), Some(score), Some(model)),
            None => (None, None, None),
        };
        Ok(AutoMlOutcome {
            best_algorithm,
            best_score,
            best_model,
            results,
            total_secs,
            requested: algorithms.to_vec(),
            executed,
        })
    }

    fn derive(
        &self,
        dataset: &Dataset,
        date_column: &str,
        target_column: &str,
        extra_columns: &[String],
    ) -> Result<DerivedFeatures> {
        let mut engine = FeatureEngine::new(self.features.clone());
        if let Some(calendar) = &self.holidays {
            engine = engine.with_holidays(Box::new(SharedCalendar(Arc::clone(calendar))));
        }
        engine.derive(dataset, date_column, target_column, extra_columns)
    }
}

/// Pick the candidate with the strictly lowest finite score; an exact
/// tie keeps the earlier entry.
fn select_best<M>(candidates: Vec<(String, f64, M)>) -> Option<(String, f64, M)> {
    let mut best: Option<(String, f64, M)> = None;
    for (name, score, model) in candidates {
        if !score.is_finite() {
            continue;
        }
        if best.as_ref().map_or(true, |(_, held, _)| score < *held) {
            best = Some((name, score, model));
        }
    }
    best
}

struct SharedCalendar(Arc<dyn HolidayCalendar>);

impl HolidayCalendar for SharedCalendar {
    fn is_holiday(&self, date: chrono::NaiveDate) -> bool {
        self.0.is_holiday(date)
    }
}

fn failed_result(algorithm: &str, error: &str) -> SearchResult {
    SearchResult {
        algorithm: algorithm.to_string(),
        status: SearchStatus::Failed,
        best_params: None,
        best_score: None,
        metrics: None,
        trials_run: 0,
        elapsed_secs: 0.0,
        error: Some(error.to_string()),
    }
}
