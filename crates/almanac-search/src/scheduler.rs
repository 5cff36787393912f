use std::time::{Duration, Instant};

use almanac_core::{
    AlgorithmSpec, DerivedFeatures, Forecaster, Metric, MetricSet, ParamSet,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::strategy::{ProposalStrategy, RandomSearch};

/// Trial and wall-clock limits for one algorithm's search.
///
/// `timeout` carries fractional seconds, so an even split of a total
/// budget across algorithms never rounds a small share down to zero.
#[derive(Debug, Clone, Copy)]
pub struct TrialBudget {
    pub max_trials: usize,
    pub timeout: Duration,
}

/// Record of a single evaluated configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrialResult {
    pub params: ParamSet,
    /// Objective value minimized by the search: +inf for failed trials.
    pub score: f64,
    pub metrics: Option<MetricSet>,
    pub elapsed_secs: f64,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchStatus {
    Completed,
    Failed,
}

/// Serializable summary of one algorithm's search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub algorithm: String,
    pub status: SearchStatus,
    pub best_params: Option<ParamSet>,
    pub best_score: Option<f64>,
    pub metrics: Option<MetricSet>,
    pub trials_run: usize,
    pub elapsed_secs: f64,
    pub error: Option<String>,
}

/// Full outcome of one algorithm's search, including the refit model.
pub struct SearchOutcome {
    pub result: SearchResult,
    pub model: Option<Box<dyn Forecaster>>,
    pub trials: Vec<TrialResult>,
}

/// Runs a budgeted hyperparameter search for one algorithm.
///
/// Trials are scored on held-out validation data and minimized; a
/// failed trial scores +inf so the search continues past it. The
/// deadline is soft: it is checked between trials, never mid-trial.
pub struct SearchScheduler {
    metric: Metric,
    strategy: Box<dyn ProposalStrategy>,
}

impl SearchScheduler {
    pub fn new(metric: Metric, strategy: Box<dyn ProposalStrategy>) -> Self {
        Self { metric, strategy }
    }

    /// Scheduler with uniform random sampling under a fixed seed.
    pub fn random(metric: Metric, seed: u64) -> Self {
        Self::new(metric, Box::new(RandomSearch::new(seed)))
    }

    pub fn run(
        &mut self,
        spec: &AlgorithmSpec,
        train: &DerivedFeatures,
        validation: &DerivedFeatures,
        budget: &TrialBudget,
    ) -> SearchOutcome {
        let start = Instant::now();
        let mut trials: Vec<TrialResult> = Vec::new();
        let mut best: Option<(usize, f64)> = None;

        info!(
            algorithm = spec.name,
            max_trials = budget.max_trials,
            timeout_secs = budget.timeout.as_secs_f64(),
            metric = %self.metric,
            "starting search"
        );

        for trial_index in 0..budget.max_trials {
            if start.elapsed() >= budget.timeout {
                debug!(
                    algorithm = spec.name,
                    trials_run = trials.len(),
                    "deadline reached, stopping search"
                );
                break;
            }

            let params = self.strategy.propose(&spec.space);
            let trial_start = Instant::now();
            let trial = match self.evaluate(spec, &params, train, validation) {
                Ok((score, metrics)) => TrialResult {
                    params,
                    score,
                    metrics: Some(metrics),
                    elapsed_secs: trial_start.elapsed().as_secs_f64(),
                    error: None,
                },
                Err(err) => {
                    warn!(
                        algorithm = spec.name,
                        trial = trial_index,
                        error = %err,
                        "trial failed"
                    );
                    TrialResult {
                        params,
                        score: f64::INFINITY,
                        metrics: None,
                        elapsed_secs: trial_start.elapsed().as_secs_f64(),
                        error: Some(err.to_string()),
                    }
                }
            };

            self.strategy.observe(&trial.params, trial.score);
            if trial.score.is_finite()
                && best.map_or(true, |(_, best_score)| trial.score < best_score)
            {
                debug!(
                    algorithm = spec.name,
                    trial = trial_index,
                    score = trial.score,
                    params = %trial.params,
                    "new best trial"
                );
                best = Some((trials.len(), trial.score));
            }
            trials.push(trial);
        }

        let elapsed_secs = start.elapsed().as_secs_f64();
        let (best_index, best_score) = match best {
            Some(found) => found,
            None => {
                let error = trials
                    .iter()
                    .rev()
                    .find_map(|t| t.error.clone())
                    .unwrap_or_else(|| "no successful trials".into());
                warn!(
                    algorithm = spec.name,
                    trials_run = trials.len(),
                    error = %error,
                    "search failed"
                );
                return SearchOutcome {
                    result: SearchResult {
                        algorithm: spec.name.to_string(),
                        status: SearchStatus::Failed,
                        best_params: None,
                        best_score: None,
                        metrics: None,
                        trials_run: trials.len(),
                        elapsed_secs,
                        error: Some(error),
                    },
                    model: None,
                    trials,
                };
            }
        };

        let best_params = trials[best_index].params.clone();
        let best_metrics = trials[best_index].metrics.clone();

        // Refit on train with the winning configuration so the caller
        // gets a model whose state matches the reported score.
        let model = match self.refit(spec, &best_params, train) {
            Ok(model) => model,
            Err(err) => {
                warn!(algorithm = spec.name, error = %err, "refit of best configuration failed");
                return SearchOutcome {
                    result: SearchResult {
                        algorithm: spec.name.to_string(),
                        status: SearchStatus::Failed,
                        best_params: Some(best_params),
                        best_score: Some(best_score),
                        metrics: best_metrics,
                        trials_run: trials.len(),
                        elapsed_secs: start.elapsed().as_secs_f64(),
                        error: Some(err.to_string()),
                    },
                    model: None,
                    trials,
                };
            }
        };

        info!(
            algorithm = spec.name,
            best_score,
            trials_run = trials.len(),
            elapsed_secs,
            params = %best_params,
            "search completed"
        );

        SearchOutcome {
            result: SearchResult {
                algorithm: spec.name.to_string(),
                status: SearchStatus::Completed,
                best_params: Some(best_params),
                best_score: Some(best_score),
                metrics: best_metrics,
                trials_run: trials.len(),
                elapsed_secs: start.elapsed().as_secs_f64(),
                error: None,
            },
            model: Some(model),
            trials,
        }
    }

    fn evaluate(
        &self,
        spec: &AlgorithmSpec,
        params: &ParamSet,
        train: &DerivedFeatures,
        validation: &DerivedFeatures,
    ) -> almanac_core::Result<(f64, MetricSet)> {
        let mut model = (spec.build)(params)?;
        model.fit(&train.frame, &train.target)?;
        let predicted = model.predict(&validation.frame)?;
        let metrics = almanac_core::metrics::evaluate(&validation.target, &predicted);
        let score = metrics.get(self.metric).filter(|s| s.is_finite());
        match score {
            Some(score) => Ok((score, metrics)),
            None => Err(almanac_core::AlmanacError::ModelError(format!(
                "{} undefined on validation data",
                self.metric
            ))),
        }
    }

    fn refit(
        &self,
        spec: &AlgorithmSpec,
        params: &ParamSet,
        train: &DerivedFeatures,
    ) -> almanac_core::Result<Box<dyn Forecaster>> {
        let mut model = (spec.build)(params)?;
        model.fit(&train.frame, &train.target)?;
        Ok(model)
    }
}
