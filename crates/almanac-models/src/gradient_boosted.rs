use std::collections::BTreeMap;

use almanac_core::{
    AlgorithmKind, AlmanacError, FeatureFrame, Forecaster, IntervalForecast, ParamSet, Result,
};
use rand::rngs::StdRng;
use rand::seq::index;
use rand::SeedableRng;
use tracing::debug;

use crate::interval;

/// Gradient-boosted regression trees over the engineered feature matrix.
///
/// Squared loss: each tree fits the current residuals and leaves carry
/// the mean residual. Two growth policies cover the two tabular
/// families: depth-limited (`gradient-boosted-a`) and leaf-budgeted
/// (`gradient-boosted-b`).
pub struct GradientBoostedForecaster {
    label: &'static str,
    params: GbParams,
    fitted: Option<GbState>,
}

#[derive(Debug, Clone)]
struct GbParams {
    n_estimators: usize,
    max_depth: usize,
    max_leaves: usize,
    learning_rate: f64,
    subsample: f64,
    colsample: f64,
    min_child_samples: usize,
    seed: u64,
}

struct GbState {
    base: f64,
    trees: Vec<Tree>,
    feature_names: Vec<String>,
    /// Accumulated split gain per feature, unnormalized.
    importance: Vec<f64>,
    residual_std: f64,
}

impl GradientBoostedForecaster {
    /// Depth-wise growth, the `gradient-boosted-a` family.
    pub fn depth_wise(params: &ParamSet) -> Result<Box<dyn Forecaster>> {
        let gb = GbParams {
            n_estimators: params.int("n_estimators", 100) as usize,
            max_depth: params.int("max_depth", 6) as usize,
            max_leaves: usize::MAX,
            learning_rate: params.float("learning_rate", 0.1),
            subsample: params.float("subsample", 0.8),
            colsample: params.float("colsample", 0.8),
            min_child_samples: params.int("min_child_samples", 20) as usize,
            seed: params.int("seed", 42) as u64,
        };
        Self::with_params("gradient-boosted-a", gb)
    }

    /// Leaf-budgeted growth, the `gradient-boosted-b` family.
    pub fn leaf_wise(params: &ParamSet) -> Result<Box<dyn Forecaster>> {
        let gb = GbParams {
            n_estimators: params.int("n_estimators", 100) as usize,
            max_depth: params.int("max_depth", 12) as usize,
            max_leaves: params.int("num_leaves", 31) as usize,
            learning_rate: params.float("learning_rate", 0.1),
            subsample: params.float("subsample", 0.8),
            colsample: params.float("colsample", 0.8),
            min_child_samples: params.int("min_child_samples", 20) as usize,
            seed: params.int("seed", 42) as u64,
        };
        Self::with_params("gradient-boosted-b", gb)
    }

    fn with_params(label: &'static str, params: GbParams) -> Result<Box<dyn Forecaster>> {
        if params.n_estimators == 0 {
            return Err(AlmanacError::InvalidInput(
                "n_estimators must be positive".into(),
            ));
        }
        if !(0.0..=1.0).contains(&params.learning_rate) || params.learning_rate == 0.0 {
            return Err(AlmanacError::InvalidInput(format!(
                "learning_rate must be in (0, 1], got {}",
                params.learning_rate
            )));
        }
        for (name, value) in [("subsample", params.subsample), ("colsample", params.colsample)] {
            if !(0.0..=1.0).contains(&value) || value == 0.0 {
                return Err(AlmanacError::InvalidInput(format!(
                    "{name} must be in (0, 1], got {value}"
                )));
            }
        }
        if params.max_leaves < 2 {
            return Err(AlmanacError::InvalidInput(
                "num_leaves must be at least 2".into(),
            ));
        }
        Ok(Box::new(Self {
            label,
            params,
            fitted: None,
        }))
    }

    fn fitted(&self) -> Result<&GbState> {
        self.fitted
            .as_ref()
            .ok_or_else(|| AlmanacError::NotFitted(self.label.into()))
    }
}

impl Forecaster for GradientBoostedForecaster {
    fn name(&self) -> &str {
        self.label
    }

    fn kind(&self) -> AlgorithmKind {
        AlgorithmKind::TabularRegression
    }

    fn fit(&mut self, frame: &FeatureFrame, target: &[f64]) -> Result<()> {
        let n = target.len();
        if frame.len() != n {
            return Err(AlmanacError::InvalidInput(format!(
                "feature matrix has {} rows, target has {n}",
                frame.len()
            )));
        }
        if n < 2 {
            return Err(AlmanacError::InsufficientData {
                required: 2,
                available: n,
            });
        }
        let n_features = frame.width();
        if n_features == 0 {
            return Err(AlmanacError::InvalidInput(
                "gradient boosting requires at least one feature".into(),
            ));
        }

        debug!(
            model = self.label,
            rows = n,
            features = n_features,
            trees = self.params.n_estimators,
            "gradient boosting fit"
        );

        let mut rng = StdRng::seed_from_u64(self.params.seed);
        let base = target.iter().sum::<f64>() / n as f64;
        let mut predictions = vec![base; n];
        let mut importance = vec![0.0; n_features];
        let mut trees = Vec::with_capacity(self.params.n_estimators);

        for _ in 0..self.params.n_estimators {
            let residuals: Vec<f64> = target
                .iter()
                .zip(&predictions)
                .map(|(y, p)| y - p)
                .collect();

            let rows = sample_sorted(&mut rng, n, self.params.subsample);
            let cols = sample_sorted(&mut rng, n_features, self.params.colsample);

            let mut builder = TreeBuilder {
                frame,
                residuals: &residuals,
                params: &self.params,
                importance: &mut importance,
                nodes: Vec::new(),
                leaves: 1,
            };
            builder.build(rows, &cols, 0);
            let tree = Tree {
                nodes: builder.nodes,
            };

            for (i, row) in frame.rows.iter().enumerate() {
                predictions[i] += self.params.learning_rate * tree.predict(row);
            }
            trees.push(tree);
        }

        let residual_std = interval::residual_std(target, &predictions);
        self.fitted = Some(GbState {
            base,
            trees,
            feature_names: frame.names.clone(),
            importance,
            residual_std,
        });
        Ok(())
    }

    fn predict(&self, frame: &FeatureFrame) -> Result<Vec<f64>> {
        let state = self.fitted()?;
        if frame.names != state.feature_names {
            return Err(AlmanacError::IncompatibleShape {
                expected: state.feature_names.join(","),
                actual: frame.names.join(","),
            });
        }
        Ok(frame
            .rows
            .iter()
            .map(|row| {
                let boost: f64 = state.trees.iter().map(|t| t.predict(row)).sum();
                state.base + self.params.learning_rate * boost
            })
            .collect())
    }

    fn predict_interval(&self, frame: &FeatureFrame, confidence: f64) -> Result<IntervalForecast> {
        let state = self.fitted()?;
        let point = self.predict(frame)?;
        interval::residual_interval(point, state.residual_std, confidence)
    }

    fn feature_importance(&self) -> Option<BTreeMap<String, f64>> {
        let state = self.fitted.as_ref()?;
        let total: f64 = state.importance.iter().sum();
        let map = state
            .feature_names
            .iter()
            .zip(&state.importance)
            .map(|(name, gain)| {
                let weight = if total > 0.0 { gain / total } else { 0.0 };
                (name.clone(), weight)
            })
            .collect();
        Some(map)
    }
}

/// Deterministically sample `ratio` of `n` indices, sorted.
fn sample_sorted(rng: &mut StdRng, n: usize, ratio: f64) -> Vec<usize> {
    let k = ((ratio * n as f64).round() as usize).clamp(1, n);
    if k == n {
        return (0..n).collect();
    }
    let mut picked = index::sample(rng, n, k).into_vec();
    picked.sort_unstable();
    picked
}

struct Tree {
    nodes: Vec<Node>,
}

enum Node {
    Leaf(f64),
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

impl Tree {
    fn predict(&self, row: &[f64]) -> f64 {
        let mut at = 0;
        loop {
            match &self.nodes[at] {
                Node::Leaf(value) => return *value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    at = if row[*feature] <= *threshold {
                        *left
                    } else {
                        *right
                    };
                }
            }
        }
    }
}

struct SplitCandidate {
    feature: usize,
    threshold: f64,
    gain: f64,
}

struct TreeBuilder<'a> {
    frame: &'a FeatureFrame,
    residuals: &'a [f64],
    params: &'a GbParams,
    importance: &'a mut Vec<f64>,
    nodes: Vec<Node>,
    leaves: usize,
}

impl TreeBuilder<'_> {
    /// Grow a subtree over `rows`, returning its node index.
    fn build(&mut self, rows: Vec<usize>, cols: &[usize], depth: usize) -> usize {
        let value = rows.iter().map(|&r| self.residuals[r]).sum::<f64>() / rows.len() as f64;

        let can_split = depth < self.params.max_depth
            && self.leaves < self.params.max_leaves
            && rows.len() >= 2 * self.params.min_child_samples.max(1);

        if can_split {
            if let Some(split) = self.best_split(&rows, cols) {
                self.leaves += 1;
                self.importance[split.feature] += split.gain;

                let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = rows
                    .into_iter()
                    .partition(|&r| self.frame.rows[r][split.feature] <= split.threshold);

                let at = self.nodes.len();
                self.nodes.push(Node::Leaf(value));
                let left = self.build(left_rows, cols, depth + 1);
                let right = self.build(right_rows, cols, depth + 1);
                self.nodes[at] = Node::Split {
                    feature: split.feature,
                    threshold: split.threshold,
                    left,
                    right,
                };
                return at;
            }
        }

        self.nodes.push(Node::Leaf(value));
        self.nodes.len() - 1
    }

    /// Best variance-reduction split over the sampled feature subset.
    fn best_split(&self, rows: &[usize], cols: &[usize]) -> Option<SplitCandidate> {
        let n = rows.len() as f64;
        let total: f64 = rows.iter().map(|&r| self.residuals[r]).sum();
        let base_score = total * total / n;
        let min_child = self.params.min_child_samples.max(1);

        let mut best: Option<SplitCandidate> = None;
        for &feature in cols {
            let mut pairs: Vec<(f64, f64)> = rows
                .iter()
                .map(|&r| (self.frame.rows[r][feature], self.residuals[r]))
                .collect();
            pairs.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));

            let mut left_sum = 0.0;
            for i in 1..pairs.len() {
                left_sum += pairs[i - 1].1;
                if i < min_child || pairs.len() - i < min_child {
                    continue;
                }
                // Only split between distinct values
                if pairs[i].0 <= pairs[i - 1].0 {
                    continue;
                }
                let nl = i as f64;
                let nr = n - nl;
                let right_sum = total - left_sum;
                let gain = left_sum * left_sum / nl + right_sum * right_sum / nr - base_score;
                if gain > best.as_ref().map_or(1e-12, |b| b.gain) {
                    best = Some(SplitCandidate {
                        feature,
                        threshold: (pairs[i - 1].0 + pairs[i].0) / 2.0,
                        gain,
                    });
                }
            }
        }
        best
    }
}
