use almanac_core::{ParamRange, ParamSet, ParamValue, SearchSpace};
use rand::distributions::Distribution;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use statrs::distribution::Normal;

/// Produces hyperparameter configurations for the scheduler.
///
/// Contract: up to the budgeted number of configurations, each scored
/// independently, deterministic given a fixed seed. `observe` feeds
/// trial scores back so guided strategies can adapt; stateless
/// strategies ignore it.
pub trait ProposalStrategy: Send {
    fn propose(&mut self, space: &SearchSpace) -> ParamSet;

    fn observe(&mut self, _params: &ParamSet, _score: f64) {}
}

/// Uniform sampling: linear or log-uniform for continuous ranges as
/// declared, uniform over categorical sets.
pub struct RandomSearch {
    rng: StdRng,
}

impl RandomSearch {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl ProposalStrategy for RandomSearch {
    fn propose(&mut self, space: &SearchSpace) -> ParamSet {
        let mut params = ParamSet::new();
        for (name, range) in space {
            params.set(name.clone(), sample_uniform(&mut self.rng, range));
        }
        params
    }
}

fn sample_uniform(rng: &mut StdRng, range: &ParamRange) -> ParamValue {
    match range {
        ParamRange::IntRange { lo, hi } => ParamValue::Int(rng.gen_range(*lo..=*hi)),
        ParamRange::FloatRange { lo, hi, log: false } => {
            ParamValue::Float(rng.gen_range(*lo..*hi))
        }
        ParamRange::FloatRange { lo, hi, log: true } => {
            ParamValue::Float(rng.gen_range(lo.ln()..hi.ln()).exp())
        }
        ParamRange::Categorical(choices) => choices[rng.gen_range(0..choices.len())].clone(),
    }
}

/// Guided sampling: uniform warmup, then perturbation around the
/// incumbent best configuration.
///
/// Continuous parameters get a Gaussian step sized to a tenth of the
/// declared range (in log space for log-uniform parameters); integers
/// take a bounded uniform step; categorical parameters keep the
/// incumbent choice most of the time.
pub struct AdaptiveSearch {
    rng: StdRng,
    warmup: usize,
    proposed: usize,
    best: Option<(ParamSet, f64)>,
}

impl AdaptiveSearch {
    pub fn new(seed: u64, warmup: usize) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            warmup: warmup.max(1),
            proposed: 0,
            best: None,
        }
    }
}

impl ProposalStrategy for AdaptiveSearch {
    fn propose(&mut self, space: &SearchSpace) -> ParamSet {
        self.proposed += 1;

        let incumbent = match &self.best {
            Some((params, _)) if self.proposed > self.warmup => params.clone(),
            _ => {
                let mut params = ParamSet::new();
                for (name, range) in space {
                    params.set(name.clone(), sample_uniform(&mut self.rng, range));
                }
                return params;
            }
        };

        let mut params = ParamSet::new();
        for (name, range) in space {
            let value = match (incumbent.get(name), range) {
                (Some(ParamValue::Int(base)), ParamRange::IntRange { lo, hi }) => {
                    let delta = ((hi - lo) / 10).max(1);
                    let step = self.rng.gen_range(-delta..=delta);
                    ParamValue::Int((base + step).clamp(*lo, *hi))
                }
                (Some(value), ParamRange::FloatRange { lo, hi, log }) => {
                    let base = value.as_float().unwrap_or((lo + hi) / 2.0);
                    let perturbed = if *log {
                        let width = (hi.ln() - lo.ln()) * 0.1;
                        (base.ln() + gaussian_step(&mut self.rng, width)).exp()
                    } else {
                        base + gaussian_step(&mut self.rng, (hi - lo) * 0.1)
                    };
                    ParamValue::Float(perturbed.clamp(*lo, *hi))
                }
                (Some(value), ParamRange::Categorical(choices)) => {
                    if choices.contains(value) && self.rng.gen_bool(0.7) {
                        value.clone()
                    } else {
                        choices[self.rng.gen_range(0..choices.len())].clone()
                    }
                }
                (_, range) => sample_uniform(&mut self.rng, range),
            };
            params.set(name.clone(), value);
        }
        params
    }

    fn observe(&mut self, params: &ParamSet, score: f64) {
        if !score.is_finite() {
            return;
        }
        let improved = self.best.as_ref().map_or(true, |(_, best)| score < *best);
        if improved {
            self.best = Some((params.clone(), score));
        }
    }
}

fn gaussian_step(rng: &mut StdRng, std_dev: f64) -> f64 {
    if std_dev <= 0.0 {
        return 0.0;
    }
    match Normal::new(0.0, std_dev) {
        Ok(normal) => normal.sample(rng),
        Err(_) => 0.0,
    }
}
