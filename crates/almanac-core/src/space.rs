use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{AlmanacError, Result};

/// A single hyperparameter value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Int(i64),
    Float(f64),
    Text(String),
}

impl ParamValue {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            ParamValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            ParamValue::Float(v) => Some(*v),
            ParamValue::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            ParamValue::Text(v) => Some(v),
            _ => None,
        }
    }
}

impl std::fmt::Display for ParamValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParamValue::Int(v) => write!(f, "{v}"),
            ParamValue::Float(v) => write!(f, "{v}"),
            ParamValue::Text(v) => f.write_str(v),
        }
    }
}

/// Declared range of one hyperparameter.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamRange {
    /// Inclusive integer range.
    IntRange { lo: i64, hi: i64 },
    /// Continuous range, sampled log-uniformly when `log` is set.
    FloatRange { lo: f64, hi: f64, log: bool },
    /// Finite categorical set, sampled uniformly.
    Categorical(Vec<ParamValue>),
}

/// Named hyperparameter ranges of one algorithm.
///
/// A `BTreeMap` so iteration order is stable, which keeps sampling
/// deterministic under a fixed seed.
pub type SearchSpace = BTreeMap<String, ParamRange>;

/// Validate a search space once at registration time.
pub fn validate_space(name: &str, space: &SearchSpace) -> Result<()> {
    for (param, range) in space {
        match range {
            ParamRange::IntRange { lo, hi } if lo > hi => {
                return Err(AlmanacError::InvalidInput(format!(
                    "{name}.{param}: empty integer range {lo}..{hi}"
                )));
            }
            ParamRange::FloatRange { lo, hi, .. } if lo >= hi => {
                return Err(AlmanacError::InvalidInput(format!(
                    "{name}.{param}: empty float range {lo}..{hi}"
                )));
            }
            ParamRange::FloatRange { lo, log: true, .. } if *lo <= 0.0 => {
                return Err(AlmanacError::InvalidInput(format!(
                    "{name}.{param}: log-uniform range requires lo > 0"
                )));
            }
            ParamRange::Categorical(choices) if choices.is_empty() => {
                return Err(AlmanacError::InvalidInput(format!(
                    "{name}.{param}: empty categorical set"
                )));
            }
            _ => {}
        }
    }
    Ok(())
}

/// One sampled hyperparameter configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParamSet(pub BTreeMap<String, ParamValue>);

impl ParamSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, name: impl Into<String>, value: ParamValue) {
        self.0.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.0.get(name)
    }

    pub fn int(&self, name: &str, default: i64) -> i64 {
        self.0.get(name).and_then(ParamValue::as_int).unwrap_or(default)
    }

    pub fn float(&self, name: &str, default: f64) -> f64 {
        self.0
            .get(name)
            .and_then(ParamValue::as_float)
            .unwrap_or(default)
    }

    pub fn text<'a>(&'a self, name: &str, default: &'a str) -> &'a str {
        self.0
            .get(name)
            .and_then(ParamValue::as_text)
            .unwrap_or(default)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ParamValue)> {
        self.0.iter()
    }
}

impl std::fmt::Display for ParamSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut first = true;
        for (k, v) in &self.0 {
            if !first {
                f.write_str(", ")?;
            }
            write!(f, "{k}={v}")?;
            first = false;
        }
        Ok(())
    }
}
