use almanac_core::{
    validate_space, AlgorithmKind, AlgorithmSpec, AlmanacError, ParamRange, ParamValue, Result,
    SearchSpace,
};

use crate::autoregressive::AutoRegressiveForecaster;
use crate::gradient_boosted::GradientBoostedForecaster;
use crate::trend_seasonal::TrendSeasonalForecaster;

/// Names of every registered algorithm family, in default run order.
pub fn available_algorithms() -> &'static [&'static str] {
    &[
        "trend-seasonal",
        "autoregressive-integrated",
        "gradient-boosted-a",
        "gradient-boosted-b",
    ]
}

/// Look up an algorithm family by name, validating its declared search
/// space before handing it out.
pub fn algorithm(name: &str) -> Result<AlgorithmSpec> {
    let spec = match name {
        "trend-seasonal" => AlgorithmSpec {
            name: "trend-seasonal",
            kind: AlgorithmKind::Statistical,
            space: trend_seasonal_space(),
            build: TrendSeasonalForecaster::from_params,
        },
        "autoregressive-integrated" => AlgorithmSpec {
            name: "autoregressive-integrated",
            kind: AlgorithmKind::Statistical,
            space: autoregressive_space(),
            build: AutoRegressiveForecaster::from_params,
        },
        "gradient-boosted-a" => AlgorithmSpec {
            name: "gradient-boosted-a",
            kind: AlgorithmKind::TabularRegression,
            space: gradient_boosted_a_space(),
            build: GradientBoostedForecaster::depth_wise,
        },
        "gradient-boosted-b" => AlgorithmSpec {
            name: "gradient-boosted-b",
            kind: AlgorithmKind::TabularRegression,
            space: gradient_boosted_b_space(),
            build: GradientBoostedForecaster::leaf_wise,
        },
        other => {
            return Err(AlmanacError::InvalidInput(format!(
                "unknown algorithm '{other}'"
            )))
        }
    };
    validate_space(spec.name, &spec.space)?;
    Ok(spec)
}

fn trend_seasonal_space() -> SearchSpace {
    let mut space = SearchSpace::new();
    space.insert(
        "season_length".into(),
        ParamRange::Categorical(vec![
            ParamValue::Int(1),
            ParamValue::Int(7),
            ParamValue::Int(12),
            ParamValue::Int(30),
        ]),
    );
    space.insert(
        "trend".into(),
        ParamRange::Categorical(vec![
            ParamValue::Text("auto".into()),
            ParamValue::Text("none".into()),
        ]),
    );
    space
}

fn autoregressive_space() -> SearchSpace {
    let mut space = SearchSpace::new();
    space.insert("p".into(), ParamRange::IntRange { lo: 1, hi: 5 });
    space.insert("d".into(), ParamRange::IntRange { lo: 0, hi: 2 });
    space
}

fn gradient_boosted_a_space() -> SearchSpace {
    let mut space = SearchSpace::new();
    space.insert(
        "n_estimators".into(),
        ParamRange::IntRange { lo: 50, hi: 300 },
    );
    space.insert("max_depth".into(), ParamRange::IntRange { lo: 3, hi: 10 });
    space.insert(
        "learning_rate".into(),
        ParamRange::FloatRange {
            lo: 0.01,
            hi: 0.3,
            log: true,
        },
    );
    space.insert(
        "subsample".into(),
        ParamRange::FloatRange {
            lo: 0.6,
            hi: 1.0,
            log: false,
        },
    );
    space.insert(
        "colsample".into(),
        ParamRange::FloatRange {
            lo: 0.6,
            hi: 1.0,
            log: false,
        },
    );
    space
}

fn gradient_boosted_b_space() -> SearchSpace {
    let mut space = SearchSpace::new();
    space.insert(
        "n_estimators".into(),
        ParamRange::IntRange { lo: 50, hi: 300 },
    );
    space.insert("num_leaves".into(), ParamRange::IntRange { lo: 15, hi: 127 });
    space.insert(
        "learning_rate".into(),
        ParamRange::FloatRange {
            lo: 0.01,
            hi: 0.3,
            log: true,
        },
    );
    space.insert(
        "subsample".into(),
        ParamRange::FloatRange {
            lo: 0.6,
            hi: 1.0,
            log: false,
        },
    );
    space.insert(
        "min_child_samples".into(),
        ParamRange::IntRange { lo: 5, hi: 50 },
    );
    space
}

#[cfg(test)]
mod tests {
    use super::*;
    use almanac_core::ParamSet;

    #[test]
    fn test_every_registered_algorithm_builds_with_defaults() {
        for name in available_algorithms() {
            let spec = algorithm(name).unwrap();
            assert_eq!(spec.name, *name);
            let model = spec.build(&ParamSet::new()).unwrap();
            assert_eq!(model.name(), *name);
            assert_eq!(model.kind(), spec.kind);
        }
    }

    #[test]
    fn test_unknown_algorithm() {
        assert!(matches!(
            algorithm("prophet"),
            Err(AlmanacError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_kinds() {
        assert_eq!(
            algorithm("trend-seasonal").unwrap().kind,
            AlgorithmKind::Statistical
        );
        assert_eq!(
            algorithm("gradient-boosted-a").unwrap().kind,
            AlgorithmKind::TabularRegression
        );
    }
}
