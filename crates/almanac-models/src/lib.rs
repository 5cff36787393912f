pub mod autoregressive;
pub mod gradient_boosted;
pub mod interval;
pub mod registry;
pub mod trend_seasonal;

pub use autoregressive::AutoRegressiveForecaster;
pub use gradient_boosted::GradientBoostedForecaster;
pub use registry::{algorithm, available_algorithms};
pub use trend_seasonal::TrendSeasonalForecaster;
