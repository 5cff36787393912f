pub mod walk_forward;

pub use walk_forward::{BacktestFold, BacktestReport, ModelFactory, WalkForwardBacktester};
