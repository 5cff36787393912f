pub mod coordinator;

pub use coordinator::{AutoMl, AutoMlOutcome};
