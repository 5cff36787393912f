pub mod config;
pub mod error;
pub mod metrics;
pub mod space;
pub mod types;

pub use config::*;
pub use error::*;
pub use metrics::*;
pub use space::*;
pub use types::*;
