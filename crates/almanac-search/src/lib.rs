pub mod scheduler;
pub mod strategy;

pub use scheduler::{
    SearchOutcome, SearchResult, SearchScheduler, SearchStatus, TrialBudget, TrialResult,
};
pub use strategy::{AdaptiveSearch, ProposalStrategy, RandomSearch};
