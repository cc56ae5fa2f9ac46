pub mod engine;
pub mod scorer;

pub use engine::{
    CandidateIndex, ItemMatch, MatchOutcome, MatchingEngine, MatchingSettings,
    DEFAULT_ACCEPTANCE_THRESHOLD, DEFAULT_CANDIDATE_LIMIT,
};
pub use scorer::token_sort_ratio;
