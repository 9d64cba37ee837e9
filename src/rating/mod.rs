pub mod elo;
pub mod types;

pub use elo::{apply_result, expected_score};
pub use types::{EloParams, EloUpdate, Outcome, RatingValue, TierThresholds};
