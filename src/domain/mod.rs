pub mod lifecycle;
pub mod models;
pub mod scores;

pub use lifecycle::{CompletionRules, ResultSubmission};
pub use models::*;
