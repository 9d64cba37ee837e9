pub mod engine;
pub mod import;
pub mod playoffs;
pub mod rounds;
pub mod server;

pub use engine::{LeagueEngine, MatchFilter, MatchOutcome, NewRegistration, NewSeason};
pub use import::{ImportReport, RowError};
pub use playoffs::BuildBracket;
pub use rounds::{GenerateRound, ReplacePlayer, Reschedule, RoundPlan};
