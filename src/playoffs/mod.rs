pub mod bracket;

pub use bracket::{build_bracket, Bracket, BracketMatch, BracketRound, PendingMatch, Seeded, SplitPolicy};
