use regex::Regex;
use std::sync::LazyLock;

use super::models::{SetScore, sets_won};
use crate::errors::{EngineError, EngineResult};

const MAX_SETS: usize = 5;
const MATCH_TIEBREAK_TARGET: u8 = 10;

static SET_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    // "6-4", "7:6", "7-6(5)" - the bracketed tiebreak points are ignored
    Regex::new(r"^(\d{1,2})\s*[-:]\s*(\d{1,2})(?:\(\d{1,2}\))?$").expect("set score pattern")
});

/// Which side won a validated result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    First,
    Second,
}

/// Parses a score line such as `"6-4 3-6 10-8"` or `"6-4, 7-6(3)"`.
pub fn parse_score(input: &str) -> EngineResult<Vec<SetScore>> {
    let tokens: Vec<&str> = input
        .split(|c: char| c == ',' || c == ';' || c.is_whitespace())
        .filter(|t| !t.is_empty())
        .collect();

    if tokens.is_empty() {
        return Err(EngineError::validation("Invalid score format: score is empty"));
    }

    tokens.iter().map(|token| parse_set(token)).collect()
}

fn parse_set(token: &str) -> EngineResult<SetScore> {
    let caps = SET_PATTERN.captures(token).ok_or_else(|| {
        EngineError::validation(format!("Invalid score format: '{}' is not a set score", token))
    })?;

    let first = caps[1]
        .parse::<u8>()
        .map_err(|_| EngineError::validation(format!("Invalid score format: '{}'", token)))?;
    let second = caps[2]
        .parse::<u8>()
        .map_err(|_| EngineError::validation(format!("Invalid score format: '{}'", token)))?;

    Ok(SetScore::new(first, second))
}

/// Validates tennis set scores and returns the side with strictly more sets.
pub fn validate_sets(sets: &[SetScore]) -> EngineResult<Side> {
    if sets.is_empty() || sets.len() > MAX_SETS {
        return Err(EngineError::validation(format!(
            "Invalid score: a result needs between 1 and {} sets, got {}",
            MAX_SETS,
            sets.len()
        )));
    }

    for (idx, set) in sets.iter().enumerate() {
        let deciding_tiebreak = is_deciding_set(sets, idx);
        if !is_valid_set(set, deciding_tiebreak) {
            return Err(EngineError::validation(format!(
                "Invalid score: set {} ({}) is not a valid tennis set",
                idx + 1,
                set
            )));
        }
    }

    let (first, second) = sets_won(sets);
    match first.cmp(&second) {
        std::cmp::Ordering::Greater => Ok(Side::First),
        std::cmp::Ordering::Less => Ok(Side::Second),
        std::cmp::Ordering::Equal => Err(EngineError::validation(format!(
            "Invalid score: sets are level at {}-{}, no winner",
            first, second
        ))),
    }
}

/// The third set of a best-of-three standing at one set all may be a match tiebreak.
fn is_deciding_set(sets: &[SetScore], idx: usize) -> bool {
    idx == 2 && sets.len() == 3 && sets_won(&sets[..2]) == (1, 1)
}

fn is_valid_set(set: &SetScore, allow_match_tiebreak: bool) -> bool {
    let high = set.first.max(set.second);
    let low = set.first.min(set.second);

    if high == low {
        return false;
    }

    let regular = (high == 6 && low <= 4) || (high == 7 && (low == 5 || low == 6));
    let match_tiebreak = allow_match_tiebreak
        && high >= MATCH_TIEBREAK_TARGET
        && high - low >= 2
        && (high == MATCH_TIEBREAK_TARGET || high - low == 2);

    regular || match_tiebreak
}

/// Formats sets back to the canonical `"6-4 3-6"` form.
pub fn format_score(sets: &[SetScore]) -> String {
    sets.iter()
        .map(|s| s.to_string())
        .collect::<Vec<_>>()
        .join(" ")
}
