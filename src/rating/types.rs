use serde::{Deserialize, Serialize};

use crate::domain::SkillTier;

pub type RatingValue = i32;

/// Result of a match from the first player's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    FirstWins,
    SecondWins,
    /// No opponent: flat league points, no rating change
    ByeForFirst,
}

impl Outcome {
    /// The same result seen from the other side of the pairing.
    pub fn swapped(self) -> Self {
        match self {
            Outcome::FirstWins => Outcome::SecondWins,
            Outcome::SecondWins => Outcome::FirstWins,
            Outcome::ByeForFirst => Outcome::ByeForFirst,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EloParams {
    pub k_factor: f64,
    pub rating_floor: RatingValue,
}

impl Default for EloParams {
    fn default() -> Self {
        Self {
            k_factor: 32.0,
            rating_floor: 100,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EloUpdate {
    pub first_rating: RatingValue,
    pub second_rating: RatingValue,
    pub first_delta: RatingValue,
    pub second_delta: RatingValue,
}

/// ELO cut-offs for Gold / Silver / Bronze.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TierThresholds {
    pub gold: RatingValue,
    pub silver: RatingValue,
}

impl Default for TierThresholds {
    fn default() -> Self {
        Self {
            gold: 1400,
            silver: 1200,
        }
    }
}

impl TierThresholds {
    pub fn tier_for(&self, rating: RatingValue) -> SkillTier {
        if rating >= self.gold {
            SkillTier::Gold
        } else if rating >= self.silver {
            SkillTier::Silver
        } else {
            SkillTier::Bronze
        }
    }
}
