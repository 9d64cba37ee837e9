use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::EngineError;

pub type PlayerId = i64;
pub type LeagueId = i64;
pub type SeasonId = i64;
pub type MatchId = i64;

/// One league instance for one season. All engine state is scoped by it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeasonKey {
    pub league_id: LeagueId,
    pub season_id: SeasonId,
}

impl SeasonKey {
    pub fn new(league_id: LeagueId, season_id: SeasonId) -> Self {
        Self {
            league_id,
            season_id,
        }
    }
}

impl fmt::Display for SeasonKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "league {} season {}", self.league_id, self.season_id)
    }
}

/// Implements `as_str`, `Display` and a validating `FromStr` for a closed
/// status enum stored as snake_case text.
macro_rules! text_enum {
    ($name:ident, $label:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = EngineError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_ascii_lowercase().as_str() {
                    $($text => Ok($name::$variant),)+
                    other => Err(EngineError::validation(format!(
                        "Unknown {} '{}'",
                        $label, other
                    ))),
                }
            }
        }
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistrationStatus {
    Pending,
    Confirmed,
    RegistrationOpen,
    Active,
    Completed,
    Archived,
}

text_enum!(RegistrationStatus, "registration status", {
    Pending => "pending",
    Confirmed => "confirmed",
    RegistrationOpen => "registration_open",
    Active => "active",
    Completed => "completed",
    Archived => "archived",
});

impl RegistrationStatus {
    /// Whether the registrant takes part in Swiss round generation.
    pub fn is_pairable(&self) -> bool {
        matches!(self, RegistrationStatus::Confirmed | RegistrationStatus::Active)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkillTier {
    Gold,
    Silver,
    Bronze,
}

text_enum!(SkillTier, "skill tier", {
    Gold => "gold",
    Silver => "silver",
    Bronze => "bronze",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeasonPhase {
    RegistrationOpen,
    RegularSeason,
    Playoffs,
    Completed,
}

text_enum!(SeasonPhase, "season phase", {
    RegistrationOpen => "registration_open",
    RegularSeason => "regular_season",
    Playoffs => "playoffs",
    Completed => "completed",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    Scheduled,
    Postponed,
    Completed,
    Cancelled,
}

text_enum!(MatchStatus, "match status", {
    Scheduled => "scheduled",
    Postponed => "postponed",
    Completed => "completed",
    Cancelled => "cancelled",
});

impl MatchStatus {
    /// Completed and cancelled matches never change again.
    pub fn is_final(&self) -> bool {
        matches!(self, MatchStatus::Completed | MatchStatus::Cancelled)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStage {
    Regular,
    Playoff,
}

text_enum!(MatchStage, "match stage", {
    Regular => "regular",
    Playoff => "playoff",
});

/// Games won by each side in one set. `first`/`second` follow the match's
/// player order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetScore {
    pub first: u8,
    pub second: u8,
}

impl SetScore {
    pub fn new(first: u8, second: u8) -> Self {
        Self { first, second }
    }

    pub fn swapped(&self) -> Self {
        Self {
            first: self.second,
            second: self.first,
        }
    }
}

impl fmt::Display for SetScore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.first, self.second)
    }
}

/// Counts sets won by (first, second).
pub fn sets_won(sets: &[SetScore]) -> (u32, u32) {
    sets.iter().fold((0, 0), |(a, b), set| {
        if set.first > set.second {
            (a + 1, b)
        } else if set.second > set.first {
            (a, b + 1)
        } else {
            (a, b)
        }
    })
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchResult {
    pub sets: Vec<SetScore>,
    pub winner_id: PlayerId,
    pub walkover: bool,
}

/// ELO deltas recorded when a match completes. Immutable afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EloDeltas {
    pub first: i32,
    pub second: i32,
}

impl EloDeltas {
    pub fn zero() -> Self {
        Self {
            first: 0,
            second: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schedule {
    pub scheduled_at: Option<NaiveDateTime>,
    pub deadline: NaiveDate,
    pub venue: Option<String>,
    pub court: Option<String>,
}

impl Schedule {
    pub fn with_deadline(deadline: NaiveDate) -> Self {
        Self {
            scheduled_at: None,
            deadline,
            venue: None,
            court: None,
        }
    }
}

/// One pairing within a round. `second_player_id == None` marks a BYE.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Match {
    pub id: MatchId,
    pub league_id: LeagueId,
    pub season_id: SeasonId,
    pub round_number: u32,
    pub stage: MatchStage,
    pub bracket_name: Option<String>,
    pub first_player_id: PlayerId,
    pub second_player_id: Option<PlayerId>,
    pub status: MatchStatus,
    pub schedule: Schedule,
    pub result: Option<MatchResult>,
    pub elo_deltas: Option<EloDeltas>,
    pub rematch: bool,
    pub imported: bool,
    pub completed_at: Option<NaiveDateTime>,
}

impl Match {
    pub fn season_key(&self) -> SeasonKey {
        SeasonKey::new(self.league_id, self.season_id)
    }

    pub fn is_bye(&self) -> bool {
        self.second_player_id.is_none()
    }

    pub fn involves(&self, player_id: PlayerId) -> bool {
        self.first_player_id == player_id || self.second_player_id == Some(player_id)
    }

    pub fn players(&self) -> Vec<PlayerId> {
        let mut players = vec![self.first_player_id];
        players.extend(self.second_player_id);
        players
    }

    pub fn opponent_of(&self, player_id: PlayerId) -> Option<PlayerId> {
        if self.first_player_id == player_id {
            self.second_player_id
        } else if self.second_player_id == Some(player_id) {
            Some(self.first_player_id)
        } else {
            None
        }
    }

    pub fn winner_id(&self) -> Option<PlayerId> {
        self.result.as_ref().map(|r| r.winner_id)
    }

    pub fn is_completed(&self) -> bool {
        self.status == MatchStatus::Completed
    }
}

/// Cumulative per-registration statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerStats {
    pub matches_played: u32,
    pub matches_won: u32,
    pub matches_lost: u32,
    pub sets_won: u32,
    pub sets_lost: u32,
    pub points: i32,
    pub byes: u32,
}

impl PlayerStats {
    pub fn record_win(&mut self, sets_won: u32, sets_lost: u32, points: i32) {
        self.matches_played += 1;
        self.matches_won += 1;
        self.sets_won += sets_won;
        self.sets_lost += sets_lost;
        self.points += points;
    }

    pub fn record_loss(&mut self, sets_won: u32, sets_lost: u32, points: i32) {
        self.matches_played += 1;
        self.matches_lost += 1;
        self.sets_won += sets_won;
        self.sets_lost += sets_lost;
        self.points += points;
    }

    pub fn record_bye(&mut self, points: i32) {
        self.byes += 1;
        self.points += points;
    }

    pub fn revert_bye(&mut self, points: i32) {
        self.byes = self.byes.saturating_sub(1);
        self.points -= points;
    }

    pub fn set_differential(&self) -> i64 {
        self.sets_won as i64 - self.sets_lost as i64
    }
}

/// A player's participation in one league season. This is the Rating Store
/// record; `version` guards concurrent updates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    pub player_id: PlayerId,
    pub league_id: LeagueId,
    pub season_id: SeasonId,
    pub status: RegistrationStatus,
    pub tier: SkillTier,
    pub rating: i32,
    pub stats: PlayerStats,
    pub playoff_stats: PlayerStats,
    pub postponements_remaining: u32,
    pub version: i64,
}

impl Registration {
    pub fn season_key(&self) -> SeasonKey {
        SeasonKey::new(self.league_id, self.season_id)
    }

    /// Stats bucket for the given stage.
    pub fn stats_for_mut(&mut self, stage: MatchStage) -> &mut PlayerStats {
        match stage {
            MatchStage::Regular => &mut self.stats,
            MatchStage::Playoff => &mut self.playoff_stats,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Round {
    pub league_id: LeagueId,
    pub season_id: SeasonId,
    pub number: u32,
    pub deadline: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Season {
    pub league_id: LeagueId,
    pub season_id: SeasonId,
    pub name: String,
    pub phase: SeasonPhase,
    pub k_factor: f64,
    pub version: i64,
}

impl Season {
    pub fn key(&self) -> SeasonKey {
        SeasonKey::new(self.league_id, self.season_id)
    }
}

/// Per-item result of a bulk request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemOutcome {
    pub match_id: MatchId,
    pub ok: bool,
    pub reason: Option<String>,
}

impl ItemOutcome {
    pub fn ok(match_id: MatchId) -> Self {
        Self {
            match_id,
            ok: true,
            reason: None,
        }
    }

    pub fn failed(match_id: MatchId, reason: impl Into<String>) -> Self {
        Self {
            match_id,
            ok: false,
            reason: Some(reason.into()),
        }
    }
}

/// Bulk requests are all-or-nothing: `applied` is false when any item failed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkReport {
    pub applied: bool,
    pub items: Vec<ItemOutcome>,
    pub matches: Vec<Match>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trips_through_text() {
        for status in [
            MatchStatus::Scheduled,
            MatchStatus::Postponed,
            MatchStatus::Completed,
            MatchStatus::Cancelled,
        ] {
            assert_eq!(status.as_str().parse::<MatchStatus>().unwrap(), status);
        }
        assert_eq!(
            "Regular_Season".parse::<SeasonPhase>().unwrap(),
            SeasonPhase::RegularSeason
        );
    }

    #[test]
    fn test_unknown_status_is_validation_error() {
        let err = "finished".parse::<MatchStatus>().unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
        assert_eq!(err.to_string(), "Unknown match status 'finished'");
    }

    #[test]
    fn test_sets_won() {
        let sets = vec![SetScore::new(6, 4), SetScore::new(3, 6), SetScore::new(10, 8)];
        assert_eq!(sets_won(&sets), (2, 1));
        assert_eq!(sets_won(&[]), (0, 0));
    }

    #[test]
    fn test_pairable_statuses() {
        assert!(RegistrationStatus::Active.is_pairable());
        assert!(RegistrationStatus::Confirmed.is_pairable());
        assert!(!RegistrationStatus::Pending.is_pairable());
        assert!(!RegistrationStatus::Archived.is_pairable());
    }

    #[test]
    fn test_bye_match_helpers() {
        let m = Match {
            id: 1,
            league_id: 1,
            season_id: 1,
            round_number: 1,
            stage: MatchStage::Regular,
            bracket_name: None,
            first_player_id: 7,
            second_player_id: None,
            status: MatchStatus::Completed,
            schedule: Schedule::with_deadline(NaiveDate::from_ymd_opt(2026, 5, 1).unwrap()),
            result: None,
            elo_deltas: Some(EloDeltas::zero()),
            rematch: false,
            imported: false,
            completed_at: None,
        };
        assert!(m.is_bye());
        assert_eq!(m.players(), vec![7]);
        assert_eq!(m.opponent_of(7), None);
        assert!(m.involves(7));
        assert!(!m.involves(8));
    }

    #[test]
    fn test_stats_bye_revert() {
        let mut stats = PlayerStats::default();
        stats.record_bye(3);
        assert_eq!((stats.byes, stats.points), (1, 3));
        stats.revert_bye(3);
        assert_eq!(stats, PlayerStats::default());
    }
}
