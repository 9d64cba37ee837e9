//! Match state machine.
//!
//! `scheduled -> completed`, `scheduled -> cancelled`,
//! `scheduled -> postponed -> scheduled`; a postponed match may also be
//! completed or cancelled directly. Completed and cancelled are final.
//!
//! Every transition validates first and mutates last, so a rejected call
//! leaves the match and both registrations untouched.

use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};

use super::models::{
    EloDeltas, Match, MatchResult, MatchStatus, PlayerId, Registration, SetScore, sets_won,
};
use super::scores::{Side, validate_sets};
use crate::errors::{EngineError, EngineResult};
use crate::rating::{self, EloParams, EloUpdate, Outcome, TierThresholds};
use crate::standings::PointsTable;

/// A result as submitted by a player or admin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultSubmission {
    Sets(Vec<SetScore>),
    Walkover { winner_id: PlayerId },
}

/// League rules applied when a match completes.
#[derive(Debug, Clone, Copy)]
pub struct CompletionRules {
    pub elo: EloParams,
    pub points: PointsTable,
    pub tiers: TierThresholds,
}

fn ensure_open(m: &Match, action: &str) -> EngineResult<()> {
    match m.status {
        MatchStatus::Completed => Err(EngineError::conflict(format!(
            "Cannot {} match {}: it is already completed",
            action, m.id
        ))),
        MatchStatus::Cancelled => Err(EngineError::conflict(format!(
            "Cannot {} match {}: it was cancelled",
            action, m.id
        ))),
        MatchStatus::Scheduled | MatchStatus::Postponed => Ok(()),
    }
}

fn ensure_pair(m: &Match, first: &Registration, second: &Registration) -> EngineResult<PlayerId> {
    let second_id = m.second_player_id.ok_or_else(|| {
        EngineError::conflict(format!("Match {} is a BYE and has no opponent", m.id))
    })?;
    if first.player_id != m.first_player_id || second.player_id != second_id {
        return Err(EngineError::validation(format!(
            "Registrations {}/{} do not belong to match {}",
            first.player_id, second.player_id, m.id
        )));
    }
    Ok(second_id)
}

/// Completes a match, applies ELO and updates both players' stats.
///
/// `recorded` carries externally supplied deltas (historical imports); they
/// are applied as-is instead of being recomputed.
pub fn complete(
    m: &mut Match,
    first: &mut Registration,
    second: &mut Registration,
    submission: ResultSubmission,
    recorded: Option<EloDeltas>,
    rules: &CompletionRules,
    at: NaiveDateTime,
) -> EngineResult<EloUpdate> {
    ensure_open(m, "complete")?;
    let second_id = ensure_pair(m, first, second)?;

    let (result, side) = match submission {
        ResultSubmission::Sets(sets) => {
            let side = validate_sets(&sets)?;
            let winner_id = match side {
                Side::First => m.first_player_id,
                Side::Second => second_id,
            };
            (
                MatchResult {
                    sets,
                    winner_id,
                    walkover: false,
                },
                side,
            )
        }
        ResultSubmission::Walkover { winner_id } => {
            let side = if winner_id == m.first_player_id {
                Side::First
            } else if winner_id == second_id {
                Side::Second
            } else {
                return Err(EngineError::validation(format!(
                    "Walkover winner {} is not a player in match {}",
                    winner_id, m.id
                )));
            };
            (
                MatchResult {
                    sets: Vec::new(),
                    winner_id,
                    walkover: true,
                },
                side,
            )
        }
    };

    let update = match recorded {
        Some(deltas) => EloUpdate {
            first_rating: (first.rating + deltas.first).max(rules.elo.rating_floor),
            second_rating: (second.rating + deltas.second).max(rules.elo.rating_floor),
            first_delta: deltas.first,
            second_delta: deltas.second,
        },
        None => {
            let outcome = match side {
                Side::First => Outcome::FirstWins,
                Side::Second => Outcome::SecondWins,
            };
            rating::apply_result(first.rating, second.rating, outcome, &rules.elo)
        }
    };

    let mut new_first = first.clone();
    let mut new_second = second.clone();
    let (first_sets, second_sets) = sets_won(&result.sets);
    let stage = m.stage;
    match side {
        Side::First => {
            new_first
                .stats_for_mut(stage)
                .record_win(first_sets, second_sets, rules.points.win);
            new_second
                .stats_for_mut(stage)
                .record_loss(second_sets, first_sets, rules.points.loss);
        }
        Side::Second => {
            new_first
                .stats_for_mut(stage)
                .record_loss(first_sets, second_sets, rules.points.loss);
            new_second
                .stats_for_mut(stage)
                .record_win(second_sets, first_sets, rules.points.win);
        }
    }
    new_first.rating = update.first_rating;
    new_first.tier = rules.tiers.tier_for(update.first_rating);
    new_second.rating = update.second_rating;
    new_second.tier = rules.tiers.tier_for(update.second_rating);

    *first = new_first;
    *second = new_second;
    m.result = Some(result);
    m.elo_deltas = Some(EloDeltas {
        first: update.first_delta,
        second: update.second_delta,
    });
    m.status = MatchStatus::Completed;
    m.completed_at = Some(at);

    Ok(update)
}

/// Marks a freshly generated BYE match completed and credits its player.
pub fn award_bye(
    m: &mut Match,
    player: &mut Registration,
    rules: &CompletionRules,
    at: NaiveDateTime,
) -> EngineResult<()> {
    if !m.is_bye() || m.first_player_id != player.player_id {
        return Err(EngineError::validation(format!(
            "Match {} is not a BYE for player {}",
            m.id, player.player_id
        )));
    }
    player.stats_for_mut(m.stage).record_bye(rules.points.bye);
    m.result = Some(MatchResult {
        sets: Vec::new(),
        winner_id: player.player_id,
        walkover: false,
    });
    m.elo_deltas = Some(EloDeltas::zero());
    m.status = MatchStatus::Completed;
    m.completed_at = Some(at);
    Ok(())
}

/// Postpones a match: consumes one credit from each player and pushes the
/// deadline back by `extension`.
pub fn postpone(
    m: &mut Match,
    first: &mut Registration,
    second: &mut Registration,
    new_date: NaiveDateTime,
    extension: Duration,
) -> EngineResult<()> {
    ensure_open(m, "postpone")?;
    ensure_pair(m, first, second)?;

    for reg in [&*first, &*second] {
        if reg.postponements_remaining == 0 {
            return Err(EngineError::conflict(format!(
                "No postponements remaining for player {} this season",
                reg.player_id
            )));
        }
    }

    let new_deadline = m.schedule.deadline + extension;
    if new_date.date() > new_deadline {
        return Err(EngineError::validation(format!(
            "New date {} is after the extended deadline {}",
            new_date.date(),
            new_deadline
        )));
    }

    first.postponements_remaining -= 1;
    second.postponements_remaining -= 1;
    m.schedule.deadline = new_deadline;
    m.schedule.scheduled_at = Some(new_date);
    m.status = MatchStatus::Postponed;
    Ok(())
}

/// Confirms date, venue and court; a postponed match returns to scheduled.
pub fn reschedule(
    m: &mut Match,
    at: NaiveDateTime,
    venue: Option<String>,
    court: Option<String>,
) -> EngineResult<()> {
    ensure_open(m, "reschedule")?;
    if m.is_bye() {
        return Err(EngineError::conflict(format!(
            "Match {} is a BYE and cannot be scheduled",
            m.id
        )));
    }
    if at.date() > m.schedule.deadline {
        return Err(EngineError::validation(format!(
            "Date {} is after the match deadline {}",
            at.date(),
            m.schedule.deadline
        )));
    }
    m.schedule.scheduled_at = Some(at);
    m.schedule.venue = venue;
    m.schedule.court = court;
    m.status = MatchStatus::Scheduled;
    Ok(())
}

pub fn cancel(m: &mut Match) -> EngineResult<()> {
    ensure_open(m, "cancel")?;
    m.status = MatchStatus::Cancelled;
    Ok(())
}

/// Swaps `old` for `new` in a match that has not been played yet.
///
/// Completed matches are refused so their ELO deltas stay untouched.
pub fn replace_player(m: &mut Match, old: PlayerId, new: PlayerId) -> EngineResult<()> {
    ensure_open(m, "replace a player in")?;
    if old == new {
        return Err(EngineError::validation("Old and new player are the same"));
    }
    if m.involves(new) {
        return Err(EngineError::validation(format!(
            "Player {} already plays in match {}",
            new, m.id
        )));
    }
    if m.first_player_id == old {
        m.first_player_id = new;
    } else if m.second_player_id == Some(old) {
        m.second_player_id = Some(new);
    } else {
        return Err(EngineError::validation(format!(
            "Player {} does not play in match {}",
            old, m.id
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{MatchStage, PlayerStats, RegistrationStatus, Schedule, SkillTier};
    use chrono::NaiveDate;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 4, d).unwrap()
    }

    fn at(d: u32) -> NaiveDateTime {
        date(d).and_hms_opt(18, 0, 0).unwrap()
    }

    fn rules() -> CompletionRules {
        CompletionRules {
            elo: EloParams::default(),
            points: PointsTable {
                win: 3,
                loss: 0,
                bye: 3,
            },
            tiers: TierThresholds::default(),
        }
    }

    fn reg(player_id: PlayerId) -> Registration {
        Registration {
            player_id,
            league_id: 1,
            season_id: 1,
            status: RegistrationStatus::Active,
            tier: SkillTier::Silver,
            rating: 1200,
            stats: PlayerStats::default(),
            playoff_stats: PlayerStats::default(),
            postponements_remaining: 3,
            version: 0,
        }
    }

    fn scheduled(first: PlayerId, second: Option<PlayerId>) -> Match {
        Match {
            id: 10,
            league_id: 1,
            season_id: 1,
            round_number: 1,
            stage: MatchStage::Regular,
            bracket_name: None,
            first_player_id: first,
            second_player_id: second,
            status: MatchStatus::Scheduled,
            schedule: Schedule::with_deadline(date(14)),
            result: None,
            elo_deltas: None,
            rematch: false,
            imported: false,
            completed_at: None,
        }
    }

    #[test]
    fn test_complete_with_sets() {
        let mut m = scheduled(1, Some(2));
        let (mut a, mut b) = (reg(1), reg(2));
        let sets = vec![SetScore::new(4, 6), SetScore::new(3, 6)];

        let update = complete(&mut m, &mut a, &mut b, ResultSubmission::Sets(sets), None, &rules(), at(5)).unwrap();

        assert_eq!(m.status, MatchStatus::Completed);
        assert_eq!(m.winner_id(), Some(2));
        assert_eq!(m.elo_deltas, Some(EloDeltas { first: -16, second: 16 }));
        assert_eq!(update.second_rating, 1216);
        assert_eq!(b.rating, 1216);
        assert_eq!(a.rating, 1184);
        assert_eq!(b.stats.points, 3);
        assert_eq!((b.stats.sets_won, b.stats.sets_lost), (2, 0));
        assert_eq!((a.stats.matches_played, a.stats.matches_lost), (1, 1));
        assert_eq!(a.tier, SkillTier::Bronze);
    }

    #[test]
    fn test_complete_twice_is_rejected() {
        let mut m = scheduled(1, Some(2));
        let (mut a, mut b) = (reg(1), reg(2));
        let sets = vec![SetScore::new(6, 4), SetScore::new(6, 4)];
        complete(&mut m, &mut a, &mut b, ResultSubmission::Sets(sets.clone()), None, &rules(), at(5)).unwrap();
        let snapshot = (a.clone(), b.clone());

        let err = complete(&mut m, &mut a, &mut b, ResultSubmission::Sets(sets), None, &rules(), at(6)).unwrap_err();

        assert!(matches!(err, EngineError::StateConflict(_)));
        assert_eq!((a, b), snapshot);
    }

    #[test]
    fn test_walkover_counts_like_a_win() {
        let mut m = scheduled(1, Some(2));
        let (mut a, mut b) = (reg(1), reg(2));
        complete(&mut m, &mut a, &mut b, ResultSubmission::Walkover { winner_id: 1 }, None, &rules(), at(5)).unwrap();

        assert!(m.result.as_ref().unwrap().walkover);
        assert_eq!(a.rating, 1216);
        assert_eq!(a.stats.matches_won, 1);
        assert_eq!(a.stats.sets_won, 0);
    }

    #[test]
    fn test_walkover_winner_must_play() {
        let mut m = scheduled(1, Some(2));
        let (mut a, mut b) = (reg(1), reg(2));
        let err = complete(&mut m, &mut a, &mut b, ResultSubmission::Walkover { winner_id: 9 }, None, &rules(), at(5)).unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
        assert_eq!(m.status, MatchStatus::Scheduled);
    }

    #[test]
    fn test_invalid_score_leaves_match_open() {
        let mut m = scheduled(1, Some(2));
        let (mut a, mut b) = (reg(1), reg(2));
        let sets = vec![SetScore::new(6, 4), SetScore::new(4, 6)];
        assert!(complete(&mut m, &mut a, &mut b, ResultSubmission::Sets(sets), None, &rules(), at(5)).is_err());
        assert_eq!(m.status, MatchStatus::Scheduled);
        assert_eq!(a.rating, 1200);
    }

    #[test]
    fn test_recorded_deltas_are_not_recomputed() {
        let mut m = scheduled(1, Some(2));
        let (mut a, mut b) = (reg(1), reg(2));
        let sets = vec![SetScore::new(6, 1), SetScore::new(6, 1)];
        let deltas = EloDeltas { first: 11, second: -9 };
        complete(&mut m, &mut a, &mut b, ResultSubmission::Sets(sets), Some(deltas), &rules(), at(5)).unwrap();
        assert_eq!(m.elo_deltas, Some(deltas));
        assert_eq!((a.rating, b.rating), (1211, 1191));
    }

    #[test]
    fn test_playoff_completion_uses_playoff_stats() {
        let mut m = scheduled(1, Some(2));
        m.stage = MatchStage::Playoff;
        let (mut a, mut b) = (reg(1), reg(2));
        let sets = vec![SetScore::new(6, 1), SetScore::new(6, 1)];
        complete(&mut m, &mut a, &mut b, ResultSubmission::Sets(sets), None, &rules(), at(5)).unwrap();
        assert_eq!(a.stats, PlayerStats::default());
        assert_eq!(a.playoff_stats.matches_won, 1);
    }

    #[test]
    fn test_award_bye() {
        let mut m = scheduled(4, None);
        let mut p = reg(4);
        award_bye(&mut m, &mut p, &rules(), at(1)).unwrap();
        assert_eq!(m.status, MatchStatus::Completed);
        assert_eq!(m.elo_deltas, Some(EloDeltas::zero()));
        assert_eq!(p.rating, 1200);
        assert_eq!((p.stats.points, p.stats.byes), (3, 1));
    }

    #[test]
    fn test_postpone_consumes_credits_and_extends_deadline() {
        let mut m = scheduled(1, Some(2));
        let (mut a, mut b) = (reg(1), reg(2));
        postpone(&mut m, &mut a, &mut b, at(20), Duration::days(7)).unwrap();
        assert_eq!(m.status, MatchStatus::Postponed);
        assert_eq!(m.schedule.deadline, date(21));
        assert_eq!((a.postponements_remaining, b.postponements_remaining), (2, 2));
    }

    #[test]
    fn test_postpone_without_credits_is_rejected() {
        let mut m = scheduled(1, Some(2));
        let (mut a, mut b) = (reg(1), reg(2));
        b.postponements_remaining = 0;
        let err = postpone(&mut m, &mut a, &mut b, at(20), Duration::days(7)).unwrap_err();
        assert!(matches!(err, EngineError::StateConflict(_)));
        assert!(err.to_string().contains("No postponements remaining"));
        assert_eq!(a.postponements_remaining, 3);
        assert_eq!(m.status, MatchStatus::Scheduled);
    }

    #[test]
    fn test_postpone_past_extended_deadline_is_rejected() {
        let mut m = scheduled(1, Some(2));
        let (mut a, mut b) = (reg(1), reg(2));
        let err = postpone(&mut m, &mut a, &mut b, at(25), Duration::days(7)).unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
    }

    #[test]
    fn test_postponed_match_can_be_rescheduled_and_completed() {
        let mut m = scheduled(1, Some(2));
        let (mut a, mut b) = (reg(1), reg(2));
        postpone(&mut m, &mut a, &mut b, at(18), Duration::days(7)).unwrap();
        reschedule(&mut m, at(19), Some("Riverside".into()), Some("3".into())).unwrap();
        assert_eq!(m.status, MatchStatus::Scheduled);
        assert_eq!(m.schedule.court.as_deref(), Some("3"));

        postpone(&mut m, &mut a, &mut b, at(26), Duration::days(7)).unwrap();
        let sets = vec![SetScore::new(6, 3), SetScore::new(6, 3)];
        complete(&mut m, &mut a, &mut b, ResultSubmission::Sets(sets), None, &rules(), at(26)).unwrap();
        assert_eq!(m.status, MatchStatus::Completed);
        assert_eq!(a.postponements_remaining, 1);
    }

    #[test]
    fn test_cancel_is_final() {
        let mut m = scheduled(1, Some(2));
        cancel(&mut m).unwrap();
        assert!(cancel(&mut m).is_err());
        assert!(reschedule(&mut m, at(3), None, None).is_err());
    }

    #[test]
    fn test_replace_player_only_in_open_matches() {
        let mut m = scheduled(1, Some(2));
        replace_player(&mut m, 2, 5).unwrap();
        assert_eq!(m.second_player_id, Some(5));
        assert!(replace_player(&mut m, 2, 6).is_err());
        assert!(replace_player(&mut m, 1, 5).is_err());

        m.status = MatchStatus::Completed;
        let err = replace_player(&mut m, 1, 7).unwrap_err();
        assert!(matches!(err, EngineError::StateConflict(_)));
        assert_eq!(m.first_player_id, 1);
    }
}
