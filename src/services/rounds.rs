use chrono::{Duration, NaiveDateTime};
use log::info;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::engine::{
    load_registration, record_rating_changes, store_match, store_registration, LeagueEngine,
    MatchOutcome,
};
use super::playoffs::advance_playoffs;
use crate::database::{matches, registrations, rounds, NewMatch};
use crate::domain::{
    lifecycle, BulkReport, ItemOutcome, Match, MatchId, MatchStage, MatchStatus, PlayerId,
    ResultSubmission, Round, Season, SeasonKey, SeasonPhase,
};
use crate::errors::{EngineError, EngineResult};
use crate::pairing::{self, Pairing, PairingHistory, PairingOptions, SwissPlayer};

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRound {
    /// Must equal the next round number when given
    pub round_number: Option<u32>,
    #[serde(default)]
    pub allow_rematches: bool,
    pub expected_version: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundPlan {
    pub round: Round,
    pub pairings: Vec<Pairing>,
    pub matches: Vec<Match>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reschedule {
    pub scheduled_at: NaiveDateTime,
    pub venue: Option<String>,
    pub court: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplacePlayer {
    pub match_ids: Vec<MatchId>,
    pub old_player_id: PlayerId,
    pub new_player_id: PlayerId,
}

fn ensure_phase(season: &Season, phase: SeasonPhase, action: &str) -> EngineResult<()> {
    if season.phase != phase {
        return Err(EngineError::conflict(format!(
            "Cannot {}: {} is in phase {}",
            action,
            season.key(),
            season.phase
        )));
    }
    Ok(())
}

fn ensure_stage_phase(season: &Season, m: &Match, action: &str) -> EngineResult<()> {
    let phase = match m.stage {
        MatchStage::Regular => SeasonPhase::RegularSeason,
        MatchStage::Playoff => SeasonPhase::Playoffs,
    };
    ensure_phase(season, phase, action)
}

fn load_match(conn: &Connection, key: SeasonKey, match_id: MatchId) -> EngineResult<Match> {
    matches::find_match(conn, match_id)?
        .filter(|m| m.season_key() == key)
        .ok_or_else(|| EngineError::not_found("Match", match_id))
}

/// Fails when `player` already takes part in another live match of the
/// same round, BYE included.
pub(crate) fn ensure_free_in_round(
    conn: &Connection,
    key: SeasonKey,
    stage: MatchStage,
    round_number: u32,
    player: PlayerId,
    except: Option<MatchId>,
) -> EngineResult<()> {
    let clash = matches::list_for_round(conn, key, stage, round_number)?
        .into_iter()
        .find(|other| {
            Some(other.id) != except
                && other.status != MatchStatus::Cancelled
                && other.involves(player)
        });
    match clash {
        Some(other) if other.is_bye() => Err(EngineError::conflict(format!(
            "Player {} already has the BYE in round {}",
            player, round_number
        ))),
        Some(other) => Err(EngineError::conflict(format!(
            "Player {} already plays match {} in round {}",
            player, other.id, round_number
        ))),
        None => Ok(()),
    }
}

impl LeagueEngine {
    fn round_is_closed(&self, round_matches: &[Match]) -> bool {
        round_matches.iter().all(|m| {
            m.status.is_final()
                || (m.status == MatchStatus::Postponed && !self.settings.postponed_blocks_round_close)
        })
    }

    /// Generates and stores the next Swiss round.
    ///
    /// The previous round must be closed. BYE matches are completed right
    /// away and their points credited.
    pub fn generate_round(&self, key: SeasonKey, req: GenerateRound) -> EngineResult<RoundPlan> {
        self.with_season_tx(key, req.expected_version, "generate_round", |tx, season| {
            ensure_phase(season, SeasonPhase::RegularSeason, "generate a round")?;

            let latest = rounds::latest_round(tx, key)?;
            let next = latest.as_ref().map_or(1, |r| r.number + 1);
            match req.round_number {
                Some(n) if n < next => {
                    return Err(EngineError::conflict(format!(
                        "Round {} already exists for {}",
                        n, key
                    )));
                }
                Some(n) if n > next => {
                    return Err(EngineError::validation(format!(
                        "Round {} cannot be generated before round {}",
                        n, next
                    )));
                }
                _ => {}
            }

            if let Some(prev) = &latest {
                let prev_matches = matches::list_for_round(tx, key, MatchStage::Regular, prev.number)?;
                if !self.round_is_closed(&prev_matches) {
                    let open = prev_matches.iter().filter(|m| !m.status.is_final()).count();
                    return Err(EngineError::conflict(format!(
                        "Round {} still has {} unfinished match(es)",
                        prev.number, open
                    )));
                }
            }

            let mut regs: Vec<_> = registrations::list_for_season(tx, key)?
                .into_iter()
                .filter(|r| r.status.is_pairable())
                .collect();
            let field: Vec<SwissPlayer> = regs
                .iter()
                .map(|r| SwissPlayer {
                    player_id: r.player_id,
                    points: r.stats.points,
                    rating: r.rating,
                })
                .collect();
            let history = PairingHistory::from_matches(&matches::list_for_season(tx, key)?);
            let options = PairingOptions {
                allow_rematches: req.allow_rematches,
            };
            let pairings = pairing::generate_round(&field, &history, next, &options)?;

            let round = Round {
                league_id: key.league_id,
                season_id: key.season_id,
                number: next,
                deadline: self.round_deadline(),
            };
            rounds::insert_round(tx, &round)?;

            let rules = self.rules(season);
            let now = Self::now();
            let mut stored = Vec::with_capacity(pairings.len());
            for p in &pairings {
                let (first, second, rematch) = match *p {
                    Pairing::Game {
                        first,
                        second,
                        rematch,
                    } => (first, Some(second), rematch),
                    Pairing::Bye { player } => (player, None, false),
                };
                let mut m = matches::insert_match(
                    tx,
                    &NewMatch {
                        key,
                        round_number: next,
                        stage: MatchStage::Regular,
                        bracket_name: None,
                        first_player_id: first,
                        second_player_id: second,
                        deadline: round.deadline,
                        rematch,
                        imported: false,
                    },
                )?;

                if m.is_bye() {
                    let reg = regs
                        .iter_mut()
                        .find(|r| r.player_id == first)
                        .ok_or_else(|| EngineError::not_found("Registration", first))?;
                    lifecycle::award_bye(&mut m, reg, &rules, now)?;
                    store_match(tx, &m, MatchStatus::Scheduled)?;
                    store_registration(tx, reg, key)?;
                    reg.version += 1;
                }
                stored.push(m);
            }

            info!(
                "Generated round {} for {}: {} match(es), deadline {}",
                next,
                key,
                stored.len(),
                round.deadline
            );
            Ok(RoundPlan {
                round,
                pairings,
                matches: stored,
            })
        })
    }

    /// Records a result, applies ELO to both players and, for playoff
    /// matches, advances the bracket.
    pub fn complete_match(
        &self,
        match_id: MatchId,
        submission: ResultSubmission,
        expected_version: Option<i64>,
    ) -> EngineResult<MatchOutcome> {
        let key = self.season_of_match(match_id)?;
        self.with_season_tx(key, expected_version, "complete_match", |tx, season| {
            let mut m = load_match(tx, key, match_id)?;
            ensure_stage_phase(season, &m, "complete a match")?;
            let second_id = m.second_player_id.ok_or_else(|| {
                EngineError::conflict(format!("Match {} is a BYE and completes automatically", match_id))
            })?;

            let previous_status = m.status;
            let before = [
                load_registration(tx, key, m.first_player_id)?,
                load_registration(tx, key, second_id)?,
            ];
            let [mut first, mut second] = before.clone();
            let now = Self::now();
            let update = lifecycle::complete(
                &mut m,
                &mut first,
                &mut second,
                submission,
                None,
                &self.rules(season),
                now,
            )?;

            store_match(tx, &m, previous_status)?;
            store_registration(tx, &first, key)?;
            store_registration(tx, &second, key)?;
            record_rating_changes(tx, &m, &[&before[0], &before[1]], &[&first, &second], now)?;
            first.version += 1;
            second.version += 1;

            let new_matches = if m.stage == MatchStage::Playoff {
                advance_playoffs(tx, self, key, &m)?
            } else {
                Vec::new()
            };

            info!(
                "Completed match {} in {}: winner {}, ELO {:+}/{:+}",
                m.id,
                key,
                m.winner_id().unwrap_or_default(),
                update.first_delta,
                update.second_delta
            );
            Ok(MatchOutcome {
                game: m,
                registrations: vec![first, second],
                new_matches,
            })
        })
    }

    /// Postpones a match to `new_date`, spending one credit from each player.
    pub fn postpone_match(&self, match_id: MatchId, new_date: NaiveDateTime) -> EngineResult<Match> {
        let key = self.season_of_match(match_id)?;
        self.with_season_tx(key, None, "postpone_match", |tx, season| {
            let mut m = load_match(tx, key, match_id)?;
            ensure_stage_phase(season, &m, "postpone a match")?;
            let second_id = m.second_player_id.ok_or_else(|| {
                EngineError::conflict(format!("Match {} is a BYE and cannot be postponed", match_id))
            })?;

            let previous_status = m.status;
            let mut first = load_registration(tx, key, m.first_player_id)?;
            let mut second = load_registration(tx, key, second_id)?;
            lifecycle::postpone(
                &mut m,
                &mut first,
                &mut second,
                new_date,
                Duration::days(self.settings.postponement_days),
            )?;

            store_match(tx, &m, previous_status)?;
            store_registration(tx, &first, key)?;
            store_registration(tx, &second, key)?;
            info!(
                "Postponed match {} in {} to {} (deadline {}), credits left {}/{}",
                m.id,
                key,
                new_date,
                m.schedule.deadline,
                first.postponements_remaining,
                second.postponements_remaining
            );
            Ok(m)
        })
    }

    pub fn reschedule_match(&self, match_id: MatchId, req: Reschedule) -> EngineResult<Match> {
        let key = self.season_of_match(match_id)?;
        self.with_season_tx(key, None, "reschedule_match", |tx, season| {
            let mut m = load_match(tx, key, match_id)?;
            ensure_stage_phase(season, &m, "reschedule a match")?;
            let previous_status = m.status;
            lifecycle::reschedule(&mut m, req.scheduled_at, req.venue, req.court)?;
            store_match(tx, &m, previous_status)?;
            info!("Rescheduled match {} in {} to {}", m.id, key, req.scheduled_at);
            Ok(m)
        })
    }

    pub fn cancel_match(&self, match_id: MatchId) -> EngineResult<Match> {
        let key = self.season_of_match(match_id)?;
        self.with_season_tx(key, None, "cancel_match", |tx, season| {
            let mut m = load_match(tx, key, match_id)?;
            ensure_stage_phase(season, &m, "cancel a match")?;
            if m.stage == MatchStage::Playoff {
                return Err(EngineError::conflict(format!(
                    "Playoff match {} cannot be cancelled, record a walkover instead",
                    match_id
                )));
            }
            let previous_status = m.status;
            lifecycle::cancel(&mut m)?;
            store_match(tx, &m, previous_status)?;
            info!("Cancelled match {} in {}", m.id, key);
            Ok(m)
        })
    }

    /// Replaces a player in the selected unplayed matches.
    ///
    /// Every item is checked first; if any fails nothing is written.
    pub fn replace_player(&self, key: SeasonKey, req: ReplacePlayer) -> EngineResult<BulkReport> {
        self.with_season_tx(key, None, "replace_player", |tx, season| {
            ensure_phase(season, SeasonPhase::RegularSeason, "replace players")?;
            let replacement = load_registration(tx, key, req.new_player_id)?;
            if !replacement.status.is_pairable() {
                return Err(EngineError::conflict(format!(
                    "Player {} is {} and cannot be scheduled",
                    req.new_player_id, replacement.status
                )));
            }

            let history = PairingHistory::from_matches(&matches::list_for_season(tx, key)?);
            let mut seen = HashSet::new();
            let mut items = Vec::with_capacity(req.match_ids.len());
            let mut updated = Vec::with_capacity(req.match_ids.len());
            for &id in &req.match_ids {
                if !seen.insert(id) {
                    items.push(ItemOutcome::failed(id, "Listed more than once"));
                    continue;
                }
                let attempt = load_match(tx, key, id).and_then(|mut m| {
                    let previous_status = m.status;
                    lifecycle::replace_player(&mut m, req.old_player_id, req.new_player_id)?;
                    ensure_free_in_round(
                        tx,
                        key,
                        m.stage,
                        m.round_number,
                        req.new_player_id,
                        Some(m.id),
                    )?;
                    m.rematch = m
                        .opponent_of(req.new_player_id)
                        .is_some_and(|o| history.have_met(req.new_player_id, o));
                    Ok((m, previous_status))
                });
                match attempt {
                    Ok(pair) => {
                        items.push(ItemOutcome::ok(id));
                        updated.push(pair);
                    }
                    Err(e) => items.push(ItemOutcome::failed(id, e.client_message())),
                }
            }

            let applied = items.iter().all(|i| i.ok);
            if applied {
                for (m, previous_status) in &updated {
                    store_match(tx, m, *previous_status)?;
                }
                info!(
                    "Replaced player {} with {} in {} match(es) of {}",
                    req.old_player_id,
                    req.new_player_id,
                    updated.len(),
                    key
                );
            } else {
                info!("Player replacement in {} rejected, nothing changed", key);
            }
            Ok(BulkReport {
                applied,
                items,
                matches: if applied {
                    updated.into_iter().map(|(m, _)| m).collect()
                } else {
                    Vec::new()
                },
            })
        })
    }

    /// Deletes unplayed matches and BYEs. Deleting a BYE takes back the
    /// points it awarded.
    pub fn delete_matches(&self, key: SeasonKey, match_ids: &[MatchId]) -> EngineResult<BulkReport> {
        self.with_season_tx(key, None, "delete_matches", |tx, season| {
            ensure_phase(season, SeasonPhase::RegularSeason, "delete matches")?;
            let points = self.settings.points();

            let mut seen = HashSet::new();
            let mut items = Vec::with_capacity(match_ids.len());
            let mut doomed = Vec::with_capacity(match_ids.len());
            for &id in match_ids {
                if !seen.insert(id) {
                    items.push(ItemOutcome::failed(id, "Listed more than once"));
                    continue;
                }
                let attempt = load_match(tx, key, id).and_then(|m| {
                    if m.stage == MatchStage::Playoff {
                        return Err(EngineError::conflict("Playoff matches cannot be deleted"));
                    }
                    if m.status == MatchStatus::Completed && !m.is_bye() {
                        return Err(EngineError::conflict(
                            "Completed matches cannot be deleted",
                        ));
                    }
                    Ok(m)
                });
                match attempt {
                    Ok(m) => {
                        items.push(ItemOutcome::ok(id));
                        doomed.push(m);
                    }
                    Err(e) => items.push(ItemOutcome::failed(id, e.client_message())),
                }
            }

            let applied = items.iter().all(|i| i.ok);
            if !applied {
                info!("Bulk delete in {} rejected, nothing changed", key);
                return Ok(BulkReport {
                    applied,
                    items,
                    matches: Vec::new(),
                });
            }

            for m in &doomed {
                if m.is_bye() && m.is_completed() {
                    let mut reg = load_registration(tx, key, m.first_player_id)?;
                    reg.stats_for_mut(m.stage).revert_bye(points.bye);
                    store_registration(tx, &reg, key)?;
                }
                matches::delete_match(tx, m.id)?;
            }
            info!("Deleted {} match(es) from {}", doomed.len(), key);
            Ok(BulkReport {
                applied,
                items,
                matches: doomed,
            })
        })
    }
}
