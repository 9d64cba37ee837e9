use chrono::{Duration, NaiveDate, NaiveDateTime, Utc};
use log::{info, warn};
use rusqlite::{Transaction, TransactionBehavior};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use crate::config::LeagueSettings;
use crate::database::{
    self, matches, players, rating_history, registrations, seasons, DbPool, RatingChange,
};
use crate::domain::{
    CompletionRules, LeagueId, Match, MatchId, MatchStage, MatchStatus, Player, PlayerId,
    PlayerStats, Registration, RegistrationStatus, Season, SeasonId, SeasonKey, SeasonPhase,
};
use crate::errors::{EngineError, EngineResult};
use crate::playoffs::Bracket;
use crate::standings::{compute_standings, StandingsEntry};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSeason {
    pub league_id: LeagueId,
    pub season_id: SeasonId,
    pub name: String,
    pub k_factor: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewRegistration {
    pub player_id: PlayerId,
    pub rating: Option<i32>,
    pub status: Option<RegistrationStatus>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchFilter {
    pub stage: Option<MatchStage>,
    pub round: Option<u32>,
    pub status: Option<MatchStatus>,
}

impl MatchFilter {
    fn accepts(&self, m: &Match) -> bool {
        self.stage.is_none_or(|s| s == m.stage)
            && self.round.is_none_or(|r| r == m.round_number)
            && self.status.is_none_or(|s| s == m.status)
    }
}

/// A completed match together with both updated registrations.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchOutcome {
    #[serde(rename = "match")]
    pub game: Match,
    pub registrations: Vec<Registration>,
    /// Playoff matches created because this result completed a bracket round
    pub new_matches: Vec<Match>,
}

/// Process-wide registry of per-season locks.
#[derive(Default)]
struct SeasonLocks {
    inner: Mutex<HashMap<SeasonKey, Arc<Mutex<()>>>>,
}

impl SeasonLocks {
    fn for_season(&self, key: SeasonKey) -> Arc<Mutex<()>> {
        let mut map = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        map.entry(key).or_default().clone()
    }
}

/// The season pairing and ranking engine.
///
/// Every mutation runs in one immediate SQLite transaction while holding the
/// season's lock, and bumps the season's version token on commit.
pub struct LeagueEngine {
    pub(crate) pool: DbPool,
    pub(crate) settings: LeagueSettings,
    locks: SeasonLocks,
}

impl LeagueEngine {
    pub fn new(pool: DbPool, settings: LeagueSettings) -> Self {
        Self {
            pool,
            settings,
            locks: SeasonLocks::default(),
        }
    }

    pub fn settings(&self) -> &LeagueSettings {
        &self.settings
    }

    pub(crate) fn now() -> NaiveDateTime {
        Utc::now().naive_utc()
    }

    pub(crate) fn today() -> NaiveDate {
        Utc::now().date_naive()
    }

    pub(crate) fn round_deadline(&self) -> NaiveDate {
        Self::today() + Duration::days(self.settings.round_length_days)
    }

    pub(crate) fn rules(&self, season: &Season) -> CompletionRules {
        CompletionRules {
            elo: self.settings.elo_params(season.k_factor),
            points: self.settings.points(),
            tiers: self.settings.tiers(),
        }
    }

    /// Runs `f` inside the season's critical section.
    ///
    /// `expected_version`, when given, must match the stored season version
    /// or the call fails with `Conflict` before anything is read.
    pub(crate) fn with_season_tx<T>(
        &self,
        key: SeasonKey,
        expected_version: Option<i64>,
        operation: &str,
        f: impl FnOnce(&Transaction<'_>, &Season) -> EngineResult<T>,
    ) -> EngineResult<T> {
        let lock = self.locks.for_season(key);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let mut conn = database::get_connection(&self.pool)?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let season = seasons::find_season(&tx, key)?
            .ok_or_else(|| EngineError::not_found("Season", key))?;
        let conflict = EngineError::Conflict {
            league_id: key.league_id,
            season_id: key.season_id,
        };
        if expected_version.is_some_and(|v| v != season.version) {
            warn!("{} for {} rejected: stale version", operation, key);
            return Err(conflict);
        }

        let value = f(&tx, &season).inspect_err(|e| {
            warn!("{} for {} rejected: {}", operation, key, e);
        })?;

        if !seasons::bump_version(&tx, key, season.version)? {
            return Err(conflict);
        }
        tx.commit()?;
        Ok(value)
    }

    /// Runs a read-only query on a pooled connection.
    pub(crate) fn read<T>(
        &self,
        f: impl FnOnce(&rusqlite::Connection) -> EngineResult<T>,
    ) -> EngineResult<T> {
        let conn = database::get_connection(&self.pool)?;
        f(&conn)
    }

    /// Finds which season a match belongs to, so the right lock can be taken.
    pub(crate) fn season_of_match(&self, match_id: MatchId) -> EngineResult<SeasonKey> {
        self.read(|conn| {
            matches::find_match(conn, match_id)?
                .map(|m| m.season_key())
                .ok_or_else(|| EngineError::not_found("Match", match_id))
        })
    }

    pub fn create_season(&self, req: NewSeason) -> EngineResult<Season> {
        let key = SeasonKey::new(req.league_id, req.season_id);
        let name = req.name.trim();
        if name.is_empty() {
            return Err(EngineError::validation("Season name must not be empty"));
        }
        let k_factor = req.k_factor.unwrap_or(self.settings.k_factor);
        if !(k_factor.is_finite() && k_factor > 0.0) {
            return Err(EngineError::validation(format!(
                "K-factor must be positive, got {}",
                k_factor
            )));
        }

        let mut conn = database::get_connection(&self.pool)?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        if seasons::find_season(&tx, key)?.is_some() {
            return Err(EngineError::conflict(format!("{} already exists", key)));
        }
        let season = seasons::insert_season(
            &tx,
            &Season {
                league_id: key.league_id,
                season_id: key.season_id,
                name: name.to_string(),
                phase: SeasonPhase::RegistrationOpen,
                k_factor,
                version: 0,
            },
        )?;
        tx.commit()?;

        info!("Created {} '{}' with K={}", key, season.name, k_factor);
        Ok(season)
    }

    pub fn add_player(&self, name: &str, email: &str) -> EngineResult<Player> {
        let name = name.trim();
        let email = email.trim();
        if name.is_empty() {
            return Err(EngineError::validation("Player name must not be empty"));
        }
        if !is_plausible_email(email) {
            return Err(EngineError::validation(format!(
                "'{}' is not a valid email address",
                email
            )));
        }

        let mut conn = database::get_connection(&self.pool)?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        if players::find_by_email(&tx, email)?.is_some() {
            return Err(EngineError::conflict(format!(
                "A player with email {} already exists",
                email
            )));
        }
        let player = players::insert_player(&tx, name, email)?;
        tx.commit()?;

        info!("Added player {} ({})", player.id, player.email);
        Ok(player)
    }

    pub fn register_player(&self, key: SeasonKey, req: NewRegistration) -> EngineResult<Registration> {
        let rating = req.rating.unwrap_or(self.settings.initial_rating);
        if rating <= 0 {
            return Err(EngineError::validation(format!(
                "Rating must be positive, got {}",
                rating
            )));
        }

        self.with_season_tx(key, None, "register_player", |tx, season| {
            let default_status = match season.phase {
                SeasonPhase::RegistrationOpen => RegistrationStatus::Confirmed,
                SeasonPhase::RegularSeason => RegistrationStatus::Active,
                SeasonPhase::Playoffs | SeasonPhase::Completed => {
                    return Err(EngineError::conflict(format!(
                        "Cannot register players: {} is in phase {}",
                        key, season.phase
                    )));
                }
            };
            if players::find_by_id(tx, req.player_id)?.is_none() {
                return Err(EngineError::not_found("Player", req.player_id));
            }
            if registrations::find_registration(tx, key, req.player_id)?.is_some() {
                return Err(EngineError::conflict(format!(
                    "Player {} is already registered for {}",
                    req.player_id, key
                )));
            }

            let reg = registrations::insert_registration(
                tx,
                &Registration {
                    player_id: req.player_id,
                    league_id: key.league_id,
                    season_id: key.season_id,
                    status: req.status.unwrap_or(default_status),
                    tier: self.settings.tiers().tier_for(rating),
                    rating,
                    stats: PlayerStats::default(),
                    playoff_stats: PlayerStats::default(),
                    postponements_remaining: self.settings.postponement_credits,
                    version: 0,
                },
            )?;
            info!(
                "Registered player {} for {} at {} ({})",
                reg.player_id, key, reg.rating, reg.tier
            );
            Ok(reg)
        })
    }

    pub fn set_registration_status(
        &self,
        key: SeasonKey,
        player_id: PlayerId,
        status: RegistrationStatus,
    ) -> EngineResult<Registration> {
        self.with_season_tx(key, None, "set_registration_status", |tx, _| {
            let mut reg = registrations::find_registration(tx, key, player_id)?
                .ok_or_else(|| EngineError::not_found("Registration", player_id))?;
            reg.status = status;
            store_registration(tx, &reg, key)?;
            reg.version += 1;
            info!("Player {} in {} is now {}", player_id, key, status);
            Ok(reg)
        })
    }

    /// Opens the regular season: confirmed registrations become active.
    pub fn start_season(&self, key: SeasonKey) -> EngineResult<Season> {
        self.with_season_tx(key, None, "start_season", |tx, season| {
            if season.phase != SeasonPhase::RegistrationOpen {
                return Err(EngineError::conflict(format!(
                    "{} has already started (phase {})",
                    key, season.phase
                )));
            }
            let mut active = 0;
            for mut reg in registrations::list_for_season(tx, key)? {
                match reg.status {
                    RegistrationStatus::Confirmed => {
                        reg.status = RegistrationStatus::Active;
                        store_registration(tx, &reg, key)?;
                        active += 1;
                    }
                    RegistrationStatus::Active => active += 1,
                    _ => {}
                }
            }
            if active < 2 {
                return Err(EngineError::conflict(format!(
                    "{} needs at least two confirmed players to start",
                    key
                )));
            }
            seasons::update_phase(tx, key, SeasonPhase::RegularSeason)?;
            info!("Started {} with {} active players", key, active);

            let mut season = season.clone();
            season.phase = SeasonPhase::RegularSeason;
            season.version += 1;
            Ok(season)
        })
    }

    pub fn get_season(&self, key: SeasonKey) -> EngineResult<Season> {
        self.read(|conn| {
            seasons::find_season(conn, key)?.ok_or_else(|| EngineError::not_found("Season", key))
        })
    }

    pub fn list_seasons(&self) -> EngineResult<Vec<Season>> {
        self.read(|conn| Ok(seasons::list_all(conn)?))
    }

    pub fn list_players(&self) -> EngineResult<Vec<Player>> {
        self.read(|conn| Ok(players::list_all(conn)?))
    }

    pub fn list_registrations(&self, key: SeasonKey) -> EngineResult<Vec<Registration>> {
        self.read(|conn| {
            ensure_season(conn, key)?;
            Ok(registrations::list_for_season(conn, key)?)
        })
    }

    /// Standings over every registrant that took part in the regular season.
    pub fn get_standings(&self, key: SeasonKey) -> EngineResult<Vec<StandingsEntry>> {
        self.read(|conn| standings_for(conn, key, &self.settings))
    }

    pub fn list_matches(&self, key: SeasonKey, filter: MatchFilter) -> EngineResult<Vec<Match>> {
        self.read(|conn| {
            ensure_season(conn, key)?;
            Ok(matches::list_for_season(conn, key)?
                .into_iter()
                .filter(|m| filter.accepts(m))
                .collect())
        })
    }

    pub fn get_match(&self, match_id: MatchId) -> EngineResult<Match> {
        self.read(|conn| {
            matches::find_match(conn, match_id)?
                .ok_or_else(|| EngineError::not_found("Match", match_id))
        })
    }

    pub fn get_brackets(&self, key: SeasonKey) -> EngineResult<Vec<Bracket>> {
        self.read(|conn| {
            ensure_season(conn, key)?;
            Ok(database::brackets::list_for_season(conn, key)?)
        })
    }

    pub fn rating_history(&self, key: SeasonKey, player_id: PlayerId) -> EngineResult<Vec<RatingChange>> {
        self.read(|conn| {
            registrations::find_registration(conn, key, player_id)?
                .ok_or_else(|| EngineError::not_found("Registration", player_id))?;
            Ok(rating_history::list_for_player(conn, key, player_id)?)
        })
    }
}

fn is_plausible_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => !local.is_empty() && domain.contains('.') && !domain.starts_with('.'),
        None => false,
    }
}

pub(crate) fn ensure_season(conn: &rusqlite::Connection, key: SeasonKey) -> EngineResult<Season> {
    seasons::find_season(conn, key)?.ok_or_else(|| EngineError::not_found("Season", key))
}

/// Writes a registration back, mapping a version mismatch to `Conflict`.
pub(crate) fn store_registration(
    conn: &rusqlite::Connection,
    reg: &Registration,
    key: SeasonKey,
) -> EngineResult<()> {
    if registrations::update_registration(conn, reg)? {
        Ok(())
    } else {
        Err(EngineError::Conflict {
            league_id: key.league_id,
            season_id: key.season_id,
        })
    }
}

/// Writes a match back if it is still in `expected` status.
pub(crate) fn store_match(conn: &rusqlite::Connection, m: &Match, expected: MatchStatus) -> EngineResult<()> {
    if matches::update_match(conn, m, expected)? {
        Ok(())
    } else {
        Err(EngineError::conflict(format!(
            "Match {} changed while it was being updated",
            m.id
        )))
    }
}

pub(crate) fn load_registration(
    conn: &rusqlite::Connection,
    key: SeasonKey,
    player_id: PlayerId,
) -> EngineResult<Registration> {
    registrations::find_registration(conn, key, player_id)?.ok_or_else(|| {
        EngineError::not_found("Registration", format!("{} in {}", player_id, key))
    })
}

/// Appends one history row per player whose rating moved.
pub(crate) fn record_rating_changes(
    conn: &rusqlite::Connection,
    m: &Match,
    before: &[&Registration],
    after: &[&Registration],
    at: NaiveDateTime,
) -> EngineResult<()> {
    for (old, new) in before.iter().zip(after) {
        rating_history::insert_change(
            conn,
            &RatingChange {
                league_id: m.league_id,
                season_id: m.season_id,
                player_id: new.player_id,
                match_id: m.id,
                rating_before: old.rating,
                rating_after: new.rating,
                delta: new.rating - old.rating,
                recorded_at: at,
            },
        )?;
    }
    Ok(())
}

pub(crate) fn standings_for(
    conn: &rusqlite::Connection,
    key: SeasonKey,
    settings: &LeagueSettings,
) -> EngineResult<Vec<StandingsEntry>> {
    ensure_season(conn, key)?;
    let regs: Vec<Registration> = registrations::list_for_season(conn, key)?
        .into_iter()
        .filter(|r| {
            matches!(
                r.status,
                RegistrationStatus::Active | RegistrationStatus::Confirmed | RegistrationStatus::Completed
            )
        })
        .collect();
    let history = matches::list_for_season(conn, key)?;
    Ok(compute_standings(&history, &regs, &settings.points()))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn test_engine() -> LeagueEngine {
        let pool = database::create_memory_pool().unwrap();
        {
            let conn = database::get_connection(&pool).unwrap();
            database::initialize_database(&conn).unwrap();
        }
        LeagueEngine::new(pool, LeagueSettings::default())
    }

    /// A season in registration with `n` confirmed players rated 1500, 1490, ...
    pub(crate) fn seeded_season(engine: &LeagueEngine, n: usize) -> (SeasonKey, Vec<PlayerId>) {
        let key = SeasonKey::new(1, 2026);
        engine
            .create_season(NewSeason {
                league_id: 1,
                season_id: 2026,
                name: "Spring".to_string(),
                k_factor: None,
            })
            .unwrap();
        let ids = (0..n)
            .map(|i| {
                let player = engine
                    .add_player(&format!("Player {}", i + 1), &format!("p{}@club.test", i + 1))
                    .unwrap();
                engine
                    .register_player(
                        key,
                        NewRegistration {
                            player_id: player.id,
                            rating: Some(1500 - i as i32 * 10),
                            status: None,
                        },
                    )
                    .unwrap();
                player.id
            })
            .collect();
        (key, ids)
    }

    #[test]
    fn test_create_season_rejects_duplicates() {
        let engine = test_engine();
        let req = NewSeason {
            league_id: 3,
            season_id: 1,
            name: "Autumn".to_string(),
            k_factor: Some(24.0),
        };
        let season = engine.create_season(req.clone()).unwrap();
        assert_eq!(season.phase, SeasonPhase::RegistrationOpen);
        assert_eq!(season.k_factor, 24.0);
        assert!(matches!(
            engine.create_season(req),
            Err(EngineError::StateConflict(_))
        ));
    }

    #[test]
    fn test_add_player_validates_email() {
        let engine = test_engine();
        assert!(matches!(
            engine.add_player("Ann", "not-an-email"),
            Err(EngineError::Validation(_))
        ));
        engine.add_player("Ann", "ann@club.test").unwrap();
        assert!(matches!(
            engine.add_player("Ann Again", "ANN@club.test"),
            Err(EngineError::StateConflict(_))
        ));
    }

    #[test]
    fn test_registration_defaults() {
        let engine = test_engine();
        let (key, ids) = seeded_season(&engine, 2);
        let regs = engine.list_registrations(key).unwrap();
        assert_eq!(regs.len(), 2);
        let first = regs.iter().find(|r| r.player_id == ids[0]).unwrap();
        assert_eq!(first.status, RegistrationStatus::Confirmed);
        assert_eq!(first.postponements_remaining, 3);
        assert_eq!(first.tier, crate::domain::SkillTier::Gold);

        let err = engine
            .register_player(
                key,
                NewRegistration {
                    player_id: ids[0],
                    rating: None,
                    status: None,
                },
            )
            .unwrap_err();
        assert!(matches!(err, EngineError::StateConflict(_)));
    }

    #[test]
    fn test_unknown_season_is_not_found() {
        let engine = test_engine();
        let err = engine.get_standings(SeasonKey::new(9, 9)).unwrap_err();
        assert!(matches!(err, EngineError::NotFound { .. }));
    }

    #[test]
    fn test_start_season_activates_confirmed_players() {
        let engine = test_engine();
        let (key, ids) = seeded_season(&engine, 3);
        engine
            .set_registration_status(key, ids[2], RegistrationStatus::Pending)
            .unwrap();
        let season = engine.start_season(key).unwrap();
        assert_eq!(season.phase, SeasonPhase::RegularSeason);

        let regs = engine.list_registrations(key).unwrap();
        let active = regs
            .iter()
            .filter(|r| r.status == RegistrationStatus::Active)
            .count();
        assert_eq!(active, 2);
        assert!(matches!(
            engine.start_season(key),
            Err(EngineError::StateConflict(_))
        ));
    }

    #[test]
    fn test_start_season_needs_two_players() {
        let engine = test_engine();
        let (key, _) = seeded_season(&engine, 1);
        assert!(matches!(
            engine.start_season(key),
            Err(EngineError::StateConflict(_))
        ));
        assert_eq!(
            engine.get_season(key).unwrap().phase,
            SeasonPhase::RegistrationOpen
        );
    }

    #[test]
    fn test_stale_version_is_a_conflict() {
        let engine = test_engine();
        let (key, _) = seeded_season(&engine, 2);
        let version = engine.get_season(key).unwrap().version;
        engine.start_season(key).unwrap();
        let err = engine
            .with_season_tx(key, Some(version), "noop", |_, _| Ok(()))
            .unwrap_err();
        assert!(matches!(err, EngineError::Conflict { .. }));
    }

    #[test]
    fn test_each_mutation_bumps_version() {
        let engine = test_engine();
        let (key, _) = seeded_season(&engine, 2);
        let before = engine.get_season(key).unwrap().version;
        engine.start_season(key).unwrap();
        assert_eq!(engine.get_season(key).unwrap().version, before + 1);
    }
}
