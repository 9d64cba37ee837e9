use log::info;
use rusqlite::Connection;
use serde::Deserialize;

use super::engine::{standings_for, store_registration, LeagueEngine};
use crate::database::{brackets, matches, registrations, seasons, NewMatch};
use crate::domain::{Match, MatchStage, RegistrationStatus, SeasonKey, SeasonPhase};
use crate::errors::{EngineError, EngineResult};
use crate::playoffs::{build_bracket, Bracket, SplitPolicy};

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildBracket {
    pub qualifier_count: Option<usize>,
    #[serde(default)]
    pub policy: SplitPolicy,
    pub expected_version: Option<i64>,
}

/// Creates stored matches for every bracket slot that became playable.
fn schedule_pending(
    conn: &Connection,
    engine: &LeagueEngine,
    key: SeasonKey,
    bracket: &mut Bracket,
) -> EngineResult<Vec<Match>> {
    let mut created = Vec::new();
    for pending in bracket.pending_matches() {
        let m = matches::insert_match(
            conn,
            &NewMatch {
                key,
                round_number: pending.round_index as u32 + 1,
                stage: MatchStage::Playoff,
                bracket_name: Some(bracket.name.clone()),
                first_player_id: pending.first,
                second_player_id: Some(pending.second),
                deadline: engine.round_deadline(),
                rematch: false,
                imported: false,
            },
        )?;
        bracket.assign_match(pending.round_index, pending.slot, m.id)?;
        created.push(m);
    }
    Ok(created)
}

/// Feeds a completed playoff match into its bracket. Returns the matches of
/// any round that became playable; finishing the last bracket completes the
/// season.
pub(crate) fn advance_playoffs(
    conn: &Connection,
    engine: &LeagueEngine,
    key: SeasonKey,
    m: &Match,
) -> EngineResult<Vec<Match>> {
    let winner = m
        .winner_id()
        .ok_or_else(|| EngineError::conflict(format!("Match {} has no winner yet", m.id)))?;

    let mut all = brackets::list_for_season(conn, key)?;
    let position = all
        .iter()
        .position(|b| b.contains_match(m.id))
        .ok_or_else(|| EngineError::not_found("Bracket for match", m.id))?;

    let bracket = &mut all[position];
    bracket.record_result(m.id, winner)?;
    let created = schedule_pending(conn, engine, key, bracket)?;
    brackets::save_bracket(conn, key, position, bracket)?;

    if all.iter().all(Bracket::is_finished) {
        for mut reg in registrations::list_for_season(conn, key)? {
            if reg.status == RegistrationStatus::Active {
                reg.status = RegistrationStatus::Completed;
                store_registration(conn, &reg, key)?;
            }
        }
        seasons::update_phase(conn, key, SeasonPhase::Completed)?;
        let champions: Vec<String> = all
            .iter()
            .filter_map(|b| b.champion.map(|c| format!("{}: {}", b.name, c)))
            .collect();
        info!("{} completed, champions {}", key, champions.join(", "));
    } else if !created.is_empty() {
        info!(
            "Bracket {} advanced in {}: {} new match(es)",
            all[position].name,
            key,
            created.len()
        );
    }
    Ok(created)
}

impl LeagueEngine {
    /// Seeds the playoff brackets from the final regular-season standings,
    /// stores the playable first-round matches and moves the season into the
    /// playoffs.
    pub fn build_playoff_bracket(&self, key: SeasonKey, req: BuildBracket) -> EngineResult<Vec<Bracket>> {
        self.with_season_tx(key, req.expected_version, "build_playoff_bracket", |tx, season| {
            if season.phase != SeasonPhase::RegularSeason {
                return Err(EngineError::conflict(format!(
                    "Cannot build playoffs: {} is in phase {}",
                    key, season.phase
                )));
            }
            let unfinished = matches::list_for_season(tx, key)?
                .iter()
                .filter(|m| m.stage == MatchStage::Regular && !m.status.is_final())
                .count();
            if unfinished > 0 {
                return Err(EngineError::conflict(format!(
                    "Regular season of {} still has {} unfinished match(es)",
                    key, unfinished
                )));
            }

            let standings = standings_for(tx, key, &self.settings)?;
            let qualifiers = req.qualifier_count.unwrap_or(self.settings.playoff_qualifiers);
            let mut built = build_bracket(&standings, qualifiers, req.policy)?;

            for (position, bracket) in built.iter_mut().enumerate() {
                schedule_pending(tx, self, key, bracket)?;
                brackets::save_bracket(tx, key, position, bracket)?;
            }
            seasons::update_phase(tx, key, SeasonPhase::Playoffs)?;

            info!(
                "Playoffs started for {}: {} bracket(s), {} first-round match(es)",
                key,
                built.len(),
                built
                    .iter()
                    .flat_map(|b| b.rounds.first())
                    .flat_map(|r| r.matches.iter())
                    .filter(|m| m.match_id.is_some())
                    .count()
            );
            Ok(built)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{MatchStatus, ResultSubmission, SetScore};
    use crate::services::engine::tests::{seeded_season, test_engine};
    use crate::services::rounds::GenerateRound;

    fn win() -> ResultSubmission {
        ResultSubmission::Sets(vec![SetScore::new(6, 2), SetScore::new(6, 2)])
    }

    fn regular_season(n: usize) -> (LeagueEngine, SeasonKey) {
        let engine = test_engine();
        let (key, _) = seeded_season(&engine, n);
        engine.start_season(key).unwrap();
        let plan = engine.generate_round(key, GenerateRound::default()).unwrap();
        for m in plan.matches.iter().filter(|m| !m.is_bye()) {
            engine.complete_match(m.id, win(), None).unwrap();
        }
        (engine, key)
    }

    #[test]
    fn test_build_requires_closed_regular_season() {
        let engine = test_engine();
        let (key, _) = seeded_season(&engine, 4);
        engine.start_season(key).unwrap();
        engine.generate_round(key, GenerateRound::default()).unwrap();
        assert!(matches!(
            engine.build_playoff_bracket(key, BuildBracket::default()),
            Err(EngineError::StateConflict(_))
        ));
    }

    #[test]
    fn test_playoffs_run_to_a_champion() {
        let (engine, key) = regular_season(8);
        let standings = engine.get_standings(key).unwrap();
        let top_seed = standings[0].player_id;

        let built = engine
            .build_playoff_bracket(key, BuildBracket::default())
            .unwrap();
        assert_eq!(built.len(), 1);
        assert_eq!(built[0].total_matches(), 7);
        assert_eq!(engine.get_season(key).unwrap().phase, SeasonPhase::Playoffs);

        let filter = crate::services::engine::MatchFilter {
            stage: Some(MatchStage::Playoff),
            ..Default::default()
        };
        let mut played = 0;
        loop {
            let open: Vec<Match> = engine
                .list_matches(key, filter)
                .unwrap()
                .into_iter()
                .filter(|m| m.status == MatchStatus::Scheduled)
                .collect();
            if open.is_empty() {
                break;
            }
            for m in open {
                engine.complete_match(m.id, win(), None).unwrap();
                played += 1;
            }
        }
        assert_eq!(played, 7);

        let brackets = engine.get_brackets(key).unwrap();
        assert_eq!(brackets[0].champion, Some(top_seed));
        assert_eq!(engine.get_season(key).unwrap().phase, SeasonPhase::Completed);

        let regs = engine.list_registrations(key).unwrap();
        let champion = regs.iter().find(|r| r.player_id == top_seed).unwrap();
        assert_eq!(champion.playoff_stats.matches_won, 3);
        assert_eq!(champion.status, RegistrationStatus::Completed);
    }

    #[test]
    fn test_regular_operations_are_closed_during_playoffs() {
        let (engine, key) = regular_season(4);
        engine
            .build_playoff_bracket(key, BuildBracket::default())
            .unwrap();
        assert!(matches!(
            engine.generate_round(key, GenerateRound::default()),
            Err(EngineError::StateConflict(_))
        ));
        assert!(matches!(
            engine.build_playoff_bracket(key, BuildBracket::default()),
            Err(EngineError::StateConflict(_))
        ));
    }

    #[test]
    fn test_split_brackets_are_stored_in_order() {
        let (engine, key) = regular_season(8);
        let req = BuildBracket {
            qualifier_count: Some(8),
            policy: SplitPolicy::Snake { brackets: 2 },
            expected_version: None,
        };
        engine.build_playoff_bracket(key, req).unwrap();
        let stored = engine.get_brackets(key).unwrap();
        let names: Vec<&str> = stored.iter().map(|b| b.name.as_str()).collect();
        assert_eq!(names, vec!["A", "B"]);
        let playoff_matches = engine
            .list_matches(
                key,
                crate::services::engine::MatchFilter {
                    stage: Some(MatchStage::Playoff),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(playoff_matches.len(), 4);
        assert!(playoff_matches.iter().all(|m| m.bracket_name.is_some()));
    }
}
