//! Bulk match import from CSV.
//!
//! Expected columns (header names are matched case-insensitively, spaces
//! ignored): `Round`, `Player1 Email`, `Player2 Email`, and optionally
//! `Status`, `Score`, `Player1 ELO Change`, `Player2 ELO Change`.
//!
//! Rows are independent: a bad row is reported and skipped, the others are
//! applied. A missing required column rejects the whole file.

use chrono::NaiveDateTime;
use csv::{ReaderBuilder, StringRecord, Trim};
use log::{debug, info};
use rusqlite::Connection;
use serde::Serialize;
use std::io::Read;

use super::engine::{
    load_registration, record_rating_changes, store_match, store_registration, LeagueEngine,
};
use super::rounds::ensure_free_in_round;
use crate::database::{matches, players, rounds, NewMatch};
use crate::domain::scores::{parse_score, validate_sets};
use crate::domain::{
    lifecycle, CompletionRules, EloDeltas, Match, MatchStage, MatchStatus, PlayerId,
    ResultSubmission, Round, SeasonKey, SeasonPhase, SetScore,
};
use crate::errors::{row_context, EngineError, EngineResult};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RowError {
    /// 1-based data row, header excluded
    pub row: usize,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportReport {
    pub created: usize,
    pub updated: usize,
    pub errors: Vec<RowError>,
}

#[derive(Debug, Clone, Copy)]
struct Columns {
    round: usize,
    player1: usize,
    player2: usize,
    status: Option<usize>,
    score: Option<usize>,
    player1_elo: Option<usize>,
    player2_elo: Option<usize>,
}

fn normalize(header: &str) -> String {
    header
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '_')
        .flat_map(char::to_lowercase)
        .collect()
}

impl Columns {
    fn from_headers(headers: &StringRecord) -> EngineResult<Self> {
        let find = |name: &str| headers.iter().position(|h| normalize(h) == normalize(name));
        let require = |name: &str| {
            find(name).ok_or_else(|| {
                EngineError::validation(format!("Missing required column '{}'", name))
            })
        };

        Ok(Self {
            round: require("Round")?,
            player1: require("Player1 Email")?,
            player2: require("Player2 Email")?,
            status: find("Status"),
            score: find("Score"),
            player1_elo: find("Player1 ELO Change"),
            player2_elo: find("Player2 ELO Change"),
        })
    }
}

/// One parsed CSV line, validated for shape but not yet resolved against
/// the database.
#[derive(Debug, Clone, PartialEq)]
struct ImportRow {
    round: u32,
    player1: String,
    /// None for a BYE
    player2: Option<String>,
    status: MatchStatus,
    sets: Option<Vec<SetScore>>,
    deltas: Option<EloDeltas>,
}

fn cell<'r>(record: &'r StringRecord, idx: Option<usize>) -> Option<&'r str> {
    idx.and_then(|i| record.get(i))
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

fn parse_delta(raw: Option<&str>, column: &str) -> EngineResult<Option<i32>> {
    raw.map(|v| {
        v.trim_start_matches('+').parse::<i32>().map_err(|_| {
            EngineError::validation(format!("{} '{}' is not a whole number", column, v))
        })
    })
    .transpose()
}

fn parse_row(columns: &Columns, record: &StringRecord) -> EngineResult<ImportRow> {
    let round_raw = cell(record, Some(columns.round))
        .ok_or_else(|| EngineError::validation("Round is empty"))?;
    let round = round_raw
        .parse::<u32>()
        .ok()
        .filter(|n| *n > 0)
        .ok_or_else(|| {
            EngineError::validation(format!("Round '{}' is not a positive number", round_raw))
        })?;

    let player1 = cell(record, Some(columns.player1))
        .ok_or_else(|| EngineError::validation("Player1 Email is empty"))?
        .to_string();
    let player2 = cell(record, Some(columns.player2))
        .filter(|p| !p.eq_ignore_ascii_case("bye"))
        .map(str::to_string);

    let sets = cell(record, columns.score).map(parse_score).transpose()?;
    if let Some(sets) = &sets {
        validate_sets(sets)?;
    }

    let deltas = match (
        parse_delta(cell(record, columns.player1_elo), "Player1 ELO Change")?,
        parse_delta(cell(record, columns.player2_elo), "Player2 ELO Change")?,
    ) {
        (Some(first), Some(second)) => Some(EloDeltas { first, second }),
        (None, None) => None,
        _ => {
            return Err(EngineError::validation(
                "ELO changes must be given for both players or for neither",
            ));
        }
    };

    let status = match cell(record, columns.status) {
        Some(raw) => raw.parse::<MatchStatus>()?,
        None if player2.is_none() || sets.is_some() => MatchStatus::Completed,
        None => MatchStatus::Scheduled,
    };

    if player2.is_some() {
        match (status, &sets) {
            (MatchStatus::Completed, None) => {
                return Err(EngineError::validation("A completed match needs a score"));
            }
            (MatchStatus::Completed, Some(_)) => {}
            (_, Some(_)) => {
                return Err(EngineError::validation(format!(
                    "A {} match cannot carry a score",
                    status
                )));
            }
            (_, None) => {}
        }
    } else if status != MatchStatus::Completed {
        return Err(EngineError::validation("A BYE is always completed"));
    }

    Ok(ImportRow {
        round,
        player1,
        player2,
        status,
        sets,
        deltas,
    })
}

/// Reads every data row. The outer error is a file-level failure; inner
/// errors belong to individual rows.
fn read_rows(data: impl Read) -> EngineResult<Vec<(usize, EngineResult<ImportRow>)>> {
    let mut reader = ReaderBuilder::new()
        .trim(Trim::All)
        .flexible(true)
        .from_reader(data);

    let headers = reader
        .headers()
        .map_err(|e| EngineError::validation(format!("Unreadable CSV header: {}", e)))?
        .clone();
    let columns = Columns::from_headers(&headers)?;

    let mut rows = Vec::new();
    for (idx, record) in reader.records().enumerate() {
        let parsed = record
            .map_err(|e| EngineError::validation(format!("Unreadable CSV row: {}", e)))
            .and_then(|record| parse_row(&columns, &record));
        rows.push((idx + 1, parsed));
    }
    Ok(rows)
}

fn resolve_player(conn: &Connection, key: SeasonKey, email: &str) -> EngineResult<PlayerId> {
    let player = players::find_by_email(conn, email)?
        .ok_or_else(|| EngineError::not_found("Player", email))?;
    load_registration(conn, key, player.id)?;
    Ok(player.id)
}

fn find_existing(
    conn: &Connection,
    key: SeasonKey,
    round: u32,
    first: PlayerId,
    second: Option<PlayerId>,
) -> EngineResult<Option<(Match, bool)>> {
    let existing = matches::list_for_round(conn, key, MatchStage::Regular, round)?;
    Ok(existing.into_iter().find_map(|m| {
        if m.first_player_id == first && m.second_player_id == second {
            Some((m, false))
        } else if second.is_some() && m.second_player_id == Some(first) && Some(m.first_player_id) == second {
            Some((m, true))
        } else {
            None
        }
    }))
}

impl LeagueEngine {
    /// Imports matches from CSV into a season that is in its regular phase.
    pub fn import_matches(&self, key: SeasonKey, data: impl Read) -> EngineResult<ImportReport> {
        let rows = read_rows(data)?;
        self.with_season_tx(key, None, "import_matches", |tx, season| {
            if season.phase != SeasonPhase::RegularSeason {
                return Err(EngineError::conflict(format!(
                    "Cannot import matches: {} is in phase {}",
                    key, season.phase
                )));
            }

            let rules = self.rules(season);
            let now = Self::now();
            let mut report = ImportReport::default();
            for (row, parsed) in rows {
                let applied = parsed.and_then(|r| {
                    tx.execute_batch("SAVEPOINT import_row")?;
                    let outcome = self.apply_row(tx, key, &r, &rules, now);
                    if outcome.is_err() {
                        tx.execute_batch("ROLLBACK TO import_row")?;
                    }
                    tx.execute_batch("RELEASE import_row")?;
                    outcome
                });
                match applied {
                    Ok(true) => report.created += 1,
                    Ok(false) => report.updated += 1,
                    Err(e) => {
                        debug!("Import {} {}: {}", key, row_context(row), e);
                        report.errors.push(RowError {
                            row,
                            reason: e.client_message(),
                        });
                    }
                }
            }

            info!(
                "Imported matches into {}: {} created, {} updated, {} rejected",
                key,
                report.created,
                report.updated,
                report.errors.len()
            );
            Ok(report)
        })
    }

    /// Returns true when a match was created, false when one was updated.
    fn apply_row(
        &self,
        conn: &Connection,
        key: SeasonKey,
        row: &ImportRow,
        rules: &CompletionRules,
        now: NaiveDateTime,
    ) -> EngineResult<bool> {
        let first = resolve_player(conn, key, &row.player1)?;
        let second = row
            .player2
            .as_deref()
            .map(|email| resolve_player(conn, key, email))
            .transpose()?;
        if Some(first) == second {
            return Err(EngineError::validation("A player cannot play against themselves"));
        }

        let known_round = rounds::list_for_season(conn, key)?
            .iter()
            .any(|r| r.number == row.round);
        if !known_round {
            rounds::insert_round(
                conn,
                &Round {
                    league_id: key.league_id,
                    season_id: key.season_id,
                    number: row.round,
                    deadline: self.round_deadline(),
                },
            )?;
        }

        let (mut m, swapped, created) = match find_existing(conn, key, row.round, first, second)? {
            Some((m, _)) if m.status.is_final() => {
                return Err(EngineError::conflict(format!(
                    "Match {} in round {} is already {}",
                    m.id, row.round, m.status
                )));
            }
            Some((m, _)) if m.status == row.status => {
                return Err(EngineError::conflict(format!(
                    "Match {} in round {} already exists",
                    m.id, row.round
                )));
            }
            Some((m, swapped)) => (m, swapped, false),
            None => {
                for player in [Some(first), second].into_iter().flatten() {
                    ensure_free_in_round(conn, key, MatchStage::Regular, row.round, player, None)?;
                }
                let m = matches::insert_match(
                    conn,
                    &NewMatch {
                        key,
                        round_number: row.round,
                        stage: MatchStage::Regular,
                        bracket_name: None,
                        first_player_id: first,
                        second_player_id: second,
                        deadline: self.round_deadline(),
                        rematch: false,
                        imported: true,
                    },
                )?;
                (m, false, true)
            }
        };

        let previous_status = m.status;
        match (row.status, m.second_player_id) {
            (MatchStatus::Completed, None) => {
                let mut reg = load_registration(conn, key, m.first_player_id)?;
                lifecycle::award_bye(&mut m, &mut reg, rules, now)?;
                store_registration(conn, &reg, key)?;
            }
            (MatchStatus::Completed, Some(opponent)) => {
                let mut sets = row.sets.clone().unwrap_or_default();
                let mut deltas = row.deltas;
                if swapped {
                    sets = sets.iter().map(SetScore::swapped).collect();
                    deltas = deltas.map(|d| EloDeltas {
                        first: d.second,
                        second: d.first,
                    });
                }
                let before = [
                    load_registration(conn, key, m.first_player_id)?,
                    load_registration(conn, key, opponent)?,
                ];
                let [mut a, mut b] = before.clone();
                lifecycle::complete(
                    &mut m,
                    &mut a,
                    &mut b,
                    ResultSubmission::Sets(sets),
                    deltas,
                    rules,
                    now,
                )?;
                store_registration(conn, &a, key)?;
                store_registration(conn, &b, key)?;
                record_rating_changes(conn, &m, &[&before[0], &before[1]], &[&a, &b], now)?;
            }
            (MatchStatus::Cancelled, _) => lifecycle::cancel(&mut m)?,
            (MatchStatus::Postponed, _) => m.status = MatchStatus::Postponed,
            (MatchStatus::Scheduled, _) => m.status = MatchStatus::Scheduled,
        }
        store_match(conn, &m, previous_status)?;
        Ok(created)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::engine::tests::{seeded_season, test_engine};

    const HEADER: &str = "Round,Player1 Email,Player2 Email,Status,Score,Player1 ELO Change,Player2 ELO Change\n";

    fn started(n: usize) -> (LeagueEngine, SeasonKey) {
        let engine = test_engine();
        let (key, _) = seeded_season(&engine, n);
        engine.start_season(key).unwrap();
        (engine, key)
    }

    #[test]
    fn test_missing_required_column_rejects_file() {
        let (engine, key) = started(2);
        let csv = "Round,Player1 Email\n1,p1@club.test\n";
        let err = engine.import_matches(key, csv.as_bytes()).unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
        assert!(err.to_string().contains("Player2 Email"));
    }

    #[test]
    fn test_rows_are_applied_independently() {
        let (engine, key) = started(4);
        let csv = format!(
            "{}{}{}{}{}",
            HEADER,
            "1,p1@club.test,p2@club.test,completed,6-4 6-4,,\n",
            "1,p3@club.test,nobody@club.test,,,,\n",
            "1,p3@club.test,p4@club.test,,,,\n",
            "x,p3@club.test,p4@club.test,,,,\n",
        );
        let report = engine.import_matches(key, csv.as_bytes()).unwrap();
        assert_eq!(report.created, 2);
        assert_eq!(report.updated, 0);
        let failed: Vec<usize> = report.errors.iter().map(|e| e.row).collect();
        assert_eq!(failed, vec![2, 4]);

        let all = engine.list_matches(key, Default::default()).unwrap();
        assert_eq!(all.len(), 2);
        assert!(all.iter().all(|m| m.imported));
        assert_eq!(
            all.iter()
                .filter(|m| m.status == MatchStatus::Completed)
                .count(),
            1
        );
    }

    #[test]
    fn test_player_already_in_round_is_rejected() {
        let (engine, key) = started(4);
        let csv = format!(
            "{}{}{}{}{}",
            HEADER,
            "1,p1@club.test,p2@club.test,,,,\n",
            "1,p3@club.test,p1@club.test,,,,\n",
            "1,p2@club.test,BYE,,,,\n",
            "2,p3@club.test,p1@club.test,,,,\n",
        );
        let report = engine.import_matches(key, csv.as_bytes()).unwrap();
        assert_eq!(report.created, 2);
        let failed: Vec<usize> = report.errors.iter().map(|e| e.row).collect();
        assert_eq!(failed, vec![2, 3]);
        assert!(report.errors[0].reason.contains("already plays match"));

        let round_one = engine
            .list_matches(
                key,
                crate::services::MatchFilter {
                    round: Some(1),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(round_one.len(), 1);
    }

    #[test]
    fn test_recorded_elo_changes_are_kept() {
        let (engine, key) = started(2);
        let csv = format!("{}1,p1@club.test,p2@club.test,completed,6-1 6-1,+11,-11\n", HEADER);
        engine.import_matches(key, csv.as_bytes()).unwrap();
        let m = &engine.list_matches(key, Default::default()).unwrap()[0];
        assert_eq!(m.elo_deltas, Some(EloDeltas { first: 11, second: -11 }));
        let regs = engine.list_registrations(key).unwrap();
        assert_eq!(regs[0].rating, 1511);
        assert_eq!(regs[1].rating, 1479);
    }

    #[test]
    fn test_import_completes_existing_match_in_either_order() {
        let (engine, key) = started(2);
        let csv = format!("{}1,p1@club.test,p2@club.test,,,,\n", HEADER);
        let report = engine.import_matches(key, csv.as_bytes()).unwrap();
        assert_eq!(report.created, 1);

        let csv = format!("{}1,p2@club.test,p1@club.test,completed,6-3 6-3,,\n", HEADER);
        let report = engine.import_matches(key, csv.as_bytes()).unwrap();
        assert_eq!(report.updated, 1);
        assert!(report.errors.is_empty());

        let m = &engine.list_matches(key, Default::default()).unwrap()[0];
        let regs = engine.list_registrations(key).unwrap();
        let p2 = regs.iter().find(|r| r.player_id != m.first_player_id).unwrap();
        assert_eq!(m.winner_id(), Some(p2.player_id));
        assert_eq!(m.result.as_ref().unwrap().sets[0], SetScore::new(3, 6));

        let again = engine.import_matches(key, csv.as_bytes()).unwrap();
        assert_eq!(again.errors.len(), 1);
        assert!(again.errors[0].reason.contains("already completed"));
    }

    #[test]
    fn test_bye_rows_and_bad_scores() {
        let (engine, key) = started(3);
        let csv = format!(
            "{}{}{}{}",
            HEADER,
            "1,p3@club.test,BYE,,,,\n",
            "1,p1@club.test,p2@club.test,completed,6-4 4-6,,\n",
            "1,p1@club.test,p2@club.test,,,5,\n",
        );
        let report = engine.import_matches(key, csv.as_bytes()).unwrap();
        assert_eq!(report.created, 1);
        assert_eq!(report.errors.len(), 2);
        let standings = engine.get_standings(key).unwrap();
        assert_eq!(standings[0].byes, 1);
        assert_eq!(standings[0].points, 3);
    }

    #[test]
    fn test_header_names_are_normalized() {
        let columns = Columns::from_headers(&StringRecord::from(vec![
            "round",
            "PLAYER1_EMAIL",
            "player2 email",
            "score",
        ]))
        .unwrap();
        assert_eq!(columns.player1, 1);
        assert_eq!(columns.score, Some(3));
        assert_eq!(columns.status, None);
    }
}
