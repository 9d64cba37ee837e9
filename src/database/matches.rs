use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};

use super::models::{optional_json_column, text_column, NewMatch};
use crate::domain::{
    EloDeltas, Match, MatchId, MatchResult, MatchStage, MatchStatus, Schedule, SeasonKey,
};

const MATCH_COLUMNS: &str = "id, league_id, season_id, round_number, stage, bracket_name, first_player_id, second_player_id, status, scheduled_at, deadline, venue, court, sets, winner_id, walkover, first_elo_delta, second_elo_delta, rematch, imported, completed_at";

pub fn insert_match(conn: &Connection, new: &NewMatch) -> Result<Match> {
    let sql = format!(
        "INSERT INTO matches (league_id, season_id, round_number, stage, bracket_name, first_player_id, second_player_id, status, deadline, rematch, imported) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11) RETURNING {}",
        MATCH_COLUMNS
    );

    conn.query_row(
        &sql,
        params![
            new.key.league_id,
            new.key.season_id,
            new.round_number,
            new.stage.as_str(),
            new.bracket_name,
            new.first_player_id,
            new.second_player_id,
            MatchStatus::Scheduled.as_str(),
            new.deadline,
            new.rematch,
            new.imported
        ],
        parse_match_row,
    )
    .context("Failed to insert match")
}

pub fn find_match(conn: &Connection, id: MatchId) -> Result<Option<Match>> {
    let sql = format!("SELECT {} FROM matches WHERE id = ?1", MATCH_COLUMNS);

    conn.query_row(&sql, params![id], parse_match_row)
        .optional()
        .context("Failed to query match by id")
}

pub fn list_for_season(conn: &Connection, key: SeasonKey) -> Result<Vec<Match>> {
    let sql = format!(
        "SELECT {} FROM matches WHERE league_id = ?1 AND season_id = ?2 ORDER BY stage DESC, round_number, id",
        MATCH_COLUMNS
    );

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params![key.league_id, key.season_id], parse_match_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(rows)
}

pub fn list_for_round(
    conn: &Connection,
    key: SeasonKey,
    stage: MatchStage,
    round_number: u32,
) -> Result<Vec<Match>> {
    let sql = format!(
        "SELECT {} FROM matches WHERE league_id = ?1 AND season_id = ?2 AND stage = ?3 AND round_number = ?4 ORDER BY id",
        MATCH_COLUMNS
    );

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(
            params![key.league_id, key.season_id, stage.as_str(), round_number],
            parse_match_row,
        )?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(rows)
}

/// Writes back a match that was read while in `expected` status. Returns
/// false when the stored status no longer matches, so a result can never be
/// applied twice.
pub fn update_match(conn: &Connection, m: &Match, expected: MatchStatus) -> Result<bool> {
    let sql = "UPDATE matches SET first_player_id = ?1, second_player_id = ?2, status = ?3, scheduled_at = ?4, deadline = ?5, venue = ?6, court = ?7, sets = ?8, winner_id = ?9, walkover = ?10, first_elo_delta = ?11, second_elo_delta = ?12, rematch = ?13, completed_at = ?14 WHERE id = ?15 AND status = ?16";

    let sets = m
        .result
        .as_ref()
        .map(|r| serde_json::to_string(&r.sets))
        .transpose()?;

    let changed = conn
        .execute(
            sql,
            params![
                m.first_player_id,
                m.second_player_id,
                m.status.as_str(),
                m.schedule.scheduled_at,
                m.schedule.deadline,
                m.schedule.venue,
                m.schedule.court,
                sets,
                m.result.as_ref().map(|r| r.winner_id),
                m.result.as_ref().is_some_and(|r| r.walkover),
                m.elo_deltas.map(|d| d.first),
                m.elo_deltas.map(|d| d.second),
                m.rematch,
                m.completed_at,
                m.id,
                expected.as_str()
            ],
        )
        .with_context(|| format!("Failed to update match {}", m.id))?;
    Ok(changed == 1)
}

pub fn delete_match(conn: &Connection, id: MatchId) -> Result<bool> {
    let changed = conn
        .execute("DELETE FROM matches WHERE id = ?1", params![id])
        .with_context(|| format!("Failed to delete match {}", id))?;
    Ok(changed == 1)
}

fn parse_match_row(row: &rusqlite::Row) -> rusqlite::Result<Match> {
    let winner_id: Option<i64> = row.get(14)?;
    let result = match winner_id {
        Some(winner_id) => Some(MatchResult {
            sets: optional_json_column(row, 13)?.unwrap_or_default(),
            winner_id,
            walkover: row.get(15)?,
        }),
        None => None,
    };

    let first_delta: Option<i32> = row.get(16)?;
    let second_delta: Option<i32> = row.get(17)?;
    let elo_deltas = match (first_delta, second_delta) {
        (Some(first), Some(second)) => Some(EloDeltas { first, second }),
        _ => None,
    };

    Ok(Match {
        id: row.get(0)?,
        league_id: row.get(1)?,
        season_id: row.get(2)?,
        round_number: row.get(3)?,
        stage: text_column(row, 4)?,
        bracket_name: row.get(5)?,
        first_player_id: row.get(6)?,
        second_player_id: row.get(7)?,
        status: text_column(row, 8)?,
        schedule: Schedule {
            scheduled_at: row.get(9)?,
            deadline: row.get(10)?,
            venue: row.get(11)?,
            court: row.get(12)?,
        },
        result,
        elo_deltas,
        rematch: row.get(18)?,
        imported: row.get(19)?,
        completed_at: row.get(20)?,
    })
}
