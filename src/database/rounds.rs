use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};

use crate::domain::{Round, SeasonKey};

pub fn insert_round(conn: &Connection, round: &Round) -> Result<()> {
    let sql = "INSERT INTO rounds (league_id, season_id, number, deadline) VALUES (?1, ?2, ?3, ?4)";

    conn.execute(
        sql,
        params![round.league_id, round.season_id, round.number, round.deadline],
    )
    .with_context(|| format!("Failed to insert round {}", round.number))?;
    Ok(())
}

pub fn latest_round(conn: &Connection, key: SeasonKey) -> Result<Option<Round>> {
    let sql = "SELECT league_id, season_id, number, deadline FROM rounds WHERE league_id = ?1 AND season_id = ?2 ORDER BY number DESC LIMIT 1";

    conn.query_row(sql, params![key.league_id, key.season_id], parse_round_row)
        .optional()
        .context("Failed to query latest round")
}

pub fn list_for_season(conn: &Connection, key: SeasonKey) -> Result<Vec<Round>> {
    let sql = "SELECT league_id, season_id, number, deadline FROM rounds WHERE league_id = ?1 AND season_id = ?2 ORDER BY number";

    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params![key.league_id, key.season_id], parse_round_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(rows)
}

fn parse_round_row(row: &rusqlite::Row) -> rusqlite::Result<Round> {
    Ok(Round {
        league_id: row.get(0)?,
        season_id: row.get(1)?,
        number: row.get(2)?,
        deadline: row.get(3)?,
    })
}
