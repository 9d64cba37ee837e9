use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};

use super::models::text_column;
use crate::domain::{Season, SeasonKey, SeasonPhase};

const SEASON_COLUMNS: &str = "league_id, season_id, name, phase, k_factor, version";

pub fn insert_season(conn: &Connection, season: &Season) -> Result<Season> {
    let sql = format!(
        "INSERT INTO seasons (league_id, season_id, name, phase, k_factor) VALUES (?1, ?2, ?3, ?4, ?5) RETURNING {}",
        SEASON_COLUMNS
    );

    conn.query_row(
        &sql,
        params![
            season.league_id,
            season.season_id,
            season.name,
            season.phase.as_str(),
            season.k_factor
        ],
        parse_season_row,
    )
    .context("Failed to insert season")
}

pub fn find_season(conn: &Connection, key: SeasonKey) -> Result<Option<Season>> {
    let sql = format!(
        "SELECT {} FROM seasons WHERE league_id = ?1 AND season_id = ?2",
        SEASON_COLUMNS
    );

    conn.query_row(&sql, params![key.league_id, key.season_id], parse_season_row)
        .optional()
        .context("Failed to query season")
}

pub fn list_all(conn: &Connection) -> Result<Vec<Season>> {
    let sql = format!(
        "SELECT {} FROM seasons ORDER BY league_id, season_id",
        SEASON_COLUMNS
    );

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([], parse_season_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(rows)
}

/// Advances the season's concurrency token. Returns false when `expected`
/// is stale, i.e. someone else committed a mutation first.
pub fn bump_version(conn: &Connection, key: SeasonKey, expected: i64) -> Result<bool> {
    let sql = "UPDATE seasons SET version = version + 1 WHERE league_id = ?1 AND season_id = ?2 AND version = ?3";

    let changed = conn
        .execute(sql, params![key.league_id, key.season_id, expected])
        .context("Failed to bump season version")?;
    Ok(changed == 1)
}

pub fn update_phase(conn: &Connection, key: SeasonKey, phase: SeasonPhase) -> Result<()> {
    let sql = "UPDATE seasons SET phase = ?1 WHERE league_id = ?2 AND season_id = ?3";

    conn.execute(sql, params![phase.as_str(), key.league_id, key.season_id])
        .context("Failed to update season phase")?;
    Ok(())
}

fn parse_season_row(row: &rusqlite::Row) -> rusqlite::Result<Season> {
    Ok(Season {
        league_id: row.get(0)?,
        season_id: row.get(1)?,
        name: row.get(2)?,
        phase: text_column(row, 3)?,
        k_factor: row.get(4)?,
        version: row.get(5)?,
    })
}
