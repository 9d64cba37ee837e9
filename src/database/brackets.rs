use anyhow::{Context, Result};
use rusqlite::{params, Connection};

use super::models::json_column;
use crate::domain::SeasonKey;
use crate::playoffs::Bracket;

/// Inserts or replaces a bracket; `position` keeps A before B on reads.
pub fn save_bracket(conn: &Connection, key: SeasonKey, position: usize, bracket: &Bracket) -> Result<()> {
    let sql = "INSERT INTO brackets (league_id, season_id, name, position, data) VALUES (?1, ?2, ?3, ?4, ?5) ON CONFLICT (league_id, season_id, name) DO UPDATE SET position = excluded.position, data = excluded.data, updated_at = CURRENT_TIMESTAMP";

    conn.execute(
        sql,
        params![
            key.league_id,
            key.season_id,
            bracket.name,
            position as i64,
            serde_json::to_string(bracket)?
        ],
    )
    .with_context(|| format!("Failed to save bracket {}", bracket.name))?;
    Ok(())
}

pub fn list_for_season(conn: &Connection, key: SeasonKey) -> Result<Vec<Bracket>> {
    let sql = "SELECT data FROM brackets WHERE league_id = ?1 AND season_id = ?2 ORDER BY position";

    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params![key.league_id, key.season_id], |row| json_column(row, 0))?
        .collect::<rusqlite::Result<Vec<Bracket>>>()?;

    Ok(rows)
}
