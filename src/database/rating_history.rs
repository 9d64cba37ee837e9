use anyhow::{Context, Result};
use rusqlite::{params, Connection};

use super::models::RatingChange;
use crate::domain::{PlayerId, SeasonKey};

pub fn insert_change(conn: &Connection, change: &RatingChange) -> Result<()> {
    let sql = "INSERT INTO rating_history (league_id, season_id, player_id, match_id, rating_before, rating_after, delta, recorded_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)";

    conn.execute(
        sql,
        params![
            change.league_id,
            change.season_id,
            change.player_id,
            change.match_id,
            change.rating_before,
            change.rating_after,
            change.delta,
            change.recorded_at
        ],
    )
    .context("Failed to insert rating history entry")?;
    Ok(())
}

pub fn list_for_player(
    conn: &Connection,
    key: SeasonKey,
    player_id: PlayerId,
) -> Result<Vec<RatingChange>> {
    let sql = "SELECT league_id, season_id, player_id, match_id, rating_before, rating_after, delta, recorded_at FROM rating_history WHERE league_id = ?1 AND season_id = ?2 AND player_id = ?3 ORDER BY id";

    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(
            params![key.league_id, key.season_id, player_id],
            parse_change_row,
        )?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(rows)
}

fn parse_change_row(row: &rusqlite::Row) -> rusqlite::Result<RatingChange> {
    Ok(RatingChange {
        league_id: row.get(0)?,
        season_id: row.get(1)?,
        player_id: row.get(2)?,
        match_id: row.get(3)?,
        rating_before: row.get(4)?,
        rating_after: row.get(5)?,
        delta: row.get(6)?,
        recorded_at: row.get(7)?,
    })
}
