use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};

use super::models::{json_column, text_column};
use crate::domain::{PlayerId, Registration, SeasonKey};

const REGISTRATION_COLUMNS: &str = "player_id, league_id, season_id, status, tier, rating, stats, playoff_stats, postponements_remaining, version";

pub fn insert_registration(conn: &Connection, reg: &Registration) -> Result<Registration> {
    let sql = format!(
        "INSERT INTO registrations (player_id, league_id, season_id, status, tier, rating, stats, playoff_stats, postponements_remaining) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9) RETURNING {}",
        REGISTRATION_COLUMNS
    );

    conn.query_row(
        &sql,
        params![
            reg.player_id,
            reg.league_id,
            reg.season_id,
            reg.status.as_str(),
            reg.tier.as_str(),
            reg.rating,
            serde_json::to_string(&reg.stats)?,
            serde_json::to_string(&reg.playoff_stats)?,
            reg.postponements_remaining
        ],
        parse_registration_row,
    )
    .with_context(|| format!("Failed to register player {}", reg.player_id))
}

pub fn find_registration(
    conn: &Connection,
    key: SeasonKey,
    player_id: PlayerId,
) -> Result<Option<Registration>> {
    let sql = format!(
        "SELECT {} FROM registrations WHERE league_id = ?1 AND season_id = ?2 AND player_id = ?3",
        REGISTRATION_COLUMNS
    );

    conn.query_row(
        &sql,
        params![key.league_id, key.season_id, player_id],
        parse_registration_row,
    )
    .optional()
    .context("Failed to query registration")
}

pub fn list_for_season(conn: &Connection, key: SeasonKey) -> Result<Vec<Registration>> {
    let sql = format!(
        "SELECT {} FROM registrations WHERE league_id = ?1 AND season_id = ?2 ORDER BY player_id",
        REGISTRATION_COLUMNS
    );

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params![key.league_id, key.season_id], parse_registration_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(rows)
}

/// Writes back a registration read at `reg.version`. Returns false when the
/// row changed in between.
pub fn update_registration(conn: &Connection, reg: &Registration) -> Result<bool> {
    let sql = "UPDATE registrations SET status = ?1, tier = ?2, rating = ?3, stats = ?4, playoff_stats = ?5, postponements_remaining = ?6, version = version + 1 WHERE league_id = ?7 AND season_id = ?8 AND player_id = ?9 AND version = ?10";

    let changed = conn
        .execute(
            sql,
            params![
                reg.status.as_str(),
                reg.tier.as_str(),
                reg.rating,
                serde_json::to_string(&reg.stats)?,
                serde_json::to_string(&reg.playoff_stats)?,
                reg.postponements_remaining,
                reg.league_id,
                reg.season_id,
                reg.player_id,
                reg.version
            ],
        )
        .with_context(|| format!("Failed to update registration of player {}", reg.player_id))?;
    Ok(changed == 1)
}

fn parse_registration_row(row: &rusqlite::Row) -> rusqlite::Result<Registration> {
    Ok(Registration {
        player_id: row.get(0)?,
        league_id: row.get(1)?,
        season_id: row.get(2)?,
        status: text_column(row, 3)?,
        tier: text_column(row, 4)?,
        rating: row.get(5)?,
        stats: json_column(row, 6)?,
        playoff_stats: json_column(row, 7)?,
        postponements_remaining: row.get(8)?,
        version: row.get(9)?,
    })
}
