use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};

use crate::domain::{Player, PlayerId};

pub fn insert_player(conn: &Connection, name: &str, email: &str) -> Result<Player> {
    let sql = "INSERT INTO players (name, email) VALUES (?1, ?2) RETURNING id, name, email";

    conn.query_row(sql, params![name, email], parse_player_row)
        .context("Failed to insert new player")
}

pub fn find_by_id(conn: &Connection, id: PlayerId) -> Result<Option<Player>> {
    let sql = "SELECT id, name, email FROM players WHERE id = ?1";

    conn.query_row(sql, params![id], parse_player_row)
        .optional()
        .context("Failed to query player by id")
}

pub fn find_by_email(conn: &Connection, email: &str) -> Result<Option<Player>> {
    let sql = "SELECT id, name, email FROM players WHERE email = ?1 COLLATE NOCASE";

    conn.query_row(sql, params![email.trim()], parse_player_row)
        .optional()
        .context("Failed to query player by email")
}

pub fn list_all(conn: &Connection) -> Result<Vec<Player>> {
    let sql = "SELECT id, name, email FROM players ORDER BY id";

    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map([], parse_player_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(rows)
}

fn parse_player_row(row: &rusqlite::Row) -> rusqlite::Result<Player> {
    Ok(Player {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
    })
}
