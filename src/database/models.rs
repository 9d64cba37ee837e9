use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::types::Type;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::domain::{
    LeagueId, MatchId, MatchStage, PlayerId, SeasonId, SeasonKey,
};
use crate::errors::EngineError;

/// Insert payload for a match row; everything else starts empty.
#[derive(Debug, Clone)]
pub struct NewMatch {
    pub key: SeasonKey,
    pub round_number: u32,
    pub stage: MatchStage,
    pub bracket_name: Option<String>,
    pub first_player_id: PlayerId,
    pub second_player_id: Option<PlayerId>,
    pub deadline: NaiveDate,
    pub rematch: bool,
    pub imported: bool,
}

/// One applied ELO delta.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RatingChange {
    pub league_id: LeagueId,
    pub season_id: SeasonId,
    pub player_id: PlayerId,
    pub match_id: MatchId,
    pub rating_before: i32,
    pub rating_after: i32,
    pub delta: i32,
    pub recorded_at: NaiveDateTime,
}

/// Reads a closed enum stored as text.
pub(crate) fn text_column<T>(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr<Err = EngineError>,
{
    let raw: String = row.get(idx)?;
    raw.parse()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

pub(crate) fn json_column<T: DeserializeOwned>(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

pub(crate) fn optional_json_column<T: DeserializeOwned>(
    row: &rusqlite::Row,
    idx: usize,
) -> rusqlite::Result<Option<T>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|raw| {
        serde_json::from_str(&raw)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
    })
    .transpose()
}
