use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::domain::{MatchId, PlayerId, RegistrationStatus, ResultSubmission, SetScore};
use crate::domain::scores::parse_score;
use crate::errors::{EngineError, EngineResult, ErrorKind};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub kind: ErrorKind,
    pub message: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPlayerRequest {
    pub name: String,
    pub email: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusRequest {
    pub status: RegistrationStatus,
}

/// A match result: either a score line, explicit sets, or a walkover.
#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ResultRequest {
    pub score: Option<String>,
    pub sets: Option<Vec<SetScore>>,
    pub walkover_winner_id: Option<PlayerId>,
    pub expected_version: Option<i64>,
}

impl ResultRequest {
    pub fn submission(&self) -> EngineResult<ResultSubmission> {
        match (&self.score, &self.sets, self.walkover_winner_id) {
            (Some(score), None, None) => Ok(ResultSubmission::Sets(parse_score(score)?)),
            (None, Some(sets), None) => Ok(ResultSubmission::Sets(sets.clone())),
            (None, None, Some(winner_id)) => Ok(ResultSubmission::Walkover { winner_id }),
            _ => Err(EngineError::validation(
                "Provide exactly one of score, sets or walkoverWinnerId",
            )),
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostponeRequest {
    pub new_date: NaiveDateTime,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkDeleteRequest {
    pub match_ids: Vec<MatchId>,
}
