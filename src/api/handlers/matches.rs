use axum::{
    extract::{Path, State},
    response::Json,
};
use std::sync::Arc;

use super::{ApiResult, AppState};
use crate::api::models::{PostponeRequest, ResultRequest};
use crate::domain::{Match, MatchId};
use crate::services::{MatchOutcome, Reschedule};

pub async fn get_match(
    State(state): State<Arc<AppState>>,
    Path(match_id): Path<MatchId>,
) -> ApiResult<Match> {
    Ok(Json(state.engine.get_match(match_id)?))
}

pub async fn submit_result(
    State(state): State<Arc<AppState>>,
    Path(match_id): Path<MatchId>,
    Json(req): Json<ResultRequest>,
) -> ApiResult<MatchOutcome> {
    let submission = req.submission()?;
    Ok(Json(state.engine.complete_match(
        match_id,
        submission,
        req.expected_version,
    )?))
}

pub async fn postpone_match(
    State(state): State<Arc<AppState>>,
    Path(match_id): Path<MatchId>,
    Json(req): Json<PostponeRequest>,
) -> ApiResult<Match> {
    Ok(Json(state.engine.postpone_match(match_id, req.new_date)?))
}

pub async fn reschedule_match(
    State(state): State<Arc<AppState>>,
    Path(match_id): Path<MatchId>,
    Json(req): Json<Reschedule>,
) -> ApiResult<Match> {
    Ok(Json(state.engine.reschedule_match(match_id, req)?))
}

pub async fn cancel_match(
    State(state): State<Arc<AppState>>,
    Path(match_id): Path<MatchId>,
) -> ApiResult<Match> {
    Ok(Json(state.engine.cancel_match(match_id)?))
}
