use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use std::sync::Arc;

use super::{ApiError, ApiResult, AppState};
use crate::domain::SeasonKey;
use crate::playoffs::Bracket;
use crate::services::BuildBracket;

pub async fn build_playoffs(
    State(state): State<Arc<AppState>>,
    Path((league_id, season_id)): Path<(i64, i64)>,
    body: Option<Json<BuildBracket>>,
) -> Result<(StatusCode, Json<Vec<Bracket>>), ApiError> {
    let key = SeasonKey::new(league_id, season_id);
    let req = body.map(|Json(req)| req).unwrap_or_default();
    let brackets = state.engine.build_playoff_bracket(key, req)?;
    Ok((StatusCode::CREATED, Json(brackets)))
}

pub async fn get_playoffs(
    State(state): State<Arc<AppState>>,
    Path((league_id, season_id)): Path<(i64, i64)>,
) -> ApiResult<Vec<Bracket>> {
    let key = SeasonKey::new(league_id, season_id);
    Ok(Json(state.engine.get_brackets(key)?))
}
