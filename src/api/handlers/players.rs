use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use std::sync::Arc;

use super::{ApiError, ApiResult, AppState};
use crate::api::models::NewPlayerRequest;
use crate::database::RatingChange;
use crate::domain::{Player, PlayerId, SeasonKey};

pub async fn list_players(State(state): State<Arc<AppState>>) -> ApiResult<Vec<Player>> {
    Ok(Json(state.engine.list_players()?))
}

pub async fn create_player(
    State(state): State<Arc<AppState>>,
    Json(req): Json<NewPlayerRequest>,
) -> Result<(StatusCode, Json<Player>), ApiError> {
    let player = state.engine.add_player(&req.name, &req.email)?;
    Ok((StatusCode::CREATED, Json(player)))
}

pub async fn rating_history(
    State(state): State<Arc<AppState>>,
    Path((league_id, season_id, player_id)): Path<(i64, i64, PlayerId)>,
) -> ApiResult<Vec<RatingChange>> {
    let key = SeasonKey::new(league_id, season_id);
    Ok(Json(state.engine.rating_history(key, player_id)?))
}
