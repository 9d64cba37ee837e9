use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use std::sync::Arc;

use super::{ApiError, ApiResult, AppState};
use crate::api::models::{BulkDeleteRequest, StatusRequest};
use crate::domain::{BulkReport, Match, PlayerId, Registration, Season, SeasonKey};
use crate::services::{
    GenerateRound, ImportReport, MatchFilter, NewRegistration, NewSeason, ReplacePlayer, RoundPlan,
};
use crate::standings::StandingsEntry;

pub async fn list_seasons(State(state): State<Arc<AppState>>) -> ApiResult<Vec<Season>> {
    Ok(Json(state.engine.list_seasons()?))
}

pub async fn create_season(
    State(state): State<Arc<AppState>>,
    Json(req): Json<NewSeason>,
) -> Result<(StatusCode, Json<Season>), ApiError> {
    let season = state.engine.create_season(req)?;
    Ok((StatusCode::CREATED, Json(season)))
}

pub async fn get_season(
    State(state): State<Arc<AppState>>,
    Path((league_id, season_id)): Path<(i64, i64)>,
) -> ApiResult<Season> {
    Ok(Json(state.engine.get_season(SeasonKey::new(league_id, season_id))?))
}

pub async fn start_season(
    State(state): State<Arc<AppState>>,
    Path((league_id, season_id)): Path<(i64, i64)>,
) -> ApiResult<Season> {
    Ok(Json(state.engine.start_season(SeasonKey::new(league_id, season_id))?))
}

pub async fn list_registrations(
    State(state): State<Arc<AppState>>,
    Path((league_id, season_id)): Path<(i64, i64)>,
) -> ApiResult<Vec<Registration>> {
    let key = SeasonKey::new(league_id, season_id);
    Ok(Json(state.engine.list_registrations(key)?))
}

pub async fn register_player(
    State(state): State<Arc<AppState>>,
    Path((league_id, season_id)): Path<(i64, i64)>,
    Json(req): Json<NewRegistration>,
) -> Result<(StatusCode, Json<Registration>), ApiError> {
    let key = SeasonKey::new(league_id, season_id);
    let reg = state.engine.register_player(key, req)?;
    Ok((StatusCode::CREATED, Json(reg)))
}

pub async fn set_registration_status(
    State(state): State<Arc<AppState>>,
    Path((league_id, season_id, player_id)): Path<(i64, i64, PlayerId)>,
    Json(req): Json<StatusRequest>,
) -> ApiResult<Registration> {
    let key = SeasonKey::new(league_id, season_id);
    Ok(Json(
        state
            .engine
            .set_registration_status(key, player_id, req.status)?,
    ))
}

pub async fn generate_round(
    State(state): State<Arc<AppState>>,
    Path((league_id, season_id)): Path<(i64, i64)>,
    body: Option<Json<GenerateRound>>,
) -> Result<(StatusCode, Json<RoundPlan>), ApiError> {
    let key = SeasonKey::new(league_id, season_id);
    let req = body.map(|Json(req)| req).unwrap_or_default();
    let plan = state.engine.generate_round(key, req)?;
    Ok((StatusCode::CREATED, Json(plan)))
}

pub async fn list_matches(
    State(state): State<Arc<AppState>>,
    Path((league_id, season_id)): Path<(i64, i64)>,
    Query(filter): Query<MatchFilter>,
) -> ApiResult<Vec<Match>> {
    let key = SeasonKey::new(league_id, season_id);
    Ok(Json(state.engine.list_matches(key, filter)?))
}

pub async fn replace_player(
    State(state): State<Arc<AppState>>,
    Path((league_id, season_id)): Path<(i64, i64)>,
    Json(req): Json<ReplacePlayer>,
) -> ApiResult<BulkReport> {
    let key = SeasonKey::new(league_id, season_id);
    Ok(Json(state.engine.replace_player(key, req)?))
}

pub async fn delete_matches(
    State(state): State<Arc<AppState>>,
    Path((league_id, season_id)): Path<(i64, i64)>,
    Json(req): Json<BulkDeleteRequest>,
) -> ApiResult<BulkReport> {
    let key = SeasonKey::new(league_id, season_id);
    Ok(Json(state.engine.delete_matches(key, &req.match_ids)?))
}

/// Body is the raw CSV file.
pub async fn import_matches(
    State(state): State<Arc<AppState>>,
    Path((league_id, season_id)): Path<(i64, i64)>,
    body: String,
) -> ApiResult<ImportReport> {
    let key = SeasonKey::new(league_id, season_id);
    Ok(Json(state.engine.import_matches(key, body.as_bytes())?))
}

pub async fn get_standings(
    State(state): State<Arc<AppState>>,
    Path((league_id, season_id)): Path<(i64, i64)>,
) -> ApiResult<Vec<StandingsEntry>> {
    let key = SeasonKey::new(league_id, season_id);
    Ok(Json(state.engine.get_standings(key)?))
}
