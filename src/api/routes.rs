use axum::{
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;

use crate::api::handlers::{
    matches::{cancel_match, get_match, postpone_match, reschedule_match, submit_result},
    players::{create_player, list_players, rating_history},
    playoffs::{build_playoffs, get_playoffs},
    seasons::{
        create_season, delete_matches, generate_round, get_season, get_standings, import_matches,
        list_matches, list_registrations, list_seasons, register_player, replace_player,
        set_registration_status, start_season,
    },
    AppState,
};

pub fn create_router(state: Arc<AppState>) -> Router {
    let season = "/api/leagues/:league_id/seasons/:season_id";

    Router::new()
        .route("/api/players", get(list_players).post(create_player))
        .route("/api/seasons", get(list_seasons).post(create_season))
        .route(season, get(get_season))
        .route(&format!("{season}/start"), post(start_season))
        .route(
            &format!("{season}/registrations"),
            get(list_registrations).post(register_player),
        )
        .route(
            &format!("{season}/registrations/:player_id/status"),
            put(set_registration_status),
        )
        .route(
            &format!("{season}/players/:player_id/rating-history"),
            get(rating_history),
        )
        .route(&format!("{season}/rounds"), post(generate_round))
        .route(&format!("{season}/matches"), get(list_matches))
        .route(&format!("{season}/matches/replace-player"), post(replace_player))
        .route(&format!("{season}/matches/delete"), post(delete_matches))
        .route(&format!("{season}/import"), post(import_matches))
        .route(&format!("{season}/standings"), get(get_standings))
        .route(&format!("{season}/playoffs"), get(get_playoffs).post(build_playoffs))
        .route("/api/matches/:match_id", get(get_match))
        .route("/api/matches/:match_id/result", post(submit_result))
        .route("/api/matches/:match_id/postpone", post(postpone_match))
        .route("/api/matches/:match_id/reschedule", post(reschedule_match))
        .route("/api/matches/:match_id/cancel", post(cancel_match))
        .with_state(state)
}
