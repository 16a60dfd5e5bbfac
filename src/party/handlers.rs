use axum::extract::{Path, State};
use axum::Json;
use serde_json::{json, Value};
use tracing::instrument;

use super::models::PartyGame;
use super::service::{PartyService, SessionOutcome};
use super::types::{
    AddPlayerRequest, MaxPointsRequest, PressResponse, SessionOutcomeResponse,
    StartSessionRequest,
};
use crate::shared::{AppError, AppState};

fn service(state: &AppState) -> PartyService {
    PartyService::new(
        state.party.clone(),
        state.clock.clone(),
        state.event_bus.clone(),
    )
}

fn outcome_response(outcome: SessionOutcome) -> SessionOutcomeResponse {
    let (winner, victory) = match outcome.winner {
        Some((player_id, victory)) => (Some(player_id), Some(victory)),
        None => (None, None),
    };
    SessionOutcomeResponse {
        winner,
        victory,
        game: outcome.game,
    }
}

/// HTTP handler for adding a party player
///
/// POST /party/players
#[instrument(name = "add_party_player", skip(state, request))]
pub async fn add_player(
    State(state): State<AppState>,
    Json(request): Json<AddPlayerRequest>,
) -> Result<Json<Value>, AppError> {
    let player_id = service(&state).add_player(&request.name).await?;
    Ok(Json(json!({ "player_id": player_id })))
}

/// HTTP handler for removing a party player
///
/// DELETE /party/players/:id
#[instrument(name = "remove_party_player", skip(state))]
pub async fn remove_player(
    State(state): State<AppState>,
    Path(player_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    service(&state).remove_player(&player_id).await?;
    Ok(Json(json!({ "removed": true })))
}

/// HTTP handler for starting a party session
///
/// POST /party/session
#[instrument(name = "start_session", skip(state, request))]
pub async fn start_session(
    State(state): State<AppState>,
    Json(request): Json<StartSessionRequest>,
) -> Result<Json<PartyGame>, AppError> {
    let game = service(&state)
        .start_session(request.question, request.duration_ms)
        .await?;
    Ok(Json(game))
}

/// HTTP handler for stopping the running session
///
/// POST /party/session/stop
#[instrument(name = "stop_session", skip(state))]
pub async fn stop_session(
    State(state): State<AppState>,
) -> Result<Json<SessionOutcomeResponse>, AppError> {
    let outcome = service(&state).stop_session().await?;
    Ok(Json(outcome_response(outcome)))
}

/// HTTP handler for the deadline-driven session resolution
///
/// POST /party/session/expire
#[instrument(name = "expire_session", skip(state))]
pub async fn finish_if_expired(
    State(state): State<AppState>,
) -> Result<Json<Option<SessionOutcomeResponse>>, AppError> {
    let outcome = service(&state).finish_if_expired().await?;
    Ok(Json(outcome.map(outcome_response)))
}

/// HTTP handler for one buzzer press
///
/// POST /party/players/:id/press
#[instrument(name = "press", skip(state))]
pub async fn press(
    State(state): State<AppState>,
    Path(player_id): Path<String>,
) -> Result<Json<PressResponse>, AppError> {
    let temp_points = service(&state).press(&player_id).await?;
    Ok(Json(PressResponse {
        player_id,
        temp_points,
    }))
}

/// HTTP handler for deleting one recorded victory
///
/// DELETE /party/players/:id/victories/:index
#[instrument(name = "delete_victory", skip(state))]
pub async fn delete_victory(
    State(state): State<AppState>,
    Path((player_id, index)): Path<(String, usize)>,
) -> Result<Json<Value>, AppError> {
    service(&state).delete_victory(&player_id, index).await?;
    Ok(Json(json!({ "deleted": true })))
}

/// HTTP handler for clearing a player's victories
///
/// POST /party/players/:id/reset
#[instrument(name = "reset_player_points", skip(state))]
pub async fn reset_player_points(
    State(state): State<AppState>,
    Path(player_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    service(&state).reset_player_points(&player_id).await?;
    Ok(Json(json!({ "reset": true })))
}

/// HTTP handler for setting the session point cap
///
/// PUT /party/max-points
#[instrument(name = "set_max_points", skip(state, request))]
pub async fn set_max_points(
    State(state): State<AppState>,
    Json(request): Json<MaxPointsRequest>,
) -> Result<Json<Value>, AppError> {
    service(&state).set_max_points(request.max_points).await?;
    Ok(Json(json!({ "max_points": request.max_points })))
}

/// HTTP handler for the full party snapshot
///
/// GET /party
#[instrument(name = "party_snapshot", skip(state))]
pub async fn snapshot(State(state): State<AppState>) -> Result<Json<PartyGame>, AppError> {
    let game = service(&state).snapshot().await?;
    Ok(Json(game))
}
