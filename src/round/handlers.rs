use axum::extract::{Path, Query, State};
use axum::Json;
use serde_json::{json, Value};
use strum::IntoEnumIterator;
use tracing::instrument;

use super::economy::{Bid, Tier};
use super::eligibility::BidCheck;
use super::models::CurrentRound;
use super::service::RoundService;
use super::types::{BidRequest, CheckBidQuery, RoundView, StartRoundRequest, TierCost};
use crate::shared::{AppError, AppState};

fn service(state: &AppState) -> RoundService {
    RoundService::new(
        state.rooms.clone(),
        state.rounds.clone(),
        state.clock.clone(),
        state.event_bus.clone(),
    )
}

/// HTTP handler for starting a new round
///
/// POST /rooms/:code/round
#[instrument(name = "start_round", skip(state, request))]
pub async fn start_round(
    State(state): State<AppState>,
    Path(room_code): Path<String>,
    Json(request): Json<StartRoundRequest>,
) -> Result<Json<CurrentRound>, AppError> {
    let round = service(&state)
        .start_round(&room_code, request.question_text, request.max_points)
        .await?;
    Ok(Json(round))
}

/// HTTP handler for placing a bid
///
/// POST /rooms/:code/round/bids
#[instrument(name = "submit_bid", skip(state, request))]
pub async fn submit_bid(
    State(state): State<AppState>,
    Path(room_code): Path<String>,
    Json(request): Json<BidRequest>,
) -> Result<Json<Bid>, AppError> {
    let bid = service(&state)
        .submit_bid(&room_code, &request.user_key, request.tier)
        .await?;
    Ok(Json(bid))
}

/// HTTP handler for finishing the round explicitly
///
/// POST /rooms/:code/round/finish
#[instrument(name = "finish_round", skip(state))]
pub async fn finish_round(
    State(state): State<AppState>,
    Path(room_code): Path<String>,
) -> Result<Json<CurrentRound>, AppError> {
    let round = service(&state).finish_round(&room_code).await?;
    Ok(Json(round))
}

/// HTTP handler for the deadline-driven finish; any client may call it
///
/// POST /rooms/:code/round/expire
#[instrument(name = "finish_if_expired", skip(state))]
pub async fn finish_if_expired(
    State(state): State<AppState>,
    Path(room_code): Path<String>,
) -> Result<Json<Option<CurrentRound>>, AppError> {
    let round = service(&state).finish_if_expired(&room_code).await?;
    Ok(Json(round))
}

/// HTTP handler for clearing a finished round
///
/// DELETE /rooms/:code/round
#[instrument(name = "reset_round", skip(state))]
pub async fn reset_round(
    State(state): State<AppState>,
    Path(room_code): Path<String>,
) -> Result<Json<Value>, AppError> {
    service(&state).reset_round(&room_code).await?;
    Ok(Json(json!({ "reset": true })))
}

/// HTTP handler for the round view: record, countdown, leader, and the
/// full cost ladder
///
/// GET /rooms/:code/round
#[instrument(name = "round_view", skip(state))]
pub async fn round_view(
    State(state): State<AppState>,
    Path(room_code): Path<String>,
) -> Result<Json<RoundView>, AppError> {
    let service = service(&state);

    let round = service.round_snapshot(&room_code).await?;
    let remaining_ms = service.remaining_ms(&room_code).await?;
    let leader = service.current_leader(&room_code).await?;

    let mut required_costs = Vec::new();
    for tier in Tier::iter() {
        required_costs.push(TierCost {
            tier,
            label: tier.label().to_string(),
            cost: service.required_cost(&room_code, tier).await?,
        });
    }

    Ok(Json(RoundView {
        round,
        remaining_ms,
        leader,
        required_costs,
    }))
}

/// HTTP handler for the read-only eligibility check
///
/// GET /rooms/:code/round/eligibility?user_key=...&tier=...
#[instrument(name = "check_bid", skip(state))]
pub async fn check_bid(
    State(state): State<AppState>,
    Path(room_code): Path<String>,
    Query(query): Query<CheckBidQuery>,
) -> Result<Json<BidCheck>, AppError> {
    let check = service(&state)
        .check_bid(&room_code, &query.user_key, query.tier)
        .await?;
    Ok(Json(check))
}
