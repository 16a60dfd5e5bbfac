use serde::{Deserialize, Serialize};

use super::models::{PartyGame, Victory};

/// Request payload for adding a player to the party game
#[derive(Debug, Clone, Deserialize)]
pub struct AddPlayerRequest {
    pub name: String,
}

/// Request payload for starting a session
#[derive(Debug, Clone, Deserialize)]
pub struct StartSessionRequest {
    pub question: Option<String>,
    pub duration_ms: Option<i64>,
}

/// Request payload for changing the per-session point cap
#[derive(Debug, Clone, Deserialize)]
pub struct MaxPointsRequest {
    pub max_points: u32,
}

/// Response for a buzzer press
#[derive(Debug, Serialize)]
pub struct PressResponse {
    pub player_id: String,
    pub temp_points: u32,
}

/// Response for a resolved session
#[derive(Debug, Serialize)]
pub struct SessionOutcomeResponse {
    pub winner: Option<String>,
    pub victory: Option<Victory>,
    pub game: PartyGame,
}
