use serde::{Deserialize, Serialize};

use super::models::Room;

/// Request payload for creating a new room
#[derive(Debug, Clone, Deserialize)]
pub struct CreateRoomRequest {
    pub name: String,
    pub email: String,
    pub total_points: u32,
    pub timer_ms: i64,
}

/// Request payload for joining an existing room
#[derive(Debug, Clone, Deserialize)]
pub struct JoinRoomRequest {
    pub name: String,
    pub email: String,
}

/// Response for room creation
#[derive(Debug, Serialize)]
pub struct CreateRoomResponse {
    pub room_code: String,
    pub room: Room,
}

/// Response for joining a room
#[derive(Debug, Serialize)]
pub struct JoinRoomResponse {
    pub user_key: String,
    pub room: Room,
}

/// One row of the room leaderboard, ordered by rounds won, then by
/// available points
#[derive(Debug, Clone, Serialize)]
pub struct LeaderboardEntry {
    pub user_key: String,
    pub name: String,
    pub is_online: bool,
    pub rounds_won: usize,
    pub points_spent: u32,
    pub available_points: u32,
}
