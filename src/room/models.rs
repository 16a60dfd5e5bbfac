use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::round::economy::Bid;

pub const ROOM_CODE_LENGTH: usize = 6;
const ROOM_CODE_CHARS: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Per-room game settings fixed at creation time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomSettings {
    /// Starting point budget of every participant
    pub total_points: u32,
    /// Round countdown duration in milliseconds
    pub timer_ms: i64,
}

/// A round a participant has won
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundWon {
    pub question_text: String,
    pub points_awarded: u32,
    pub timestamp: i64,
}

/// One player in a room
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub name: String,
    /// Point budget fixed at room creation
    pub points_total: u32,
    /// Cumulative points spent on accepted bids; never decreases
    pub points_spent: u32,
    pub is_online: bool,
    #[serde(default)]
    pub rounds_won: Vec<RoundWon>,
}

impl Participant {
    pub fn new(name: String, points_total: u32) -> Self {
        Self {
            name,
            points_total,
            points_spent: 0,
            is_online: true,
            rounds_won: Vec::new(),
        }
    }

    /// Points still available to spend.
    ///
    /// The ledger write trails the round-record commit briefly, so the
    /// participant's own bid in the current round is used as a floor:
    /// once a bid of cost C is committed, the ledger must be at least C.
    pub fn available_points(&self, own_bid: Option<&Bid>) -> u32 {
        let committed = own_bid.map(|bid| bid.points).unwrap_or(0);
        self.points_total
            .saturating_sub(self.points_spent.max(committed))
    }
}

/// A named game instance, stored under its room code.
///
/// The active round is kept as a separate record under the same code so
/// that bid acceptance and ledger updates are independent atomic
/// transforms.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    pub master_key: String,
    pub created_at: i64,
    pub updated_at: i64,
    pub settings: RoomSettings,
    #[serde(default)]
    pub participants: HashMap<String, Participant>,
}

impl Room {
    pub fn new(master_key: String, settings: RoomSettings, now: i64) -> Self {
        Self {
            master_key,
            created_at: now,
            updated_at: now,
            settings,
            participants: HashMap::new(),
        }
    }

    pub fn participant(&self, user_key: &str) -> Option<&Participant> {
        self.participants.get(user_key)
    }
}

/// Generates a random room code (uppercase letters and digits)
pub fn generate_room_code() -> String {
    let mut rng = rand::rng();
    (0..ROOM_CODE_LENGTH)
        .map(|_| ROOM_CODE_CHARS[rng.random_range(0..ROOM_CODE_CHARS.len())] as char)
        .collect()
}

/// Turns an e-mail address into a store-safe participant key.
///
/// The store forbids `. $ # [ ] /` in keys, so each is replaced with a
/// reversible marker.
pub fn sanitize_key(email: &str) -> String {
    email
        .to_lowercase()
        .replace('.', "_dot_")
        .replace('$', "_dollar_")
        .replace('#', "_hash_")
        .replace('[', "_lbracket_")
        .replace(']', "_rbracket_")
        .replace('/', "_slash_")
}

pub fn desanitize_key(key: &str) -> String {
    key.replace("_dot_", ".")
        .replace("_dollar_", "$")
        .replace("_hash_", "#")
        .replace("_lbracket_", "[")
        .replace("_rbracket_", "]")
        .replace("_slash_", "/")
}

/// Cheap shape check for e-mail input at the boundary
pub fn is_valid_email(email: &str) -> bool {
    let mut parts = email.split('@');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(local), Some(domain), None) => {
            !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.')
        }
        _ => false,
    }
}
