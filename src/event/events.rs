use serde::{Deserialize, Serialize};

/// Channel name used by the single shared party-mode game.
pub const PARTY_CHANNEL: &str = "party";

/// Events that can occur in a buzzer game
///
/// Events represent facts about things that have already happened.
/// They are used to communicate state changes between different parts
/// of the system without tight coupling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum RoomEvent {
    // Room lifecycle events
    /// A new room has been created
    RoomCreated { room_code: String, master_key: String },

    /// A participant has joined the room
    ParticipantJoined {
        room_code: String,
        user_key: String,
        name: String,
    },

    /// A participant's presence flag changed
    PresenceChanged {
        room_code: String,
        user_key: String,
        is_online: bool,
    },

    // Round lifecycle events
    /// The master started a new bidding round
    RoundStarted {
        room_code: String,
        question_text: String,
        max_points: u32,
        timer_ms: i64,
    },

    /// A bid was accepted and the countdown restarted
    BidAccepted {
        room_code: String,
        user_key: String,
        points: u32,
        target_label: String,
        deadline: i64,
    },

    /// The round was finished and resolved
    RoundFinished {
        room_code: String,
        winner: Option<String>,
        points_awarded: Option<u32>,
    },

    /// The finished round was cleared
    RoundReset { room_code: String },

    // Party-mode events
    /// A new party session started
    SessionStarted {
        question: String,
        expires_at: i64,
    },

    /// A player pressed the party buzzer
    BuzzerPressed {
        player_id: String,
        temp_points: u32,
        expires_at: i64,
    },

    /// The party session ended and was resolved
    SessionEnded {
        winner: Option<String>,
        points_used: Option<u32>,
    },
}

impl RoomEvent {
    /// Get the channel this event belongs to: the room code for room
    /// events, the shared party channel otherwise
    pub fn channel(&self) -> &str {
        match self {
            RoomEvent::RoomCreated { room_code, .. } => room_code,
            RoomEvent::ParticipantJoined { room_code, .. } => room_code,
            RoomEvent::PresenceChanged { room_code, .. } => room_code,
            RoomEvent::RoundStarted { room_code, .. } => room_code,
            RoomEvent::BidAccepted { room_code, .. } => room_code,
            RoomEvent::RoundFinished { room_code, .. } => room_code,
            RoomEvent::RoundReset { room_code } => room_code,
            RoomEvent::SessionStarted { .. }
            | RoomEvent::BuzzerPressed { .. }
            | RoomEvent::SessionEnded { .. } => PARTY_CHANNEL,
        }
    }

    /// Get a human-readable description of the event type
    pub fn event_type(&self) -> &'static str {
        match self {
            RoomEvent::RoomCreated { .. } => "room_created",
            RoomEvent::ParticipantJoined { .. } => "participant_joined",
            RoomEvent::PresenceChanged { .. } => "presence_changed",
            RoomEvent::RoundStarted { .. } => "round_started",
            RoomEvent::BidAccepted { .. } => "bid_accepted",
            RoomEvent::RoundFinished { .. } => "round_finished",
            RoomEvent::RoundReset { .. } => "round_reset",
            RoomEvent::SessionStarted { .. } => "session_started",
            RoomEvent::BuzzerPressed { .. } => "buzzer_pressed",
            RoomEvent::SessionEnded { .. } => "session_ended",
        }
    }
}
