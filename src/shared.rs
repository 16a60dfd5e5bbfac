use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::sync::Arc;
use thiserror::Error;

use crate::event::EventBus;
use crate::party::models::PartyGame;
use crate::room::models::Room;
use crate::round::models::CurrentRound;
use crate::store::{AtomicStore, Clock};

/// Shared application state containing all dependencies
#[derive(Clone)]
pub struct AppState {
    pub rooms: Arc<dyn AtomicStore<Room>>,
    pub rounds: Arc<dyn AtomicStore<CurrentRound>>,
    pub party: Arc<dyn AtomicStore<PartyGame>>,
    pub clock: Arc<dyn Clock>,
    pub event_bus: EventBus,
}

impl AppState {
    pub fn new(
        rooms: Arc<dyn AtomicStore<Room>>,
        rounds: Arc<dyn AtomicStore<CurrentRound>>,
        party: Arc<dyn AtomicStore<PartyGame>>,
        clock: Arc<dyn Clock>,
        event_bus: EventBus,
    ) -> Self {
        Self {
            rooms,
            rounds,
            party,
            clock,
            event_bus,
        }
    }
}

/// Domain-level failures of the bidding engine.
///
/// Every variant is a recoverable condition the caller is expected to
/// handle (show the reason, recompute the cost, retry); none of them
/// abort the process.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GameError {
    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("insufficient points: {required} needed, {available} available")]
    InsufficientPoints { required: u32, available: u32 },

    #[error("already holding the lead")]
    AlreadyLeading,

    #[error("round already finished")]
    AlreadyFinished,

    #[error("another update committed first, recompute the cost and retry")]
    RaceLost,

    #[error("storage error: {0}")]
    Store(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AppError {
    #[error(transparent)]
    Game(#[from] GameError),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal server error")]
    Internal,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::Game(err) => {
                let status = match &err {
                    GameError::NotFound(_) => StatusCode::NOT_FOUND,
                    GameError::InvalidState(_)
                    | GameError::InsufficientPoints { .. }
                    | GameError::AlreadyLeading
                    | GameError::AlreadyFinished
                    | GameError::RaceLost => StatusCode::CONFLICT,
                    GameError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
                };
                (status, err.to_string())
            }
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            ),
        };

        let body = Json(json!({
            "error": error_message
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
pub mod test_utils {
    use super::*;
    use crate::store::memory::InMemoryStore;
    use crate::store::ManualClock;

    /// AppState wired against in-memory stores and a manual clock,
    /// for handler and service tests
    pub struct TestApp {
        pub state: AppState,
        pub clock: Arc<ManualClock>,
    }

    impl TestApp {
        pub fn new() -> Self {
            let clock = Arc::new(ManualClock::new(1_000));
            let rooms: Arc<InMemoryStore<Room>> = Arc::new(InMemoryStore::new());
            let rounds: Arc<InMemoryStore<CurrentRound>> = Arc::new(InMemoryStore::new());
            let party: Arc<InMemoryStore<PartyGame>> = Arc::new(InMemoryStore::new());
            let state = AppState::new(rooms, rounds, party, clock.clone(), EventBus::new());
            Self { state, clock }
        }
    }

    impl Default for TestApp {
        fn default() -> Self {
            Self::new()
        }
    }
}
