// Library crate for the buzzer quiz game server
// This file exposes the public API for integration tests

pub mod event;
pub mod party;
pub mod room;
pub mod round;
pub mod shared;
pub mod store;

// Re-export commonly used types for easier access in tests
pub use event::{EventBus, RoomEvent};
pub use round::economy::{Bid, Leader, Tier};
pub use shared::{AppError, AppState, GameError};
pub use store::{AtomicStore, Clock};
