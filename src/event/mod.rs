pub mod bus;
pub mod events;

pub use bus::EventBus;
pub use events::RoomEvent;
