use std::sync::Arc;

use buzzrs::event::EventBus;
use buzzrs::party::models::PartyGame;
use buzzrs::party::service::PartyService;
use buzzrs::room::models::Room;
use buzzrs::room::service::RoomService;
use buzzrs::room::types::{CreateRoomRequest, JoinRoomRequest};
use buzzrs::round::models::CurrentRound;
use buzzrs::round::service::RoundService;
use buzzrs::store::memory::InMemoryStore;
use buzzrs::store::{AtomicStore, ManualClock};

// ============================================================================
// Test Setup Infrastructure
// ============================================================================

pub struct TestSetup {
    pub rooms: Arc<RoomService>,
    pub rounds: Arc<RoundService>,
    pub party: Arc<PartyService>,
    pub room_store: Arc<dyn AtomicStore<Room>>,
    pub clock: Arc<ManualClock>,
    pub event_bus: EventBus,
    pub room_code: String,
    pub participants: Vec<String>,
}

impl TestSetup {
    /// Committed ledger spend of one participant, straight from the
    /// room record
    pub async fn points_spent(&self, user_key: &str) -> u32 {
        self.room_store
            .read(&self.room_code)
            .await
            .unwrap()
            .unwrap()
            .participants
            .get(user_key)
            .unwrap()
            .points_spent
    }

    pub async fn rounds_won(&self, user_key: &str) -> usize {
        self.room_store
            .read(&self.room_code)
            .await
            .unwrap()
            .unwrap()
            .participants
            .get(user_key)
            .unwrap()
            .rounds_won
            .len()
    }
}

pub struct TestSetupBuilder {
    participants: Vec<String>,
    total_points: u32,
    timer_ms: i64,
}

impl TestSetupBuilder {
    pub fn new() -> Self {
        Self {
            participants: vec![],
            total_points: 300,
            timer_ms: 10_000,
        }
    }

    pub fn with_participants(mut self, names: Vec<&str>) -> Self {
        self.participants = names.into_iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_total_points(mut self, total_points: u32) -> Self {
        self.total_points = total_points;
        self
    }

    #[allow(dead_code)]
    pub fn with_timer_ms(mut self, timer_ms: i64) -> Self {
        self.timer_ms = timer_ms;
        self
    }

    pub async fn build(self) -> TestSetup {
        let room_store: Arc<InMemoryStore<Room>> = Arc::new(InMemoryStore::new());
        let round_store: Arc<InMemoryStore<CurrentRound>> = Arc::new(InMemoryStore::new());
        let party_store: Arc<InMemoryStore<PartyGame>> = Arc::new(InMemoryStore::new());
        let clock = Arc::new(ManualClock::new(1_000));
        let event_bus = EventBus::new();

        let rooms = Arc::new(RoomService::new(
            room_store.clone(),
            round_store.clone(),
            clock.clone(),
            event_bus.clone(),
        ));
        let rounds = Arc::new(RoundService::new(
            room_store.clone(),
            round_store.clone(),
            clock.clone(),
            event_bus.clone(),
        ));
        let party = Arc::new(PartyService::new(
            party_store,
            clock.clone(),
            event_bus.clone(),
        ));

        let (room_code, _) = rooms
            .create_room(CreateRoomRequest {
                name: "Quiz Master".to_string(),
                email: "master@example.com".to_string(),
                total_points: self.total_points,
                timer_ms: self.timer_ms,
            })
            .await
            .expect("room creation failed");

        let mut participants = Vec::new();
        for name in &self.participants {
            let (user_key, _) = rooms
                .join_room(
                    &room_code,
                    JoinRoomRequest {
                        name: name.clone(),
                        email: format!("{}@example.com", name),
                    },
                )
                .await
                .expect("join failed");
            participants.push(user_key);
        }

        let room_store: Arc<dyn AtomicStore<Room>> = room_store;
        TestSetup {
            rooms,
            rounds,
            party,
            room_store,
            clock,
            event_bus,
            room_code,
            participants,
        }
    }
}
