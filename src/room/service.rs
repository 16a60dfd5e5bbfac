use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, instrument, warn};

use super::models::{
    generate_room_code, is_valid_email, sanitize_key, Participant, Room, RoomSettings,
    ROOM_CODE_LENGTH,
};
use super::types::{CreateRoomRequest, JoinRoomRequest, LeaderboardEntry};
use crate::event::{EventBus, RoomEvent};
use crate::round::models::CurrentRound;
use crate::shared::{AppError, GameError};
use crate::store::{AtomicStore, Clock};

const MIN_NAME_LENGTH: usize = 2;
const MIN_TOTAL_POINTS: u32 = 100;
const MIN_TIMER_MS: i64 = 3_000;
const CODE_GENERATION_ATTEMPTS: usize = 3;

/// Service for room lifecycle and participant membership
pub struct RoomService {
    rooms: Arc<dyn AtomicStore<Room>>,
    rounds: Arc<dyn AtomicStore<CurrentRound>>,
    clock: Arc<dyn Clock>,
    event_bus: EventBus,
}

impl RoomService {
    pub fn new(
        rooms: Arc<dyn AtomicStore<Room>>,
        rounds: Arc<dyn AtomicStore<CurrentRound>>,
        clock: Arc<dyn Clock>,
        event_bus: EventBus,
    ) -> Self {
        Self {
            rooms,
            rounds,
            clock,
            event_bus,
        }
    }

    /// Creates a room with a freshly generated code.
    #[instrument(skip(self, request), fields(name = %request.name))]
    pub async fn create_room(
        &self,
        request: CreateRoomRequest,
    ) -> Result<(String, Room), AppError> {
        validate_create(&request)?;

        let master_key = sanitize_key(&request.email);
        let now = self.clock.now_ms();
        let room = Room::new(
            master_key.clone(),
            RoomSettings {
                total_points: request.total_points,
                timer_ms: request.timer_ms,
            },
            now,
        );

        // Collisions on a 6-character code are unlikely but possible;
        // retry with a fresh code a few times before giving up.
        for _ in 0..CODE_GENERATION_ATTEMPTS {
            let code = generate_room_code();
            let candidate = room.clone();
            let result = self
                .rooms
                .update(
                    &code,
                    Box::new(move |current| {
                        if current.is_some() {
                            return Err(GameError::RaceLost);
                        }
                        Ok(Some(candidate.clone()))
                    }),
                )
                .await;

            match result {
                Ok(Some(created)) => {
                    info!(room_code = %code, master_key = %master_key, "Room created");
                    self.event_bus
                        .emit(RoomEvent::RoomCreated {
                            room_code: code.clone(),
                            master_key: master_key.clone(),
                        })
                        .await;
                    return Ok((code, created));
                }
                Ok(None) => return Err(AppError::Internal),
                Err(GameError::RaceLost) => {
                    warn!(room_code = %code, "Room code collision, regenerating");
                    continue;
                }
                Err(err) => return Err(err.into()),
            }
        }

        Err(AppError::Internal)
    }

    /// Adds a participant to a room, or marks an existing one online
    /// again (re-joins are idempotent).
    #[instrument(skip(self, request), fields(name = %request.name))]
    pub async fn join_room(
        &self,
        room_code: &str,
        request: JoinRoomRequest,
    ) -> Result<(String, Room), AppError> {
        validate_join(room_code, &request)?;

        let user_key = sanitize_key(&request.email);
        let name = request.name.trim().to_string();
        let now = self.clock.now_ms();

        let key = user_key.clone();
        let code = room_code.to_string();
        let room = self
            .rooms
            .update(
                room_code,
                Box::new(move |current| {
                    let mut room = current
                        .ok_or_else(|| GameError::NotFound(format!("room {} does not exist", code)))?;
                    let budget = room.settings.total_points;
                    room.participants
                        .entry(key.clone())
                        .and_modify(|participant| participant.is_online = true)
                        .or_insert_with(|| Participant::new(name.clone(), budget));
                    room.updated_at = now;
                    Ok(Some(room))
                }),
            )
            .await?
            .ok_or(AppError::Internal)?;

        debug!(room_code = %room_code, user_key = %user_key, "Participant joined");
        self.event_bus
            .emit(RoomEvent::ParticipantJoined {
                room_code: room_code.to_string(),
                user_key: user_key.clone(),
                name: request.name.trim().to_string(),
            })
            .await;

        Ok((user_key, room))
    }

    /// Flips a participant's online flag (used on join, leave and
    /// connectivity changes).
    #[instrument(skip(self))]
    pub async fn set_online(
        &self,
        room_code: &str,
        user_key: &str,
        is_online: bool,
    ) -> Result<(), AppError> {
        let key = user_key.to_string();
        let now = self.clock.now_ms();
        self.rooms
            .update(
                room_code,
                Box::new(move |current| {
                    let mut room = current
                        .ok_or_else(|| GameError::NotFound("room does not exist".to_string()))?;
                    let participant = room.participants.get_mut(&key).ok_or_else(|| {
                        GameError::NotFound(format!("participant {} is not in this room", key))
                    })?;
                    participant.is_online = is_online;
                    room.updated_at = now;
                    Ok(Some(room))
                }),
            )
            .await?;

        self.event_bus
            .emit(RoomEvent::PresenceChanged {
                room_code: room_code.to_string(),
                user_key: user_key.to_string(),
                is_online,
            })
            .await;

        Ok(())
    }

    /// Full room record (read-only).
    pub async fn room_snapshot(&self, room_code: &str) -> Result<Room, AppError> {
        let room = self
            .rooms
            .read(room_code)
            .await?
            .ok_or_else(|| GameError::NotFound(format!("room {} does not exist", room_code)))?;
        Ok(room)
    }

    /// Participants ordered by rounds won, then by available points.
    /// Available balances apply the round-record fallback.
    pub async fn leaderboard(&self, room_code: &str) -> Result<Vec<LeaderboardEntry>, AppError> {
        let room = self.room_snapshot(room_code).await?;
        let round = self.rounds.read(room_code).await?;

        let mut entries: Vec<LeaderboardEntry> = room
            .participants
            .iter()
            .map(|(user_key, participant)| {
                let own_bid = round.as_ref().and_then(|round| round.bids.get(user_key));
                LeaderboardEntry {
                    user_key: user_key.clone(),
                    name: participant.name.clone(),
                    is_online: participant.is_online,
                    rounds_won: participant.rounds_won.len(),
                    points_spent: participant.points_spent,
                    available_points: participant.available_points(own_bid),
                }
            })
            .collect();

        entries.sort_by(|a, b| {
            b.rounds_won
                .cmp(&a.rounds_won)
                .then(b.available_points.cmp(&a.available_points))
                .then(a.user_key.cmp(&b.user_key))
        });
        Ok(entries)
    }

    /// Subscribe to full room-record snapshots.
    pub async fn subscribe(&self, room_code: &str) -> broadcast::Receiver<Option<Room>> {
        self.rooms.watch(room_code).await
    }
}

fn validate_create(request: &CreateRoomRequest) -> Result<(), AppError> {
    let mut errors = Vec::new();
    if request.name.trim().len() < MIN_NAME_LENGTH {
        errors.push("name must be at least 2 characters".to_string());
    }
    if !is_valid_email(&request.email) {
        errors.push("a valid email is required".to_string());
    }
    if request.total_points < MIN_TOTAL_POINTS {
        errors.push(format!(
            "total points must be at least {}",
            MIN_TOTAL_POINTS
        ));
    }
    if request.timer_ms < MIN_TIMER_MS {
        errors.push(format!("timer must be at least {} ms", MIN_TIMER_MS));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(AppError::BadRequest(errors.join("; ")))
    }
}

fn validate_join(room_code: &str, request: &JoinRoomRequest) -> Result<(), AppError> {
    let mut errors = Vec::new();
    if room_code.trim().len() != ROOM_CODE_LENGTH {
        errors.push(format!(
            "room code must be {} characters",
            ROOM_CODE_LENGTH
        ));
    }
    if request.name.trim().len() < MIN_NAME_LENGTH {
        errors.push("name must be at least 2 characters".to_string());
    }
    if !is_valid_email(&request.email) {
        errors.push("a valid email is required".to_string());
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(AppError::BadRequest(errors.join("; ")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::InMemoryStore;
    use crate::store::ManualClock;

    fn service() -> RoomService {
        let rooms: Arc<InMemoryStore<Room>> = Arc::new(InMemoryStore::new());
        let rounds: Arc<InMemoryStore<CurrentRound>> = Arc::new(InMemoryStore::new());
        RoomService::new(rooms, rounds, Arc::new(ManualClock::new(1_000)), EventBus::new())
    }

    fn create_request() -> CreateRoomRequest {
        CreateRoomRequest {
            name: "Quiz Master".to_string(),
            email: "master@example.com".to_string(),
            total_points: 300,
            timer_ms: 10_000,
        }
    }

    fn join_request(name: &str, email: &str) -> JoinRoomRequest {
        JoinRoomRequest {
            name: name.to_string(),
            email: email.to_string(),
        }
    }

    #[tokio::test]
    async fn test_create_room_generates_code_and_stores_settings() {
        let service = service();
        let (code, room) = service.create_room(create_request()).await.unwrap();

        assert_eq!(code.len(), ROOM_CODE_LENGTH);
        assert_eq!(room.master_key, "master@example_dot_com");
        assert_eq!(room.settings.total_points, 300);
        assert_eq!(room.settings.timer_ms, 10_000);
        assert!(room.participants.is_empty());
    }

    #[tokio::test]
    async fn test_create_room_validation() {
        let service = service();

        let mut request = create_request();
        request.name = "x".to_string();
        request.total_points = 50;
        request.timer_ms = 1_000;

        let err = service.create_room(request).await.unwrap_err();
        match err {
            AppError::BadRequest(message) => {
                assert!(message.contains("name"));
                assert!(message.contains("total points"));
                assert!(message.contains("timer"));
            }
            other => panic!("expected BadRequest, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_join_creates_participant_with_room_budget() {
        let service = service();
        let (code, _) = service.create_room(create_request()).await.unwrap();

        let (user_key, room) = service
            .join_room(&code, join_request("Alice", "alice@example.com"))
            .await
            .unwrap();

        let participant = room.participants.get(&user_key).unwrap();
        assert_eq!(participant.name, "Alice");
        assert_eq!(participant.points_total, 300);
        assert_eq!(participant.points_spent, 0);
        assert!(participant.is_online);
    }

    #[tokio::test]
    async fn test_rejoin_is_idempotent_and_flips_presence() {
        let service = service();
        let (code, _) = service.create_room(create_request()).await.unwrap();

        let (user_key, _) = service
            .join_room(&code, join_request("Alice", "alice@example.com"))
            .await
            .unwrap();
        service.set_online(&code, &user_key, false).await.unwrap();

        let (_, room) = service
            .join_room(&code, join_request("Alice", "alice@example.com"))
            .await
            .unwrap();

        assert_eq!(room.participants.len(), 1);
        assert!(room.participants.get(&user_key).unwrap().is_online);
    }

    #[tokio::test]
    async fn test_join_unknown_room() {
        let service = service();
        let result = service
            .join_room("ZZZZZZ", join_request("Alice", "alice@example.com"))
            .await;
        assert!(matches!(
            result,
            Err(AppError::Game(GameError::NotFound(_)))
        ));
    }

    #[tokio::test]
    async fn test_join_validation() {
        let service = service();
        let result = service.join_room("SHORT", join_request("A", "bad")).await;
        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }

    #[tokio::test]
    async fn test_leaderboard_orders_by_wins_then_available() {
        let service = service();
        let (code, _) = service.create_room(create_request()).await.unwrap();

        let (alice, _) = service
            .join_room(&code, join_request("Alice", "alice@example.com"))
            .await
            .unwrap();
        let (bob, _) = service
            .join_room(&code, join_request("Bob", "bob@example.com"))
            .await
            .unwrap();
        let (carol, _) = service
            .join_room(&code, join_request("Carol", "carol@example.com"))
            .await
            .unwrap();

        // Hand-adjust the records: Bob won a round, Carol spent less
        // than Alice.
        service
            .rooms
            .update(
                &code,
                Box::new(move |current| {
                    let mut room = current.expect("room exists");
                    room.participants.get_mut(&bob).unwrap().rounds_won.push(
                        crate::room::models::RoundWon {
                            question_text: "Q".to_string(),
                            points_awarded: 50,
                            timestamp: 0,
                        },
                    );
                    room.participants.get_mut(&alice).unwrap().points_spent = 40;
                    room.participants.get_mut(&carol).unwrap().points_spent = 10;
                    Ok(Some(room))
                }),
            )
            .await
            .unwrap();

        let leaderboard = service.leaderboard(&code).await.unwrap();
        let names: Vec<&str> = leaderboard.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["Bob", "Carol", "Alice"]);
        assert_eq!(leaderboard[0].rounds_won, 1);
        assert_eq!(leaderboard[2].available_points, 260);
    }

    #[tokio::test]
    async fn test_subscribe_delivers_room_snapshots() {
        let service = service();
        let (code, _) = service.create_room(create_request()).await.unwrap();
        let mut receiver = service.subscribe(&code).await;

        service
            .join_room(&code, join_request("Alice", "alice@example.com"))
            .await
            .unwrap();

        let snapshot = receiver.recv().await.unwrap().unwrap();
        assert_eq!(snapshot.participants.len(), 1);
    }
}
