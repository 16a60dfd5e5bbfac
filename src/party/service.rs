use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, instrument};

use super::models::{PartyGame, PartyPlayer, Victory, PARTY_RECORD_KEY};
use crate::event::{EventBus, RoomEvent};
use crate::shared::{AppError, GameError};
use crate::store::{AtomicStore, Clock};

/// Outcome of a resolved party session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOutcome {
    pub winner: Option<(String, Victory)>,
    pub game: PartyGame,
}

/// Service for the single shared party game.
///
/// Every mutation is an atomic transform of the one party record; the
/// record is created lazily with defaults on first use.
pub struct PartyService {
    store: Arc<dyn AtomicStore<PartyGame>>,
    clock: Arc<dyn Clock>,
    event_bus: EventBus,
}

impl PartyService {
    pub fn new(
        store: Arc<dyn AtomicStore<PartyGame>>,
        clock: Arc<dyn Clock>,
        event_bus: EventBus,
    ) -> Self {
        Self {
            store,
            clock,
            event_bus,
        }
    }

    /// Adds a player to the pool. Re-adding an existing player keeps
    /// their victories.
    #[instrument(skip(self))]
    pub async fn add_player(&self, name: &str) -> Result<String, AppError> {
        let trimmed = name.trim().to_string();
        if trimmed.is_empty() {
            return Err(AppError::BadRequest("player name is required".to_string()));
        }

        let player_id = trimmed.clone();
        let id = player_id.clone();
        self.store
            .update(
                PARTY_RECORD_KEY,
                Box::new(move |current| {
                    let mut game = current.unwrap_or_default();
                    game.players
                        .entry(id.clone())
                        .or_insert_with(|| PartyPlayer::new(trimmed.clone()));
                    Ok(Some(game))
                }),
            )
            .await?;

        debug!(player_id = %player_id, "Party player added");
        Ok(player_id)
    }

    /// Removes a player from the pool; removing an absent player is a
    /// no-op.
    #[instrument(skip(self))]
    pub async fn remove_player(&self, player_id: &str) -> Result<(), AppError> {
        let id = player_id.to_string();
        self.store
            .update(
                PARTY_RECORD_KEY,
                Box::new(move |current| {
                    let mut game = current.unwrap_or_default();
                    game.players.remove(&id);
                    Ok(Some(game))
                }),
            )
            .await?;
        Ok(())
    }

    /// Starts a new session, clearing all temporary points.
    #[instrument(skip(self))]
    pub async fn start_session(
        &self,
        question: Option<String>,
        duration_ms: Option<i64>,
    ) -> Result<PartyGame, AppError> {
        let now = self.clock.now_ms();
        let game = self
            .store
            .update(
                PARTY_RECORD_KEY,
                Box::new(move |current| {
                    let mut game = current.unwrap_or_default();
                    game.start_session(question.clone(), duration_ms, now);
                    Ok(Some(game))
                }),
            )
            .await?
            .ok_or(AppError::Internal)?;

        info!(
            question = %game.current_question,
            expires_at = game.expires_at,
            "Party session started"
        );
        self.event_bus
            .emit(RoomEvent::SessionStarted {
                question: game.current_question.clone(),
                expires_at: game.expires_at,
            })
            .await;

        Ok(game)
    }

    /// One buzzer press for a player; re-arms the session timer.
    #[instrument(skip(self))]
    pub async fn press(&self, player_id: &str) -> Result<u32, AppError> {
        let now = self.clock.now_ms();
        let id = player_id.to_string();
        let game = self
            .store
            .update(
                PARTY_RECORD_KEY,
                Box::new(move |current| {
                    let mut game = current.ok_or_else(|| {
                        GameError::InvalidState("no session running".to_string())
                    })?;
                    game.press(&id, now)?;
                    Ok(Some(game))
                }),
            )
            .await?
            .ok_or(AppError::Internal)?;

        let temp_points = game
            .players
            .get(player_id)
            .map(|player| player.temp_points)
            .unwrap_or(0);

        self.event_bus
            .emit(RoomEvent::BuzzerPressed {
                player_id: player_id.to_string(),
                temp_points,
                expires_at: game.expires_at,
            })
            .await;

        Ok(temp_points)
    }

    /// Stops the running session and resolves it. Exactly one of N
    /// racing stoppers performs the resolution.
    #[instrument(skip(self))]
    pub async fn stop_session(&self) -> Result<SessionOutcome, AppError> {
        let game = self
            .store
            .update(
                PARTY_RECORD_KEY,
                Box::new(|current| {
                    let mut game = current.ok_or_else(|| {
                        GameError::InvalidState("no session running".to_string())
                    })?;
                    game.resolve()?;
                    Ok(Some(game))
                }),
            )
            .await?
            .ok_or(AppError::Internal)?;

        // The resolver left temp_points untouched, so the winner is
        // recomputable from the committed snapshot.
        let winner = game.session_winner().map(|(player_id, points_used)| {
            (
                player_id,
                Victory {
                    target_name: game.current_question.clone(),
                    points_used,
                },
            )
        });

        info!(winner = ?winner.as_ref().map(|(id, _)| id), "Party session ended");
        self.event_bus
            .emit(RoomEvent::SessionEnded {
                winner: winner.as_ref().map(|(id, _)| id.clone()),
                points_used: winner.as_ref().map(|(_, victory)| victory.points_used),
            })
            .await;

        Ok(SessionOutcome { winner, game })
    }

    /// Resolves the session if its expiry has passed. Idempotent; a
    /// lost resolution race is a quiet `None`.
    #[instrument(skip(self))]
    pub async fn finish_if_expired(&self) -> Result<Option<SessionOutcome>, AppError> {
        let now = self.clock.now_ms();
        let game = match self.store.read(PARTY_RECORD_KEY).await? {
            Some(game) => game,
            None => return Ok(None),
        };
        if !game.is_expired(now) {
            return Ok(None);
        }

        match self.stop_session().await {
            Ok(outcome) => Ok(Some(outcome)),
            Err(AppError::Game(GameError::InvalidState(_))) => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Deletes one recorded victory of a player (master correction).
    #[instrument(skip(self))]
    pub async fn delete_victory(&self, player_id: &str, index: usize) -> Result<(), AppError> {
        let id = player_id.to_string();
        self.store
            .update(
                PARTY_RECORD_KEY,
                Box::new(move |current| {
                    let mut game = current.unwrap_or_default();
                    let player = game.players.get_mut(&id).ok_or_else(|| {
                        GameError::NotFound(format!("player {} is not in the game", id))
                    })?;
                    if index < player.victories.len() {
                        player.victories.remove(index);
                    }
                    Ok(Some(game))
                }),
            )
            .await?;
        Ok(())
    }

    /// Clears all victories of a player.
    #[instrument(skip(self))]
    pub async fn reset_player_points(&self, player_id: &str) -> Result<(), AppError> {
        let id = player_id.to_string();
        self.store
            .update(
                PARTY_RECORD_KEY,
                Box::new(move |current| {
                    let mut game = current.unwrap_or_default();
                    let player = game.players.get_mut(&id).ok_or_else(|| {
                        GameError::NotFound(format!("player {} is not in the game", id))
                    })?;
                    player.victories.clear();
                    Ok(Some(game))
                }),
            )
            .await?;
        Ok(())
    }

    /// Sets the per-session point cap.
    #[instrument(skip(self))]
    pub async fn set_max_points(&self, max_points: u32) -> Result<(), AppError> {
        if max_points == 0 {
            return Err(AppError::BadRequest(
                "max points must be positive".to_string(),
            ));
        }
        self.store
            .update(
                PARTY_RECORD_KEY,
                Box::new(move |current| {
                    let mut game = current.unwrap_or_default();
                    game.max_points = max_points;
                    Ok(Some(game))
                }),
            )
            .await?;
        Ok(())
    }

    /// Current party record; defaults when nothing has been written yet.
    pub async fn snapshot(&self) -> Result<PartyGame, AppError> {
        Ok(self.store.read(PARTY_RECORD_KEY).await?.unwrap_or_default())
    }

    /// Subscribe to full party-record snapshots.
    pub async fn subscribe(&self) -> broadcast::Receiver<Option<PartyGame>> {
        self.store.watch(PARTY_RECORD_KEY).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::InMemoryStore;
    use crate::store::ManualClock;

    struct Harness {
        service: PartyService,
        clock: Arc<ManualClock>,
    }

    fn harness() -> Harness {
        let clock = Arc::new(ManualClock::new(1_000));
        let store: Arc<InMemoryStore<PartyGame>> = Arc::new(InMemoryStore::new());
        let service = PartyService::new(store, clock.clone(), EventBus::new());
        Harness { service, clock }
    }

    async fn press_times(h: &Harness, player: &str, times: u32) {
        for _ in 0..times {
            h.service.press(player).await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_add_player_is_idempotent() {
        let h = harness();
        h.service.add_player("anna").await.unwrap();
        h.service.start_session(None, None).await.unwrap();
        press_times(&h, "anna", 2).await;
        h.service.stop_session().await.unwrap();

        // Re-adding must not wipe the recorded victory.
        h.service.add_player("anna").await.unwrap();
        let game = h.service.snapshot().await.unwrap();
        assert_eq!(game.players.get("anna").unwrap().victories.len(), 1);
    }

    #[tokio::test]
    async fn test_add_player_requires_a_name() {
        let h = harness();
        let result = h.service.add_player("   ").await;
        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }

    #[tokio::test]
    async fn test_expired_tie_records_no_victory() {
        let h = harness();
        for name in ["anna", "ben", "carl"] {
            h.service.add_player(name).await.unwrap();
        }
        h.service
            .start_session(Some("Funniest?".to_string()), Some(3_000))
            .await
            .unwrap();

        press_times(&h, "anna", 3).await;
        press_times(&h, "ben", 3).await;
        press_times(&h, "carl", 1).await;

        h.clock.advance(60_000);
        let outcome = h.service.finish_if_expired().await.unwrap().unwrap();

        assert_eq!(outcome.winner, None);
        let game = h.service.snapshot().await.unwrap();
        assert!(game.players.values().all(|p| p.victories.is_empty()));
        assert!(!game.session_active);
    }

    #[tokio::test]
    async fn test_expired_unique_leader_wins() {
        let h = harness();
        for name in ["anna", "ben", "carl"] {
            h.service.add_player(name).await.unwrap();
        }
        h.service
            .start_session(Some("Best dancer?".to_string()), Some(3_000))
            .await
            .unwrap();

        press_times(&h, "anna", 4).await;
        press_times(&h, "ben", 2).await;

        h.clock.advance(60_000);
        let outcome = h.service.finish_if_expired().await.unwrap().unwrap();

        let (winner_id, victory) = outcome.winner.unwrap();
        assert_eq!(winner_id, "anna");
        assert_eq!(victory.target_name, "Best dancer?");
        assert_eq!(victory.points_used, 4);

        let game = h.service.snapshot().await.unwrap();
        assert_eq!(game.players.get("anna").unwrap().victories.len(), 1);
    }

    #[tokio::test]
    async fn test_finish_if_expired_is_idempotent() {
        let h = harness();
        h.service.add_player("anna").await.unwrap();
        h.service.start_session(None, Some(3_000)).await.unwrap();
        press_times(&h, "anna", 2).await;

        h.clock.advance(60_000);
        assert!(h.service.finish_if_expired().await.unwrap().is_some());
        assert!(h.service.finish_if_expired().await.unwrap().is_none());

        let game = h.service.snapshot().await.unwrap();
        assert_eq!(game.players.get("anna").unwrap().victories.len(), 1);
    }

    #[tokio::test]
    async fn test_press_rearms_the_expiry() {
        let h = harness();
        h.service.add_player("anna").await.unwrap();
        h.service.start_session(None, Some(3_000)).await.unwrap();

        h.clock.advance(2_500);
        h.service.press("anna").await.unwrap();

        // Not expired: the press pushed the deadline out.
        assert!(h.service.finish_if_expired().await.unwrap().is_none());
        let game = h.service.snapshot().await.unwrap();
        assert_eq!(game.expires_at, 3_500 + 3_000);
        assert_eq!(game.last_buzzer.as_deref(), Some("anna"));
    }

    #[tokio::test]
    async fn test_new_session_resets_temp_points() {
        let h = harness();
        h.service.add_player("anna").await.unwrap();
        h.service.start_session(None, None).await.unwrap();
        press_times(&h, "anna", 3).await;
        h.service.stop_session().await.unwrap();

        h.service.start_session(None, None).await.unwrap();
        let game = h.service.snapshot().await.unwrap();
        assert_eq!(game.players.get("anna").unwrap().temp_points, 0);
    }

    #[tokio::test]
    async fn test_stop_without_session_is_invalid() {
        let h = harness();
        let result = h.service.stop_session().await;
        assert!(matches!(
            result,
            Err(AppError::Game(GameError::InvalidState(_)))
        ));
    }

    #[tokio::test]
    async fn test_victory_maintenance() {
        let h = harness();
        h.service.add_player("anna").await.unwrap();

        for _ in 0..2 {
            h.service.start_session(None, None).await.unwrap();
            h.service.press("anna").await.unwrap();
            h.service.stop_session().await.unwrap();
        }
        let game = h.service.snapshot().await.unwrap();
        assert_eq!(game.players.get("anna").unwrap().victories.len(), 2);

        h.service.delete_victory("anna", 0).await.unwrap();
        let game = h.service.snapshot().await.unwrap();
        assert_eq!(game.players.get("anna").unwrap().victories.len(), 1);

        h.service.reset_player_points("anna").await.unwrap();
        let game = h.service.snapshot().await.unwrap();
        assert!(game.players.get("anna").unwrap().victories.is_empty());
        assert_eq!(game.players.get("anna").unwrap().points_used(), 0);
    }

    #[tokio::test]
    async fn test_max_points_cap_applies_to_presses() {
        let h = harness();
        h.service.add_player("anna").await.unwrap();
        h.service.set_max_points(2).await.unwrap();
        h.service.start_session(None, None).await.unwrap();

        press_times(&h, "anna", 5).await;

        let game = h.service.snapshot().await.unwrap();
        assert_eq!(game.players.get("anna").unwrap().temp_points, 2);
    }
}
