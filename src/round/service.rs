use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, instrument};

use super::economy::{required_cost, Bid, Leader, Tier};
use super::eligibility::{check_bid, BidCheck};
use super::models::{CurrentRound, RoundStatus};
use crate::event::{EventBus, RoomEvent};
use crate::room::models::{Room, RoundWon};
use crate::shared::{AppError, GameError};
use crate::store::{AtomicStore, Clock};

/// Service owning the round lifecycle of every room.
///
/// All writes go through the atomic store transforms; the round record
/// and the participant ledger are two separate records, updated in two
/// separate atomic steps (the brief window in between is tolerated by
/// the balance fallback in `Participant::available_points`).
pub struct RoundService {
    rooms: Arc<dyn AtomicStore<Room>>,
    rounds: Arc<dyn AtomicStore<CurrentRound>>,
    clock: Arc<dyn Clock>,
    event_bus: EventBus,
}

impl RoundService {
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

    async fn room(&self, room_code: &str) -> Result<Room, GameError> {
        self.rooms
            .read(room_code)
            .await?
            .ok_or_else(|| GameError::NotFound(format!("room {} does not exist", room_code)))
    }

    /// Starts a new round. Fails while another round is still in
    /// progress; a finished round is replaced.
    #[instrument(skip(self))]
    pub async fn start_round(
        &self,
        room_code: &str,
        question_text: String,
        max_points: u32,
    ) -> Result<CurrentRound, AppError> {
        let room = self.room(room_code).await?;
        let timer_ms = room.settings.timer_ms;
        let now = self.clock.now_ms();

        let question = question_text.clone();
        let committed = self
            .rounds
            .update(
                room_code,
                Box::new(move |current| {
                    if let Some(round) = &current {
                        if round.status == RoundStatus::InProgress {
                            return Err(GameError::InvalidState(
                                "a round is already in progress".to_string(),
                            ));
                        }
                    }
                    Ok(Some(CurrentRound::start(
                        question.clone(),
                        max_points,
                        timer_ms,
                        now,
                    )))
                }),
            )
            .await?
            .ok_or(AppError::Internal)?;

        self.touch_room(room_code, now).await?;

        info!(
            room_code = %room_code,
            question_text = %committed.question_text,
            timer_ms = committed.timer_ms,
            "Round started"
        );
        self.event_bus
            .emit(RoomEvent::RoundStarted {
                room_code: room_code.to_string(),
                question_text: committed.question_text.clone(),
                max_points: committed.max_points,
                timer_ms: committed.timer_ms,
            })
            .await;

        Ok(committed)
    }

    /// Places a bid for a participant at the given tier.
    ///
    /// Step 1 transforms the round record: the cost is recomputed from
    /// the record's own bid set and the bid merged in, all inside one
    /// atomic transform. Step 2 charges the participant ledger with the
    /// delta over their previous bid in this round. The two steps are
    /// deliberately not one transaction; see the balance fallback.
    #[instrument(skip(self))]
    pub async fn submit_bid(
        &self,
        room_code: &str,
        user_key: &str,
        tier: Tier,
    ) -> Result<Bid, AppError> {
        let now = self.clock.now_ms();
        let room = self.room(room_code).await?;
        let participant = room.participant(user_key).cloned().ok_or_else(|| {
            GameError::NotFound(format!("participant {} is not in this room", user_key))
        })?;

        // The participant's previous commitment in this round, for the
        // ledger delta. Only this participant's own bids can change it,
        // so reading it outside the transform is safe.
        let prev_points = self
            .rounds
            .read(room_code)
            .await?
            .and_then(|round| round.bids.get(user_key).map(|bid| bid.points))
            .unwrap_or(0);

        let key = user_key.to_string();
        let committed = self
            .rounds
            .update(
                room_code,
                Box::new(move |current| {
                    let mut round = current.ok_or_else(|| {
                        GameError::InvalidState("no round in progress".to_string())
                    })?;
                    round.accept_bid(&key, tier, &participant, now)?;
                    Ok(Some(round))
                }),
            )
            .await?
            .ok_or(AppError::Internal)?;

        let bid = committed
            .bids
            .get(user_key)
            .cloned()
            .ok_or(AppError::Internal)?;

        // Step 2: charge the ledger. saturating_sub guards the
        // pathological case of a round swap between the read above and
        // the transform; an undercharge there is within the accepted
        // consistency window.
        let delta = bid.points.saturating_sub(prev_points);
        let key = user_key.to_string();
        let code = room_code.to_string();
        self.rooms
            .update(
                room_code,
                Box::new(move |current| {
                    let mut room =
                        current.ok_or_else(|| GameError::NotFound(format!("room {}", code)))?;
                    let participant = room.participants.get_mut(&key).ok_or_else(|| {
                        GameError::NotFound(format!("participant {} is not in this room", key))
                    })?;
                    participant.points_spent += delta;
                    room.updated_at = now;
                    Ok(Some(room))
                }),
            )
            .await?;

        debug!(
            room_code = %room_code,
            user_key = %user_key,
            points = bid.points,
            deadline = committed.deadline(),
            "Bid accepted"
        );
        self.event_bus
            .emit(RoomEvent::BidAccepted {
                room_code: room_code.to_string(),
                user_key: user_key.to_string(),
                points: bid.points,
                target_label: bid.target_label.clone(),
                deadline: committed.deadline(),
            })
            .await;

        Ok(bid)
    }

    /// Finishes the round and resolves the winner.
    ///
    /// The status flip inside the transform guarantees at-most-once
    /// resolution: concurrent finish callers (a client timer racing the
    /// master's button) all but one get `AlreadyFinished`.
    #[instrument(skip(self))]
    pub async fn finish_round(&self, room_code: &str) -> Result<CurrentRound, AppError> {
        let now = self.clock.now_ms();

        let committed = self
            .rounds
            .update(
                room_code,
                Box::new(move |current| {
                    let mut round = current.ok_or_else(|| {
                        GameError::InvalidState("no round in progress".to_string())
                    })?;
                    round.finish(now)?;
                    Ok(Some(round))
                }),
            )
            .await?
            .ok_or(AppError::Internal)?;

        if let Some(winner_key) = committed.winner.clone() {
            self.award_round(room_code, &winner_key, &committed, now)
                .await?;
        } else {
            self.touch_room(room_code, now).await?;
        }

        info!(
            room_code = %room_code,
            winner = ?committed.winner,
            "Round finished"
        );
        self.event_bus
            .emit(RoomEvent::RoundFinished {
                room_code: room_code.to_string(),
                winner: committed.winner.clone(),
                points_awarded: committed.winner_points,
            })
            .await;

        Ok(committed)
    }

    /// Finishes the round if its deadline has passed. Idempotent and
    /// safe to call from any client at any time: a lost finish race or
    /// an unexpired round is a quiet `None`.
    #[instrument(skip(self))]
    pub async fn finish_if_expired(
        &self,
        room_code: &str,
    ) -> Result<Option<CurrentRound>, AppError> {
        let now = self.clock.now_ms();
        let round = match self.rounds.read(room_code).await? {
            Some(round) => round,
            None => return Ok(None),
        };
        if !round.is_expired(now) {
            return Ok(None);
        }

        match self.finish_round(room_code).await {
            Ok(finished) => Ok(Some(finished)),
            Err(AppError::Game(GameError::AlreadyFinished)) => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Clears a finished round so a new one can start.
    #[instrument(skip(self))]
    pub async fn reset_round(&self, room_code: &str) -> Result<(), AppError> {
        self.rounds
            .update(
                room_code,
                Box::new(|current| {
                    let round = current.ok_or_else(|| {
                        GameError::InvalidState("no round to reset".to_string())
                    })?;
                    if round.status != RoundStatus::Finished {
                        return Err(GameError::InvalidState(
                            "round is still in progress".to_string(),
                        ));
                    }
                    Ok(None)
                }),
            )
            .await?;

        self.event_bus
            .emit(RoomEvent::RoundReset {
                room_code: room_code.to_string(),
            })
            .await;

        Ok(())
    }

    /// Current round record, if any (read-only).
    pub async fn round_snapshot(&self, room_code: &str) -> Result<Option<CurrentRound>, AppError> {
        Ok(self.rounds.read(room_code).await?)
    }

    /// Cost of claiming the lead at the given tier right now.
    pub async fn required_cost(&self, room_code: &str, tier: Tier) -> Result<u32, AppError> {
        let round = self.rounds.read(room_code).await?;
        let cost = match &round {
            Some(round) if round.status == RoundStatus::InProgress => {
                required_cost(&round.bids, tier)
            }
            _ => tier.increment(),
        };
        Ok(cost)
    }

    /// Participant currently holding the lead, if the maximum is unique.
    pub async fn current_leader(&self, room_code: &str) -> Result<Option<Leader>, AppError> {
        let round = self.rounds.read(room_code).await?;
        Ok(round.and_then(|round| round.leader()))
    }

    /// Read-only eligibility verdict for UI polling. The committed
    /// amount is still recomputed inside the bid transform.
    pub async fn check_bid(
        &self,
        room_code: &str,
        user_key: &str,
        tier: Tier,
    ) -> Result<BidCheck, AppError> {
        let room = self.room(room_code).await?;
        let round = self.rounds.read(room_code).await?;
        let empty = Default::default();
        let bids = round.as_ref().map(|round| &round.bids).unwrap_or(&empty);
        Ok(check_bid(room.participant(user_key), user_key, bids, tier))
    }

    /// Milliseconds until the deadline of the in-progress round, zero
    /// otherwise.
    pub async fn remaining_ms(&self, room_code: &str) -> Result<i64, AppError> {
        let now = self.clock.now_ms();
        let round = self.rounds.read(room_code).await?;
        Ok(round.map(|round| round.remaining_ms(now)).unwrap_or(0))
    }

    /// Subscribe to full round-record snapshots for a room.
    pub async fn subscribe(&self, room_code: &str) -> broadcast::Receiver<Option<CurrentRound>> {
        self.rounds.watch(room_code).await
    }

    async fn touch_room(&self, room_code: &str, now: i64) -> Result<(), AppError> {
        self.rooms
            .update(
                room_code,
                Box::new(move |current| {
                    let mut room = match current {
                        Some(room) => room,
                        None => return Ok(None),
                    };
                    room.updated_at = now;
                    Ok(Some(room))
                }),
            )
            .await?;
        Ok(())
    }

    async fn award_round(
        &self,
        room_code: &str,
        winner_key: &str,
        round: &CurrentRound,
        now: i64,
    ) -> Result<(), AppError> {
        let key = winner_key.to_string();
        let question_text = round.question_text.clone();
        let points_awarded = round.max_points;
        self.rooms
            .update(
                room_code,
                Box::new(move |current| {
                    let mut room = current
                        .ok_or_else(|| GameError::NotFound("room vanished".to_string()))?;
                    let participant = room.participants.get_mut(&key).ok_or_else(|| {
                        GameError::NotFound(format!("winning participant {} not found", key))
                    })?;
                    participant.rounds_won.push(RoundWon {
                        question_text: question_text.clone(),
                        points_awarded,
                        timestamp: now,
                    });
                    room.updated_at = now;
                    Ok(Some(room))
                }),
            )
            .await?;
        Ok(())
    }
}
