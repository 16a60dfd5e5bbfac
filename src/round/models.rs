use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::economy::{current_leader, Bid, Leader, Tier};
use super::eligibility::can_bid;
use crate::room::models::Participant;
use crate::shared::GameError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoundStatus {
    InProgress,
    Finished,
}

/// The active or most-recently-finished bidding contest of a room.
///
/// Stored under the room code, separately from the room record. All
/// transitions happen inside an atomic store transform; the methods here
/// are pure so they can be unit-tested against literal records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentRound {
    pub question_text: String,
    /// Prize recorded for the winner, independent of the bid amounts
    /// actually committed.
    pub max_points: u32,
    pub status: RoundStatus,
    /// Reset to "now" by every accepted bid; the deadline is always
    /// `started_at + timer_ms`.
    pub started_at: i64,
    pub timer_ms: i64,
    #[serde(default)]
    pub bids: HashMap<String, Bid>,
    pub winner: Option<String>,
    pub winner_points: Option<u32>,
    pub ended_at: Option<i64>,
}

impl CurrentRound {
    pub fn start(question_text: String, max_points: u32, timer_ms: i64, now: i64) -> Self {
        Self {
            question_text,
            max_points,
            status: RoundStatus::InProgress,
            started_at: now,
            timer_ms,
            bids: HashMap::new(),
            winner: None,
            winner_points: None,
            ended_at: None,
        }
    }

    pub fn deadline(&self) -> i64 {
        self.started_at + self.timer_ms
    }

    pub fn remaining_ms(&self, now: i64) -> i64 {
        if self.status != RoundStatus::InProgress {
            return 0;
        }
        (self.deadline() - now).max(0)
    }

    pub fn is_expired(&self, now: i64) -> bool {
        self.status == RoundStatus::InProgress && now >= self.deadline()
    }

    pub fn leader(&self) -> Option<Leader> {
        current_leader(&self.bids)
    }

    /// Records a bid for the participant, overwriting any earlier bid of
    /// theirs ("latest bid stands"), and restarts the full countdown.
    ///
    /// The cost is recomputed here from this record's own bid set, so a
    /// caller racing against other bidders can never commit a stale
    /// amount.
    pub fn accept_bid(
        &mut self,
        user_key: &str,
        tier: Tier,
        participant: &Participant,
        now: i64,
    ) -> Result<Bid, GameError> {
        if self.status != RoundStatus::InProgress {
            return Err(GameError::InvalidState(
                "round is not in progress".to_string(),
            ));
        }

        let cost = can_bid(Some(participant), user_key, &self.bids, tier)?;

        let bid = Bid {
            user_key: user_key.to_string(),
            points: cost,
            server_ts: now,
            tier,
            target_label: tier.label().to_string(),
        };
        self.bids.insert(user_key.to_string(), bid.clone());
        self.started_at = now;

        Ok(bid)
    }

    /// Transitions the round to finished and determines the winner.
    ///
    /// The status flip doubles as the once-only guard: of N racing
    /// finish callers, exactly one sees `InProgress` inside the store
    /// transform and performs the resolution, the rest get
    /// `AlreadyFinished`.
    pub fn finish(&mut self, now: i64) -> Result<Option<Leader>, GameError> {
        if self.status == RoundStatus::Finished {
            return Err(GameError::AlreadyFinished);
        }

        self.status = RoundStatus::Finished;
        self.ended_at = Some(now);

        let leader = self.leader();
        if let Some(winner) = &leader {
            self.winner = Some(winner.user_key.clone());
            self.winner_points = Some(self.max_points);
        }
        Ok(leader)
    }
}
