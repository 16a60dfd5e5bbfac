use serde::Serialize;
use std::collections::HashMap;

use super::economy::{current_leader, required_cost, Bid, Tier};
use crate::room::models::Participant;
use crate::shared::GameError;

/// Decides whether a participant may place a bid at the given tier.
///
/// Returns the required cost on success; the caller must commit that
/// exact amount, not the raw tier increment, or participants get under-
/// or over-charged. Checks run in order: unknown participant, budget,
/// self-outbid.
pub fn can_bid(
    participant: Option<&Participant>,
    user_key: &str,
    bids: &HashMap<String, Bid>,
    tier: Tier,
) -> Result<u32, GameError> {
    let participant = participant.ok_or_else(|| {
        GameError::NotFound(format!("participant {} is not in this room", user_key))
    })?;

    let required = required_cost(bids, tier);
    let available = participant.available_points(bids.get(user_key));
    if available < required {
        return Err(GameError::InsufficientPoints {
            required,
            available,
        });
    }

    if let Some(leader) = current_leader(bids) {
        if leader.user_key == user_key {
            return Err(GameError::AlreadyLeading);
        }
    }

    Ok(required)
}

/// Structured eligibility verdict for read-only UI polling
#[derive(Debug, Clone, Serialize)]
pub struct BidCheck {
    pub allowed: bool,
    pub reason: Option<String>,
    pub required_cost: u32,
}

pub fn check_bid(
    participant: Option<&Participant>,
    user_key: &str,
    bids: &HashMap<String, Bid>,
    tier: Tier,
) -> BidCheck {
    let required = required_cost(bids, tier);
    match can_bid(participant, user_key, bids, tier) {
        Ok(cost) => BidCheck {
            allowed: true,
            reason: None,
            required_cost: cost,
        },
        Err(err) => BidCheck {
            allowed: false,
            reason: Some(err.to_string()),
            required_cost: required,
        },
    }
}
