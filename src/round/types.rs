use serde::{Deserialize, Serialize};

use super::economy::{Leader, Tier};
use super::models::CurrentRound;

/// Request payload for starting a round
#[derive(Debug, Clone, Deserialize)]
pub struct StartRoundRequest {
    pub question_text: String,
    pub max_points: u32,
}

/// Request payload for placing a bid
#[derive(Debug, Clone, Deserialize)]
pub struct BidRequest {
    pub user_key: String,
    pub tier: Tier,
}

/// Query parameters for the eligibility view
#[derive(Debug, Clone, Deserialize)]
pub struct CheckBidQuery {
    pub user_key: String,
    pub tier: Tier,
}

/// Cost of claiming the lead at one tier
#[derive(Debug, Clone, Serialize)]
pub struct TierCost {
    pub tier: Tier,
    pub label: String,
    pub cost: u32,
}

/// Read-only view of the current round for clients
#[derive(Debug, Serialize)]
pub struct RoundView {
    pub round: Option<CurrentRound>,
    pub remaining_ms: i64,
    pub leader: Option<Leader>,
    pub required_costs: Vec<TierCost>,
}
