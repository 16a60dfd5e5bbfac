use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use strum_macros::EnumIter;

/// Bonus tier a participant selects when bidding.
///
/// The tier is the increment added on top of the current leader's
/// committed points; it is not the cost itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumIter)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Tier {
    Buzz,
    Plus5,
    Plus10,
    Plus20,
}

impl Tier {
    pub fn increment(&self) -> u32 {
        match self {
            Tier::Buzz => 1,
            Tier::Plus5 => 5,
            Tier::Plus10 => 10,
            Tier::Plus20 => 20,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Tier::Buzz => "BUZZ",
            Tier::Plus5 => "+5",
            Tier::Plus10 => "+10",
            Tier::Plus20 => "+20",
        }
    }
}

impl TryFrom<u32> for Tier {
    type Error = u32;

    fn try_from(increment: u32) -> Result<Self, Self::Error> {
        match increment {
            1 => Ok(Tier::Buzz),
            5 => Ok(Tier::Plus5),
            10 => Ok(Tier::Plus10),
            20 => Ok(Tier::Plus20),
            other => Err(other),
        }
    }
}

/// One participant's claim on the current round's lead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bid {
    pub user_key: String,
    /// Points committed; always equals the required cost computed at the
    /// moment the bid was accepted.
    pub points: u32,
    /// Server-assigned timestamp; client clocks are never trusted for
    /// ordering.
    pub server_ts: i64,
    pub tier: Tier,
    pub target_label: String,
}

/// The bid currently holding the round's lead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Leader {
    pub user_key: String,
    pub points: u32,
}

/// Finds the unique bid with the maximum committed points.
///
/// A tie at the maximum designates nobody: downstream winner
/// determination requires a single leader, so an ambiguous maximum
/// yields `None`. Accepted bids always strictly exceed the previous
/// maximum, so ties cannot arise through the normal bidding path.
pub fn current_leader(bids: &HashMap<String, Bid>) -> Option<Leader> {
    let max_points = bids.values().map(|bid| bid.points).max()?;
    let mut at_max = bids.values().filter(|bid| bid.points == max_points);
    let leader = at_max.next()?;
    if at_max.next().is_some() {
        return None;
    }
    Some(Leader {
        user_key: leader.user_key.clone(),
        points: max_points,
    })
}

/// Points needed to claim the lead with the given tier.
///
/// With no bids the cost is the tier increment alone; otherwise it is
/// the highest committed amount plus the increment, which makes the cost
/// ladder strictly increasing with every accepted bid.
pub fn required_cost(bids: &HashMap<String, Bid>, tier: Tier) -> u32 {
    let top = bids.values().map(|bid| bid.points).max().unwrap_or(0);
    top + tier.increment()
}
