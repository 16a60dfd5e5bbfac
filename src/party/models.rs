use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::shared::GameError;

/// Store key of the single shared party game record.
pub const PARTY_RECORD_KEY: &str = "game";

pub const DEFAULT_QUESTION: &str = "Who deserves a point?";
pub const DEFAULT_SESSION_DURATION_MS: i64 = 3_000;
pub const DEFAULT_MAX_POINTS: u32 = 10;

/// A recorded session win
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Victory {
    pub target_name: String,
    pub points_used: u32,
}

/// One player in the party game
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartyPlayer {
    pub name: String,
    /// Points accumulated in the current session; reset when a new
    /// session starts
    #[serde(default)]
    pub temp_points: u32,
    #[serde(default)]
    pub victories: Vec<Victory>,
}

impl PartyPlayer {
    pub fn new(name: String) -> Self {
        Self {
            name,
            temp_points: 0,
            victories: Vec::new(),
        }
    }

    /// Cumulative points across recorded victories
    pub fn points_used(&self) -> u32 {
        self.victories.iter().map(|victory| victory.points_used).sum()
    }
}

/// The single shared party game: a pool of players and at most one
/// running session.
///
/// Unlike the tiered round economy, every press is worth exactly one
/// point, capped at `max_points`, and the session has no distinct
/// finished state: resolution flips it straight back to idle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartyGame {
    pub session_active: bool,
    pub expires_at: i64,
    pub duration_ms: i64,
    pub current_question: String,
    pub last_buzzer: Option<String>,
    pub max_points: u32,
    #[serde(default)]
    pub players: HashMap<String, PartyPlayer>,
}

impl Default for PartyGame {
    fn default() -> Self {
        Self {
            session_active: false,
            expires_at: 0,
            duration_ms: DEFAULT_SESSION_DURATION_MS,
            current_question: DEFAULT_QUESTION.to_string(),
            last_buzzer: None,
            max_points: DEFAULT_MAX_POINTS,
            players: HashMap::new(),
        }
    }
}

impl PartyGame {
    /// Starts a new session: clears every player's temporary points and
    /// arms the expiry timer.
    pub fn start_session(&mut self, question: Option<String>, duration_ms: Option<i64>, now: i64) {
        for player in self.players.values_mut() {
            player.temp_points = 0;
        }
        self.session_active = true;
        self.duration_ms = duration_ms
            .filter(|ms| *ms > 0)
            .unwrap_or(DEFAULT_SESSION_DURATION_MS);
        self.expires_at = now + self.duration_ms;
        self.current_question = question
            .filter(|q| !q.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_QUESTION.to_string());
        self.last_buzzer = None;
    }

    /// One buzzer press: +1 temporary point (capped at `max_points`)
    /// and a fresh expiry window measured from the session's configured
    /// duration.
    pub fn press(&mut self, player_id: &str, now: i64) -> Result<u32, GameError> {
        if !self.session_active {
            return Err(GameError::InvalidState("no session running".to_string()));
        }
        let max_points = self.max_points;
        let player = self.players.get_mut(player_id).ok_or_else(|| {
            GameError::NotFound(format!("player {} is not in the game", player_id))
        })?;

        if player.temp_points < max_points {
            player.temp_points += 1;
        }
        let temp_points = player.temp_points;

        self.expires_at = now + self.duration_ms;
        self.last_buzzer = Some(player_id.to_string());
        Ok(temp_points)
    }

    /// Ends the session and records at most one victory.
    ///
    /// The `session_active` flag is the once-only guard: a second
    /// resolver sees an idle session and fails, so no session can ever
    /// produce two victory records. A tie at the maximum records
    /// nothing.
    pub fn resolve(&mut self) -> Result<Option<(String, Victory)>, GameError> {
        if !self.session_active {
            return Err(GameError::InvalidState("no session running".to_string()));
        }
        self.session_active = false;
        self.expires_at = 0;

        let winner = match self.session_winner() {
            Some(winner) => winner,
            None => return Ok(None),
        };

        let victory = Victory {
            target_name: self.current_question.clone(),
            points_used: winner.1,
        };
        if let Some(player) = self.players.get_mut(&winner.0) {
            player.victories.push(victory.clone());
        }
        Ok(Some((winner.0, victory)))
    }

    /// The unique player holding the session maximum, if that maximum
    /// is positive and unshared.
    pub fn session_winner(&self) -> Option<(String, u32)> {
        let max_points = self.players.values().map(|p| p.temp_points).max()?;
        if max_points == 0 {
            return None;
        }
        let mut at_max = self
            .players
            .iter()
            .filter(|(_, p)| p.temp_points == max_points);
        let (winner_id, _) = at_max.next()?;
        if at_max.next().is_some() {
            return None;
        }
        Some((winner_id.clone(), max_points))
    }

    pub fn is_expired(&self, now: i64) -> bool {
        self.session_active && now >= self.expires_at
    }

    pub fn remaining_ms(&self, now: i64) -> i64 {
        if !self.session_active {
            return 0;
        }
        (self.expires_at - now).max(0)
    }
}
