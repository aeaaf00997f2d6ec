//! Player bookkeeping

use crate::ws::protocol::PlayerSnapshot;

use super::track::{CELLS_PER_PLAYER, PLAYER_ROW};
use super::types::Action;

/// Player state in a game (authoritative)
#[derive(Debug, Clone)]
pub struct Player {
    pub name: String,
    pub car: usize,
    /// Track segment this player drives in
    pub lane: usize,

    // Position
    pub x: i32,
    pub y: i32,

    // Oracle-driven ghost, never sent to clients
    pub ghost_x: i32,
    pub ghost_y: i32,
    /// Lane the oracle picked at the last drive action, consumed by scoring
    pub ghost_target: Option<i32>,

    pub score: i32,
    pub score_ghost: i32,

    pub action: Action,
    pub response_time: f64,
}

impl Player {
    pub fn new(name: String, car: usize, lane: usize) -> Self {
        let mut player = Self {
            name,
            car,
            lane,
            x: 0,
            y: 0,
            ghost_x: 0,
            ghost_y: 0,
            ghost_target: None,
            score: 0,
            score_ghost: 0,
            action: Action::None,
            response_time: 1.0,
        };
        player.reset();
        player
    }

    /// Middle lane of this player's segment
    pub fn start_x(&self) -> i32 {
        self.lane as i32 * CELLS_PER_PLAYER + 1
    }

    pub fn reset(&mut self) {
        self.x = self.start_x();
        self.y = PLAYER_ROW;
        self.ghost_x = self.x;
        self.ghost_y = self.y;
        self.ghost_target = None;
        self.score = 0;
        self.score_ghost = 0;
        self.action = Action::None;
        self.response_time = 1.0;
    }

    pub fn state(&self) -> PlayerSnapshot {
        PlayerSnapshot {
            name: self.name.clone(),
            car: self.car,
            lane: self.lane,
            x: self.x,
            y: self.y,
            score: self.score,
            action: self.action,
            response_time: self.response_time,
        }
    }
}
