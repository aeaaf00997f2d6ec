//! WebSocket protocol message definitions
//! These are the wire types for client-server communication

use serde::{Deserialize, Serialize};

use crate::game::track::TrackSnapshot;
use crate::game::types::Action;

/// Messages sent from client to server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMsg {
    /// Join the game under a unique name
    Join { name: String },

    /// Action for the next tick. Validated by the game, so both fields are
    /// optional on the wire.
    Drive {
        action: Option<String>,
        /// Seconds the driver took to decide
        response_time: Option<f64>,
    },

    /// Leave the game
    Leave,

    Start,

    Stop,

    /// Change the tick rate (ticks per second)
    SetRate { rate: f64 },
}

/// Messages sent from server to client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMsg {
    /// Full game state, sent every tick and on every roster/config change
    Update { payload: Snapshot },

    /// Confirmation of a join on this connection
    Joined { name: String },

    /// Error message
    Error { code: String, message: String },
}

/// Game state as broadcast to clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub started: bool,
    pub track: TrackSnapshot,
    pub players: Vec<PlayerSnapshot>,
    /// Ticks left before the game stops
    pub timeleft: u32,
    /// Ticks per second
    pub rate: f64,
}

/// Player state in a snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerSnapshot {
    pub name: String,
    pub car: usize,
    pub lane: usize,
    pub x: i32,
    pub y: i32,
    pub score: i32,
    /// Last action submitted
    pub action: Action,
    pub response_time: f64,
}
