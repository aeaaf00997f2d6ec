//! Obstacle and action vocabulary shared by the track, scoring and search

use std::fmt;
use std::str::FromStr;

use rand::Rng;
use serde::{Deserialize, Serialize};

/// What occupies a single track cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Obstacle {
    #[default]
    None,
    Penguin,
    Water,
    Crack,
    Trash,
    Bike,
    Barrier,
}

impl Obstacle {
    pub const ALL: [Obstacle; 7] = [
        Obstacle::None,
        Obstacle::Penguin,
        Obstacle::Water,
        Obstacle::Crack,
        Obstacle::Trash,
        Obstacle::Bike,
        Obstacle::Barrier,
    ];

    /// Points awarded for meeting this obstacle while staying in lane and
    /// reacting correctly. Blocking obstacles cannot be handled in lane.
    pub fn points(self) -> i32 {
        match self {
            Obstacle::None => 0,
            Obstacle::Penguin => 10,
            Obstacle::Water => 4,
            Obstacle::Crack => 5,
            Obstacle::Trash | Obstacle::Bike | Obstacle::Barrier => -10,
        }
    }

    /// The action that handles this obstacle without leaving the lane
    pub fn reaction(self) -> Option<Action> {
        match self {
            Obstacle::None => Some(Action::None),
            Obstacle::Penguin => Some(Action::Pickup),
            Obstacle::Water => Some(Action::Brake),
            Obstacle::Crack => Some(Action::Jump),
            Obstacle::Trash | Obstacle::Bike | Obstacle::Barrier => None,
        }
    }

    /// Cells that punish a car arriving from a neighbouring lane
    pub fn is_lateral_hazard(self) -> bool {
        matches!(self, Obstacle::Crack | Obstacle::Water)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Obstacle::None => "none",
            Obstacle::Penguin => "penguin",
            Obstacle::Water => "water",
            Obstacle::Crack => "crack",
            Obstacle::Trash => "trash",
            Obstacle::Bike => "bike",
            Obstacle::Barrier => "barrier",
        }
    }

    /// Uniform draw over every obstacle kind, empty included
    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self::ALL[rng.gen_range(0..Self::ALL.len())]
    }
}

impl fmt::Display for Obstacle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One discrete driver decision per tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    #[default]
    None,
    Left,
    Right,
    Brake,
    Jump,
    Pickup,
}

impl Action {
    pub const ALL: [Action; 6] = [
        Action::None,
        Action::Left,
        Action::Right,
        Action::Brake,
        Action::Jump,
        Action::Pickup,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Action::None => "none",
            Action::Left => "left",
            Action::Right => "right",
            Action::Brake => "brake",
            Action::Jump => "jump",
            Action::Pickup => "pickup",
        }
    }

    /// Lateral offset this action applies to the car
    pub fn lane_shift(self) -> i32 {
        match self {
            Action::Left => -1,
            Action::Right => 1,
            _ => 0,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown action: {0}")]
pub struct UnknownAction(pub String);

impl FromStr for Action {
    type Err = UnknownAction;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Action::ALL
            .into_iter()
            .find(|action| action.as_str() == s)
            .ok_or_else(|| UnknownAction(s.to_string()))
    }
}
