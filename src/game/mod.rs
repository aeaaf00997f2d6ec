//! Game simulation modules

pub mod driver;
pub mod engine;
pub mod error;
pub mod evaluator;
pub mod player;
pub mod scheduler;
pub mod score;
pub mod server;
pub mod track;
pub mod types;

pub use engine::{DriveRequest, Game, Hub, PlayerReport};
pub use error::GameError;
pub use server::{GameHandle, GameServer};
pub use types::{Action, Obstacle};
