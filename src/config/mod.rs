//! Configuration module - environment variable parsing

use std::env;
use std::net::SocketAddr;
use std::str::FromStr;

use crate::game::evaluator::LOOKAHEAD_DEPTH;
use crate::game::scheduler::period_for;
use crate::game::track::{CELLS_PER_PLAYER, TRACK_WIDTH};

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Server binding address
    pub server_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Allowed client origins for CORS, any origin when unset
    pub client_origin: Option<String>,
    /// Names of server-hosted autonomous drivers
    pub bot_players: Vec<String>,

    pub game: GameConfig,
}

/// Game rules and pacing
#[derive(Clone, Debug, PartialEq)]
pub struct GameConfig {
    /// Ticks per second
    pub rate: f64,
    /// Ticks per game
    pub duration: u32,
    pub max_players: usize,
    pub number_of_cars: usize,
    /// Rows the oracle looks ahead
    pub lookahead: u32,
    /// Let every segment place its obstacle independently
    pub random_track: bool,
    /// Seed for track generation and slot assignment
    pub seed: u64,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            rate: 1.0,
            duration: 60,
            max_players: (TRACK_WIDTH / CELLS_PER_PLAYER) as usize,
            number_of_cars: 4,
            lookahead: LOOKAHEAD_DEPTH,
            random_track: false,
            seed: 0,
        }
    }
}

impl GameConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if period_for(self.rate).is_none() {
            return Err(ConfigError::Invalid("GAME_RATE"));
        }
        let segments = (TRACK_WIDTH / CELLS_PER_PLAYER) as usize;
        if self.max_players == 0 || self.max_players > segments {
            return Err(ConfigError::Invalid("MAX_PLAYERS"));
        }
        if self.number_of_cars < self.max_players {
            return Err(ConfigError::Invalid("NUMBER_OF_CARS"));
        }
        if self.lookahead > LOOKAHEAD_DEPTH {
            return Err(ConfigError::Invalid("LOOKAHEAD_DEPTH"));
        }
        Ok(())
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // Render provides PORT env var, fall back to SERVER_ADDR or default
        let server_addr = if let Ok(port) = env::var("PORT") {
            format!("0.0.0.0:{}", port)
        } else {
            env::var("SERVER_ADDR").unwrap_or_else(|_| "0.0.0.0:8880".to_string())
        };

        let defaults = GameConfig::default();
        let game = GameConfig {
            rate: parse_or("GAME_RATE", defaults.rate)?,
            duration: parse_or("GAME_DURATION", defaults.duration)?,
            max_players: parse_or("MAX_PLAYERS", defaults.max_players)?,
            number_of_cars: parse_or("NUMBER_OF_CARS", defaults.number_of_cars)?,
            lookahead: parse_or("LOOKAHEAD_DEPTH", defaults.lookahead)?,
            random_track: parse_or("RANDOM_TRACK", defaults.random_track)?,
            seed: match env::var("TRACK_SEED") {
                Ok(raw) => raw.parse().map_err(|_| ConfigError::Invalid("TRACK_SEED"))?,
                Err(_) => rand::random(),
            },
        };
        game.validate()?;

        Ok(Self {
            server_addr: server_addr
                .parse()
                .map_err(|_| ConfigError::InvalidAddress)?,

            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),

            client_origin: env::var("CLIENT_ORIGIN").ok(),

            bot_players: env::var("BOT_PLAYERS")
                .map(|raw| parse_names(&raw))
                .unwrap_or_default(),

            game,
        })
    }
}

fn parse_or<T: FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid(key)),
        Err(_) => Ok(default),
    }
}

fn parse_names(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),

    #[error("Invalid server address format")]
    InvalidAddress,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = GameConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_players, 2);
        assert_eq!(config.lookahead, 6);
    }

    #[test]
    fn rejects_bad_game_values() {
        let bad_rate = GameConfig {
            rate: 0.0,
            ..GameConfig::default()
        };
        assert!(matches!(bad_rate.validate(), Err(ConfigError::Invalid("GAME_RATE"))));

        for rate in [1e12, 1e-20] {
            let extreme = GameConfig {
                rate,
                ..GameConfig::default()
            };
            assert!(matches!(extreme.validate(), Err(ConfigError::Invalid("GAME_RATE"))));
        }

        let too_many = GameConfig {
            max_players: 3,
            ..GameConfig::default()
        };
        assert!(matches!(too_many.validate(), Err(ConfigError::Invalid("MAX_PLAYERS"))));

        let few_cars = GameConfig {
            number_of_cars: 1,
            ..GameConfig::default()
        };
        assert!(matches!(few_cars.validate(), Err(ConfigError::Invalid("NUMBER_OF_CARS"))));
    }

    #[test]
    fn bot_names_are_trimmed() {
        assert_eq!(parse_names(" yosef, ,rosie "), vec!["yosef", "rosie"]);
        assert!(parse_names("").is_empty());
    }
}
