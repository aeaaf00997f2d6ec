//! Errors raised by the game loop and facade

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GameError {
    #[error("Game already started")]
    AlreadyStarted,

    #[error("Game not started")]
    NotStarted,

    #[error("Action forbidden: cannot {0}")]
    ActionForbidden(String),

    #[error("Player exists: {0}")]
    PlayerExists(String),

    #[error("Too many players")]
    TooManyPlayers,

    #[error("No such player: {0}")]
    NoSuchPlayer(String),

    #[error("Invalid message: {0}")]
    InvalidMessage(String),

    #[error("Game server is not running")]
    ServerClosed,
}

impl GameError {
    /// Stable code sent to clients
    pub fn code(&self) -> &'static str {
        match self {
            GameError::AlreadyStarted => "already_started",
            GameError::NotStarted => "not_started",
            GameError::ActionForbidden(_) => "action_forbidden",
            GameError::PlayerExists(_) => "player_exists",
            GameError::TooManyPlayers => "too_many_players",
            GameError::NoSuchPlayer(_) => "no_such_player",
            GameError::InvalidMessage(_) => "invalid_message",
            GameError::ServerClosed => "server_closed",
        }
    }
}
