//! Game task and the facade handle used by the transport layer
//!
//! All game state lives in one task. Facade calls travel to it as commands
//! and get their result back on a oneshot channel, so callers still see
//! errors synchronously while no state is ever shared or locked.

use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, info};

use crate::config::GameConfig;
use crate::ws::protocol::{ServerMsg, Snapshot};

use super::engine::{DriveRequest, Game, PlayerReport};
use super::error::GameError;
use super::track::{RandomTrack, Track};

/// Capacity of the update broadcast channel
const UPDATE_CHANNEL_SIZE: usize = 64;
/// Capacity of the command queue
const COMMAND_CHANNEL_SIZE: usize = 256;

type Reply<T> = oneshot::Sender<Result<T, GameError>>;

/// Requests handled by the game task
#[derive(Debug)]
pub enum Command {
    AddPlayer { name: String, reply: Reply<()> },
    RemovePlayer { name: String, reply: Reply<()> },
    Drive {
        name: String,
        request: DriveRequest,
        reply: Reply<()>,
    },
    Start { reply: Reply<()> },
    Stop { reply: Reply<()> },
    GetRate { reply: Reply<f64> },
    SetRate { rate: f64, reply: Reply<()> },
    State { reply: Reply<Snapshot> },
    Report { reply: Reply<Vec<PlayerReport>> },
}

/// Owns the game and drives it from commands and scheduler ticks
pub struct GameServer<T: Track> {
    game: Game<T, broadcast::Sender<ServerMsg>>,
    commands: mpsc::Receiver<Command>,
}

impl GameServer<RandomTrack> {
    /// Create a game over a random track seeded from the config
    pub fn with_random_track(config: GameConfig) -> (Self, GameHandle) {
        let track = RandomTrack::new(config.seed, config.random_track);
        Self::new(config, track)
    }
}

impl<T: Track> GameServer<T> {
    pub fn new(config: GameConfig, track: T) -> (Self, GameHandle) {
        let (command_tx, commands) = mpsc::channel(COMMAND_CHANNEL_SIZE);
        let (update_tx, _) = broadcast::channel(UPDATE_CHANNEL_SIZE);

        let handle = GameHandle {
            commands: command_tx,
            updates: update_tx.clone(),
        };
        let server = Self {
            game: Game::new(config, track, update_tx),
            commands,
        };

        (server, handle)
    }

    /// Run until every handle is dropped
    pub async fn run(mut self) {
        info!("Game server running");

        loop {
            self.game.flush_deferred();

            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(command) => self.handle(command),
                    None => break,
                },
                _ = self.game.scheduler_mut().tick() => self.game.tick(),
            }
        }

        info!("Game server shut down");
    }

    fn handle(&mut self, command: Command) {
        let game = &mut self.game;
        // A dropped reply receiver means the caller gave up, nothing to do
        match command {
            Command::AddPlayer { name, reply } => {
                let _ = reply.send(game.add_player(&name));
            }
            Command::RemovePlayer { name, reply } => {
                let _ = reply.send(game.remove_player(&name));
            }
            Command::Drive {
                name,
                request,
                reply,
            } => {
                let _ = reply.send(game.drive_player(&name, &request));
            }
            Command::Start { reply } => {
                let _ = reply.send(game.start());
            }
            Command::Stop { reply } => {
                let _ = reply.send(game.stop());
            }
            Command::GetRate { reply } => {
                let _ = reply.send(Ok(game.rate()));
            }
            Command::SetRate { rate, reply } => {
                let _ = reply.send(game.set_rate(rate));
            }
            Command::State { reply } => {
                let _ = reply.send(Ok(game.state()));
            }
            Command::Report { reply } => {
                let _ = reply.send(Ok(game.report()));
            }
        }
    }
}

/// Cloneable entry point into a running game
#[derive(Clone)]
pub struct GameHandle {
    commands: mpsc::Sender<Command>,
    updates: broadcast::Sender<ServerMsg>,
}

impl GameHandle {
    async fn request<R>(
        &self,
        build: impl FnOnce(Reply<R>) -> Command,
    ) -> Result<R, GameError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(build(reply))
            .await
            .map_err(|_| GameError::ServerClosed)?;
        response.await.map_err(|_| GameError::ServerClosed)?
    }

    /// Receive every state update from now on
    pub fn subscribe(&self) -> broadcast::Receiver<ServerMsg> {
        self.updates.subscribe()
    }

    pub async fn add_player(&self, name: &str) -> Result<(), GameError> {
        let name = name.to_string();
        self.request(|reply| Command::AddPlayer { name, reply }).await
    }

    pub async fn remove_player(&self, name: &str) -> Result<(), GameError> {
        let name = name.to_string();
        self.request(|reply| Command::RemovePlayer { name, reply })
            .await
    }

    pub async fn drive_action(&self, name: &str, request: DriveRequest) -> Result<(), GameError> {
        debug!(player = %name, ?request, "Drive action");
        let name = name.to_string();
        self.request(|reply| Command::Drive {
            name,
            request,
            reply,
        })
        .await
    }

    pub async fn start(&self) -> Result<(), GameError> {
        self.request(|reply| Command::Start { reply }).await
    }

    pub async fn stop(&self) -> Result<(), GameError> {
        self.request(|reply| Command::Stop { reply }).await
    }

    pub async fn rate(&self) -> Result<f64, GameError> {
        self.request(|reply| Command::GetRate { reply }).await
    }

    pub async fn set_rate(&self, rate: f64) -> Result<(), GameError> {
        self.request(|reply| Command::SetRate { rate, reply }).await
    }

    pub async fn state(&self) -> Result<Snapshot, GameError> {
        self.request(|reply| Command::State { reply }).await
    }

    pub async fn report(&self) -> Result<Vec<PlayerReport>, GameError> {
        self.request(|reply| Command::Report { reply }).await
    }
}
