//! WebSocket upgrade handler

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::app::AppState;
use crate::game::{DriveRequest, GameError, GameHandle};
use crate::util::rate_limit::ConnectionRateLimiter;
use crate::ws::protocol::{ClientMsg, ServerMsg};

/// WebSocket upgrade handler
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state.game))
}

/// Handle the upgraded WebSocket connection
async fn handle_socket(socket: WebSocket, game: GameHandle) {
    let session_id = Uuid::new_v4();
    info!(session_id = %session_id, "New WebSocket connection");

    let (ws_sink, ws_stream) = socket.split();
    let updates = game.subscribe();

    let player = run_session(session_id, &game, ws_sink, ws_stream, updates).await;

    // Cleanup on disconnect
    if let Some(name) = player {
        match game.remove_player(&name).await {
            Ok(()) | Err(GameError::NoSuchPlayer(_)) => {}
            Err(e) => warn!(session_id = %session_id, error = %e, "Failed to remove player"),
        }
    }

    info!(session_id = %session_id, "WebSocket connection closed");
}

/// Run the WebSocket session with read/write split. Returns the player this
/// connection still owns.
async fn run_session(
    session_id: Uuid,
    game: &GameHandle,
    mut ws_sink: futures::stream::SplitSink<WebSocket, Message>,
    mut ws_stream: futures::stream::SplitStream<WebSocket>,
    mut updates: broadcast::Receiver<ServerMsg>,
) -> Option<String> {
    let rate_limiter = ConnectionRateLimiter::new();
    let (reply_tx, mut reply_rx) = mpsc::channel::<ServerMsg>(16);

    // Spawn writer task: game updates and direct replies -> WebSocket
    let writer_handle = tokio::spawn(async move {
        loop {
            let msg = tokio::select! {
                update = updates.recv() => match update {
                    Ok(msg) => msg,
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(session_id = %session_id, lagged_count = n, "Client lagged, skipping {} updates", n);
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        debug!(session_id = %session_id, "Update channel closed");
                        break;
                    }
                },
                reply = reply_rx.recv() => match reply {
                    Some(msg) => msg,
                    None => break,
                },
            };

            if let Err(e) = send_msg(&mut ws_sink, &msg).await {
                debug!(session_id = %session_id, error = %e, "WebSocket send failed");
                break;
            }
        }
    });

    let mut player: Option<String> = None;

    // Reader loop: WebSocket -> game
    while let Some(result) = ws_stream.next().await {
        match result {
            Ok(Message::Text(text)) => {
                let client_msg = match serde_json::from_str::<ClientMsg>(&text) {
                    Ok(msg) => msg,
                    Err(e) => {
                        warn!(session_id = %session_id, error = %e, "Failed to parse client message");
                        let error = GameError::InvalidMessage(e.to_string());
                        if reply_tx.send(error_msg(&error)).await.is_err() {
                            break;
                        }
                        continue;
                    }
                };

                let allowed = match client_msg {
                    ClientMsg::Drive { .. } => rate_limiter.check_drive(),
                    _ => rate_limiter.check_control(),
                };
                if !allowed {
                    warn!(session_id = %session_id, "Rate limited client message");
                    continue;
                }

                match dispatch(game, &mut player, client_msg).await {
                    Ok(Some(reply)) => {
                        if reply_tx.send(reply).await.is_err() {
                            break;
                        }
                    }
                    Ok(None) => {}
                    Err(e) => {
                        debug!(session_id = %session_id, error = %e, "Request rejected");
                        if reply_tx.send(error_msg(&e)).await.is_err() {
                            break;
                        }
                    }
                }
            }
            Ok(Message::Binary(_)) => {
                warn!(session_id = %session_id, "Received binary message, ignoring");
            }
            Ok(Message::Ping(_)) => {
                debug!(session_id = %session_id, "Received ping");
            }
            Ok(Message::Pong(_)) => {
                debug!(session_id = %session_id, "Received pong");
            }
            Ok(Message::Close(_)) => {
                info!(session_id = %session_id, "Client initiated close");
                break;
            }
            Err(e) => {
                error!(session_id = %session_id, error = %e, "WebSocket error");
                break;
            }
        }
    }

    // Abort writer task
    writer_handle.abort();

    player
}

/// Apply one client message to the game. `player` is the name this
/// connection joined as, if any.
async fn dispatch(
    game: &GameHandle,
    player: &mut Option<String>,
    msg: ClientMsg,
) -> Result<Option<ServerMsg>, GameError> {
    match msg {
        ClientMsg::Join { name } => {
            if let Some(current) = player {
                return Err(GameError::InvalidMessage(format!(
                    "already joined as {current}"
                )));
            }
            game.add_player(&name).await?;
            *player = Some(name.clone());
            Ok(Some(ServerMsg::Joined { name }))
        }
        ClientMsg::Drive {
            action,
            response_time,
        } => {
            let name = player
                .as_deref()
                .ok_or_else(|| GameError::InvalidMessage("join before driving".to_string()))?;
            game.drive_action(
                name,
                DriveRequest {
                    action,
                    response_time,
                },
            )
            .await?;
            Ok(None)
        }
        ClientMsg::Leave => {
            if let Some(name) = player.take() {
                game.remove_player(&name).await?;
            }
            Ok(None)
        }
        ClientMsg::Start => game.start().await.map(|_| None),
        ClientMsg::Stop => game.stop().await.map(|_| None),
        ClientMsg::SetRate { rate } => game.set_rate(rate).await.map(|_| None),
    }
}

fn error_msg(error: &GameError) -> ServerMsg {
    ServerMsg::Error {
        code: error.code().to_string(),
        message: error.to_string(),
    }
}

/// Send a message over WebSocket
async fn send_msg(
    sink: &mut futures::stream::SplitSink<WebSocket, Message>,
    msg: &ServerMsg,
) -> Result<(), String> {
    let json = serde_json::to_string(msg).map_err(|e| e.to_string())?;
    sink.send(Message::Text(json))
        .await
        .map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GameConfig;
    use crate::game::GameServer;

    fn spawn() -> GameHandle {
        let (server, handle) = GameServer::with_random_track(GameConfig::default());
        tokio::spawn(server.run());
        handle
    }

    #[tokio::test]
    async fn join_then_drive() {
        let game = spawn();
        let mut player = None;

        let reply = dispatch(&game, &mut player, ClientMsg::Join { name: "A".into() })
            .await
            .unwrap();
        assert!(matches!(reply, Some(ServerMsg::Joined { ref name }) if name == "A"));
        assert_eq!(player.as_deref(), Some("A"));

        let drive = ClientMsg::Drive {
            action: Some("brake".into()),
            response_time: Some(0.3),
        };
        assert!(dispatch(&game, &mut player, drive).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn drive_requires_a_join() {
        let game = spawn();
        let mut player = None;
        let drive = ClientMsg::Drive {
            action: Some("left".into()),
            response_time: None,
        };
        let err = dispatch(&game, &mut player, drive).await.unwrap_err();
        assert_eq!(err.code(), "invalid_message");
    }

    #[tokio::test]
    async fn invalid_action_is_reported_with_its_code() {
        let game = spawn();
        let mut player = None;
        dispatch(&game, &mut player, ClientMsg::Join { name: "A".into() })
            .await
            .unwrap();
        let drive = ClientMsg::Drive {
            action: Some("hover".into()),
            response_time: None,
        };
        let err = dispatch(&game, &mut player, drive).await.unwrap_err();
        match error_msg(&err) {
            ServerMsg::Error { code, .. } => assert_eq!(code, "invalid_message"),
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[tokio::test]
    async fn leave_releases_the_name() {
        let game = spawn();
        let mut player = None;
        dispatch(&game, &mut player, ClientMsg::Join { name: "A".into() })
            .await
            .unwrap();
        dispatch(&game, &mut player, ClientMsg::Leave).await.unwrap();
        assert!(player.is_none());

        let mut other = None;
        dispatch(&game, &mut other, ClientMsg::Join { name: "A".into() })
            .await
            .unwrap();
        assert_eq!(other.as_deref(), Some("A"));
    }
}
