//! Server-hosted autonomous drivers

use std::time::Instant;

use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use crate::game::driver::choose_action;
use crate::game::track::Grid;
use crate::game::{DriveRequest, GameError, GameHandle};
use crate::ws::protocol::{ServerMsg, Snapshot};

/// Pick this agent's action for a running snapshot, if it is in the game
pub fn decide(snapshot: &Snapshot, name: &str) -> Option<DriveRequest> {
    if !snapshot.started {
        return None;
    }
    let me = snapshot.players.iter().find(|p| p.name == name)?;

    let decided_at = Instant::now();
    let grid = Grid::from_snapshot(&snapshot.track);
    let action = choose_action(&grid, me.x, me.y);
    Some(DriveRequest::new(action).with_response_time(decided_at.elapsed().as_secs_f64()))
}

/// Join as `name` and drive on every update until the game goes away
pub async fn run_agent(handle: GameHandle, name: String) -> Result<(), GameError> {
    let mut updates = handle.subscribe();
    handle.add_player(&name).await?;
    info!(player = %name, "Agent joined");

    loop {
        match updates.recv().await {
            Ok(ServerMsg::Update { payload }) => {
                let Some(request) = decide(&payload, &name) else {
                    continue;
                };
                debug!(player = %name, action = ?request.action, "Agent driving");
                match handle.drive_action(&name, request).await {
                    Ok(()) => {}
                    Err(GameError::NoSuchPlayer(_)) => {
                        info!(player = %name, "Agent was removed from the game");
                        return Ok(());
                    }
                    Err(error) => return Err(error),
                }
            }
            Ok(_) => {}
            Err(RecvError::Lagged(n)) => {
                warn!(player = %name, lagged = n, "Agent lagged behind updates");
            }
            Err(RecvError::Closed) => break,
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::track::{RandomTrack, Track, PLAYER_ROW};
    use crate::game::types::{Action, Obstacle};
    use crate::ws::protocol::PlayerSnapshot;

    fn snapshot(started: bool, track: &RandomTrack) -> Snapshot {
        Snapshot {
            started,
            track: track.state(),
            players: vec![PlayerSnapshot {
                name: "bot".to_string(),
                car: 0,
                lane: 0,
                x: 1,
                y: PLAYER_ROW,
                score: 0,
                action: Action::None,
                response_time: 1.0,
            }],
            timeleft: 10,
            rate: 1.0,
        }
    }

    #[test]
    fn idle_until_the_game_runs() {
        let track = RandomTrack::new(0, false);
        assert_eq!(decide(&snapshot(false, &track), "bot"), None);
        assert_eq!(decide(&snapshot(true, &track), "someone"), None);
    }

    #[test]
    fn decides_from_the_broadcast_track() {
        let mut track = RandomTrack::new(0, false);
        track.set(1, PLAYER_ROW - 2, Obstacle::Barrier);
        let snap = snapshot(true, &track);

        let request = decide(&snap, "bot").unwrap();
        let expected = choose_action(&Grid::from_snapshot(&snap.track), 1, PLAYER_ROW);
        assert_eq!(request.action.as_deref(), Some(expected.as_str()));
        assert!(request.response_time.unwrap() >= 0.0);
    }
}
