//! Game state and the tick state machine
//!
//! A game is either running or not. `start` resets the track and every
//! player and arms the scheduler; each tick scrolls the track, scores the
//! players against their ghosts and counts down the time budget; running out
//! of time, an explicit `stop` or the last player leaving ends the game.

use std::collections::{BTreeSet, HashMap};

use rand::seq::IteratorRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::config::GameConfig;
use crate::ws::protocol::{ServerMsg, Snapshot};

use super::error::GameError;
use super::evaluator;
use super::player::Player;
use super::scheduler::{period_for, Scheduler, MAX_RATE, MIN_RATE};
use super::score::{self, success_rate};
use super::track::Track;
use super::types::Action;

/// Outbound sink for state updates. Must not block.
pub trait Hub: Send + 'static {
    fn broadcast(&self, msg: ServerMsg);
}

impl Hub for broadcast::Sender<ServerMsg> {
    fn broadcast(&self, msg: ServerMsg) {
        // No subscribers is fine, nobody is watching yet
        let _ = self.send(msg);
    }
}

/// A drive action as received from a client
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DriveRequest {
    pub action: Option<String>,
    pub response_time: Option<f64>,
}

impl DriveRequest {
    pub fn new(action: Action) -> Self {
        Self {
            action: Some(action.to_string()),
            response_time: None,
        }
    }

    pub fn with_response_time(mut self, seconds: f64) -> Self {
        self.response_time = Some(seconds);
        self
    }
}

/// End of game performance of one player
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlayerReport {
    pub name: String,
    pub score: i32,
    pub oracle_score: i32,
    /// Percentage of the oracle score, `None` while the oracle has nothing
    pub success_rate: Option<f64>,
}

pub struct Game<T: Track, H: Hub> {
    config: GameConfig,
    hub: H,
    track: T,
    players: HashMap<String, Player>,
    free_cars: BTreeSet<usize>,
    free_lanes: BTreeSet<usize>,
    rate: f64,
    started: bool,
    timeleft: u32,
    scheduler: Scheduler,
    rng: ChaCha8Rng,
    /// Roster changed, clients hear about it on the next turn
    update_pending: bool,
}

impl<T: Track, H: Hub> Game<T, H> {
    pub fn new(config: GameConfig, track: T, hub: H) -> Self {
        Self {
            free_cars: (0..config.number_of_cars).collect(),
            free_lanes: (0..config.max_players).collect(),
            rate: config.rate,
            timeleft: config.duration,
            rng: ChaCha8Rng::seed_from_u64(config.seed),
            config,
            hub,
            track,
            players: HashMap::new(),
            started: false,
            scheduler: Scheduler::new(),
            update_pending: false,
        }
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn timeleft(&self) -> u32 {
        self.timeleft
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }

    pub fn player(&self, name: &str) -> Option<&Player> {
        self.players.get(name)
    }

    #[cfg(test)]
    pub(crate) fn player_count(&self) -> usize {
        self.players.len()
    }

    #[cfg(test)]
    pub(crate) fn track(&self) -> &T {
        &self.track
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn scheduler_mut(&mut self) -> &mut Scheduler {
        &mut self.scheduler
    }

    pub fn set_rate(&mut self, value: f64) -> Result<(), GameError> {
        let period = period_for(value).ok_or_else(|| invalid_rate(value))?;
        if value != self.rate {
            info!(rate = value, "Changing game rate");
            self.rate = value;
            if self.started {
                self.scheduler.start(period);
            } else {
                self.update_clients();
            }
        }
        Ok(())
    }

    pub fn start(&mut self) -> Result<(), GameError> {
        if self.started {
            return Err(GameError::AlreadyStarted);
        }
        if self.players.is_empty() {
            return Err(GameError::ActionForbidden(
                "start a game with no players".to_string(),
            ));
        }
        let period = period_for(self.rate).ok_or_else(|| invalid_rate(self.rate))?;

        self.track.reset();
        for player in self.players.values_mut() {
            player.reset();
        }
        self.timeleft = self.config.duration;
        self.started = true;
        self.scheduler.start(period);

        info!(
            players = self.players.len(),
            rate = self.rate,
            duration = self.timeleft,
            "Game started"
        );
        Ok(())
    }

    pub fn stop(&mut self) -> Result<(), GameError> {
        if !self.started {
            return Err(GameError::NotStarted);
        }

        self.scheduler.stop();
        self.started = false;
        self.update_clients();

        info!("Game stopped");
        for report in self.report() {
            match report.success_rate {
                Some(rate) => info!(
                    player = %report.name,
                    score = report.score,
                    oracle_score = report.oracle_score,
                    "Success rate {:.1}%", rate
                ),
                None => info!(
                    player = %report.name,
                    score = report.score,
                    "Success rate n/a, oracle scored nothing"
                ),
            }
        }
        Ok(())
    }

    /// One scheduler period elapsed
    pub fn tick(&mut self) {
        if !self.started {
            return;
        }

        self.track.update();
        score::process(&mut self.players, &self.track);

        if self.timeleft > 0 {
            self.timeleft -= 1;
            self.update_clients();
        } else {
            info!("Time is up");
            if let Err(error) = self.stop() {
                warn!(%error, "Failed to stop game");
            }
        }
    }

    pub fn add_player(&mut self, name: &str) -> Result<(), GameError> {
        if name.trim().is_empty() {
            return Err(GameError::InvalidMessage("player name required".to_string()));
        }
        if self.players.contains_key(name) {
            return Err(GameError::PlayerExists(name.to_string()));
        }
        if self.players.len() >= self.config.max_players {
            return Err(GameError::TooManyPlayers);
        }

        let car = self.free_cars.iter().copied().choose(&mut self.rng);
        let lane = self.free_lanes.iter().copied().choose(&mut self.rng);
        let (Some(car), Some(lane)) = (car, lane) else {
            return Err(GameError::TooManyPlayers);
        };
        self.free_cars.remove(&car);
        self.free_lanes.remove(&lane);

        info!(player = %name, lane, car, "Player added");
        self.players
            .insert(name.to_string(), Player::new(name.to_string(), car, lane));
        self.update_pending = true;
        Ok(())
    }

    pub fn remove_player(&mut self, name: &str) -> Result<(), GameError> {
        let player = self
            .players
            .remove(name)
            .ok_or_else(|| GameError::NoSuchPlayer(name.to_string()))?;
        self.free_cars.insert(player.car);
        self.free_lanes.insert(player.lane);
        info!(player = %name, lane = player.lane, car = player.car, "Player removed");

        if self.players.is_empty() && self.started {
            info!("Stopping game, no players connected");
            self.stop()
        } else {
            self.update_pending = true;
            Ok(())
        }
    }

    /// Record a player's action for the next tick, together with the lane
    /// the oracle picks for the player's ghost
    pub fn drive_player(&mut self, name: &str, request: &DriveRequest) -> Result<(), GameError> {
        let depth = self.config.lookahead;
        let player = self
            .players
            .get_mut(name)
            .ok_or_else(|| GameError::NoSuchPlayer(name.to_string()))?;

        let raw = request
            .action
            .as_deref()
            .ok_or_else(|| GameError::InvalidMessage("action required".to_string()))?;
        let action: Action = raw
            .parse()
            .map_err(|_| GameError::InvalidMessage(format!("invalid drive action {raw}")))?;
        let response_time = match request.response_time {
            None => 1.0,
            Some(seconds) if seconds.is_finite() && seconds >= 0.0 => seconds,
            Some(seconds) => {
                return Err(GameError::InvalidMessage(format!(
                    "invalid response time {seconds}"
                )))
            }
        };

        player.ghost_target = Some(evaluator::best_lane(
            &self.track,
            player.ghost_x,
            player.ghost_y,
            depth,
        ));

        let advice = evaluator::recommended_action(&self.track, player.x, player.y, depth);
        if action == advice {
            debug!(player = %name, %action, "Player chose the best move");
        } else {
            debug!(player = %name, %action, best = %advice, "Player missed the best move");
        }

        player.action = action;
        player.response_time = response_time;
        Ok(())
    }

    /// Broadcast a roster change deferred by admission or removal
    pub fn flush_deferred(&mut self) {
        if std::mem::take(&mut self.update_pending) {
            self.update_clients();
        }
    }

    pub fn update_clients(&self) {
        self.hub.broadcast(ServerMsg::Update {
            payload: self.state(),
        });
    }

    pub fn state(&self) -> Snapshot {
        Snapshot {
            started: self.started,
            track: self.track.state(),
            players: self.players.values().map(Player::state).collect(),
            timeleft: self.timeleft,
            rate: self.rate,
        }
    }

    /// Players ordered by score, best first
    pub fn report(&self) -> Vec<PlayerReport> {
        let mut reports: Vec<PlayerReport> = self
            .players
            .values()
            .map(|p| PlayerReport {
                name: p.name.clone(),
                score: p.score,
                oracle_score: p.score_ghost,
                success_rate: success_rate(p.score, p.score_ghost),
            })
            .collect();
        reports.sort_by(|a, b| b.score.cmp(&a.score).then_with(|| a.name.cmp(&b.name)));
        reports
    }

    #[cfg(test)]
    pub(crate) fn track_mut(&mut self) -> &mut T {
        &mut self.track
    }
}

fn invalid_rate(rate: f64) -> GameError {
    GameError::InvalidMessage(format!(
        "invalid rate {rate}, expected {MIN_RATE:.4} to {MAX_RATE} ticks per second"
    ))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use parking_lot::Mutex;

    use super::*;
    use crate::game::track::{RandomTrack, World};
    use crate::game::types::Obstacle;

    /// Captures every broadcast
    #[derive(Clone, Default)]
    struct RecordingHub(Arc<Mutex<Vec<ServerMsg>>>);

    impl RecordingHub {
        fn count(&self) -> usize {
            self.0.lock().len()
        }

        fn last(&self) -> Option<Snapshot> {
            self.0.lock().iter().rev().find_map(|msg| match msg {
                ServerMsg::Update { payload } => Some(payload.clone()),
                _ => None,
            })
        }
    }

    impl Hub for RecordingHub {
        fn broadcast(&self, msg: ServerMsg) {
            self.0.lock().push(msg);
        }
    }

    fn game() -> (Game<RandomTrack, RecordingHub>, RecordingHub) {
        let hub = RecordingHub::default();
        let config = GameConfig::default();
        let track = RandomTrack::new(config.seed, config.random_track);
        (Game::new(config, track, hub.clone()), hub)
    }

    #[test]
    fn start_runs_once() {
        let (mut game, _) = game();
        game.add_player("A").unwrap();
        assert_eq!(game.start(), Ok(()));
        assert!(game.is_started());
        assert!(game.scheduler().is_running());
        assert_eq!(game.start(), Err(GameError::AlreadyStarted));
    }

    #[test]
    fn stop_before_start_fails() {
        let (mut game, _) = game();
        assert_eq!(game.stop(), Err(GameError::NotStarted));
    }

    #[test]
    fn start_needs_players() {
        let (mut game, _) = game();
        assert!(matches!(game.start(), Err(GameError::ActionForbidden(_))));
        assert!(!game.is_started());
    }

    #[test]
    fn stop_halts_and_broadcasts() {
        let (mut game, hub) = game();
        game.add_player("A").unwrap();
        game.start().unwrap();
        let before = hub.count();

        game.stop().unwrap();
        assert!(!game.is_started());
        assert!(!game.scheduler().is_running());
        assert_eq!(hub.count(), before + 1);
        assert_eq!(hub.last().map(|s| s.started), Some(false));

        // A stopped game can run again
        game.start().unwrap();
        assert!(game.is_started());
    }

    #[test]
    fn admission_assigns_disjoint_slots() {
        let (mut game, _) = game();
        game.add_player("A").unwrap();
        game.add_player("B").unwrap();
        let a = game.player("A").unwrap();
        let b = game.player("B").unwrap();
        assert_ne!(a.car, b.car);
        assert_ne!(a.lane, b.lane);
        assert!(!game.free_cars.contains(&a.car));
        assert!(!game.free_lanes.contains(&b.lane));
        assert_eq!(game.free_cars.len(), 2);
        assert!(game.free_lanes.is_empty());
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let (mut game, _) = game();
        game.add_player("A").unwrap();
        assert_eq!(
            game.add_player("A"),
            Err(GameError::PlayerExists("A".to_string()))
        );
    }

    #[test]
    fn one_more_than_max_players_is_too_many() {
        let (mut game, _) = game();
        let max = GameConfig::default().max_players;
        for i in 0..max {
            game.add_player(&format!("p{i}")).unwrap();
        }
        assert_eq!(game.add_player("late"), Err(GameError::TooManyPlayers));
        assert_eq!(game.player_count(), max);
    }

    #[test]
    fn removal_releases_slots() {
        let (mut game, _) = game();
        game.add_player("A").unwrap();
        let (car, lane) = {
            let a = game.player("A").unwrap();
            (a.car, a.lane)
        };
        game.remove_player("A").unwrap();
        assert!(game.free_cars.contains(&car));
        assert!(game.free_lanes.contains(&lane));
        assert_eq!(
            game.remove_player("A"),
            Err(GameError::NoSuchPlayer("A".to_string()))
        );
    }

    #[test]
    fn removing_the_last_player_stops_the_game() {
        let (mut game, _) = game();
        game.add_player("A").unwrap();
        game.add_player("B").unwrap();
        game.start().unwrap();

        game.remove_player("A").unwrap();
        assert!(game.is_started());
        game.remove_player("B").unwrap();
        assert!(!game.is_started());
    }

    #[test]
    fn roster_broadcasts_are_deferred() {
        let (mut game, hub) = game();
        game.add_player("A").unwrap();
        assert_eq!(hub.count(), 0);
        game.flush_deferred();
        assert_eq!(hub.count(), 1);
        game.flush_deferred();
        assert_eq!(hub.count(), 1);
    }

    #[test]
    fn drive_validates_the_message() {
        let (mut game, _) = game();
        game.add_player("A").unwrap();

        assert_eq!(
            game.drive_player("B", &DriveRequest::new(Action::Jump)),
            Err(GameError::NoSuchPlayer("B".to_string()))
        );
        assert!(matches!(
            game.drive_player("A", &DriveRequest::default()),
            Err(GameError::InvalidMessage(_))
        ));
        let bogus = DriveRequest {
            action: Some("fly".to_string()),
            response_time: None,
        };
        assert!(matches!(
            game.drive_player("A", &bogus),
            Err(GameError::InvalidMessage(_))
        ));
        assert_eq!(game.player("A").unwrap().action, Action::None);
    }

    #[test]
    fn drive_records_action_and_response_time() {
        let (mut game, _) = game();
        game.add_player("A").unwrap();

        game.drive_player("A", &DriveRequest::new(Action::Brake)).unwrap();
        let a = game.player("A").unwrap();
        assert_eq!(a.action, Action::Brake);
        assert_eq!(a.response_time, 1.0);
        assert_eq!(a.ghost_target, Some(a.ghost_x));

        game.drive_player("A", &DriveRequest::new(Action::Left).with_response_time(0.25))
            .unwrap();
        assert_eq!(game.player("A").unwrap().response_time, 0.25);
    }

    #[test]
    fn tick_counts_down_and_broadcasts() {
        let (mut game, hub) = game();
        game.add_player("A").unwrap();
        game.start().unwrap();
        let duration = game.timeleft();

        game.tick();
        assert_eq!(game.timeleft(), duration - 1);
        let snapshot = hub.last().unwrap();
        assert!(snapshot.started);
        assert_eq!(snapshot.timeleft, duration - 1);
        assert_eq!(snapshot.players.len(), 1);
    }

    #[test]
    fn running_out_of_time_stops() {
        let hub = RecordingHub::default();
        let config = GameConfig {
            duration: 2,
            ..GameConfig::default()
        };
        let track = RandomTrack::new(1, false);
        let mut game = Game::new(config, track, hub);
        game.add_player("A").unwrap();
        game.start().unwrap();

        game.tick();
        game.tick();
        assert!(game.is_started());
        assert_eq!(game.timeleft(), 0);
        game.tick();
        assert!(!game.is_started());
        assert_eq!(game.timeleft(), 0);
    }

    #[test]
    fn rate_change_while_running_reschedules_only() {
        let (mut game, _) = game();
        game.add_player("A").unwrap();
        game.start().unwrap();
        game.tick();
        let timeleft = game.timeleft();
        let score = game.player("A").unwrap().score;

        game.set_rate(4.0).unwrap();
        assert_eq!(game.rate(), 4.0);
        assert_eq!(game.scheduler().period(), Some(Duration::from_millis(250)));
        assert_eq!(game.timeleft(), timeleft);
        assert_eq!(game.player("A").unwrap().score, score);
        assert!(game.is_started());
    }

    #[test]
    fn rate_change_while_stopped_broadcasts() {
        let (mut game, hub) = game();
        game.set_rate(2.0).unwrap();
        assert_eq!(hub.count(), 1);
        assert_eq!(hub.last().map(|s| s.rate), Some(2.0));
        assert!(!game.scheduler().is_running());

        // Same rate is not a change
        game.set_rate(2.0).unwrap();
        assert_eq!(hub.count(), 1);
        assert!(matches!(game.set_rate(0.0), Err(GameError::InvalidMessage(_))));
    }

    #[test]
    fn extreme_rates_are_rejected_and_keep_the_game_running() {
        let (mut game, _) = game();
        game.add_player("A").unwrap();
        game.start().unwrap();

        for rate in [1e12, 1e-20, f64::INFINITY] {
            assert!(matches!(game.set_rate(rate), Err(GameError::InvalidMessage(_))));
        }
        assert_eq!(game.rate(), 1.0);
        assert_eq!(game.scheduler().period(), Some(Duration::from_secs(1)));
        assert!(game.is_started());
    }

    #[test]
    fn braking_through_water_scores_four() {
        let (mut game, _) = game();
        game.add_player("A").unwrap();
        game.start().unwrap();

        let (x, y) = {
            let a = game.player("A").unwrap();
            (a.x, a.y)
        };
        game.track_mut().set(x, y - 1, Obstacle::Water);
        let depth = GameConfig::default().lookahead;
        let oracle_lane = evaluator::best_lane(game.track(), x, y, depth);

        game.drive_player("A", &DriveRequest::new(Action::Brake)).unwrap();
        game.tick();

        let a = game.player("A").unwrap();
        assert_eq!(game.track().get(x, y), Obstacle::Water);
        assert_eq!(a.score, 4);
        assert_eq!(oracle_lane, x);
        assert_eq!(a.ghost_x, oracle_lane);
        assert_eq!(a.score_ghost, 4);
    }

    #[test]
    fn report_guards_a_zero_oracle() {
        let (mut game, _) = game();
        game.add_player("A").unwrap();
        let report = game.report();
        assert_eq!(report.len(), 1);
        assert_eq!(report[0].success_rate, None);
    }
}
