//! Per-tick scoring of players and their oracle ghosts

use std::collections::HashMap;

use super::evaluator::possible_moves;
use super::player::Player;
use super::track::World;
use super::types::{Action, Obstacle};

/// Default for any obstacle met without its answer
pub const MISS_PENALTY: i32 = -10;

/// Point delta for meeting `obstacle` while performing `action`
pub fn delta(obstacle: Obstacle, action: Action) -> i32 {
    match obstacle {
        Obstacle::None => 0,
        _ if obstacle.reaction() == Some(action) => obstacle.points(),
        // A missed penguin is just a missed bonus
        Obstacle::Penguin => 0,
        _ => MISS_PENALTY,
    }
}

/// Lane a steer action leads to from `x`, if the move is allowed
fn steer(x: i32, action: Action) -> i32 {
    let target = x + action.lane_shift();
    if possible_moves(x).contains(&target) {
        target
    } else {
        x
    }
}

/// Delta the ghost earns moving from `from` to `to` and playing perfectly
fn ideal_delta(obstacle: Obstacle, from: i32, to: i32) -> i32 {
    let action = if to == from {
        obstacle.reaction().unwrap_or(Action::None)
    } else if to < from {
        Action::Left
    } else {
        Action::Right
    };
    delta(obstacle, action)
}

/// Apply this tick's outcomes. Runs right after the track scrolled, so the
/// cell under each car is the one that was ahead when the action was chosen.
/// Each submitted action counts for exactly one tick.
pub fn process<W: World + ?Sized>(players: &mut HashMap<String, Player>, world: &W) {
    for player in players.values_mut() {
        let action = std::mem::take(&mut player.action);
        player.x = steer(player.x, action);
        let obstacle = world.get(player.x, player.y);
        player.score += delta(obstacle, action);

        let from = player.ghost_x;
        let to = player
            .ghost_target
            .take()
            .filter(|lane| possible_moves(from).contains(lane))
            .unwrap_or(from);
        let ghost_obstacle = world.get(to, player.ghost_y);
        player.ghost_x = to;
        player.score_ghost += ideal_delta(ghost_obstacle, from, to);
    }
}

/// `score / oracle_score` as a percentage rounded to a tenth, or `None` when
/// the oracle has not scored anything yet
pub fn success_rate(score: i32, oracle_score: i32) -> Option<f64> {
    if oracle_score == 0 {
        return None;
    }
    let ratio = f64::from(score) / f64::from(oracle_score);
    Some((ratio * 1000.0).round() / 10.0)
}
