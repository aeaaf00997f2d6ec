//! Lane lookahead search used as the grading oracle
//!
//! The search walks forward one row per level and, at every level, tries each
//! lane reachable from the current one. Staying in a lane earns the obstacle's
//! table value (the car is assumed to react correctly); moving into a lane
//! whose next cell is a crack or water costs [`LATERAL_PENALTY`], since
//! braking and jumping only protect the lane the car stays in.

use super::track::{World, CELLS_PER_PLAYER};
use super::types::Action;

/// Default search depth
pub const LOOKAHEAD_DEPTH: u32 = 6;

/// Cost of arriving sideways onto a crack or water
pub const LATERAL_PENALTY: i32 = 10;

/// Lanes reachable from `x` in one tick, the current lane first.
///
/// Each player segment is three lanes wide with hard edges: the left edge can
/// only stay or go right, the right edge can only stay or go left.
pub fn possible_moves(x: i32) -> Vec<i32> {
    match x.rem_euclid(CELLS_PER_PLAYER) {
        0 => vec![x, x + 1],
        r if r == CELLS_PER_PLAYER - 1 => vec![x, x - 1],
        _ => vec![x, x - 1, x + 1],
    }
}

/// Best total grade reachable from `(x, y)` within `depth` rows, and the lane
/// to take next. Ties keep the earliest candidate of [`possible_moves`].
pub fn evaluate<W: World + ?Sized>(world: &W, x: i32, y: i32, depth: u32) -> (i32, i32) {
    if depth == 0 {
        return (0, x);
    }

    let mut best: Option<(i32, i32)> = None;
    for next_x in possible_moves(x) {
        let obstacle = world.get(next_x, y - 1);
        let mut grade = if next_x == x {
            obstacle.points()
        } else if obstacle.is_lateral_hazard() {
            -LATERAL_PENALTY
        } else {
            0
        };

        let (next_grade, _) = evaluate(world, next_x, y - 1, depth - 1);
        grade += next_grade;

        if best.map_or(true, |(best_grade, _)| grade > best_grade) {
            best = Some((grade, next_x));
        }
    }

    best.unwrap_or((0, x))
}

/// Lane the oracle takes next from `(x, y)`
pub fn best_lane<W: World + ?Sized>(world: &W, x: i32, y: i32, depth: u32) -> i32 {
    evaluate(world, x, y, depth).1
}

/// Action a perfect driver at `(x, y)` would submit this tick
pub fn recommended_action<W: World + ?Sized>(world: &W, x: i32, y: i32, depth: u32) -> Action {
    let next_x = best_lane(world, x, y, depth);
    if next_x == x {
        return world
            .get(next_x, y - 1)
            .reaction()
            .unwrap_or(Action::None);
    }
    if next_x < x {
        Action::Left
    } else {
        Action::Right
    }
}
