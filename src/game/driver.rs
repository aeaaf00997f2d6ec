//! Action search for autonomous drivers
//!
//! Unlike the lane oracle in [`super::evaluator`], this search works directly
//! on the action space and derives the car's movement from each action. It
//! alternates a maximizing and a minimizing role level by level; there is no
//! opponent, the minimizing levels stand for a pessimistic continuation under
//! the same static scoring.

use super::score::delta;
use super::track::World;
use super::types::Action;

/// Levels searched below each root action
pub const SEARCH_DEPTH: u32 = 3;

/// Root enumeration order, also the tie-break order
pub const CANDIDATES: [Action; 5] = [
    Action::None,
    Action::Brake,
    Action::Jump,
    Action::Left,
    Action::Right,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Maximizing,
    Minimizing,
}

impl Role {
    fn flip(self) -> Self {
        match self {
            Role::Maximizing => Role::Minimizing,
            Role::Minimizing => Role::Maximizing,
        }
    }
}

/// Position after performing `action` from `(x, y)`. Steering changes lane,
/// anything else advances one row.
pub fn simulate_move(x: i32, y: i32, action: Action) -> (i32, i32) {
    match action {
        Action::Left | Action::Right => (x + action.lane_shift(), y),
        _ => (x, y - 1),
    }
}

/// Immediate score of performing `action` from `(x, y)`, with the position
/// it leads to
fn step<W: World + ?Sized>(world: &W, x: i32, y: i32, action: Action) -> (i32, i32, i32) {
    let (nx, ny) = simulate_move(x, y, action);
    (delta(world.get(nx, ny - 1), action), nx, ny)
}

/// Bounded two-role search value of `(x, y)`
pub fn minimax<W: World + ?Sized>(world: &W, x: i32, y: i32, depth: u32, role: Role) -> i32 {
    if depth == 0 {
        return delta(world.get(x, y - 1), Action::None);
    }

    let values = CANDIDATES.iter().map(|&action| {
        let (score, nx, ny) = step(world, x, y, action);
        score + minimax(world, nx, ny, depth - 1, role.flip())
    });

    let best = match role {
        Role::Maximizing => values.max(),
        Role::Minimizing => values.min(),
    };
    best.unwrap_or_default()
}

/// Pick the action with the highest combined score for a car at `(x, y)`.
/// Ties keep the earliest action of [`CANDIDATES`].
pub fn choose_action<W: World + ?Sized>(world: &W, x: i32, y: i32) -> Action {
    let mut best: Option<(i32, Action)> = None;
    for action in CANDIDATES {
        let (score, nx, ny) = step(world, x, y, action);
        let total = score + minimax(world, nx, ny, SEARCH_DEPTH, Role::Minimizing);
        if best.map_or(true, |(best_total, _)| total > best_total) {
            best = Some((total, action));
        }
    }
    best.map_or(Action::None, |(_, action)| action)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::track::{Grid, PLAYER_ROW, TRACK_HEIGHT, TRACK_WIDTH};
    use crate::game::types::Obstacle;

    fn empty() -> Grid {
        Grid::empty(TRACK_WIDTH, TRACK_HEIGHT)
    }

    #[test]
    fn steering_keeps_the_row() {
        assert_eq!(simulate_move(2, 6, Action::Left), (1, 6));
        assert_eq!(simulate_move(2, 6, Action::Right), (3, 6));
        assert_eq!(simulate_move(2, 6, Action::Brake), (2, 5));
        assert_eq!(simulate_move(2, 6, Action::Jump), (2, 5));
        assert_eq!(simulate_move(2, 6, Action::None), (2, 5));
    }

    #[test]
    fn terminal_scores_the_cell_ahead_with_no_action() {
        let mut grid = empty();
        grid.set(1, PLAYER_ROW - 1, Obstacle::Barrier);
        assert_eq!(minimax(&grid, 1, PLAYER_ROW, 0, Role::Maximizing), -10);
        assert_eq!(minimax(&grid, 2, PLAYER_ROW, 0, Role::Minimizing), 0);
    }

    #[test]
    fn empty_track_prefers_the_first_candidate() {
        let grid = empty();
        assert_eq!(choose_action(&grid, 1, PLAYER_ROW), Action::None);
    }

    #[test]
    fn roles_take_best_and_worst_continuations() {
        let mut grid = empty();
        grid.set(1, PLAYER_ROW - 2, Obstacle::Water);
        // Steering sideways avoids the water entirely; rolling on without
        // braking meets it twice (once on the move, once at the leaf).
        assert_eq!(minimax(&grid, 1, PLAYER_ROW, 1, Role::Maximizing), 0);
        assert_eq!(minimax(&grid, 1, PLAYER_ROW, 1, Role::Minimizing), -20);
    }

    #[test]
    fn search_is_deterministic() {
        let mut grid = empty();
        grid.set(0, PLAYER_ROW - 1, Obstacle::Bike);
        grid.set(1, PLAYER_ROW - 2, Obstacle::Penguin);
        grid.set(2, PLAYER_ROW - 3, Obstacle::Water);
        let first = choose_action(&grid, 1, PLAYER_ROW);
        for _ in 0..5 {
            assert_eq!(choose_action(&grid, 1, PLAYER_ROW), first);
        }
    }

    #[test]
    fn picks_a_root_action_with_the_best_total() {
        let mut grid = empty();
        grid.set(1, PLAYER_ROW - 2, Obstacle::Crack);
        let chosen = choose_action(&grid, 1, PLAYER_ROW);
        let total = |action: Action| {
            let (score, nx, ny) = step(&grid, 1, PLAYER_ROW, action);
            score + minimax(&grid, nx, ny, SEARCH_DEPTH, Role::Minimizing)
        };
        let best = CANDIDATES.iter().map(|&a| total(a)).max().unwrap();
        assert_eq!(total(chosen), best);
        let first_best = CANDIDATES.into_iter().find(|&a| total(a) == best).unwrap();
        assert_eq!(chosen, first_best);
    }
}
