//! Scrolling obstacle grid

use std::collections::VecDeque;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use super::types::Obstacle;

/// Number of lanes across the whole track
pub const TRACK_WIDTH: i32 = 6;
/// Number of visible rows
pub const TRACK_HEIGHT: i32 = 9;
/// Lanes owned by each player segment
pub const CELLS_PER_PLAYER: i32 = 3;
/// Row every car drives on
pub const PLAYER_ROW: i32 = TRACK_HEIGHT / 3 * 2;

/// Read-only obstacle lookup used by the searches
pub trait World {
    /// Obstacle at lane `x`, row `y`. Out of range cells are empty.
    fn get(&self, x: i32, y: i32) -> Obstacle;
}

/// The track collaborator owned by the game loop
pub trait Track: World + Send + 'static {
    /// Scroll one row toward the cars
    fn update(&mut self);
    /// Clear the track for a new game
    fn reset(&mut self);
    fn state(&self) -> TrackSnapshot;
}

/// Non-empty cell as sent to clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObstacleCell {
    pub obstacle: Obstacle,
    pub x: i32,
    pub y: i32,
}

/// Track state in a snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackSnapshot {
    pub width: i32,
    pub height: i32,
    pub obstacles: Vec<ObstacleCell>,
}

/// Dense row-major grid, row 0 at the far end of the track
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grid {
    width: i32,
    height: i32,
    rows: VecDeque<Vec<Obstacle>>,
}

impl Grid {
    pub fn empty(width: i32, height: i32) -> Self {
        let rows = (0..height)
            .map(|_| vec![Obstacle::None; width.max(0) as usize])
            .collect();
        Self {
            width,
            height,
            rows,
        }
    }

    /// Rebuild a grid from a broadcast track snapshot
    pub fn from_snapshot(snapshot: &TrackSnapshot) -> Self {
        let mut grid = Self::empty(snapshot.width, snapshot.height);
        for cell in &snapshot.obstacles {
            grid.set(cell.x, cell.y, cell.obstacle);
        }
        grid
    }

    fn index(&self, x: i32, y: i32) -> Option<(usize, usize)> {
        if (0..self.width).contains(&x) && (0..self.height).contains(&y) {
            Some((x as usize, y as usize))
        } else {
            None
        }
    }

    /// Place an obstacle; out of range writes are ignored
    pub fn set(&mut self, x: i32, y: i32, obstacle: Obstacle) {
        if let Some((col, row)) = self.index(x, y) {
            self.rows[row][col] = obstacle;
        }
    }

    fn clear(&mut self) {
        for row in self.rows.iter_mut() {
            row.fill(Obstacle::None);
        }
    }

    fn push_front(&mut self, row: Vec<Obstacle>) {
        self.rows.pop_back();
        self.rows.push_front(row);
    }

    pub fn snapshot(&self) -> TrackSnapshot {
        let obstacles = self
            .rows
            .iter()
            .enumerate()
            .flat_map(|(y, row)| {
                row.iter()
                    .enumerate()
                    .filter(|(_, obstacle)| **obstacle != Obstacle::None)
                    .map(move |(x, obstacle)| ObstacleCell {
                        obstacle: *obstacle,
                        x: x as i32,
                        y: y as i32,
                    })
            })
            .collect();

        TrackSnapshot {
            width: self.width,
            height: self.height,
            obstacles,
        }
    }
}

impl World for Grid {
    fn get(&self, x: i32, y: i32) -> Obstacle {
        self.index(x, y)
            .map(|(col, row)| self.rows[row][col])
            .unwrap_or_default()
    }
}

/// Track that generates one random row per scroll
pub struct RandomTrack {
    grid: Grid,
    rng: ChaCha8Rng,
    /// Each segment draws its own lane offset instead of sharing one
    per_segment: bool,
}

impl RandomTrack {
    pub fn new(seed: u64, per_segment: bool) -> Self {
        Self {
            grid: Grid::empty(TRACK_WIDTH, TRACK_HEIGHT),
            rng: ChaCha8Rng::seed_from_u64(seed),
            per_segment,
        }
    }

    /// Place an obstacle directly, used to script a track
    pub fn set(&mut self, x: i32, y: i32, obstacle: Obstacle) {
        self.grid.set(x, y, obstacle);
    }

    fn generate_row(&mut self) -> Vec<Obstacle> {
        let mut row = vec![Obstacle::None; TRACK_WIDTH as usize];
        let obstacle = Obstacle::random(&mut self.rng);
        let shared_offset = self.rng.gen_range(0..CELLS_PER_PLAYER);

        for segment in 0..TRACK_WIDTH / CELLS_PER_PLAYER {
            let offset = if self.per_segment {
                self.rng.gen_range(0..CELLS_PER_PLAYER)
            } else {
                shared_offset
            };
            row[(segment * CELLS_PER_PLAYER + offset) as usize] = obstacle;
        }

        row
    }
}

impl World for RandomTrack {
    fn get(&self, x: i32, y: i32) -> Obstacle {
        self.grid.get(x, y)
    }
}

impl Track for RandomTrack {
    fn update(&mut self) {
        let row = self.generate_row();
        self.grid.push_front(row);
    }

    fn reset(&mut self) {
        self.grid.clear();
    }

    fn state(&self) -> TrackSnapshot {
        self.grid.snapshot()
    }
}
