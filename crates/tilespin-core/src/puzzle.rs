use rand::Rng;
use serde::{Deserialize, Serialize};

/// Number of tiles in a puzzle (3x3 grid, row-major).
pub const TILE_COUNT: usize = 9;

/// Number of distinct orientations a tile can take (90° steps).
pub const ROTATION_STEPS: u8 = 4;

/// Per-player tile orientations. Each value is a clockwise quarter-turn count
/// away from the tile's correct orientation, always in `0..ROTATION_STEPS`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Puzzle([u8; TILE_COUNT]);

impl Puzzle {
    /// The target configuration: every tile upright.
    pub const SOLVED: Puzzle = Puzzle([0; TILE_COUNT]);

    /// Build a puzzle from raw rotation values, normalizing each modulo 4.
    pub fn from_rotations(rotations: [u8; TILE_COUNT]) -> Self {
        Self(rotations.map(|r| r % ROTATION_STEPS))
    }

    pub fn rotations(&self) -> &[u8; TILE_COUNT] {
        &self.0
    }

    /// Rotate one tile a quarter turn clockwise. Returns `false` and leaves the
    /// puzzle untouched if `index` does not address a tile.
    pub fn rotate(&mut self, index: usize) -> bool {
        match self.0.get_mut(index) {
            Some(cell) => {
                *cell = (*cell + 1) % ROTATION_STEPS;
                true
            },
            None => false,
        }
    }

    pub fn is_solved(&self) -> bool {
        *self == Self::SOLVED
    }
}

/// Generate a random starting puzzle. Each tile is drawn uniformly from
/// `0..4`; an all-zero draw has one random tile forced to `1` so a round never
/// starts already solved.
pub fn generate_puzzle<R: Rng + ?Sized>(rng: &mut R) -> Puzzle {
    let mut rotations = [0u8; TILE_COUNT];
    for cell in &mut rotations {
        *cell = rng.random_range(0..ROTATION_STEPS);
    }
    if rotations.iter().all(|&r| r == 0) {
        rotations[rng.random_range(0..TILE_COUNT)] = 1;
    }
    Puzzle(rotations)
}
