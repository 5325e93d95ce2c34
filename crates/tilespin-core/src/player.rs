use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::puzzle::Puzzle;

/// Unique identifier for a player within a running server process.
pub type PlayerId = u64;

/// Per-player progress. Within a round it only advances forward; a new
/// round puts everyone back to `Playing`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlayerStatus {
    Joined,
    Playing,
    Finished,
}

/// A connected player and their puzzle progress.
///
/// Fields are mutated only from inside this crate (registry, session state
/// machine, move applier); everyone else reads through the accessors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Player {
    pub(crate) id: PlayerId,
    pub(crate) display_name: String,
    pub(crate) status: PlayerStatus,
    pub(crate) puzzle: Puzzle,
    pub(crate) step_count: u32,
    pub(crate) started_at: Option<u64>,
    pub(crate) finished_at: Option<u64>,
    pub(crate) elapsed_ms: Option<u64>,
}

impl Player {
    pub(crate) fn new(id: PlayerId, display_name: String, puzzle: Puzzle) -> Self {
        Self {
            id,
            display_name,
            status: PlayerStatus::Joined,
            puzzle,
            step_count: 0,
            started_at: None,
            finished_at: None,
            elapsed_ms: None,
        }
    }

    pub fn id(&self) -> PlayerId {
        self.id
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn status(&self) -> PlayerStatus {
        self.status
    }

    pub fn puzzle(&self) -> &Puzzle {
        &self.puzzle
    }

    pub fn step_count(&self) -> u32 {
        self.step_count
    }

    pub fn started_at(&self) -> Option<u64> {
        self.started_at
    }

    pub fn finished_at(&self) -> Option<u64> {
        self.finished_at
    }

    /// Time taken to solve, frozen at completion. `Some` iff finished.
    pub fn elapsed_ms(&self) -> Option<u64> {
        self.elapsed_ms
    }

    pub fn is_finished(&self) -> bool {
        self.status == PlayerStatus::Finished
    }

    /// Put the player on the start line of a new round.
    pub(crate) fn begin_round(&mut self, puzzle: Puzzle, now_ms: u64) {
        self.puzzle = puzzle;
        self.status = PlayerStatus::Playing;
        self.step_count = 0;
        self.started_at = Some(now_ms);
        self.finished_at = None;
        self.elapsed_ms = None;
    }

    /// Mark the puzzle solved at `now_ms` and freeze the elapsed time.
    pub(crate) fn finish(&mut self, now_ms: u64) {
        let started = self.started_at.unwrap_or(now_ms);
        self.status = PlayerStatus::Finished;
        self.finished_at = Some(now_ms);
        self.elapsed_ms = Some(now_ms.saturating_sub(started));
    }
}

const ADJECTIVES: &[&str] = &[
    "Swift", "Clever", "Brave", "Calm", "Sunny", "Lucky", "Quiet", "Bold", "Happy", "Witty",
    "Eager", "Gentle", "Jolly", "Nimble", "Proud", "Zesty",
];

const ANIMALS: &[&str] = &[
    "Otter", "Fox", "Panda", "Koala", "Falcon", "Lynx", "Badger", "Heron", "Gecko", "Walrus",
    "Moose", "Puffin", "Tiger", "Dolphin", "Beaver", "Raven",
];

/// Generate a friendly "Adjective Animal" display name.
pub fn generate_display_name<R: Rng + ?Sized>(rng: &mut R) -> String {
    let adjective = ADJECTIVES[rng.random_range(0..ADJECTIVES.len())];
    let animal = ANIMALS[rng.random_range(0..ANIMALS.len())];
    format!("{adjective} {animal}")
}

/// Length in bytes of the longest name [`generate_display_name`] can return.
pub fn max_display_name_len() -> usize {
    let longest = |words: &[&str]| words.iter().map(|w| w.len()).max().unwrap_or(0);
    longest(ADJECTIVES) + 1 + longest(ANIMALS)
}
