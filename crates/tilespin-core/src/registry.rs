use crate::player::{Player, PlayerId};
use crate::puzzle::Puzzle;

/// Owns every registered player, kept in join order.
///
/// Join order is the tie-break order for the leaderboard, so players live in
/// a `Vec` rather than a hash map. Sessions hold at most a few dozen players.
#[derive(Debug)]
pub struct PlayerRegistry {
    players: Vec<Player>,
    next_player_id: PlayerId,
}

impl Default for PlayerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl PlayerRegistry {
    pub fn new() -> Self {
        Self {
            players: Vec::new(),
            next_player_id: 1,
        }
    }

    fn alloc_player_id(&mut self) -> PlayerId {
        let id = self.next_player_id;
        self.next_player_id += 1;
        id
    }

    /// Register a new player in the `Joined` state.
    pub fn register(&mut self, display_name: String, puzzle: Puzzle) -> &Player {
        let id = self.alloc_player_id();
        self.players.push(Player::new(id, display_name, puzzle));
        let idx = self.players.len() - 1;
        &self.players[idx]
    }

    /// Remove a player. Returns `None` if the player was already gone.
    pub fn unregister(&mut self, player_id: PlayerId) -> Option<Player> {
        let idx = self.players.iter().position(|p| p.id == player_id)?;
        Some(self.players.remove(idx))
    }

    pub fn get(&self, player_id: PlayerId) -> Option<&Player> {
        self.players.iter().find(|p| p.id == player_id)
    }

    pub(crate) fn get_mut(&mut self, player_id: PlayerId) -> Option<&mut Player> {
        self.players.iter_mut().find(|p| p.id == player_id)
    }

    /// Iterate players in join order.
    pub fn iter(&self) -> impl Iterator<Item = &Player> {
        self.players.iter()
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut Player> {
        self.players.iter_mut()
    }

    /// Drop every player. Ids keep counting up so a stale id from before the
    /// wipe can never match a new player.
    pub(crate) fn clear(&mut self) {
        self.players.clear();
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    /// True when the registry is non-empty and every player has finished.
    pub fn all_finished(&self) -> bool {
        !self.players.is_empty() && self.players.iter().all(Player::is_finished)
    }
}
