use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::player::{Player, PlayerId, PlayerStatus};

/// One ranked row of the leaderboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub player_id: PlayerId,
    pub name: String,
    pub status: PlayerStatus,
    pub elapsed_ms: Option<u64>,
    pub step_count: u32,
}

impl From<&Player> for LeaderboardEntry {
    fn from(p: &Player) -> Self {
        Self {
            player_id: p.id(),
            name: p.display_name().to_string(),
            status: p.status(),
            elapsed_ms: p.elapsed_ms(),
            step_count: p.step_count(),
        }
    }
}

/// Rank players: finishers first by solve time, then everyone else by step
/// count. The sort is stable, so ties keep the input (join) order.
pub fn rank<'a>(players: impl IntoIterator<Item = &'a Player>) -> Vec<LeaderboardEntry> {
    let mut entries: Vec<LeaderboardEntry> =
        players.into_iter().map(LeaderboardEntry::from).collect();
    entries.sort_by(compare_entries);
    entries
}

fn compare_entries(a: &LeaderboardEntry, b: &LeaderboardEntry) -> Ordering {
    let a_done = a.status == PlayerStatus::Finished;
    let b_done = b.status == PlayerStatus::Finished;
    match (a_done, b_done) {
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (true, true) => a
            .elapsed_ms
            .unwrap_or(u64::MAX)
            .cmp(&b.elapsed_ms.unwrap_or(u64::MAX)),
        (false, false) => a.step_count.cmp(&b.step_count),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::puzzle::Puzzle;

    fn finished(id: PlayerId, name: &str, elapsed: u64, steps: u32) -> Player {
        let mut p = Player::new(id, name.into(), Puzzle::SOLVED);
        p.begin_round(Puzzle::SOLVED, 1_000);
        p.step_count = steps;
        p.finish(1_000 + elapsed);
        p
    }

    fn playing(id: PlayerId, name: &str, steps: u32) -> Player {
        let mut p = Player::new(id, name.into(), Puzzle::SOLVED);
        p.begin_round(Puzzle::from_rotations([1; 9]), 1_000);
        p.step_count = steps;
        p
    }

    fn names(entries: &[LeaderboardEntry]) -> Vec<&str> {
        entries.iter().map(|e| e.name.as_str()).collect()
    }

    #[test]
    fn finishers_by_time_then_players_by_steps() {
        let players = vec![
            finished(1, "A", 120, 30),
            finished(2, "B", 80, 40),
            playing(3, "C", 5),
            playing(4, "D", 2),
        ];
        let board = rank(&players);
        assert_eq!(names(&board), vec!["B", "A", "D", "C"]);
        assert_eq!(board[0].elapsed_ms, Some(80));
        assert_eq!(board[3].elapsed_ms, None);
    }

    #[test]
    fn finisher_beats_player_with_fewer_steps() {
        let players = vec![playing(1, "Fast", 0), finished(2, "Done", 90_000, 500)];
        assert_eq!(names(&rank(&players)), vec!["Done", "Fast"]);
    }

    #[test]
    fn ties_keep_join_order() {
        let players = vec![
            playing(1, "First", 3),
            playing(2, "Second", 3),
            finished(3, "Third", 50, 9),
            finished(4, "Fourth", 50, 4),
        ];
        assert_eq!(
            names(&rank(&players)),
            vec!["Third", "Fourth", "First", "Second"]
        );
    }

    #[test]
    fn joined_players_rank_with_non_finishers() {
        let joined = Player::new(1, "Lobby".into(), Puzzle::from_rotations([1; 9]));
        let players = vec![joined, playing(2, "Busy", 7)];
        let board = rank(&players);
        assert_eq!(names(&board), vec!["Lobby", "Busy"]);
        assert_eq!(board[0].status, PlayerStatus::Joined);
    }

    #[test]
    fn empty_input_gives_empty_board() {
        assert!(rank(std::iter::empty()).is_empty());
    }
}
