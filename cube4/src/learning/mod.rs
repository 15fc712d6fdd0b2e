//! Learned bias carried between games: the human's heat profile, outcome
//! memory keyed by exact position, and adaptive evaluation weights.
//!
//! Updates never mutate in place; each returns the next state so callers can
//! decide when to persist it.
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{Column, Player, CELLS};

pub mod memory;
pub mod profile;
pub mod weights;

pub use memory::{encode_state, Memory, MemoryMove};
pub use profile::{Profile, ProfileStats, ProfileSummary};
pub use weights::Weights;

/// Number of trailing snapshots credited with a finished game's outcome.
pub const RECENT_SNAPSHOTS: usize = 10;

/// Game result from the computer's side.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Win,
    Loss,
    Draw,
}

/// Position just before a move, with the side that moved and its column.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Snapshot {
    pub cells: [Option<Player>; CELLS],
    pub turn: Player,
    pub column: Column,
}

impl Snapshot {
    pub fn key(&self) -> String {
        encode_state(&self.cells, self.turn)
    }
}

pub fn recent_snapshots(history: &[Snapshot], limit: usize) -> &[Snapshot] {
    &history[history.len().saturating_sub(limit)..]
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct LearnedState {
    pub profile: Profile,
    pub memory: Memory,
    pub weights: Weights,
}

impl LearnedState {
    /// Credits the trailing snapshots with `outcome`, adapts the weights and
    /// counts the game.
    pub fn record_game(self, history: &[Snapshot], outcome: Outcome) -> LearnedState {
        let recent = recent_snapshots(history, RECENT_SNAPSHOTS);
        let memory = recent.iter().fold(self.memory, |memory, snapshot| {
            memory.update(&snapshot.key(), snapshot.column, outcome)
        });
        let weights = self.weights.adjust(outcome);
        let profile = self.profile.update_game(true);
        info!(
            ?outcome,
            credited = recent.len(),
            positions = memory.len(),
            games = profile.games,
            "learned from finished game"
        );
        LearnedState {
            profile,
            memory,
            weights,
        }
    }

    pub fn reset(&mut self) {
        *self = LearnedState::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::Board;

    fn snapshots(count: usize) -> Vec<Snapshot> {
        let mut board = Board::new();
        let mut turn = Player::Red;
        let mut out = Vec::new();
        for i in 0..count {
            let column = Column::from_index(i % crate::COLUMNS);
            out.push(Snapshot {
                cells: *board.cells(),
                turn,
                column,
            });
            board.make_move(column, turn).unwrap();
            turn = turn.opponent();
        }
        out
    }

    #[test]
    fn recent_snapshots_keeps_the_tail() {
        let history = snapshots(14);
        let recent = recent_snapshots(&history, RECENT_SNAPSHOTS);
        assert_eq!(recent.len(), 10);
        assert_eq!(recent[0], history[4]);
        assert_eq!(recent_snapshots(&history[..3], 10).len(), 3);
    }

    #[test]
    fn record_game_updates_all_three_stores() {
        let history = snapshots(12);
        let state = LearnedState::default().record_game(&history, Outcome::Loss);
        assert_eq!(state.memory.len(), 10);
        assert!(!state.memory.contains(&history[1].key()));
        let tally = state.memory.pick(&history[11].key());
        assert_eq!(tally[0].column, history[11].column);
        assert_eq!(tally[0].losses, 1);
        assert_eq!(state.weights, Weights::default().adjust(Outcome::Loss));
        assert_eq!(state.profile.games, 1);
    }

    #[test]
    fn reset_restores_defaults() {
        let mut state = LearnedState::default().record_game(&snapshots(3), Outcome::Win);
        state.reset();
        assert!(state.memory.is_empty());
        assert_eq!(state.weights, Weights::default());
        assert_eq!(state.profile.games, 0);
    }
}
