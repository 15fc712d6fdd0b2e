//! Messages exchanged with the isolated search context. A request carries
//! everything the search needs, so the receiving side rebuilds a private
//! board and never touches the caller's state.
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::board::Board;
use crate::learning::{Profile, Weights};
use crate::sampler::ScoredMove;
use crate::search::{compute_best_move, SearchOptions, HARD_CEILING_MS};
use crate::{Column, GameError, Player, COLUMNS};

fn default_time_limit() -> u64 {
    crate::search::Difficulty::Hard.time_limit_ms()
}

fn default_hard_limit() -> u64 {
    HARD_CEILING_MS
}

fn default_max_depth() -> u8 {
    crate::search::Difficulty::Hard.max_depth()
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
    pub grid: Vec<i8>,
    #[serde(default)]
    pub heights: Vec<u8>,
    #[serde(default)]
    pub move_count: Option<usize>,
    pub player: Player,
    #[serde(default = "default_time_limit")]
    pub time_limit_ms: u64,
    #[serde(default = "default_hard_limit")]
    pub hard_limit_ms: u64,
    #[serde(default = "default_max_depth")]
    pub max_depth: u8,
    #[serde(default)]
    pub weights: Weights,
    #[serde(default)]
    pub profile: Profile,
    #[serde(default)]
    pub memory_moves: Vec<ScoredMove>,
    #[serde(default)]
    pub random_seed: u64,
    #[serde(default)]
    pub random_intensity: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
    #[serde(rename = "move")]
    pub mv: Option<Column>,
    pub depth: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SearchRequest {
    pub fn new(board: &Board, player: Player, options: SearchOptions) -> Self {
        Self {
            grid: board.to_wire(),
            heights: board.heights().to_vec(),
            move_count: Some(board.moves_played()),
            player,
            time_limit_ms: options.time_limit_ms,
            hard_limit_ms: options.hard_limit_ms,
            max_depth: options.max_depth,
            weights: options.weights,
            profile: options.profile,
            memory_moves: options.memory_moves,
            random_seed: options.random_seed,
            random_intensity: options.random_intensity,
        }
    }

    /// Rebuilds the position and checks the redundant fields against it.
    pub fn into_parts(self) -> Result<(Board, Player, SearchOptions), GameError> {
        let board = Board::from_cells(&self.grid)?;
        if !self.heights.is_empty() {
            if self.heights.len() != COLUMNS {
                return Err(GameError::InconsistentPosition(format!(
                    "expected {COLUMNS} heights, found {}",
                    self.heights.len()
                )));
            }
            if let Some(col_idx) = (0..COLUMNS).find(|&i| self.heights[i] != board.heights()[i]) {
                let column = Column::from_index(col_idx);
                return Err(GameError::InconsistentPosition(format!(
                    "height of column ({}, {}) disagrees with the grid",
                    column.x, column.y
                )));
            }
        }
        if let Some(count) = self.move_count {
            if count != board.moves_played() {
                return Err(GameError::InconsistentPosition(format!(
                    "move count {count} but {} stones on the grid",
                    board.moves_played()
                )));
            }
        }
        let options = SearchOptions {
            time_limit_ms: self.time_limit_ms,
            hard_limit_ms: self.hard_limit_ms,
            max_depth: self.max_depth,
            weights: self.weights,
            profile: self.profile,
            memory_moves: self.memory_moves,
            random_seed: self.random_seed,
            random_intensity: self.random_intensity.clamp(0.0, 1.0),
        };
        Ok((board, self.player, options))
    }
}

/// Entry point of the search context: one request in, one response out.
pub fn handle_request(request: SearchRequest) -> SearchResponse {
    match request.into_parts() {
        Ok((board, player, options)) => {
            let result = compute_best_move(&board, player, &options);
            SearchResponse {
                mv: result.mv,
                depth: result.depth,
                error: None,
            }
        }
        Err(err) => {
            warn!(%err, "rejected search request");
            SearchResponse {
                mv: None,
                depth: 0,
                error: Some(err.to_string()),
            }
        }
    }
}
