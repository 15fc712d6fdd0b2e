use serde::{Deserialize, Serialize};

use crate::board::MoveRecord;
use crate::{Column, Player, COLUMNS};

/// Cumulative placement statistics of the human player.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub games: u32,
    pub moves: u32,
    pub heat: Vec<u32>,
    pub stats: ProfileStats,
    pub updated_at: i64,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileStats {
    pub center_moves: u32,
    pub edge_moves: u32,
    pub total_moves: u32,
    pub total_z: u32,
    pub same_column_streaks: u32,
    pub last_column: Option<usize>,
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileSummary {
    pub center_bias: f64,
    pub edge_bias: f64,
    pub avg_z: f64,
    pub moves: u32,
    pub games: u32,
}

impl Default for Profile {
    fn default() -> Self {
        Self {
            games: 0,
            moves: 0,
            heat: vec![0; COLUMNS],
            stats: ProfileStats::default(),
            updated_at: chrono::Utc::now().timestamp_millis(),
        }
    }
}

impl Profile {
    /// Folds one placement into the profile. Moves by anyone but `human` are ignored.
    pub fn update_move(&self, record: &MoveRecord, human: Player) -> Profile {
        if record.player != human {
            return self.clone();
        }
        let column = record.column;
        let col_idx = column.index();
        let mut next = self.clone();
        next.moves += 1;
        if next.heat.len() != COLUMNS {
            next.heat.resize(COLUMNS, 0);
        }
        next.heat[col_idx] += 1;

        let stats = &mut next.stats;
        stats.total_moves += 1;
        stats.total_z += record.z as u32;
        if column.is_center() {
            stats.center_moves += 1;
        }
        if column.is_edge() {
            stats.edge_moves += 1;
        }
        if stats.last_column == Some(col_idx) {
            stats.same_column_streaks += 1;
        }
        stats.last_column = Some(col_idx);
        next.updated_at = chrono::Utc::now().timestamp_millis();
        next
    }

    pub fn update_game(&self, learning_enabled: bool) -> Profile {
        if !learning_enabled {
            return self.clone();
        }
        let mut next = self.clone();
        next.games += 1;
        next.updated_at = chrono::Utc::now().timestamp_millis();
        next
    }

    pub fn summary(&self) -> ProfileSummary {
        let total = self.stats.total_moves.max(1) as f64;
        ProfileSummary {
            center_bias: self.stats.center_moves as f64 / total,
            edge_bias: self.stats.edge_moves as f64 / total,
            avg_z: self.stats.total_z as f64 / total,
            moves: self.moves,
            games: self.games,
        }
    }

    /// Heat of `column` relative to the hottest column, in `[0, 1]`.
    pub fn relative_heat(&self, column: Column) -> f64 {
        let max = self.heat.iter().copied().max().unwrap_or(0);
        if max == 0 {
            return 0.0;
        }
        self.heat.get(column.index()).copied().unwrap_or(0) as f64 / max as f64
    }
}
