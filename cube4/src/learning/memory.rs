use std::collections::{HashMap, VecDeque};

use serde::{Deserialize, Serialize};

use super::Outcome;
use crate::sampler::ScoredMove;
use crate::{Column, Player, CELLS};

pub const DEFAULT_CAPACITY: usize = 5000;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryMove {
    #[serde(flatten)]
    pub column: Column,
    pub wins: u32,
    pub losses: u32,
    pub draws: u32,
    pub last_seen: i64,
}

impl MemoryMove {
    pub fn score(&self) -> f64 {
        self.wins as f64 - self.losses as f64 + self.draws as f64 * 0.2
    }
}

/// Outcome tallies per exact position. Keys are evicted oldest-first once
/// more than `cap` distinct positions are stored.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Memory {
    entries: HashMap<String, Vec<MemoryMove>>,
    order: VecDeque<String>,
    cap: usize,
}

impl Default for Memory {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

/// Exact-position key: one character per cell (`0` empty, `1` red, `2` blue)
/// followed by the side to move.
pub fn encode_state(cells: &[Option<Player>; CELLS], turn: Player) -> String {
    let mut out = String::with_capacity(CELLS + 3);
    for cell in cells {
        out.push(match cell {
            None => '0',
            Some(Player::Red) => '1',
            Some(Player::Blue) => '2',
        });
    }
    out.push('|');
    out.push_str(&turn.value().to_string());
    out
}

impl Memory {
    pub fn with_capacity(cap: usize) -> Self {
        Self {
            entries: HashMap::new(),
            order: VecDeque::new(),
            cap,
        }
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.cap
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Keys from oldest to newest.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    /// A decoded record is only trusted when the key order and the entry map agree.
    pub fn is_consistent(&self) -> bool {
        self.order.len() == self.entries.len()
            && self.order.iter().all(|key| self.entries.contains_key(key))
    }

    /// Entries for `key`, best first.
    pub fn pick(&self, key: &str) -> Vec<MemoryMove> {
        let mut moves = self.entries.get(key).cloned().unwrap_or_default();
        moves.sort_by(|a, b| b.score().total_cmp(&a.score()));
        moves
    }

    pub fn scored_moves(&self, key: &str) -> Vec<ScoredMove> {
        self.pick(key)
            .into_iter()
            .map(|entry| ScoredMove {
                column: entry.column,
                score: entry.score(),
            })
            .collect()
    }

    pub fn update(mut self, key: &str, column: Column, outcome: Outcome) -> Memory {
        let now = chrono::Utc::now().timestamp_millis();
        if !self.entries.contains_key(key) {
            self.order.push_back(key.to_string());
        }
        let list = self.entries.entry(key.to_string()).or_default();
        let entry = match list.iter_mut().position(|e| e.column == column) {
            Some(pos) => &mut list[pos],
            None => {
                list.push(MemoryMove {
                    column,
                    wins: 0,
                    losses: 0,
                    draws: 0,
                    last_seen: now,
                });
                let last = list.len() - 1;
                &mut list[last]
            }
        };
        match outcome {
            Outcome::Win => entry.wins += 1,
            Outcome::Loss => entry.losses += 1,
            Outcome::Draw => entry.draws += 1,
        }
        entry.last_seen = now;

        while self.order.len() > self.cap {
            if let Some(oldest) = self.order.pop_front() {
                self.entries.remove(&oldest);
            }
        }
        self
    }
}
