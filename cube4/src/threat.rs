//! One-ply tactical scan over every line, independent of the search tree.
use serde::Serialize;

use crate::board::Board;
use crate::lines::{self, LINES};
use crate::{Column, Player};

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ThreatKind {
    MustBlock,
    Fork,
    StrongThreat,
    Opportunity,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Threats {
    /// Opponent three with its fourth cell playable now.
    pub must_block: Vec<Column>,
    /// Columns where an opponent stone would create two immediate wins.
    pub forks: Vec<Column>,
    /// Playable empties of opponent twos on otherwise empty lines.
    pub strong_threats: Vec<Column>,
    /// Own three with its fourth cell playable now.
    pub opportunities: Vec<Column>,
}

impl Threats {
    /// Categories in the order they must be answered.
    pub fn by_priority(&self) -> [(ThreatKind, &[Column]); 4] {
        [
            (ThreatKind::MustBlock, self.must_block.as_slice()),
            (ThreatKind::Fork, self.forks.as_slice()),
            (ThreatKind::StrongThreat, self.strong_threats.as_slice()),
            (ThreatKind::Opportunity, self.opportunities.as_slice()),
        ]
    }

    pub fn is_empty(&self) -> bool {
        self.by_priority().iter().all(|(_, moves)| moves.is_empty())
    }
}

fn push_unique(list: &mut Vec<Column>, column: Column) {
    if !list.contains(&column) {
        list.push(column);
    }
}

fn playable_columns<'a>(board: &'a Board, empties: &'a [usize]) -> impl Iterator<Item = Column> + 'a {
    empties
        .iter()
        .filter(move |&&cell| board.is_playable(cell))
        .map(|&cell| {
            let c = lines::coords(cell);
            Column::new(c.x, c.y)
        })
}

pub fn detect_threats(board: &Board, player: Player) -> Threats {
    let opponent = player.opponent();
    let cells = board.cells();
    let mut threats = Threats::default();

    for line in LINES.iter() {
        let mut mine = 0;
        let mut theirs = 0;
        let mut empties = Vec::with_capacity(4);
        for &cell in line {
            match cells[cell] {
                Some(p) if p == player => mine += 1,
                Some(_) => theirs += 1,
                None => empties.push(cell),
            }
        }
        match (mine, theirs) {
            (0, 3) => {
                for column in playable_columns(board, &empties) {
                    push_unique(&mut threats.must_block, column);
                }
            }
            (3, 0) => {
                for column in playable_columns(board, &empties) {
                    push_unique(&mut threats.opportunities, column);
                }
            }
            (0, 2) => {
                for column in playable_columns(board, &empties) {
                    push_unique(&mut threats.strong_threats, column);
                }
            }
            _ => {}
        }
    }

    let mut scratch = board.clone();
    for column in board.valid_moves() {
        if scratch.make_move(column, opponent).is_err() {
            continue;
        }
        if count_immediate_wins(&scratch, opponent) >= 2 {
            push_unique(&mut threats.forks, column);
        }
        scratch.undo();
    }

    threats
}

/// Lines where `player` holds three cells and the fourth is playable now.
pub fn count_immediate_wins(board: &Board, player: Player) -> usize {
    let cells = board.cells();
    LINES
        .iter()
        .filter(|line| {
            let owned = line.iter().filter(|&&c| cells[c] == Some(player)).count();
            let mut empty = line.iter().filter(|&&c| cells[c].is_none());
            match (owned, empty.next(), empty.next()) {
                (3, Some(&cell), None) => board.is_playable(cell),
                _ => false,
            }
        })
        .count()
}
