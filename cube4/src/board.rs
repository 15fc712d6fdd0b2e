use serde::Serialize;

use crate::lines::{self, Coord, Line, CELL_LINES, LINES};
use crate::{Column, GameError, Player, CELLS, COLUMNS, CONNECT, SIZE};

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
pub struct MoveRecord {
    pub column: Column,
    pub z: usize,
    pub player: Player,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MoveOutcome {
    pub player: Player,
    pub column: Column,
    pub z: usize,
    pub won: bool,
    pub draw: bool,
    pub winning_lines: Vec<Line>,
}

impl MoveOutcome {
    pub fn is_terminal(&self) -> bool {
        self.won || self.draw
    }

    /// Winning lines as cube coordinates, for highlighting.
    pub fn winning_coords(&self) -> Vec<[Coord; CONNECT]> {
        self.winning_lines
            .iter()
            .map(|line| line.map(lines::coords))
            .collect()
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Winner {
    pub player: Player,
    pub line: Line,
}

/// Mutable state of one game. Not shared: the search works on its own copy.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Board {
    cells: [Option<Player>; CELLS],
    heights: [u8; COLUMNS],
    history: Vec<MoveRecord>,
    moves_played: usize,
}

impl Default for Board {
    fn default() -> Self {
        Self::new()
    }
}

impl Board {
    pub fn new() -> Self {
        Self {
            cells: [None; CELLS],
            heights: [0; COLUMNS],
            history: Vec::new(),
            moves_played: 0,
        }
    }

    pub fn from_cells(cells: &[i8]) -> Result<Self, GameError> {
        let mut board = Self::new();
        board.load_position(cells)?;
        Ok(board)
    }

    pub fn cells(&self) -> &[Option<Player>; CELLS] {
        &self.cells
    }

    pub fn cell(&self, x: usize, y: usize, z: usize) -> Option<Player> {
        self.cells[lines::index(x, y, z)]
    }

    pub fn heights(&self) -> &[u8; COLUMNS] {
        &self.heights
    }

    pub fn height(&self, column: Column) -> usize {
        self.heights[column.index()] as usize
    }

    pub fn history(&self) -> &[MoveRecord] {
        &self.history
    }

    pub fn moves_played(&self) -> usize {
        self.moves_played
    }

    pub fn is_empty(&self) -> bool {
        self.moves_played == 0
    }

    pub fn is_full(&self) -> bool {
        self.moves_played >= CELLS
    }

    /// True when `cell` is the lowest free cell of its column.
    pub fn is_playable(&self, cell: usize) -> bool {
        let c = lines::coords(cell);
        self.heights[Column::new(c.x, c.y).index()] as usize == c.z
    }

    /// Wire encoding of the grid: `0` empty, `1` red, `-1` blue.
    pub fn to_wire(&self) -> Vec<i8> {
        self.cells
            .iter()
            .map(|cell| cell.map_or(0, Player::value))
            .collect()
    }

    pub fn make_move(&mut self, column: Column, player: Player) -> Result<MoveOutcome, GameError> {
        if !column.in_bounds() {
            return Err(GameError::ColumnOutOfBounds {
                x: column.x,
                y: column.y,
            });
        }
        let z = self.height(column);
        if z >= SIZE {
            return Err(GameError::ColumnFull {
                x: column.x,
                y: column.y,
            });
        }
        let cell = lines::index(column.x, column.y, z);
        self.cells[cell] = Some(player);
        self.heights[column.index()] += 1;
        self.history.push(MoveRecord { column, z, player });
        self.moves_played += 1;

        let winning_lines = self.winning_lines_through(cell, player);
        let won = !winning_lines.is_empty();
        let draw = !won && self.is_full();
        Ok(MoveOutcome {
            player,
            column,
            z,
            won,
            draw,
            winning_lines,
        })
    }

    /// Reverts the most recent move. No-op on an empty history.
    pub fn undo(&mut self) -> Option<MoveRecord> {
        let last = self.history.pop()?;
        self.cells[lines::index(last.column.x, last.column.y, last.z)] = None;
        self.heights[last.column.index()] = last.z as u8;
        self.moves_played -= 1;
        Some(last)
    }

    /// Open columns in x-major order.
    pub fn valid_moves(&self) -> Vec<Column> {
        let mut moves = Vec::with_capacity(COLUMNS);
        for x in 0..SIZE {
            for y in 0..SIZE {
                let column = Column::new(x, y);
                if self.height(column) < SIZE {
                    moves.push(column);
                }
            }
        }
        moves
    }

    /// Open columns, nearest to the centre first. Ties keep x-major order.
    pub fn moves_by_center(&self) -> Vec<Column> {
        let mut moves = self.valid_moves();
        moves.sort_by_key(|column| column.center_distance());
        moves
    }

    /// Full scan in line-table order; the first complete line wins.
    pub fn check_win_all(&self) -> Option<Winner> {
        LINES.iter().find_map(|line| {
            let first = self.cells[line[0]]?;
            line[1..]
                .iter()
                .all(|&cell| self.cells[cell] == Some(first))
                .then_some(Winner {
                    player: first,
                    line: *line,
                })
        })
    }

    pub fn winning_lines_through(&self, cell: usize, player: Player) -> Vec<Line> {
        CELL_LINES[cell]
            .iter()
            .map(|&line_idx| LINES[line_idx])
            .filter(|line| line.iter().all(|&c| self.cells[c] == Some(player)))
            .collect()
    }

    /// Replaces the position from a flat grid. Heights and the move counter
    /// are rebuilt from the cells; history is cleared.
    pub fn load_position(&mut self, cells: &[i8]) -> Result<(), GameError> {
        if cells.len() != CELLS {
            return Err(GameError::GridLength {
                expected: CELLS,
                found: cells.len(),
            });
        }
        let mut grid = [None; CELLS];
        for (slot, &value) in grid.iter_mut().zip(cells) {
            *slot = Player::from_cell(value)?;
        }

        let mut heights = [0u8; COLUMNS];
        for (col_idx, height) in heights.iter_mut().enumerate() {
            let column = Column::from_index(col_idx);
            *height = (0..SIZE)
                .rev()
                .find(|&z| grid[lines::index(column.x, column.y, z)].is_some())
                .map_or(0, |z| z as u8 + 1);
        }

        self.cells = grid;
        self.heights = heights;
        self.history.clear();
        self.moves_played = grid.iter().filter(|cell| cell.is_some()).count();
        Ok(())
    }
}
