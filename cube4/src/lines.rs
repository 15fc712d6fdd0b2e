//! Precomputed winning lines of four and the reverse index from a cell to
//! every line passing through it.
use once_cell::sync::Lazy;
use serde::Serialize;

use crate::{CELLS, CONNECT, SIZE};

/// Four cell indices along one straight direction.
pub type Line = [usize; CONNECT];

/// One representative per undirected direction: 3 axes, 6 planar diagonals
/// and 4 space diagonals. Reverse directions are left out so a line is never
/// generated twice.
pub const DIRECTIONS: [(i32, i32, i32); 13] = [
    (1, 0, 0),
    (0, 1, 0),
    (0, 0, 1),
    (1, 1, 0),
    (1, -1, 0),
    (1, 0, 1),
    (1, 0, -1),
    (0, 1, 1),
    (0, 1, -1),
    (1, 1, 1),
    (1, 1, -1),
    (1, -1, 1),
    (1, -1, -1),
];

pub static LINES: Lazy<Vec<Line>> = Lazy::new(generate_lines);

pub static CELL_LINES: Lazy<Vec<Vec<usize>>> = Lazy::new(|| build_line_index(&LINES));

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
pub struct Coord {
    pub x: usize,
    pub y: usize,
    pub z: usize,
}

pub fn index(x: usize, y: usize, z: usize) -> usize {
    x + y * SIZE + z * SIZE * SIZE
}

pub fn coords(idx: usize) -> Coord {
    Coord {
        x: idx % SIZE,
        y: (idx / SIZE) % SIZE,
        z: idx / (SIZE * SIZE),
    }
}

/// Lines are emitted in a fixed order (x, then y, then z, then direction) so
/// any scan over them is reproducible.
pub fn generate_lines() -> Vec<Line> {
    let mut lines = Vec::new();
    let reach = CONNECT as i32 - 1;
    let in_range = |v: i32| (0..SIZE as i32).contains(&v);
    for x in 0..SIZE as i32 {
        for y in 0..SIZE as i32 {
            for z in 0..SIZE as i32 {
                for &(dx, dy, dz) in DIRECTIONS.iter() {
                    if !in_range(x + dx * reach) || !in_range(y + dy * reach) || !in_range(z + dz * reach) {
                        continue;
                    }
                    let mut line = [0; CONNECT];
                    for (step, cell) in line.iter_mut().enumerate() {
                        let s = step as i32;
                        *cell = index(
                            (x + dx * s) as usize,
                            (y + dy * s) as usize,
                            (z + dz * s) as usize,
                        );
                    }
                    lines.push(line);
                }
            }
        }
    }
    lines
}

pub fn build_line_index(lines: &[Line]) -> Vec<Vec<usize>> {
    let mut cell_lines = vec![Vec::new(); CELLS];
    for (line_idx, line) in lines.iter().enumerate() {
        for &cell in line {
            cell_lines[cell].push(line_idx);
        }
    }
    cell_lines
}
