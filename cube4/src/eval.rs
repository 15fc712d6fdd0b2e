//! Static evaluation of a position.
use once_cell::sync::Lazy;

use crate::learning::Weights;
use crate::lines::{self, LINES};
use crate::{Player, CELLS, SIZE};

/// Terminal score of a won game, far above any heuristic sum.
pub const WIN_SCORE: f64 = 1_000_000.0;
/// A completed line found mid-evaluation.
const FOUR_SCORE: f64 = 100_000.0;

static CENTER_WEIGHTS: Lazy<[f64; CELLS]> = Lazy::new(|| {
    let mut table = [0.0; CELLS];
    for (idx, slot) in table.iter_mut().enumerate() {
        let c = lines::coords(idx);
        let distance = c.x.abs_diff(2) + c.y.abs_diff(2) + c.z.abs_diff(2);
        *slot = 6.0 - distance as f64;
    }
    table
});

/// Signed score of `cells` for `perspective`; positive favours it.
///
/// Each stone earns a centrality bonus plus a bonus for sitting low in its
/// column. A line held by one side only is open: two or three stones on it
/// score the count weight plus the matching open bonus.
pub fn evaluate_grid(cells: &[Option<Player>; CELLS], perspective: Player, weights: &Weights) -> f64 {
    let mut score = 0.0;

    for (idx, cell) in cells.iter().enumerate() {
        let Some(owner) = cell else { continue };
        let z = idx / (SIZE * SIZE);
        let bonus = CENTER_WEIGHTS[idx] * weights.center + (SIZE - 1 - z) as f64 * weights.height;
        if *owner == perspective {
            score += bonus;
        } else {
            score -= bonus;
        }
    }

    for line in LINES.iter() {
        let mut mine = 0;
        let mut theirs = 0;
        for &cell in line {
            match cells[cell] {
                Some(p) if p == perspective => mine += 1,
                Some(_) => theirs += 1,
                None => {}
            }
        }
        if mine > 0 && theirs > 0 {
            continue;
        }
        if mine > 0 {
            score += match mine {
                2 => weights.two + weights.open_two,
                3 => weights.three + weights.open_three,
                4 => FOUR_SCORE,
                _ => 0.0,
            };
        } else if theirs > 0 {
            score -= match theirs {
                2 => weights.block_two + weights.open_two,
                3 => weights.block_three + weights.open_three,
                4 => FOUR_SCORE,
                _ => 0.0,
            };
        }
    }

    score
}
