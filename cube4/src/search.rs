//! Move selection for the computer player.
//!
//! Cheap rules run first (opening, win-in-one, block-in-one, threat scan,
//! remembered outcomes). Then iterative-deepening negamax with alpha-beta
//! pruning runs against the static evaluator under a wall-clock deadline.
//! The searched move may finally be swapped for a close alternative through
//! softmax sampling, which makes the opponent less predictable.
use std::time::{Duration, Instant};

use rand::{rngs::StdRng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::board::Board;
use crate::eval::{evaluate_grid, WIN_SCORE};
use crate::learning::{Profile, Weights};
use crate::sampler::{softmax_sample, ScoredMove};
use crate::threat::{count_immediate_wins, detect_threats, ThreatKind};
use crate::{Column, Player};

/// No search may run longer than this, whatever the caller asks for.
pub const HARD_CEILING_MS: u64 = 30_000;

const MEMORY_CANDIDATES: usize = 3;
const MEMORY_TEMPERATURE: f64 = 0.6;
const DIVERSIFY_CANDIDATES: usize = 3;
const DIVERSIFY_BASE_TEMPERATURE: f64 = 0.5;
/// Evaluation points per unit of softmax temperature when diversifying.
const DIVERSIFY_SCORE_SCALE: f64 = 10.0;
/// Largest share by which heat shortens a root move's ordering key.
const HEAT_NUDGE: f64 = 0.15;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub fn max_depth(self) -> u8 {
        match self {
            Difficulty::Easy => 1,
            Difficulty::Medium => 4,
            Difficulty::Hard => 6,
        }
    }

    pub fn time_limit_ms(self) -> u64 {
        match self {
            Difficulty::Easy => 80,
            Difficulty::Medium => 500,
            Difficulty::Hard => 1200,
        }
    }

    /// Least diversification applied at this level. Easy always re-draws
    /// among the searched move and the most central ones.
    pub fn min_random_intensity(self) -> f64 {
        match self {
            Difficulty::Easy => 1.0,
            Difficulty::Medium | Difficulty::Hard => 0.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct SearchOptions {
    pub time_limit_ms: u64,
    pub hard_limit_ms: u64,
    pub max_depth: u8,
    pub weights: Weights,
    pub profile: Profile,
    /// Remembered moves for this exact position, best first.
    pub memory_moves: Vec<ScoredMove>,
    pub random_seed: u64,
    /// Diversification strength in `[0, 1]`; zero keeps the searched move.
    pub random_intensity: f64,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self::for_difficulty(Difficulty::Hard)
    }
}

impl SearchOptions {
    pub fn for_difficulty(difficulty: Difficulty) -> Self {
        Self {
            time_limit_ms: difficulty.time_limit_ms(),
            hard_limit_ms: HARD_CEILING_MS,
            max_depth: difficulty.max_depth(),
            weights: Weights::default(),
            profile: Profile::default(),
            memory_moves: Vec::new(),
            random_seed: 1,
            random_intensity: difficulty.min_random_intensity(),
        }
    }

    pub fn budget(&self) -> Duration {
        Duration::from_millis(self.time_limit_ms.min(self.hard_limit_ms).min(HARD_CEILING_MS))
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum MoveSource {
    Opening,
    ImmediateWin,
    ImmediateBlock,
    Threat(ThreatKind),
    Memory,
    Search,
    Fallback,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SearchResult {
    pub mv: Option<Column>,
    /// Deepest ply fully or partially searched; 1 for rule-based picks.
    pub depth: u8,
    pub source: MoveSource,
}

impl SearchResult {
    fn rule(mv: Column, source: MoveSource) -> Self {
        Self {
            mv: Some(mv),
            depth: 1,
            source,
        }
    }
}

/// Picks a column for `player`. Works on a private copy of `board` and
/// returns a legal move whenever one exists.
pub fn compute_best_move(board: &Board, player: Player, options: &SearchOptions) -> SearchResult {
    let started = Instant::now();
    let deadline = started + options.budget();
    let mut scratch = board.clone();
    let mut rng = StdRng::seed_from_u64(options.random_seed);
    let weights = &options.weights;

    let ordered = scratch.moves_by_center();
    let Some(&nearest) = ordered.first() else {
        return SearchResult {
            mv: None,
            depth: 0,
            source: MoveSource::Fallback,
        };
    };

    if scratch.is_empty() {
        return SearchResult::rule(Column::CENTER, MoveSource::Opening);
    }
    if let Some(column) = find_immediate_win(&mut scratch, player, &ordered) {
        return SearchResult::rule(column, MoveSource::ImmediateWin);
    }
    if let Some(column) = find_immediate_win(&mut scratch, player.opponent(), &ordered) {
        return SearchResult::rule(column, MoveSource::ImmediateBlock);
    }

    let threats = detect_threats(&scratch, player);
    for (kind, columns) in threats.by_priority() {
        if let Some(column) = best_tactical(&mut scratch, player, columns, weights) {
            debug!(?kind, ?column, "threat rule answered");
            return SearchResult::rule(column, MoveSource::Threat(kind));
        }
    }

    if let Some(column) = pick_from_memory(&mut scratch, player, &options.memory_moves, &mut rng) {
        return SearchResult::rule(column, MoveSource::Memory);
    }

    let mut searcher = Searcher {
        weights,
        deadline,
        nodes: 0,
    };
    let deepened = searcher.iterative_deepening(&mut scratch, player, options);
    debug!(
        depth = deepened.depth,
        nodes = searcher.nodes,
        elapsed_ms = started.elapsed().as_millis() as u64,
        best = ?deepened.best,
        "iterative deepening finished"
    );

    match deepened.best {
        Some((column, score)) => {
            let column = if options.random_intensity > 0.0 && score < WIN_SCORE {
                diversify(&mut scratch, player, column, options, &mut rng)
            } else {
                column
            };
            SearchResult {
                mv: Some(column),
                depth: deepened.depth,
                source: MoveSource::Search,
            }
        }
        None => SearchResult {
            mv: Some(nearest),
            depth: 0,
            source: MoveSource::Fallback,
        },
    }
}

/// First column, in the given order, where `player` completes a line.
fn find_immediate_win(board: &mut Board, player: Player, ordered: &[Column]) -> Option<Column> {
    ordered.iter().copied().find(|&column| match board.make_move(column, player) {
        Ok(outcome) => {
            board.undo();
            outcome.won
        }
        Err(_) => false,
    })
}

/// Playing `column` lets the opponent complete a line next turn.
fn hands_over_win(board: &mut Board, player: Player, column: Column) -> bool {
    let Ok(outcome) = board.make_move(column, player) else {
        return true;
    };
    let unsafe_move = !outcome.won && count_immediate_wins(board, player.opponent()) > 0;
    board.undo();
    unsafe_move
}

/// One-ply static score of each legal candidate, with its safety flag.
fn score_candidates(
    board: &mut Board,
    player: Player,
    columns: &[Column],
    weights: &Weights,
) -> Vec<(ScoredMove, bool)> {
    let mut scored = Vec::with_capacity(columns.len());
    for &column in columns {
        if !column.in_bounds() || board.height(column) >= crate::SIZE {
            continue;
        }
        let safe = !hands_over_win(board, player, column);
        if board.make_move(column, player).is_err() {
            continue;
        }
        let score = evaluate_grid(board.cells(), player, weights);
        board.undo();
        scored.push((ScoredMove { column, score }, safe));
    }
    scored
}

/// Keeps only safe candidates when at least one exists.
fn prefer_safe(scored: Vec<(ScoredMove, bool)>) -> Vec<ScoredMove> {
    let any_safe = scored.iter().any(|(_, safe)| *safe);
    scored
        .into_iter()
        .filter(|(_, safe)| *safe || !any_safe)
        .map(|(candidate, _)| candidate)
        .collect()
}

fn best_tactical(board: &mut Board, player: Player, columns: &[Column], weights: &Weights) -> Option<Column> {
    prefer_safe(score_candidates(board, player, columns, weights))
        .into_iter()
        .fold(None, |best: Option<ScoredMove>, candidate| match best {
            Some(b) if b.score >= candidate.score => Some(b),
            _ => Some(candidate),
        })
        .map(|m| m.column)
}

fn pick_from_memory(
    board: &mut Board,
    player: Player,
    memory_moves: &[ScoredMove],
    rng: &mut StdRng,
) -> Option<Column> {
    let mut ranked: Vec<ScoredMove> = memory_moves
        .iter()
        .copied()
        .filter(|m| m.score > 0.0 && m.column.in_bounds() && board.height(m.column) < crate::SIZE)
        .collect();
    ranked.sort_by(|a, b| b.score.total_cmp(&a.score));
    ranked.truncate(MEMORY_CANDIDATES);
    let safe: Vec<ScoredMove> = ranked
        .into_iter()
        .filter(|m| !hands_over_win(board, player, m.column))
        .collect();
    softmax_sample(&safe, MEMORY_TEMPERATURE, rng).map(|m| m.column)
}

/// Re-draws among the searched move and the most central legal moves,
/// weighted by one-ply evaluation.
fn diversify(
    board: &mut Board,
    player: Player,
    best: Column,
    options: &SearchOptions,
    rng: &mut StdRng,
) -> Column {
    let mut pool = vec![best];
    for column in board.moves_by_center().into_iter().take(DIVERSIFY_CANDIDATES) {
        if !pool.contains(&column) {
            pool.push(column);
        }
    }
    let candidates: Vec<ScoredMove> = prefer_safe(score_candidates(board, player, &pool, &options.weights))
        .into_iter()
        .map(|m| ScoredMove {
            column: m.column,
            score: m.score / DIVERSIFY_SCORE_SCALE,
        })
        .collect();
    let temperature = DIVERSIFY_BASE_TEMPERATURE + options.random_intensity.clamp(0.0, 1.0);
    softmax_sample(&candidates, temperature, rng)
        .map(|m| m.column)
        .unwrap_or(best)
}

/// Root ordering: nearest to the centre first, with columns the human
/// favours pulled slightly forward.
fn root_order(board: &Board, profile: &Profile) -> Vec<Column> {
    let mut moves = board.moves_by_center();
    let key = |column: &Column| {
        (column.center_distance() as f64 + 1.0) * (1.0 - HEAT_NUDGE * profile.relative_heat(*column))
    };
    moves.sort_by(|a, b| key(a).total_cmp(&key(b)));
    moves
}

struct Deepened {
    best: Option<(Column, f64)>,
    depth: u8,
}

struct Searcher<'a> {
    weights: &'a Weights,
    deadline: Instant,
    nodes: u64,
}

impl Searcher<'_> {
    fn expired(&self) -> bool {
        Instant::now() >= self.deadline
    }

    fn iterative_deepening(&mut self, board: &mut Board, player: Player, options: &SearchOptions) -> Deepened {
        let order = root_order(board, &options.profile);
        let mut result = Deepened { best: None, depth: 0 };

        for depth in 1..=options.max_depth.max(1) {
            if self.expired() {
                break;
            }
            let mut local: Option<(Column, f64)> = None;
            let mut alpha = f64::NEG_INFINITY;
            let mut aborted = false;

            for &column in &order {
                if self.expired() {
                    aborted = true;
                    break;
                }
                let Ok(outcome) = board.make_move(column, player) else {
                    continue;
                };
                let score = if outcome.won {
                    WIN_SCORE + depth as f64
                } else {
                    -self.negamax(board, depth - 1, f64::NEG_INFINITY, -alpha, player.opponent())
                };
                board.undo();
                if local.map_or(true, |(_, best)| score > best) {
                    local = Some((column, score));
                }
                alpha = alpha.max(score);
            }

            if local.is_some() {
                result.best = local;
                result.depth = depth;
            }
            if aborted || local.is_some_and(|(_, score)| score >= WIN_SCORE) {
                break;
            }
        }
        result
    }

    fn negamax(&mut self, board: &mut Board, depth: u8, mut alpha: f64, beta: f64, player: Player) -> f64 {
        self.nodes += 1;
        if self.expired() {
            return evaluate_grid(board.cells(), player, self.weights);
        }
        if let Some(winner) = board.check_win_all() {
            let score = WIN_SCORE + depth as f64;
            return if winner.player == player { score } else { -score };
        }
        if depth == 0 || board.is_full() {
            return evaluate_grid(board.cells(), player, self.weights);
        }

        let mut best = f64::NEG_INFINITY;
        for column in board.moves_by_center() {
            if board.make_move(column, player).is_err() {
                continue;
            }
            let score = -self.negamax(board, depth - 1, -beta, -alpha, player.opponent());
            board.undo();
            best = best.max(score);
            alpha = alpha.max(score);
            if alpha >= beta {
                break;
            }
        }
        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn play(board: &mut Board, moves: &[((usize, usize), Player)]) {
        for &((x, y), player) in moves {
            board.make_move(Column::new(x, y), player).unwrap();
        }
    }

    fn quick(depth: u8) -> SearchOptions {
        SearchOptions {
            time_limit_ms: 2_000,
            max_depth: depth,
            ..SearchOptions::default()
        }
    }

    #[test]
    fn empty_board_opens_in_the_centre() {
        let result = compute_best_move(&Board::new(), Player::Red, &quick(4));
        assert_eq!(result.mv, Some(Column::CENTER));
        assert_eq!(result.source, MoveSource::Opening);
    }

    #[test]
    fn takes_immediate_win() {
        let mut board = Board::new();
        play(
            &mut board,
            &[
                ((0, 0), Player::Red),
                ((0, 4), Player::Blue),
                ((1, 0), Player::Red),
                ((1, 4), Player::Blue),
                ((2, 0), Player::Red),
                ((2, 4), Player::Blue),
            ],
        );
        let result = compute_best_move(&board, Player::Red, &quick(4));
        assert_eq!(result.mv, Some(Column::new(3, 0)));
        assert_eq!(result.source, MoveSource::ImmediateWin);
    }

    #[test]
    fn blocks_immediate_loss() {
        let mut board = Board::new();
        play(
            &mut board,
            &[
                ((4, 4), Player::Red),
                ((2, 0), Player::Blue),
                ((4, 3), Player::Red),
                ((2, 1), Player::Blue),
                ((0, 4), Player::Red),
                ((2, 2), Player::Blue),
            ],
        );
        let result = compute_best_move(&board, Player::Red, &quick(4));
        assert_eq!(result.mv, Some(Column::new(2, 3)));
        assert_eq!(result.source, MoveSource::ImmediateBlock);
    }

    #[test]
    fn does_not_mutate_the_callers_board() {
        let mut board = Board::new();
        play(&mut board, &[((2, 2), Player::Red), ((1, 2), Player::Blue)]);
        let before = board.clone();
        let _ = compute_best_move(&board, Player::Red, &quick(3));
        assert_eq!(board, before);
    }

    #[test]
    fn pre_empts_a_fork() {
        let mut board = Board::new();
        play(
            &mut board,
            &[
                ((1, 0), Player::Blue),
                ((2, 0), Player::Blue),
                ((0, 1), Player::Blue),
                ((0, 2), Player::Blue),
                ((4, 4), Player::Red),
                ((3, 4), Player::Red),
            ],
        );
        // Blue stones at (0,0), (3,0) or (0,3) would each open two wins.
        let result = compute_best_move(&board, Player::Red, &quick(3));
        assert_eq!(result.source, MoveSource::Threat(ThreatKind::Fork));
        let forks = [Column::new(0, 0), Column::new(3, 0), Column::new(0, 3)];
        assert!(forks.contains(&result.mv.unwrap()));
    }

    #[test]
    fn zero_deadline_still_returns_a_legal_move() {
        let mut board = Board::new();
        play(&mut board, &[((2, 2), Player::Red), ((4, 0), Player::Blue)]);
        let options = SearchOptions {
            time_limit_ms: 0,
            ..SearchOptions::default()
        };
        let result = compute_best_move(&board, Player::Red, &options);
        let mv = result.mv.expect("a move must be returned");
        assert!(board.valid_moves().contains(&mv));
    }

    #[test]
    fn searches_quiet_positions_within_the_budget() {
        // Scattered stones, no twos on shared lines: nothing for the rules to answer.
        let mut board = Board::new();
        play(&mut board, &[((0, 0), Player::Blue), ((4, 4), Player::Red)]);
        let options = SearchOptions {
            time_limit_ms: 300,
            max_depth: 3,
            ..SearchOptions::default()
        };
        let started = Instant::now();
        let result = compute_best_move(&board, Player::Red, &options);
        assert!(started.elapsed() < Duration::from_millis(2_000));
        assert_eq!(result.source, MoveSource::Search);
        assert!(result.depth >= 1);
        assert!(board.valid_moves().contains(&result.mv.unwrap()));
    }

    #[test]
    fn full_board_yields_no_move() {
        let mut board = Board::new();
        let grid: Vec<i8> = (0..crate::CELLS)
            .map(|idx| {
                let c = crate::lines::coords(idx);
                if (c.x + 2 * c.y + 3 * c.z) % 4 < 2 {
                    1
                } else {
                    -1
                }
            })
            .collect();
        board.load_position(&grid).unwrap();
        let result = compute_best_move(&board, Player::Red, &quick(2));
        assert_eq!(result.mv, None);
    }

    #[test]
    fn remembered_winning_move_is_replayed() {
        let mut board = Board::new();
        play(&mut board, &[((0, 0), Player::Blue), ((4, 4), Player::Red)]);
        let options = SearchOptions {
            memory_moves: vec![ScoredMove {
                column: Column::new(3, 1),
                score: 4.0,
            }],
            ..quick(3)
        };
        let result = compute_best_move(&board, Player::Blue, &options);
        assert_eq!(result.mv, Some(Column::new(3, 1)));
        assert_eq!(result.source, MoveSource::Memory);
    }

    #[test]
    fn losing_memories_are_ignored() {
        let mut board = Board::new();
        play(&mut board, &[((0, 0), Player::Blue), ((4, 4), Player::Red)]);
        let options = SearchOptions {
            memory_moves: vec![ScoredMove {
                column: Column::new(3, 1),
                score: -2.0,
            }],
            ..quick(2)
        };
        let result = compute_best_move(&board, Player::Blue, &options);
        assert_eq!(result.source, MoveSource::Search);
    }

    #[test]
    fn diversified_moves_stay_legal_and_reproducible() {
        let mut board = Board::new();
        play(&mut board, &[((0, 0), Player::Blue), ((4, 4), Player::Red)]);
        let options = SearchOptions {
            random_intensity: 1.0,
            random_seed: 42,
            ..quick(2)
        };
        let first = compute_best_move(&board, Player::Red, &options);
        let second = compute_best_move(&board, Player::Red, &options);
        assert_eq!(first.mv, second.mv);
        assert!(board.valid_moves().contains(&first.mv.unwrap()));
    }

    #[test]
    fn easy_level_always_diversifies() {
        assert_eq!(SearchOptions::for_difficulty(Difficulty::Easy).random_intensity, 1.0);
        assert_eq!(SearchOptions::for_difficulty(Difficulty::Hard).random_intensity, 0.0);

        let mut board = Board::new();
        play(&mut board, &[((0, 0), Player::Blue), ((4, 4), Player::Red)]);
        let central = board.moves_by_center();
        let mut picks = std::collections::HashSet::new();
        for seed in 0..40 {
            let options = SearchOptions {
                random_seed: seed,
                ..SearchOptions::for_difficulty(Difficulty::Easy)
            };
            let result = compute_best_move(&board, Player::Red, &options);
            let mv = result.mv.unwrap();
            assert!(board.valid_moves().contains(&mv));
            picks.insert(mv);
        }
        assert!(picks.len() > 1, "easy level never varied: {picks:?}");
        assert!(picks.iter().filter(|m| !central[..3].contains(m)).count() <= 1);
    }

    #[test]
    fn heat_pulls_favoured_columns_forward() {
        let board = Board::new();
        let mut profile = Profile::default();
        profile.heat[Column::new(3, 2).index()] = 10;
        let order = root_order(&board, &profile);
        assert_eq!(order[0], Column::CENTER);
        assert_eq!(order[1], Column::new(3, 2));
    }
}
