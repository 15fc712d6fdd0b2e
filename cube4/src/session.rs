//! The interactive side of a game: owns the live board, enforces turn order,
//! runs the per-turn clock and talks to the search through one outstanding
//! request at a time.
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::board::{Board, MoveOutcome};
use crate::learning::{encode_state, LearnedState, Outcome, ProfileSummary, Snapshot};
use crate::protocol::{SearchRequest, SearchResponse};
use crate::search::{Difficulty, SearchOptions, HARD_CEILING_MS};
use crate::worker::{SearchWorker, WorkerReply};
use crate::{Column, GameError, Player};

/// Slack kept back from the turn clock when budgeting a computer search.
const CLOCK_MARGIN_MS: u64 = 50;
const MIN_COMPUTER_TIME_MS: u64 = 200;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Pvp,
    Ai,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Actor {
    Human,
    Computer,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerMapping {
    pub human: Player,
    pub ai: Player,
    pub first_turn: Player,
}

/// The human always plays red; only the opening side changes.
pub fn player_mapping(mode: Mode, human_first: bool) -> PlayerMapping {
    let first_turn = match mode {
        Mode::Pvp => Player::Red,
        Mode::Ai if human_first => Player::Red,
        Mode::Ai => Player::Blue,
    };
    PlayerMapping {
        human: Player::Red,
        ai: Player::Blue,
        first_turn,
    }
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeControl {
    #[default]
    Off,
    #[serde(rename = "30")]
    Seconds30,
    #[serde(rename = "60")]
    Seconds60,
}

impl TimeControl {
    pub fn turn_limit(self) -> Option<Duration> {
        match self {
            TimeControl::Off => None,
            TimeControl::Seconds30 => Some(Duration::from_secs(30)),
            TimeControl::Seconds60 => Some(Duration::from_secs(60)),
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase", tag = "state", content = "winner")]
pub enum GameStatus {
    Playing,
    Won(Player),
    Draw,
}

/// Identifies the turn a search request was issued for.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Ticket {
    /// Game generation; bumped by every reset.
    pub game: u64,
    pub ply: usize,
    pub player: Player,
}

#[derive(Debug)]
pub struct GameSession {
    board: Board,
    mode: Mode,
    mapping: PlayerMapping,
    turn: Player,
    status: GameStatus,
    /// Positions the computer moved from, credited when the game ends.
    snapshots: Vec<Snapshot>,
    learned: LearnedState,
    learning_enabled: bool,
    difficulty: Difficulty,
    random_intensity: f64,
    seed: u64,
    time_control: TimeControl,
    turn_started: Instant,
    pending: Option<Ticket>,
    game: u64,
}

impl GameSession {
    pub fn new(mode: Mode, human_first: bool, learned: LearnedState) -> Self {
        let mapping = player_mapping(mode, human_first);
        Self {
            board: Board::new(),
            mode,
            mapping,
            turn: mapping.first_turn,
            status: GameStatus::Playing,
            snapshots: Vec::new(),
            learned,
            learning_enabled: true,
            difficulty: Difficulty::Hard,
            random_intensity: 0.0,
            seed: chrono::Utc::now().timestamp_millis() as u64,
            time_control: TimeControl::Off,
            turn_started: Instant::now(),
            pending: None,
            game: 0,
        }
    }

    /// Starts a new game, keeping settings and learned state.
    pub fn reset(&mut self, mode: Mode, human_first: bool) {
        self.mode = mode;
        self.mapping = player_mapping(mode, human_first);
        self.board = Board::new();
        self.turn = self.mapping.first_turn;
        self.status = GameStatus::Playing;
        self.snapshots.clear();
        self.pending = None;
        self.game = self.game.wrapping_add(1);
        self.turn_started = Instant::now();
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn mapping(&self) -> PlayerMapping {
        self.mapping
    }

    pub fn turn(&self) -> Player {
        self.turn
    }

    pub fn status(&self) -> GameStatus {
        self.status
    }

    pub fn is_over(&self) -> bool {
        self.status != GameStatus::Playing
    }

    pub fn pending(&self) -> Option<Ticket> {
        self.pending
    }

    pub fn learned(&self) -> &LearnedState {
        &self.learned
    }

    pub fn learning_enabled(&self) -> bool {
        self.learning_enabled
    }

    pub fn difficulty(&self) -> Difficulty {
        self.difficulty
    }

    pub fn time_control(&self) -> TimeControl {
        self.time_control
    }

    pub fn profile_summary(&self) -> ProfileSummary {
        self.learned.profile.summary()
    }

    pub fn set_learning(&mut self, enabled: bool) {
        self.learning_enabled = enabled;
    }

    pub fn set_difficulty(&mut self, difficulty: Difficulty) {
        self.difficulty = difficulty;
    }

    pub fn set_random_intensity(&mut self, intensity: f64) {
        self.random_intensity = if intensity.is_finite() {
            intensity.clamp(0.0, 1.0)
        } else {
            0.0
        };
    }

    pub fn set_seed(&mut self, seed: u64) {
        self.seed = seed;
    }

    /// Switching the clock restarts the current turn's timer.
    pub fn set_time_control(&mut self, time_control: TimeControl) {
        self.time_control = time_control;
        self.turn_started = Instant::now();
    }

    /// Forgets everything learned so far.
    pub fn clear_learning(&mut self) {
        self.learned.reset();
        info!("learned state cleared");
    }

    /// Who is allowed to place `player`'s stones.
    pub fn actor_for(&self, player: Player) -> Actor {
        match self.mode {
            Mode::Ai if player == self.mapping.ai => Actor::Computer,
            _ => Actor::Human,
        }
    }

    pub fn apply_move(&mut self, column: Column, player: Player, actor: Actor) -> Result<MoveOutcome, GameError> {
        if self.is_over() {
            return Err(GameError::GameOver);
        }
        if player != self.turn {
            return Err(GameError::WrongTurn {
                expected: self.turn,
                found: player,
            });
        }
        if actor != self.actor_for(player) {
            return Err(GameError::WrongColor { actor, player });
        }

        let snapshot = Snapshot {
            cells: *self.board.cells(),
            turn: player,
            column,
        };
        let outcome = self.board.make_move(column, player)?;
        if actor == Actor::Computer {
            self.snapshots.push(snapshot);
        }

        if self.learning_enabled && self.mode == Mode::Ai {
            if let Some(record) = self.board.history().last() {
                self.learned.profile = self.learned.profile.update_move(record, self.mapping.human);
            }
        }

        if outcome.won {
            self.finish(GameStatus::Won(player));
        } else if outcome.draw {
            self.finish(GameStatus::Draw);
        } else {
            self.turn = player.opponent();
            self.turn_started = Instant::now();
        }
        Ok(outcome)
    }

    fn finish(&mut self, status: GameStatus) {
        self.status = status;
        self.pending = None;
        info!(?status, moves = self.board.moves_played(), "game over");

        if self.mode != Mode::Ai || !self.learning_enabled {
            return;
        }
        let outcome = match status {
            GameStatus::Won(winner) if winner == self.mapping.ai => Outcome::Win,
            GameStatus::Won(_) => Outcome::Loss,
            GameStatus::Draw => Outcome::Draw,
            GameStatus::Playing => return,
        };
        self.learned = std::mem::take(&mut self.learned).record_game(&self.snapshots, outcome);
    }

    /// Nearest-to-centre open column.
    pub fn fallback_move(&self) -> Result<Column, GameError> {
        self.board
            .moves_by_center()
            .first()
            .copied()
            .ok_or(GameError::NoMoves)
    }

    fn remaining_at(&self, now: Instant) -> Option<Duration> {
        let limit = self.time_control.turn_limit()?;
        Some(limit.saturating_sub(now.saturating_duration_since(self.turn_started)))
    }

    /// Time left on the current turn's clock, if one is running.
    pub fn remaining_turn_time(&self) -> Option<Duration> {
        self.remaining_at(Instant::now())
    }

    fn computer_time_limit_at(&self, now: Instant) -> u64 {
        let preset = self.difficulty.time_limit_ms();
        match self.remaining_at(now) {
            None => preset,
            Some(remaining) => {
                let remaining_ms = remaining.as_millis() as u64;
                let clocked = remaining_ms
                    .saturating_sub(CLOCK_MARGIN_MS)
                    .clamp(MIN_COMPUTER_TIME_MS, HARD_CEILING_MS);
                preset.min(clocked)
            }
        }
    }

    /// Search budget for the computer's turn, trimmed to fit the clock.
    pub fn computer_time_limit(&self) -> u64 {
        self.computer_time_limit_at(Instant::now())
    }

    fn expire_turn_at(&mut self, now: Instant) -> Result<bool, GameError> {
        if self.is_over() {
            return Err(GameError::GameOver);
        }
        match self.remaining_at(now) {
            Some(remaining) if remaining.is_zero() => {
                warn!(player = ?self.turn, "turn clock ran out");
                self.finish(GameStatus::Won(self.turn.opponent()));
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    /// Ends the game if the side to move has run out of time.
    pub fn expire_turn(&mut self) -> Result<bool, GameError> {
        self.expire_turn_at(Instant::now())
    }

    fn search_options(&self) -> SearchOptions {
        let memory_key = encode_state(self.board.cells(), self.turn);
        SearchOptions {
            time_limit_ms: self.computer_time_limit(),
            memory_moves: if self.learning_enabled {
                self.learned.memory.scored_moves(&memory_key)
            } else {
                Vec::new()
            },
            weights: self.learned.weights,
            profile: self.learned.profile.clone(),
            random_seed: self.seed,
            random_intensity: self.random_intensity.max(self.difficulty.min_random_intensity()),
            ..SearchOptions::for_difficulty(self.difficulty)
        }
    }

    /// Builds the request for the computer's turn and marks it outstanding.
    pub fn prepare_search(&mut self) -> Result<(Ticket, SearchRequest), GameError> {
        if self.is_over() {
            return Err(GameError::GameOver);
        }
        if self.pending.is_some() {
            return Err(GameError::RequestPending);
        }
        if self.actor_for(self.turn) != Actor::Computer {
            return Err(GameError::WrongColor {
                actor: Actor::Computer,
                player: self.turn,
            });
        }
        let ticket = Ticket {
            game: self.game,
            ply: self.board.moves_played(),
            player: self.turn,
        };
        let request = SearchRequest::new(&self.board, self.turn, self.search_options());
        self.seed = self.seed.wrapping_add(1);
        self.pending = Some(ticket);
        Ok((ticket, request))
    }

    fn claim(&mut self, ticket: Ticket) -> Result<(), GameError> {
        if self.pending != Some(ticket) {
            warn!(?ticket, current = ?self.pending, "discarding stale search reply");
            return Err(GameError::StaleReply);
        }
        self.pending = None;
        Ok(())
    }

    /// Plays the engine's answer, or the fallback when the answer is
    /// missing, failed or illegal.
    pub fn accept_reply(&mut self, ticket: Ticket, response: SearchResponse) -> Result<MoveOutcome, GameError> {
        self.claim(ticket)?;
        let column = match (response.error, response.mv) {
            (Some(err), _) => {
                warn!(%err, "search reported an error, playing fallback");
                self.fallback_move()?
            }
            (None, Some(column)) if column.in_bounds() && self.board.height(column) < crate::SIZE => column,
            (None, mv) => {
                warn!(?mv, "search returned no playable move, playing fallback");
                self.fallback_move()?
            }
        };
        self.apply_move(column, ticket.player, Actor::Computer)
    }

    /// Plays the fallback for a request that never answered.
    pub fn resolve_timeout(&mut self, ticket: Ticket) -> Result<MoveOutcome, GameError> {
        self.claim(ticket)?;
        let column = self.fallback_move()?;
        warn!(?column, "no search reply in time, playing fallback");
        self.apply_move(column, ticket.player, Actor::Computer)
    }

    /// Runs one full computer turn through `worker`.
    pub async fn play_computer_turn(&mut self, worker: &SearchWorker) -> Result<MoveOutcome, GameError> {
        let (ticket, request) = self.prepare_search()?;
        match worker.search(request).await {
            WorkerReply::Reply(response) => self.accept_reply(ticket, response),
            WorkerReply::TimedOut => self.resolve_timeout(ticket),
            WorkerReply::Failed(reason) => {
                warn!(%reason, "search worker failed");
                self.resolve_timeout(ticket)
            }
        }
    }
}
