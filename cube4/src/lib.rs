//! Four-in-a-row on a 5x5x5 cube with gravity along -z.
//! Players pick a column `(x, y)`; the piece drops to the lowest free `z`.
//! The crate holds the board engine, a negamax searcher with alpha-beta
//! pruning and a learned-bias layer (heat profile, outcome memory and
//! adaptive evaluation weights) that is persisted as opaque blobs.
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod board;
pub mod eval;
pub mod learning;
pub mod lines;
pub mod protocol;
pub mod sampler;
pub mod search;
pub mod session;
pub mod storage;
pub mod threat;
pub mod worker;

pub use board::{Board, MoveOutcome, MoveRecord, Winner};
pub use learning::{LearnedState, Memory, Outcome, Profile, Weights};
pub use protocol::{handle_request, SearchRequest, SearchResponse};
pub use sampler::{softmax_sample, ScoredMove};
pub use search::{compute_best_move, Difficulty, MoveSource, SearchOptions, SearchResult};
pub use session::{player_mapping, Actor, GameSession, GameStatus, Mode, PlayerMapping, TimeControl};
pub use worker::{SearchWorker, WorkerReply};

pub const SIZE: usize = 5;
pub const CONNECT: usize = 4;
pub const COLUMNS: usize = SIZE * SIZE;
pub const CELLS: usize = SIZE * SIZE * SIZE;
const CENTER: usize = SIZE / 2;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i8", into = "i8")]
pub enum Player {
    Red,
    Blue,
}

impl Player {
    /// Wire value: red is `1`, blue is `-1`.
    pub fn value(self) -> i8 {
        match self {
            Player::Red => 1,
            Player::Blue => -1,
        }
    }

    pub fn opponent(self) -> Player {
        match self {
            Player::Red => Player::Blue,
            Player::Blue => Player::Red,
        }
    }

    /// Decodes a cell value. Both `{0, 1, -1}` and `{0, 1, 2}` encodings are accepted.
    pub fn from_cell(value: i8) -> Result<Option<Player>, GameError> {
        match value {
            0 => Ok(None),
            1 => Ok(Some(Player::Red)),
            -1 | 2 => Ok(Some(Player::Blue)),
            other => Err(GameError::InvalidPlayer(other)),
        }
    }
}

impl TryFrom<i8> for Player {
    type Error = GameError;

    fn try_from(value: i8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Player::Red),
            -1 => Ok(Player::Blue),
            other => Err(GameError::InvalidPlayer(other)),
        }
    }
}

impl From<Player> for i8 {
    fn from(player: Player) -> i8 {
        player.value()
    }
}

/// A column of the cube, addressed by its horizontal coordinates.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct Column {
    pub x: usize,
    pub y: usize,
}

impl Column {
    pub const CENTER: Column = Column {
        x: CENTER,
        y: CENTER,
    };

    pub fn new(x: usize, y: usize) -> Self {
        Self { x, y }
    }

    pub fn in_bounds(self) -> bool {
        self.x < SIZE && self.y < SIZE
    }

    pub fn index(self) -> usize {
        self.x + self.y * SIZE
    }

    pub fn from_index(index: usize) -> Self {
        Self {
            x: index % SIZE,
            y: index / SIZE,
        }
    }

    /// Manhattan distance to the central column.
    pub fn center_distance(self) -> usize {
        self.x.abs_diff(CENTER) + self.y.abs_diff(CENTER)
    }

    pub fn is_center(self) -> bool {
        self.x.abs_diff(CENTER) <= 1 && self.y.abs_diff(CENTER) <= 1
    }

    pub fn is_edge(self) -> bool {
        self.x == 0 || self.y == 0 || self.x == SIZE - 1 || self.y == SIZE - 1
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GameError {
    #[error("column ({x}, {y}) is out of bounds")]
    ColumnOutOfBounds { x: usize, y: usize },
    #[error("column ({x}, {y}) is full, pick another one")]
    ColumnFull { x: usize, y: usize },
    #[error("grid must hold {expected} cells, found {found}")]
    GridLength { expected: usize, found: usize },
    #[error("invalid player value {0}")]
    InvalidPlayer(i8),
    #[error("inconsistent position: {0}")]
    InconsistentPosition(String),
    #[error("it is {expected:?}'s turn, not {found:?}'s")]
    WrongTurn { expected: Player, found: Player },
    #[error("{actor:?} may not play {player:?}")]
    WrongColor { actor: session::Actor, player: Player },
    #[error("the game is already over")]
    GameOver,
    #[error("a search request is already outstanding")]
    RequestPending,
    #[error("search reply does not match the current turn")]
    StaleReply,
    #[error("no legal moves remain")]
    NoMoves,
}
