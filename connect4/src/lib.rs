//! Connect 4 game-state engine for a presentation layer.
//! The engine owns a `rows x columns` grid, applies drops with gravity, scans
//! the four lines through the last drop for a win, and can play player 2 with
//! a one-ply threat/opportunity heuristic. It never renders anything: the
//! collaborator calls [`GameEngine::apply_move`] and listens to [`GameEvent`]s.
use serde::{Deserialize, Serialize};
use thiserror::Error;

mod ai;
mod config;
mod engine;
mod events;
mod grid;

pub use ai::{choose_column, scan_threats, Assessment};
pub use config::GameConfig;
pub use engine::{GameEngine, GameSnapshot, GameStatus, AI_PLAYER};
pub use events::{GameEvent, GameObserver, NullObserver};
pub use grid::{Cell, Diagonal, Grid, Position};

/// Number of equal cells in a row that wins the game.
pub const WINDOW: usize = 4;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Player {
    One,
    Two,
}

impl Player {
    pub fn number(self) -> u8 {
        match self {
            Player::One => 1,
            Player::Two => 2,
        }
    }

    pub fn opponent(self) -> Player {
        match self {
            Player::One => Player::Two,
            Player::Two => Player::One,
        }
    }

    pub fn cell(self) -> Cell {
        match self {
            Player::One => Cell::Player1,
            Player::Two => Cell::Player2,
        }
    }
}

/// Why a column was refused by [`GameEngine::apply_move`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ColumnRejection {
    OutOfBounds,
    Full,
}

impl std::fmt::Display for ColumnRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ColumnRejection::OutOfBounds => f.write_str("out of bounds"),
            ColumnRejection::Full => f.write_str("full"),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GameError {
    #[error("column {column} is {reason}")]
    InvalidColumn {
        column: usize,
        reason: ColumnRejection,
    },
    #[error("board dimensions {rows}x{columns} are invalid")]
    InvalidDimensions { rows: usize, columns: usize },
    #[error("the game is over; reset before playing again")]
    GameOver,
    #[error("invalid layout at row {row}, column {column}: {reason}")]
    ParseLayout {
        row: usize,
        column: usize,
        reason: String,
    },
}

impl GameError {
    pub fn is_invalid_column(&self) -> bool {
        matches!(self, GameError::InvalidColumn { .. })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveOutcome {
    pub player: Player,
    pub position: Position,
    pub status: GameStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn players_alternate() {
        assert_eq!(Player::One.opponent(), Player::Two);
        assert_eq!(Player::Two.opponent(), Player::One);
        assert_eq!(Player::Two.number(), 2);
        assert_eq!(Player::One.cell(), Cell::Player1);
    }

    #[test]
    fn error_messages() {
        let err = GameError::InvalidColumn {
            column: 9,
            reason: ColumnRejection::OutOfBounds,
        };
        assert_eq!(err.to_string(), "column 9 is out of bounds");
        assert!(err.is_invalid_column());
        let err = GameError::InvalidDimensions {
            rows: 0,
            columns: 7,
        };
        assert_eq!(err.to_string(), "board dimensions 0x7 are invalid");
        assert!(!err.is_invalid_column());
    }

    #[test]
    fn player_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Player::Two).unwrap(), "\"two\"");
    }
}
