use std::fmt;

use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::ai::{choose_column, scan_threats, Assessment};
use crate::events::{GameEvent, GameObserver, NullObserver};
use crate::grid::{Cell, Grid, Position};
use crate::{ColumnRejection, GameConfig, GameError, MoveOutcome, Player, WINDOW};

/// The computer always plays second.
pub const AI_PLAYER: Player = Player::Two;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameStatus {
    New,
    InProgress,
    Won,
    Draw,
}

impl GameStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, GameStatus::Won | GameStatus::Draw)
    }
}

/// Serializable view of the engine for the presentation layer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameSnapshot {
    pub rows: usize,
    pub columns: usize,
    pub board: Vec<Vec<Cell>>,
    pub status: GameStatus,
    pub turn: Player,
    pub vs_ai: bool,
    pub winning_line: Vec<Position>,
    pub threat: Option<Position>,
    pub opportunity: Option<Position>,
}

/// Board state machine: applies drops, detects wins and draws, alternates
/// turns and asks the collaborator to play the AI's column.
pub struct GameEngine {
    grid: Grid,
    status: GameStatus,
    turn: Player,
    vs_ai: bool,
    winning_line: Vec<Position>,
    assessment: Assessment,
    observer: Box<dyn GameObserver + Send>,
    rng: Box<dyn RngCore + Send>,
}

impl GameEngine {
    pub fn new(rows: usize, columns: usize) -> Result<Self, GameError> {
        Ok(Self::with_grid(Grid::new(rows, columns)?, Player::One))
    }

    pub fn from_config(config: &GameConfig) -> Result<Self, GameError> {
        config.validate()?;
        let engine = Self::new(config.rows, config.columns)?.with_ai(config.vs_ai);
        Ok(match config.seed {
            Some(seed) => engine.with_rng(ChaCha8Rng::seed_from_u64(seed)),
            None => engine,
        })
    }

    /// Starts from a board diagram (see [`Grid::parse`]) with `turn` to move.
    ///
    /// A diagram that already holds four in a row is rejected. A full diagram
    /// loads as a draw.
    pub fn from_layout(layout: &str, turn: Player) -> Result<Self, GameError> {
        let grid = Grid::parse(layout)?;
        let mut engine = Self::with_grid(grid, turn);
        for row in 0..engine.rows() {
            for column in 0..engine.columns() {
                let pos = Position::new(row, column);
                let cell = engine.grid.at(pos);
                if !cell.is_empty() && engine.find_winning_line(pos, cell).is_some() {
                    return Err(GameError::ParseLayout {
                        row,
                        column,
                        reason: "layout already contains four in a row".to_string(),
                    });
                }
            }
        }
        if engine.grid.is_full() {
            engine.status = GameStatus::Draw;
        } else if engine.grid.occupied() > 0 {
            engine.status = GameStatus::InProgress;
        }
        Ok(engine)
    }

    fn with_grid(grid: Grid, turn: Player) -> Self {
        Self {
            grid,
            status: GameStatus::New,
            turn,
            vs_ai: true,
            winning_line: Vec::new(),
            assessment: Assessment::default(),
            observer: Box::new(NullObserver),
            rng: Box::new(ChaCha8Rng::from_entropy()),
        }
    }

    pub fn with_observer(mut self, observer: impl GameObserver + Send + 'static) -> Self {
        self.set_observer(observer);
        self
    }

    pub fn set_observer(&mut self, observer: impl GameObserver + Send + 'static) {
        self.observer = Box::new(observer);
    }

    /// Replaces the random source used when the AI has no forced move.
    pub fn with_rng(mut self, rng: impl RngCore + Send + 'static) -> Self {
        self.rng = Box::new(rng);
        self
    }

    pub fn with_ai(mut self, enabled: bool) -> Self {
        self.vs_ai = enabled;
        self
    }

    pub fn set_ai_mode(&mut self, enabled: bool) {
        self.vs_ai = enabled;
    }

    pub fn reset(&mut self) {
        self.grid.clear();
        self.status = GameStatus::New;
        self.turn = Player::One;
        self.winning_line.clear();
        self.assessment = Assessment::default();
        debug!(rows = self.rows(), columns = self.columns(), "board reset");
    }

    /// Changes the board size and discards the current game.
    pub fn resize(&mut self, rows: usize, columns: usize) -> Result<(), GameError> {
        self.grid = Grid::new(rows, columns)?;
        self.reset();
        Ok(())
    }

    /// Drops the current player's piece into `column` and evaluates the turn.
    pub fn apply_move(&mut self, column: usize) -> Result<MoveOutcome, GameError> {
        if self.status.is_terminal() {
            return Err(GameError::GameOver);
        }
        if column >= self.columns() {
            return Err(GameError::InvalidColumn {
                column,
                reason: ColumnRejection::OutOfBounds,
            });
        }
        let row = self.grid.drop_row(column).ok_or(GameError::InvalidColumn {
            column,
            reason: ColumnRejection::Full,
        })?;

        let player = self.turn;
        let position = Position::new(row, column);
        self.grid.set(position, player.cell());
        self.status = GameStatus::InProgress;
        debug!(player = player.number(), %position, "piece placed");
        self.emit(GameEvent::CellPlaced { position, player });

        self.evaluate_turn(position);
        Ok(MoveOutcome {
            player,
            position,
            status: self.status,
        })
    }

    fn evaluate_turn(&mut self, placed: Position) {
        let board_full = self.grid.is_full();
        let mover = self.turn;

        // A win on the move that fills the board is still a win.
        if let Some(line) = self.find_winning_line(placed, mover.cell()) {
            for &pos in &line {
                self.grid.set(pos, Cell::Winning);
            }
            self.status = GameStatus::Won;
            self.winning_line = line.clone();
            info!(winner = mover.number(), "game won");
            self.emit(GameEvent::GameEnded {
                winner: mover,
                winning_line: line,
            });
            return;
        }

        if board_full {
            self.status = GameStatus::Draw;
            info!("board full, game drawn");
            self.emit(GameEvent::DrawReached);
            return;
        }

        self.turn = mover.opponent();
        self.emit(GameEvent::TurnSwitched { turn: self.turn });
        self.request_ai_move();
    }

    /// Scans every 4-window of the four lines through `placed`. When several
    /// windows match, the last one found is kept.
    fn find_winning_line(&self, placed: Position, cell: Cell) -> Option<Vec<Position>> {
        let mut found = None;
        for line in self.grid.lines_through(placed) {
            if line.len() < WINDOW {
                continue;
            }
            let values = self.grid.values(&line);
            for start in 0..=line.len() - WINDOW {
                if values[start..start + WINDOW].iter().all(|&v| v == cell) {
                    found = Some(line[start..start + WINDOW].to_vec());
                }
            }
        }
        found
    }

    /// Recomputes threat and opportunity and announces the AI's column.
    /// Does nothing unless AI mode is on and the AI is to move in a live game.
    pub fn request_ai_move(&mut self) -> Option<usize> {
        if !self.vs_ai || self.turn != AI_PLAYER || self.status.is_terminal() {
            return None;
        }
        let assessment = scan_threats(&self.grid, AI_PLAYER);
        self.assessment = assessment;
        let legal = self.legal_columns();
        let column = choose_column(&assessment, &legal, &mut self.rng)?;
        debug!(
            column,
            threat = ?assessment.threat,
            opportunity = ?assessment.opportunity,
            "ai column chosen"
        );
        self.emit(GameEvent::AiMoveRequested { column });
        Some(column)
    }

    fn emit(&mut self, event: GameEvent) {
        self.observer.on_event(&event);
    }

    pub fn rows(&self) -> usize {
        self.grid.rows()
    }

    pub fn columns(&self) -> usize {
        self.grid.columns()
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn status(&self) -> GameStatus {
        self.status
    }

    pub fn turn(&self) -> Player {
        self.turn
    }

    pub fn ai_mode(&self) -> bool {
        self.vs_ai
    }

    /// Empty unless the status is [`GameStatus::Won`].
    pub fn winning_line(&self) -> &[Position] {
        &self.winning_line
    }

    pub fn threat_position(&self) -> Option<Position> {
        self.assessment.threat
    }

    pub fn opportunity_position(&self) -> Option<Position> {
        self.assessment.opportunity
    }

    /// Columns that accept a piece; none once the game is over.
    pub fn legal_columns(&self) -> Vec<usize> {
        if self.status.is_terminal() {
            return Vec::new();
        }
        (0..self.columns())
            .filter(|&column| !self.grid.is_column_full(column))
            .collect()
    }

    pub fn snapshot(&self) -> GameSnapshot {
        GameSnapshot {
            rows: self.rows(),
            columns: self.columns(),
            board: self.grid.to_rows(),
            status: self.status,
            turn: self.turn,
            vs_ai: self.vs_ai,
            winning_line: self.winning_line.clone(),
            threat: self.assessment.threat,
            opportunity: self.assessment.opportunity,
        }
    }
}

impl fmt::Debug for GameEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GameEngine")
            .field("grid", &self.grid)
            .field("status", &self.status)
            .field("turn", &self.turn)
            .field("vs_ai", &self.vs_ai)
            .field("winning_line", &self.winning_line)
            .field("assessment", &self.assessment)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn recorder() -> (Arc<Mutex<Vec<GameEvent>>>, impl GameObserver + Send + 'static) {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        (events, move |event: &GameEvent| {
            sink.lock().unwrap().push(event.clone())
        })
    }

    #[test]
    fn new_engine_is_empty() {
        let engine = GameEngine::new(6, 7).unwrap();
        assert_eq!(engine.status(), GameStatus::New);
        assert_eq!(engine.turn(), Player::One);
        assert_eq!(engine.grid().occupied(), 0);
        assert!(engine.winning_line().is_empty());
        assert_eq!(engine.threat_position(), None);
        assert_eq!(engine.opportunity_position(), None);
        assert!(engine.ai_mode());
    }

    #[test]
    fn rejects_invalid_dimensions() {
        assert!(matches!(
            GameEngine::new(0, 7),
            Err(GameError::InvalidDimensions { rows: 0, columns: 7 })
        ));
        let mut engine = GameEngine::new(6, 7).unwrap();
        assert!(engine.resize(4, 0).is_err());
        assert_eq!((engine.rows(), engine.columns()), (6, 7));
    }

    #[test]
    fn move_places_piece_and_switches_turn() {
        let (events, observer) = recorder();
        let mut engine = GameEngine::new(6, 7).unwrap().with_ai(false).with_observer(observer);
        let outcome = engine.apply_move(3).unwrap();
        assert_eq!(outcome.player, Player::One);
        assert_eq!(outcome.position, Position::new(5, 3));
        assert_eq!(outcome.status, GameStatus::InProgress);
        assert_eq!(engine.turn(), Player::Two);
        assert_eq!(
            *events.lock().unwrap(),
            vec![
                GameEvent::CellPlaced {
                    position: Position::new(5, 3),
                    player: Player::One
                },
                GameEvent::TurnSwitched { turn: Player::Two },
            ]
        );
        let outcome = engine.apply_move(3).unwrap();
        assert_eq!(outcome.position, Position::new(4, 3));
        assert_eq!(engine.grid().get(Position::new(4, 3)), Some(Cell::Player2));
    }

    #[test]
    fn invalid_columns_leave_state_untouched() {
        let (events, observer) = recorder();
        let mut engine = GameEngine::from_layout(
            "
            1 .
            2 .
            1 .
            2 .
            ",
            Player::One,
        )
        .unwrap()
        .with_ai(false)
        .with_observer(observer);
        let before = engine.grid().clone();

        let err = engine.apply_move(0).unwrap_err();
        assert_eq!(
            err,
            GameError::InvalidColumn {
                column: 0,
                reason: ColumnRejection::Full
            }
        );
        let err = engine.apply_move(2).unwrap_err();
        assert!(err.is_invalid_column());

        assert_eq!(engine.grid(), &before);
        assert_eq!(engine.turn(), Player::One);
        assert!(events.lock().unwrap().is_empty());
    }

    #[test]
    fn win_on_filling_move_beats_draw() {
        let (events, observer) = recorder();
        let mut engine = GameEngine::from_layout(
            "
            1 1 1 .
            2 2 2 1
            1 1 1 2
            2 2 2 1
            ",
            Player::One,
        )
        .unwrap()
        .with_ai(false)
        .with_observer(observer);

        let outcome = engine.apply_move(3).unwrap();
        assert_eq!(outcome.status, GameStatus::Won);
        let line: Vec<Position> = (0..4).map(|c| Position::new(0, c)).collect();
        assert_eq!(engine.winning_line(), line.as_slice());
        assert_eq!(engine.turn(), Player::One);
        let events = events.lock().unwrap();
        assert_eq!(
            events.last(),
            Some(&GameEvent::GameEnded {
                winner: Player::One,
                winning_line: line
            })
        );
        assert!(!events.contains(&GameEvent::DrawReached));
    }

    #[test]
    fn last_matching_line_is_reported() {
        // Dropping into column 3 completes a row and a column at once.
        let mut engine = GameEngine::from_layout(
            "
            . . . . . . .
            . . . . . . .
            1 1 1 . . . .
            2 2 2 1 . . .
            2 2 2 1 . . .
            2 2 2 1 . . .
            ",
            Player::One,
        )
        .unwrap()
        .with_ai(false);

        engine.apply_move(3).unwrap();
        assert_eq!(engine.status(), GameStatus::Won);
        let vertical: Vec<Position> = (2..6).map(|r| Position::new(r, 3)).collect();
        assert_eq!(engine.winning_line(), vertical.as_slice());
        for pos in &vertical {
            assert_eq!(engine.grid().get(*pos), Some(Cell::Winning));
        }
        assert_eq!(engine.grid().get(Position::new(2, 0)), Some(Cell::Player1));
    }

    #[test]
    fn layouts_with_a_finished_line_are_rejected() {
        let err = GameEngine::from_layout(
            "
            . . . .
            2 . . .
            2 . . .
            1 1 1 1
            ",
            Player::Two,
        )
        .unwrap_err();
        assert!(matches!(err, GameError::ParseLayout { row: 3, column: 0, .. }));
    }

    #[test]
    fn full_layout_loads_as_a_draw() {
        let mut engine = GameEngine::from_layout(
            "
            1 1 2 2
            2 2 1 1
            1 1 2 2
            2 2 1 1
            ",
            Player::One,
        )
        .unwrap();
        assert_eq!(engine.status(), GameStatus::Draw);
        assert!(engine.legal_columns().is_empty());
        assert_eq!(engine.apply_move(0), Err(GameError::GameOver));
    }

    #[test]
    fn moves_after_game_over_are_refused() {
        let mut engine = GameEngine::from_layout(
            "
            . . . .
            . . . .
            2 2 2 .
            1 1 1 .
            ",
            Player::One,
        )
        .unwrap()
        .with_ai(false);
        engine.apply_move(3).unwrap();
        assert_eq!(engine.status(), GameStatus::Won);
        assert_eq!(engine.apply_move(0), Err(GameError::GameOver));
        assert!(engine.legal_columns().is_empty());

        engine.reset();
        assert_eq!(engine.status(), GameStatus::New);
        assert!(engine.apply_move(0).is_ok());
    }

    #[test]
    fn ai_requests_a_move_after_switching_to_its_turn() {
        let (events, observer) = recorder();
        let mut engine = GameEngine::new(6, 7)
            .unwrap()
            .with_rng(ChaCha8Rng::seed_from_u64(3))
            .with_observer(observer);
        engine.apply_move(0).unwrap();
        let events = events.lock().unwrap();
        assert_eq!(events.len(), 3);
        assert_eq!(events[1], GameEvent::TurnSwitched { turn: Player::Two });
        match &events[2] {
            GameEvent::AiMoveRequested { column } => assert!(*column < 7),
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn request_ai_move_requires_ai_turn() {
        let mut engine = GameEngine::new(6, 7).unwrap();
        assert_eq!(engine.request_ai_move(), None);
        engine.set_ai_mode(false);
        engine.apply_move(0).unwrap();
        assert_eq!(engine.turn(), Player::Two);
        assert_eq!(engine.request_ai_move(), None);
        engine.set_ai_mode(true);
        assert!(engine.request_ai_move().is_some());
    }

    #[test]
    fn resize_discards_the_game() {
        let mut engine = GameEngine::new(6, 7).unwrap().with_ai(false);
        engine.apply_move(2).unwrap();
        engine.resize(4, 5).unwrap();
        assert_eq!((engine.rows(), engine.columns()), (4, 5));
        assert_eq!(engine.grid().occupied(), 0);
        assert_eq!(engine.status(), GameStatus::New);
        assert_eq!(engine.turn(), Player::One);
    }

    #[test]
    fn from_config_applies_options() {
        let config = GameConfig {
            rows: 5,
            columns: 8,
            vs_ai: false,
            seed: Some(9),
        };
        let engine = GameEngine::from_config(&config).unwrap();
        assert_eq!((engine.rows(), engine.columns()), (5, 8));
        assert!(!engine.ai_mode());

        let snapshot = engine.snapshot();
        assert_eq!(snapshot.board.len(), 5);
        assert_eq!(snapshot.board[0].len(), 8);
        assert_eq!(snapshot.status, GameStatus::New);
    }
}
