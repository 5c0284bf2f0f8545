use std::fmt;

use serde::{Deserialize, Serialize};

use crate::GameError;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Cell {
    #[default]
    Empty,
    Player1,
    Player2,
    /// Marks a cell of the detected winning line; overwrites the player marker.
    Winning,
}

impl Cell {
    pub fn is_empty(self) -> bool {
        self == Cell::Empty
    }

    fn symbol(self) -> char {
        match self {
            Cell::Empty => '.',
            Cell::Player1 => '1',
            Cell::Player2 => '2',
            Cell::Winning => 'X',
        }
    }
}

/// Zero-based `(row, column)`; row 0 is the top of the board.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct Position {
    pub row: usize,
    pub column: usize,
}

impl Position {
    pub const fn new(row: usize, column: usize) -> Self {
        Self { row, column }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.row, self.column)
    }
}

/// The two diagonal orientations through a cell.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Diagonal {
    /// `\`: top-left to bottom-right.
    Falling,
    /// `/`: top-right to bottom-left.
    Rising,
}

/// Row-major board of cells. Pieces fall toward the highest row index.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Grid {
    rows: usize,
    columns: usize,
    cells: Vec<Cell>,
}

impl Grid {
    pub fn new(rows: usize, columns: usize) -> Result<Self, GameError> {
        if rows == 0 || columns == 0 {
            return Err(GameError::InvalidDimensions { rows, columns });
        }
        Ok(Self {
            rows,
            columns,
            cells: vec![Cell::Empty; rows * columns],
        })
    }

    /// Parses a board diagram, one text line per row from top to bottom.
    /// `.` is empty, `1` and `2` are player pieces; spaces are ignored.
    pub fn parse(layout: &str) -> Result<Self, GameError> {
        let mut rows: Vec<Vec<Cell>> = Vec::new();
        for (row, line) in layout
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .enumerate()
        {
            let mut cells = Vec::new();
            for symbol in line.chars().filter(|c| !c.is_whitespace()) {
                let cell = match symbol {
                    '.' => Cell::Empty,
                    '1' => Cell::Player1,
                    '2' => Cell::Player2,
                    _ => {
                        return Err(GameError::ParseLayout {
                            row,
                            column: cells.len(),
                            reason: format!("expected '.', '1' or '2', found {symbol}"),
                        })
                    }
                };
                cells.push(cell);
            }
            if let Some(first) = rows.first() {
                if first.len() != cells.len() {
                    return Err(GameError::ParseLayout {
                        row,
                        column: cells.len(),
                        reason: format!("row has {} cells, expected {}", cells.len(), first.len()),
                    });
                }
            }
            rows.push(cells);
        }

        let columns = rows.first().map(Vec::len).unwrap_or(0);
        let mut grid = Grid::new(rows.len(), columns)?;
        grid.cells = rows.into_iter().flatten().collect();

        for column in 0..grid.columns {
            for row in 0..grid.rows - 1 {
                let here = grid.at(Position::new(row, column));
                let below = grid.at(Position::new(row + 1, column));
                if !here.is_empty() && below.is_empty() {
                    return Err(GameError::ParseLayout {
                        row,
                        column,
                        reason: "piece floats above an empty cell".to_string(),
                    });
                }
            }
        }
        Ok(grid)
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn columns(&self) -> usize {
        self.columns
    }

    /// The cell at `pos`, or `None` when `pos` lies outside the board.
    pub fn get(&self, pos: Position) -> Option<Cell> {
        if pos.row < self.rows && pos.column < self.columns {
            Some(self.at(pos))
        } else {
            None
        }
    }

    /// Unchecked read for positions produced by the grid itself.
    pub(crate) fn at(&self, pos: Position) -> Cell {
        self.cells[self.index(pos)]
    }

    /// Reallocates every cell as empty, keeping the dimensions.
    pub(crate) fn clear(&mut self) {
        self.cells = vec![Cell::Empty; self.rows * self.columns];
    }

    pub(crate) fn set(&mut self, pos: Position, cell: Cell) {
        let idx = self.index(pos);
        self.cells[idx] = cell;
    }

    fn index(&self, pos: Position) -> usize {
        debug_assert!(pos.row < self.rows && pos.column < self.columns);
        pos.row * self.columns + pos.column
    }

    pub fn is_column_full(&self, column: usize) -> bool {
        column >= self.columns || !self.at(Position::new(0, column)).is_empty()
    }

    pub fn is_full(&self) -> bool {
        (0..self.columns).all(|column| self.is_column_full(column))
    }

    /// Lowest empty row of `column`, or `None` when it is full.
    pub fn drop_row(&self, column: usize) -> Option<usize> {
        if column >= self.columns {
            return None;
        }
        (0..self.rows)
            .rev()
            .find(|&row| self.at(Position::new(row, column)).is_empty())
    }

    /// Where a piece would land in every column that still has room.
    pub fn possible_positions(&self) -> Vec<Position> {
        (0..self.columns)
            .filter_map(|column| self.drop_row(column).map(|row| Position::new(row, column)))
            .collect()
    }

    pub fn occupied(&self) -> usize {
        self.cells.iter().filter(|cell| !cell.is_empty()).count()
    }

    /// Rows of cells, top to bottom.
    pub fn to_rows(&self) -> Vec<Vec<Cell>> {
        self.cells.chunks(self.columns).map(<[Cell]>::to_vec).collect()
    }

    pub(crate) fn values(&self, line: &[Position]) -> Vec<Cell> {
        line.iter().map(|&pos| self.at(pos)).collect()
    }

    /// Every cell of `pos.row`, left to right.
    pub fn horizontal_line(&self, pos: Position) -> Vec<Position> {
        (0..self.columns)
            .map(|column| Position::new(pos.row, column))
            .collect()
    }

    /// Every cell of `pos.column`, top to bottom.
    pub fn vertical_line(&self, pos: Position) -> Vec<Position> {
        (0..self.rows)
            .map(|row| Position::new(row, pos.column))
            .collect()
    }

    /// The full diagonal through `pos`: walk up to the top row or the side
    /// border, then collect every cell walking back down to the last row or
    /// the opposite border.
    pub fn diagonal_line(&self, pos: Position, diagonal: Diagonal) -> Vec<Position> {
        let last_column = self.columns - 1;
        let (mut row, mut column) = (pos.row, pos.column);
        match diagonal {
            Diagonal::Falling => {
                while row != 0 && column != 0 {
                    row -= 1;
                    column -= 1;
                }
            }
            Diagonal::Rising => {
                while row != 0 && column != last_column {
                    row -= 1;
                    column += 1;
                }
            }
        }

        let mut line = vec![Position::new(row, column)];
        loop {
            let at_border = match diagonal {
                Diagonal::Falling => column == last_column,
                Diagonal::Rising => column == 0,
            };
            if row >= self.rows - 1 || at_border {
                break;
            }
            row += 1;
            match diagonal {
                Diagonal::Falling => column += 1,
                Diagonal::Rising => column -= 1,
            }
            line.push(Position::new(row, column));
        }
        line
    }

    /// Horizontal, vertical, `\` and `/` lines through `pos`, in that order.
    pub fn lines_through(&self, pos: Position) -> [Vec<Position>; 4] {
        [
            self.horizontal_line(pos),
            self.vertical_line(pos),
            self.diagonal_line(pos, Diagonal::Falling),
            self.diagonal_line(pos, Diagonal::Rising),
        ]
    }
}

impl fmt::Display for Grid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in self.cells.chunks(self.columns) {
            let line: Vec<String> = row.iter().map(|cell| cell.symbol().to_string()).collect();
            writeln!(f, "{}", line.join(" "))?;
        }
        Ok(())
    }
}
