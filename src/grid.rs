//! Board state: a fixed W×H grid of candy cells. Row 0 is the top row.

use rand::Rng;
use thiserror::Error;

/// What occupies a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token {
    Empty,
    /// Candy kind index 0..kinds.
    Candy(u8),
}

/// Vertical animation state of a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Fall {
    #[default]
    Resting,
    /// Currently drawn at `row` (may be -1, one cell above the board) and moving down.
    Falling { row: i32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cell {
    pub token: Token,
    /// Flagged by the last scan; cleared by the resolver.
    pub matched: bool,
    pub fall: Fall,
}

impl Default for Cell {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl Cell {
    pub const EMPTY: Self = Self {
        token: Token::Empty,
        matched: false,
        fall: Fall::Resting,
    };

    /// A resting, unmatched candy.
    pub const fn candy(kind: u8) -> Self {
        Self {
            token: Token::Candy(kind),
            matched: false,
            fall: Fall::Resting,
        }
    }

    #[inline]
    pub fn kind(&self) -> Option<u8> {
        match self.token {
            Token::Candy(k) => Some(k),
            Token::Empty => None,
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.token == Token::Empty
    }

    #[inline]
    pub fn is_falling(&self) -> bool {
        matches!(self.fall, Fall::Falling { .. })
    }

    /// Row the cell is drawn at when it belongs to `row`.
    #[inline]
    pub fn visual_row(&self, row: usize) -> i32 {
        match self.fall {
            Fall::Resting => row as i32,
            Fall::Falling { row: r } => r,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum GridError {
    #[error("cell ({col}, {row}) is outside the {width}x{height} grid")]
    OutOfBounds {
        col: usize,
        row: usize,
        width: usize,
        height: usize,
    },
}

/// Unwraps a grid result at a component boundary. Out-of-bounds access is a bug:
/// debug builds panic, release builds log it and carry on with `fallback`.
pub fn recover<T>(result: Result<T, GridError>, fallback: T) -> T {
    match result {
        Ok(v) => v,
        Err(e) => {
            if cfg!(debug_assertions) {
                panic!("{e}");
            }
            log::error!("{e}");
            fallback
        }
    }
}

/// Fixed-size board. Cells are stored row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grid {
    width: usize,
    height: usize,
    cells: Vec<Cell>,
}

impl Grid {
    /// All-empty grid.
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            cells: vec![Cell::EMPTY; width * height],
        }
    }

    /// Startup grid: every cell a resting candy of uniformly random kind.
    /// Matches may already exist; the first ticks resolve them.
    pub fn random<R: Rng>(width: usize, height: usize, kinds: u8, rng: &mut R) -> Self {
        let mut grid = Self::new(width, height);
        for cell in &mut grid.cells {
            *cell = Cell::candy(rng.random_range(0..kinds));
        }
        grid
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    fn index(&self, col: usize, row: usize) -> Result<usize, GridError> {
        if col >= self.width || row >= self.height {
            return Err(GridError::OutOfBounds {
                col,
                row,
                width: self.width,
                height: self.height,
            });
        }
        Ok(row * self.width + col)
    }

    pub fn get(&self, col: usize, row: usize) -> Result<Cell, GridError> {
        let i = self.index(col, row)?;
        Ok(self.cells[i])
    }

    pub fn set(&mut self, col: usize, row: usize, cell: Cell) -> Result<(), GridError> {
        let i = self.index(col, row)?;
        self.cells[i] = cell;
        Ok(())
    }

    /// Exchange the full state of two cells. Both coordinates are checked before anything moves.
    pub fn swap(&mut self, c1: usize, r1: usize, c2: usize, r2: usize) -> Result<(), GridError> {
        let a = self.index(c1, r1)?;
        let b = self.index(c2, r2)?;
        self.cells.swap(a, b);
        Ok(())
    }

    /// Candy kind at (col, row); `None` for empty or out-of-bounds cells.
    #[inline]
    pub fn kind(&self, col: usize, row: usize) -> Option<u8> {
        self.get(col, row).ok().and_then(|c| c.kind())
    }

    /// Row-major iteration: (col, row, cell).
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize, &Cell)> {
        let w = self.width;
        self.cells
            .iter()
            .enumerate()
            .map(move |(i, c)| (i % w, i / w, c))
    }

    #[cfg(test)]
    pub fn empty_count(&self) -> usize {
        self.cells.iter().filter(|c| c.is_empty()).count()
    }
}

#[cfg(test)]
impl Grid {
    /// Test boards: one string per row, digits are candy kinds and `.` is empty.
    pub fn from_rows(rows: &[&str]) -> Self {
        let height = rows.len();
        let width = rows.first().map_or(0, |r| r.len());
        let mut grid = Self::new(width, height);
        for (row, line) in rows.iter().enumerate() {
            for (col, ch) in line.chars().enumerate() {
                let cell = match ch.to_digit(10) {
                    Some(d) => Cell::candy(d as u8),
                    None => Cell::EMPTY,
                };
                grid.set(col, row, cell).unwrap();
            }
        }
        grid
    }

    /// Inverse of `from_rows` (animation state is ignored).
    pub fn to_rows(&self) -> Vec<String> {
        (0..self.height)
            .map(|row| {
                (0..self.width)
                    .map(|col| match self.kind(col, row) {
                        Some(k) => char::from(b'0' + k),
                        None => '.',
                    })
                    .collect()
            })
            .collect()
    }
}
