//! Board cells, border walls and fruit placement.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SimError};
use crate::pos::Pos;

/// Rejection-sampling attempts before falling back to a scan of empty cells.
pub const DEFAULT_FRUIT_ATTEMPTS: u32 = 1000;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Cell {
    Empty,
    Wall,
    Fruit,
    Occupied,
}

#[derive(Clone, Debug)]
pub struct Grid {
    width: usize,
    height: usize,
    cells: Vec<Cell>,
    fruit_present: bool,
    fruit_pos: Pos,
    fruit_attempts: u32,
}

impl Grid {
    /// Walled board with one fruit on a random interior cell.
    pub fn new<R: Rng + ?Sized>(width: usize, height: usize, rng: &mut R) -> Result<Self> {
        Self::with_fruit_attempts(width, height, DEFAULT_FRUIT_ATTEMPTS, rng)
    }

    pub fn with_fruit_attempts<R: Rng + ?Sized>(
        width: usize,
        height: usize,
        fruit_attempts: u32,
        rng: &mut R,
    ) -> Result<Self> {
        if width < 3 || height < 3 {
            return Err(SimError::InvalidConfiguration(format!(
                "board {width}x{height} has no interior (minimum 3x3)"
            )));
        }

        let mut cells = vec![Cell::Empty; width * height];
        for row in 0..height {
            for col in 0..width {
                if row == 0 || col == 0 || row == height - 1 || col == width - 1 {
                    cells[row * width + col] = Cell::Wall;
                }
            }
        }

        let mut grid = Self {
            width,
            height,
            cells,
            fruit_present: false,
            fruit_pos: Pos::new(0, 0),
            fruit_attempts,
        };
        grid.respawn_fruit_if_absent(rng)?;
        Ok(grid)
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn fruit_present(&self) -> bool {
        self.fruit_present
    }

    /// Last placed fruit position. Stale while `fruit_present` is false.
    pub fn fruit_pos(&self) -> Pos {
        self.fruit_pos
    }

    pub fn in_bounds(&self, pos: Pos) -> bool {
        pos.row >= 0 && pos.col >= 0 && (pos.row as usize) < self.height && (pos.col as usize) < self.width
    }

    fn index(&self, pos: Pos) -> usize {
        debug_assert!(self.in_bounds(pos), "{pos:?} outside {}x{}", self.width, self.height);
        pos.row as usize * self.width + pos.col as usize
    }

    /// Caller guarantees `pos` is on the board.
    pub fn cell_at(&self, pos: Pos) -> Cell {
        self.cells[self.index(pos)]
    }

    /// Caller guarantees `pos` is on the board.
    pub fn mark(&mut self, pos: Pos, cell: Cell) {
        let i = self.index(pos);
        self.cells[i] = cell;
    }

    /// Cell at `pos`, or `None` off the board.
    pub fn get(&self, pos: Pos) -> Option<Cell> {
        self.in_bounds(pos).then(|| self.cell_at(pos))
    }

    /// The fruit has been eaten or covered; the next respawn check replaces it.
    pub fn consume_fruit(&mut self) {
        self.fruit_present = false;
    }

    /// Move the fruit to `pos`, removing any fruit still on the board.
    pub fn place_fruit(&mut self, pos: Pos) {
        if self.fruit_present && self.cell_at(self.fruit_pos) == Cell::Fruit {
            self.mark(self.fruit_pos, Cell::Empty);
        }
        self.mark(pos, Cell::Fruit);
        self.fruit_pos = pos;
        self.fruit_present = true;
    }

    /// Returns `Ok(true)` when a new fruit was placed.
    pub fn respawn_fruit_if_absent<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<bool> {
        if self.fruit_present {
            return Ok(false);
        }

        for _ in 0..self.fruit_attempts {
            let pos = Pos::new(
                rng.gen_range(1..self.height as i32 - 1),
                rng.gen_range(1..self.width as i32 - 1),
            );
            if self.cell_at(pos) == Cell::Empty {
                self.place_fruit(pos);
                return Ok(true);
            }
        }

        let empty: Vec<Pos> = self.interior().filter(|&p| self.cell_at(p) == Cell::Empty).collect();
        if empty.is_empty() {
            return Err(SimError::NoSpaceForFruit {
                attempts: self.fruit_attempts,
            });
        }
        log::warn!(
            "fruit sampling missed {} times, picking among {} empty cells",
            self.fruit_attempts,
            empty.len()
        );
        let pos = empty[rng.gen_range(0..empty.len())];
        self.place_fruit(pos);
        Ok(true)
    }

    pub fn interior(&self) -> impl Iterator<Item = Pos> + use<> {
        let (h, w) = (self.height as i32, self.width as i32);
        (1..h - 1).flat_map(move |row| (1..w - 1).map(move |col| Pos::new(row, col)))
    }

    /// Row-major view of every cell.
    pub fn rows(&self) -> impl Iterator<Item = &[Cell]> {
        self.cells.chunks_exact(self.width)
    }

    pub fn count(&self, cell: Cell) -> usize {
        self.cells.iter().filter(|&&c| c == cell).count()
    }
}
