//! Local sensory encoding of a snake on its grid.
//!
//! Feature layout (version [`LAYOUT_VERSION`]), for a window of side `n`:
//!
//! | range | content |
//! |---|---|
//! | `0 .. n*n` | neighbourhood `is_empty`, row-major, 1.0 = free |
//! | `+0 .. +4` | distances to walls: up, down, left, right |
//! | `+4 .. +6` | head minus fruit: rows, cols |
//! | `+6 .. +8` | heading: x (cols), y (rows) |
//! | `+8 .. +10` | tail velocity: rows, cols |

use crate::grid::{Cell, Grid};
use crate::pos::{Pos, Velocity};
use crate::snake::Snake;

pub const LAYOUT_VERSION: u32 = 1;

/// Features after the neighbourhood window.
pub const SCALAR_FEATURES: usize = 10;

/// Odd window side used for a requested size.
pub fn window_side(n: usize) -> usize {
    if n % 2 == 0 { n + 1 } else { n }
}

/// Length of the flat feature vector for a requested window size.
pub fn feature_len(n: usize) -> usize {
    let side = window_side(n);
    side * side + SCALAR_FEATURES
}

/// Raw signed distances from `head` to the border lines: up, down, left, right.
pub fn wall_distances(head: Pos, grid: &Grid) -> [i32; 4] {
    [
        head.row,
        grid.height() as i32 - head.row,
        head.col,
        grid.width() as i32 - head.col,
    ]
}

pub fn distances_to_walls(snake: &Snake, grid: &Grid) -> [i32; 4] {
    wall_distances(snake.head(), grid)
}

pub fn distances_to_fruit(snake: &Snake, grid: &Grid) -> [i32; 2] {
    let (head, fruit) = (snake.head(), grid.fruit_pos());
    [head.row - fruit.row, head.col - fruit.col]
}

/// `body[-2] - body[-1]`, the direction the tail is moving.
pub fn tail_velocity(snake: &Snake) -> Velocity {
    let n = snake.len();
    Velocity::between(snake.body()[n - 1], snake.body()[n - 2])
}

/// Occupancy window centred on the head.
#[derive(Clone, Debug, PartialEq)]
pub struct Neighbourhood {
    pub side: usize,
    pub is_empty: Vec<bool>,
    pub is_fruit: Vec<bool>,
}

impl Neighbourhood {
    pub fn empty_at(&self, row: usize, col: usize) -> bool {
        self.is_empty[row * self.side + col]
    }

    pub fn fruit_at(&self, row: usize, col: usize) -> bool {
        self.is_fruit[row * self.side + col]
    }
}

/// Off-board and wall cells are blocked; cells held by the body are blocked
/// except the head itself; a fruit cell is both free and fruit.
pub fn neighbourhood(snake: &Snake, grid: &Grid, n: usize) -> Neighbourhood {
    let side = window_side(n);
    let half = (side / 2) as i32;
    let head = snake.head();
    let mut is_empty = vec![true; side * side];
    let mut is_fruit = vec![false; side * side];

    for i in -half..=half {
        for j in -half..=half {
            let k = (i + half) as usize * side + (j + half) as usize;
            let p = Pos::new(head.row + i, head.col + j);
            match grid.get(p) {
                None | Some(Cell::Wall) => is_empty[k] = false,
                Some(Cell::Fruit) => is_fruit[k] = true,
                Some(Cell::Occupied) if p != head => is_empty[k] = false,
                Some(_) => {}
            }
        }
    }

    Neighbourhood {
        side,
        is_empty,
        is_fruit,
    }
}

/// Everything a policy observes in one tick.
#[derive(Clone, Debug, PartialEq)]
pub struct SensorFrame {
    pub neighbourhood: Neighbourhood,
    pub walls: [i32; 4],
    pub fruit: [i32; 2],
    pub heading: Velocity,
    pub tail: Velocity,
}

impl SensorFrame {
    pub fn observe(snake: &Snake, grid: &Grid, n: usize) -> Self {
        Self {
            neighbourhood: neighbourhood(snake, grid, n),
            walls: distances_to_walls(snake, grid),
            fruit: distances_to_fruit(snake, grid),
            heading: snake.velocity(),
            tail: tail_velocity(snake),
        }
    }

    /// Flat projection in the documented layout.
    pub fn to_vec(&self) -> Vec<f32> {
        let mut out = Vec::with_capacity(feature_len(self.neighbourhood.side));
        out.extend(self.neighbourhood.is_empty.iter().map(|&e| if e { 1.0 } else { 0.0 }));
        out.extend(self.walls.iter().map(|&d| d as f32));
        out.extend(self.fruit.iter().map(|&d| d as f32));
        out.push(self.heading.dx as f32);
        out.push(self.heading.dy as f32);
        out.push(self.tail.dy as f32);
        out.push(self.tail.dx as f32);
        out
    }
}
