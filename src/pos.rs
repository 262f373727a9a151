use serde::{Deserialize, Serialize};

/// Grid coordinate, row first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Pos {
    pub row: i32,
    pub col: i32,
}

impl Pos {
    pub const fn new(row: i32, col: i32) -> Self {
        Self { row, col }
    }

    pub fn offset(self, v: Velocity) -> Self {
        Self::new(self.row + v.dy, self.col + v.dx)
    }

    /// Offset by `v`, wrapping each axis independently.
    pub fn wrapped(self, v: Velocity, height: usize, width: usize) -> Self {
        Self::new(
            (self.row + v.dy).rem_euclid(height as i32),
            (self.col + v.dx).rem_euclid(width as i32),
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    /// Index order shared by wall distances and policy outputs.
    pub const ALL: [Direction; 4] = [Direction::Up, Direction::Down, Direction::Left, Direction::Right];

    pub fn velocity(self) -> Velocity {
        match self {
            Direction::Up => Velocity::new(-1, 0),
            Direction::Down => Velocity::new(1, 0),
            Direction::Left => Velocity::new(0, -1),
            Direction::Right => Velocity::new(0, 1),
        }
    }

    pub fn from_index(i: usize) -> Option<Self> {
        Self::ALL.get(i).copied()
    }
}

/// Per-tick displacement `(dy, dx)`. Zero only before the first heading is set.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Velocity {
    pub dy: i32,
    pub dx: i32,
}

impl Velocity {
    pub const ZERO: Velocity = Velocity { dy: 0, dx: 0 };

    pub const fn new(dy: i32, dx: i32) -> Self {
        Self { dy, dx }
    }

    pub fn between(from: Pos, to: Pos) -> Self {
        Self::new(to.row - from.row, to.col - from.col)
    }

    pub fn reversed(self) -> Self {
        Self::new(-self.dy, -self.dx)
    }

    pub fn is_zero(self) -> bool {
        self == Self::ZERO
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrapped_each_axis() {
        let p = Pos::new(0, 7);
        assert_eq!(p.wrapped(Direction::Up.velocity(), 6, 8), Pos::new(5, 7));
        assert_eq!(p.wrapped(Direction::Right.velocity(), 6, 8), Pos::new(0, 0));
        assert_eq!(p.wrapped(Direction::Down.velocity(), 6, 8), Pos::new(1, 7));
    }

    #[test]
    fn test_direction_index_order() {
        assert_eq!(Direction::from_index(0), Some(Direction::Up));
        assert_eq!(Direction::from_index(3), Some(Direction::Right));
        assert_eq!(Direction::from_index(4), None);
    }
}
