//! The snake agent: body, heading latch, movement and hunger.

use std::collections::VecDeque;

use rand::Rng;

use crate::error::{Result, SimError};
use crate::grid::{Cell, Grid};
use crate::pos::{Direction, Pos, Velocity};
use crate::sensors;

/// Outcome of one `advance`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Move {
    Moved,
    Ate,
    HitWall,
    HitSelf,
}

#[derive(Clone, Debug)]
pub struct Snake {
    body: VecDeque<Pos>,
    velocity: Velocity,
    turned: bool, // only one heading change per tick
    alive: bool,
    hungry: bool,
    steps_taken: i64,
    steps_since_food: i64,
    hunger_limit: i64,
    initial_size: usize,
}

impl Snake {
    /// Place a snake of `initial_size` at a random position far enough from the
    /// border that the whole body fits, heading toward the farthest wall.
    pub fn spawn<R: Rng + ?Sized>(
        grid: &mut Grid,
        initial_size: usize,
        hunger_limit: u32,
        rng: &mut R,
    ) -> Result<Self> {
        if initial_size < 2 {
            return Err(SimError::InvalidConfiguration(format!(
                "initial snake size {initial_size} is below 2"
            )));
        }
        if grid.height() <= 2 * initial_size || grid.width() <= 2 * initial_size {
            return Err(SimError::InvalidConfiguration(format!(
                "board {}x{} too small to spawn a snake of size {initial_size}",
                grid.width(),
                grid.height()
            )));
        }

        let size = initial_size as i32;
        let head = Pos::new(
            rng.gen_range(size..grid.height() as i32 - size),
            rng.gen_range(size..grid.width() as i32 - size),
        );

        let mut snake = Self::bare(head, hunger_limit, initial_size);

        // First maximum wins: up, down, left, right.
        let dists = sensors::wall_distances(head, grid);
        let mut best = 0;
        for (i, &d) in dists.iter().enumerate() {
            if d > dists[best] {
                best = i;
            }
        }
        snake.set_heading(Direction::ALL[best]);

        for _ in 1..initial_size {
            let last = *snake.body.back().unwrap_or(&head);
            snake.body.push_back(last.offset(snake.velocity.reversed()));
        }
        snake.occupy_all(grid);
        grid.respawn_fruit_if_absent(rng)?;

        log::debug!("spawned snake at {:?} heading {:?}", head, Direction::ALL[best]);
        Ok(snake)
    }

    /// Place a snake with an explicit body (head first) moving along `heading`.
    /// The turn latch is left open.
    pub fn with_body(body: Vec<Pos>, heading: Direction, hunger_limit: u32, grid: &mut Grid) -> Result<Self> {
        let Some(&head) = body.first() else {
            return Err(SimError::InvalidConfiguration("empty snake body".into()));
        };
        if body.len() < 2 {
            return Err(SimError::InvalidConfiguration(format!(
                "snake body of {} segments, need at least 2",
                body.len()
            )));
        }
        if let Some(p) = body.iter().find(|&&p| !grid.in_bounds(p) || grid.cell_at(p) == Cell::Wall) {
            return Err(SimError::InvalidConfiguration(format!("segment {p:?} is not on an open cell")));
        }

        let mut snake = Self::bare(head, hunger_limit, body.len());
        snake.body = body.into();
        snake.velocity = heading.velocity();
        snake.occupy_all(grid);
        Ok(snake)
    }

    fn bare(head: Pos, hunger_limit: u32, initial_size: usize) -> Self {
        Self {
            body: VecDeque::from([head]),
            velocity: Velocity::ZERO,
            turned: false,
            alive: true,
            hungry: false,
            steps_taken: 0,
            steps_since_food: 0,
            hunger_limit: i64::from(hunger_limit),
            initial_size,
        }
    }

    fn occupy_all(&self, grid: &mut Grid) {
        for &p in &self.body {
            if grid.cell_at(p) == Cell::Fruit {
                grid.consume_fruit();
            }
            grid.mark(p, Cell::Occupied);
        }
    }

    /// Free every cell this snake holds, e.g. before it is replaced.
    pub fn release(&self, grid: &mut Grid) {
        for &p in &self.body {
            if grid.cell_at(p) == Cell::Occupied {
                grid.mark(p, Cell::Empty);
            }
        }
    }

    /// Request a heading. Only the first request per tick is considered, and a
    /// direct reversal is refused. Returns whether the request was accepted.
    pub fn set_heading(&mut self, dir: Direction) -> bool {
        if self.turned {
            return false;
        }
        self.turned = true;

        let v = dir.velocity();
        if !self.velocity.is_zero() && v == self.velocity.reversed() {
            return false;
        }
        self.velocity = v;
        true
    }

    pub fn tick_reset(&mut self) {
        self.turned = false;
    }

    pub fn advance(&mut self, grid: &mut Grid) -> Move {
        let head = self.head();
        let next = head.wrapped(self.velocity, grid.height(), grid.width());

        if grid.cell_at(next) == Cell::Wall {
            self.alive = false;
            return Move::HitWall;
        }
        if self.body.contains(&next) {
            self.alive = false;
            return Move::HitSelf;
        }

        // Growing keeps the old tail: the appended segment at
        // tail + tail_velocity ends up on the old tail cell after the shift.
        let ate = grid.cell_at(next) == Cell::Fruit;
        if ate {
            self.steps_since_food = -1;
            grid.consume_fruit();
        } else if let Some(tail) = self.body.pop_back() {
            grid.mark(tail, Cell::Empty);
        }
        self.body.push_front(next);
        grid.mark(next, Cell::Occupied);

        self.steps_taken += 1;
        self.steps_since_food += 1;
        if ate { Move::Ate } else { Move::Moved }
    }

    /// One simulation tick for a living snake.
    pub fn update(&mut self, grid: &mut Grid) -> Option<Move> {
        if !self.alive {
            return None;
        }
        self.tick_reset();
        let m = self.advance(grid);
        self.hungry = self.steps_since_food > self.hunger_limit;
        Some(m)
    }

    /// Kill a hungry snake and charge the step penalty, saturating at zero.
    pub fn starve(&mut self, penalty_steps: u32) {
        self.alive = false;
        self.steps_taken = (self.steps_taken - i64::from(penalty_steps)).max(0);
    }

    pub fn kill(&mut self) {
        self.alive = false;
    }

    pub fn body(&self) -> &VecDeque<Pos> {
        &self.body
    }

    pub fn head(&self) -> Pos {
        self.body[0]
    }

    pub fn tail(&self) -> Pos {
        self.body[self.body.len() - 1]
    }

    pub fn len(&self) -> usize {
        self.body.len()
    }

    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }

    pub fn velocity(&self) -> Velocity {
        self.velocity
    }

    pub fn alive(&self) -> bool {
        self.alive
    }

    pub fn hungry(&self) -> bool {
        self.hungry
    }

    pub fn steps_taken(&self) -> i64 {
        self.steps_taken
    }

    pub fn steps_since_food(&self) -> i64 {
        self.steps_since_food
    }

    pub fn initial_size(&self) -> usize {
        self.initial_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    fn open_grid(w: usize, h: usize, fruit: Pos) -> Grid {
        let mut rng = SmallRng::seed_from_u64(0);
        let mut grid = Grid::new(w, h, &mut rng).unwrap();
        grid.place_fruit(fruit);
        grid
    }

    fn cells(grid: &Grid) -> Vec<Cell> {
        grid.rows().flatten().copied().collect()
    }

    #[test]
    fn test_spawn_body_inside_border() {
        let mut rng = SmallRng::seed_from_u64(42);
        for seed in 0..200 {
            let mut grid = Grid::new(12, 12, &mut rng).unwrap();
            let mut srng = SmallRng::seed_from_u64(seed);
            let size = 2 + (seed as usize % 3);
            let snake = Snake::spawn(&mut grid, size, 50, &mut srng).unwrap();
            assert_eq!(snake.len(), size);
            for &p in snake.body() {
                assert!(p.row > 0 && p.col > 0 && p.row < 11 && p.col < 11, "{p:?}");
                assert_eq!(grid.cell_at(p), Cell::Occupied);
            }
            assert_eq!(grid.count(Cell::Fruit), 1);
            assert_eq!(grid.count(Cell::Occupied), size);
        }
    }

    #[test]
    fn test_spawn_heads_toward_farthest_wall() {
        let mut rng = SmallRng::seed_from_u64(5);
        for _ in 0..100 {
            let mut grid = Grid::new(15, 9, &mut rng).unwrap();
            let snake = Snake::spawn(&mut grid, 2, 50, &mut rng).unwrap();
            let d = sensors::wall_distances(snake.head(), &grid);
            let max = *d.iter().max().unwrap();
            let first = d.iter().position(|&x| x == max).unwrap();
            assert_eq!(snake.velocity(), Direction::ALL[first].velocity());
            // body trails behind the head
            assert_eq!(Velocity::between(snake.body()[1], snake.head()), snake.velocity());
        }
    }

    #[test]
    fn test_spawn_rejects_small_board() {
        let mut rng = SmallRng::seed_from_u64(1);
        let mut grid = Grid::new(4, 12, &mut rng).unwrap();
        assert!(matches!(
            Snake::spawn(&mut grid, 2, 50, &mut rng),
            Err(SimError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_one_turn_per_tick() {
        let mut grid = open_grid(10, 10, Pos::new(8, 8));
        let mut snake = Snake::with_body(vec![Pos::new(5, 5), Pos::new(5, 4)], Direction::Right, 50, &mut grid).unwrap();

        assert!(snake.set_heading(Direction::Up));
        assert!(!snake.set_heading(Direction::Left));
        assert_eq!(snake.velocity(), Direction::Up.velocity());

        snake.tick_reset();
        snake.tick_reset();
        assert!(snake.set_heading(Direction::Left));
        assert!(!snake.set_heading(Direction::Down));
        assert_eq!(snake.velocity(), Direction::Left.velocity());
    }

    #[test]
    fn test_no_reversal_consumes_latch() {
        let mut grid = open_grid(10, 10, Pos::new(8, 8));
        let mut snake = Snake::with_body(vec![Pos::new(5, 5), Pos::new(5, 4)], Direction::Right, 50, &mut grid).unwrap();

        assert!(!snake.set_heading(Direction::Left));
        assert_eq!(snake.velocity(), Velocity::new(0, 1));
        assert!(!snake.set_heading(Direction::Up));
        assert_eq!(snake.velocity(), Velocity::new(0, 1));
    }

    #[test]
    fn test_growth_on_fruit() {
        let mut grid = open_grid(10, 10, Pos::new(3, 4));
        let mut snake = Snake::with_body(vec![Pos::new(3, 3), Pos::new(3, 2)], Direction::Right, 50, &mut grid).unwrap();

        assert_eq!(snake.update(&mut grid), Some(Move::Ate));
        assert_eq!(snake.len(), 3);
        assert_eq!(snake.body(), &VecDeque::from([Pos::new(3, 4), Pos::new(3, 3), Pos::new(3, 2)]));
        assert!(!grid.fruit_present());
        assert_eq!(grid.count(Cell::Fruit), 0);
        assert_eq!(grid.count(Cell::Occupied), 3);
        assert_eq!(snake.steps_since_food(), 0);
        assert_eq!(snake.steps_taken(), 1);

        let mut rng = SmallRng::seed_from_u64(2);
        assert!(grid.respawn_fruit_if_absent(&mut rng).unwrap());
        assert_eq!(grid.count(Cell::Fruit), 1);
        assert!(!snake.body().contains(&grid.fruit_pos()));

        // next move keeps length
        grid.place_fruit(Pos::new(8, 8));
        assert_eq!(snake.update(&mut grid), Some(Move::Moved));
        assert_eq!(snake.len(), 3);
        assert_eq!(grid.count(Cell::Occupied), 3);
        assert_eq!(grid.cell_at(Pos::new(3, 2)), Cell::Empty);
    }

    #[test]
    fn test_self_collision_leaves_state() {
        let mut grid = open_grid(8, 8, Pos::new(1, 1));
        let body = vec![Pos::new(3, 3), Pos::new(3, 4), Pos::new(4, 4), Pos::new(4, 3)];
        let mut snake = Snake::with_body(body.clone(), Direction::Left, 50, &mut grid).unwrap();
        let before = cells(&grid);

        snake.tick_reset();
        assert!(snake.set_heading(Direction::Down));
        assert_eq!(snake.advance(&mut grid), Move::HitSelf);
        assert!(!snake.alive());
        assert_eq!(snake.body().iter().copied().collect::<Vec<_>>(), body);
        assert_eq!(cells(&grid), before);
        assert_eq!(snake.update(&mut grid), None);
    }

    #[test]
    fn test_wall_collision() {
        let mut grid = open_grid(6, 6, Pos::new(4, 4));
        let mut snake = Snake::with_body(vec![Pos::new(1, 2), Pos::new(2, 2)], Direction::Up, 50, &mut grid).unwrap();
        assert_eq!(snake.update(&mut grid), Some(Move::HitWall));
        assert!(!snake.alive());
        assert_eq!(snake.head(), Pos::new(1, 2));
    }

    #[test]
    fn test_toroidal_wrap_reevaluates_target() {
        // opened border cell: wrap lands on the opposite wall
        let mut grid = open_grid(7, 7, Pos::new(4, 5));
        grid.mark(Pos::new(0, 3), Cell::Empty);
        let mut snake = Snake::with_body(vec![Pos::new(1, 3), Pos::new(2, 3)], Direction::Up, 50, &mut grid).unwrap();
        assert_eq!(snake.update(&mut grid), Some(Move::Moved));
        assert_eq!(snake.head(), Pos::new(0, 3));
        assert_eq!(snake.update(&mut grid), Some(Move::HitWall));

        // both ends opened: the snake comes out on the far side
        let mut grid = open_grid(7, 7, Pos::new(4, 5));
        grid.mark(Pos::new(0, 3), Cell::Empty);
        grid.mark(Pos::new(6, 3), Cell::Empty);
        let mut snake = Snake::with_body(vec![Pos::new(1, 3), Pos::new(2, 3)], Direction::Up, 50, &mut grid).unwrap();
        snake.update(&mut grid);
        assert_eq!(snake.update(&mut grid), Some(Move::Moved));
        assert_eq!(snake.head(), Pos::new(6, 3));
        assert_eq!(grid.cell_at(Pos::new(6, 3)), Cell::Occupied);

        // and a fruit across the seam is eaten like any other
        let mut grid = open_grid(7, 7, Pos::new(6, 3));
        grid.mark(Pos::new(0, 3), Cell::Empty);
        let mut snake = Snake::with_body(vec![Pos::new(0, 3), Pos::new(1, 3)], Direction::Up, 50, &mut grid).unwrap();
        assert_eq!(snake.update(&mut grid), Some(Move::Ate));
        assert_eq!(snake.head(), Pos::new(6, 3));
    }

    #[test]
    fn test_hunger_after_limit() {
        let mut grid = open_grid(12, 12, Pos::new(9, 9));
        let mut snake = Snake::with_body(vec![Pos::new(5, 2), Pos::new(5, 1)], Direction::Right, 5, &mut grid).unwrap();
        for tick in 1..=5 {
            snake.update(&mut grid);
            assert!(!snake.hungry(), "tick {tick}");
        }
        snake.update(&mut grid);
        assert!(snake.hungry());
        assert!(snake.alive());

        snake.starve(50);
        assert!(!snake.alive());
        assert_eq!(snake.steps_taken(), 0);
    }

    #[test]
    fn test_release_frees_cells() {
        let mut grid = open_grid(8, 8, Pos::new(6, 6));
        let snake = Snake::with_body(vec![Pos::new(3, 3), Pos::new(3, 2)], Direction::Right, 5, &mut grid).unwrap();
        snake.release(&mut grid);
        assert_eq!(grid.count(Cell::Occupied), 0);
    }
}
