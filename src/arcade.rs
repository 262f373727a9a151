//! Manual play: one snake per board steered by direction events, with pause,
//! reset and quit controls.

use std::sync::mpsc::Sender;

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::config::SimConfig;
use crate::error::{Result, SimError};
use crate::grid::Grid;
use crate::pacing::TickGate;
use crate::policy::{KeyboardPolicy, Policy};
use crate::pos::Direction;
use crate::render::{BoardView, Overlay};
use crate::sensors::SensorFrame;
use crate::snake::Snake;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InputEvent {
    Turn(Direction),
    Pause,
    Reset,
    Quit,
}

struct Board {
    grid: Grid,
    snake: Snake,
    input: Sender<Direction>,
    policy: KeyboardPolicy,
    rng: SmallRng,
}

pub struct Arcade {
    boards: Vec<Board>,
    initial_size: usize,
    hunger_limit: u32,
    neighbourhood: usize,
    paused: bool,
    running: bool,
    ticks: u64,
    best_size_ever: usize,
    gate: TickGate,
}

impl Arcade {
    pub fn new(config: &SimConfig, seed: u64) -> Result<Self> {
        config.validate()?;
        let mut seeds = SmallRng::seed_from_u64(seed);
        let mut boards = Vec::with_capacity(config.num_episodes);
        for _ in 0..config.num_episodes {
            let mut rng = SmallRng::seed_from_u64(seeds.r#gen());
            let mut grid = Grid::with_fruit_attempts(
                config.cells_per_board_w,
                config.cells_per_board_h,
                config.episode.fruit_attempts,
                &mut rng,
            )?;
            let snake = Snake::spawn(&mut grid, config.episode.initial_size, config.manual.hunger_limit, &mut rng)?;
            let (input, policy) = KeyboardPolicy::channel();
            boards.push(Board {
                grid,
                snake,
                input,
                policy,
                rng,
            });
        }
        Ok(Self {
            boards,
            initial_size: config.episode.initial_size,
            hunger_limit: config.manual.hunger_limit,
            neighbourhood: config.episode.neighbourhood,
            paused: false,
            running: true,
            ticks: 0,
            best_size_ever: config.episode.initial_size,
            gate: TickGate::new(config.tick_interval()),
        })
    }

    pub fn paused(&self) -> bool {
        self.paused
    }

    pub fn running(&self) -> bool {
        self.running
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn snakes(&self) -> impl Iterator<Item = &Snake> {
        self.boards.iter().map(|b| &b.snake)
    }

    pub fn handle(&mut self, event: InputEvent) -> Result<()> {
        match event {
            InputEvent::Turn(dir) => {
                for board in &self.boards {
                    // receiver lives as long as the board
                    let _ = board.input.send(dir);
                }
            }
            InputEvent::Pause => self.paused = !self.paused,
            InputEvent::Reset => self.reset_dead()?,
            InputEvent::Quit => self.running = false,
        }
        Ok(())
    }

    /// Respawn every dead snake on its own board; unpause when none was alive.
    fn reset_dead(&mut self) -> Result<()> {
        let mut all_dead = true;
        for board in &mut self.boards {
            if board.snake.alive() {
                all_dead = false;
                continue;
            }
            board.snake.release(&mut board.grid);
            board.snake = Snake::spawn(&mut board.grid, self.initial_size, self.hunger_limit, &mut board.rng)?;
            // turns sent while the board was dead belong to the old snake
            board.policy.clear();
        }
        log::debug!("reset dead snakes, all dead: {all_dead}");
        if all_dead {
            self.paused = false;
        }
        Ok(())
    }

    /// Advance every living snake once. Does nothing while paused.
    pub fn tick(&mut self) -> Result<bool> {
        if self.paused {
            return Ok(false);
        }
        for board in &mut self.boards {
            if !board.snake.alive() {
                continue;
            }
            board.snake.tick_reset();
            let frame = SensorFrame::observe(&board.snake, &board.grid, self.neighbourhood);
            if let Some(dir) = board.policy.decide(&frame)? {
                board.snake.set_heading(dir);
            }
        }
        for board in &mut self.boards {
            board.snake.update(&mut board.grid);
            match board.grid.respawn_fruit_if_absent(&mut board.rng) {
                Ok(_) => {}
                Err(SimError::NoSpaceForFruit { .. }) => {
                    log::info!("board filled at size {}", board.snake.len());
                    board.snake.kill();
                }
                Err(e) => return Err(e),
            }
            self.best_size_ever = self.best_size_ever.max(board.snake.len());
        }
        self.ticks += 1;
        Ok(true)
    }

    /// Poll `events` once per tick until a quit event arrives.
    pub fn run<E, F>(&mut self, mut events: E, mut on_frame: F) -> Result<()>
    where
        E: FnMut() -> Vec<InputEvent>,
        F: FnMut(&Arcade),
    {
        while self.running {
            self.gate.wait();
            for event in events() {
                self.handle(event)?;
            }
            if !self.running {
                break;
            }
            self.tick()?;
            on_frame(self);
        }
        log::info!("arcade stopped after {} ticks, best size {}", self.ticks, self.best_size_ever);
        Ok(())
    }

    pub fn views(&self) -> Vec<BoardView> {
        self.boards
            .iter()
            .enumerate()
            .map(|(slot, b)| BoardView::capture(slot, &b.grid, &b.snake))
            .collect()
    }

    pub fn overlay(&self) -> Overlay {
        Overlay {
            generation: 0,
            max_size: self.snakes().map(Snake::len).max().unwrap_or(0),
            best_size_ever: self.best_size_ever,
        }
    }
}
