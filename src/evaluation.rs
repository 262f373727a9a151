//! Batched tick loop over independent episodes, fitness bookkeeping and culling.
//!
//! Each [`Episode`] owns its grid, snake, policy, fitness record and RNG, so
//! culling one removes all of them together and the advance phase can run
//! episodes in any order.

use std::fmt;

use ahash::{AHashMap, AHashSet};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::config::{EpisodeConfig, SimConfig};
use crate::error::{Result, SimError};
use crate::fitness::FitnessRecord;
use crate::grid::Grid;
use crate::pacing::TickGate;
use crate::policy::Policy;
use crate::sensors::{self, SensorFrame};
use crate::snake::Snake;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PolicyId(pub u64);

impl fmt::Display for PolicyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A policy submitted for evaluation.
pub struct Candidate {
    pub id: PolicyId,
    pub policy: Box<dyn Policy>,
}

impl Candidate {
    pub fn new(id: PolicyId, policy: impl Policy + 'static) -> Self {
        Self {
            id,
            policy: Box::new(policy),
        }
    }
}

/// Why an episode left the active set.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EndCause {
    Collision,
    Starved,
    BoardFull,
    Budget,
}

/// Counters that persist across generations.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub generation: u64,
    pub best_size_ever: usize,
}

/// Results reported back to the evolutionary driver.
#[derive(Debug, Clone)]
pub struct GenerationOutcome {
    pub session: Session,
    pub fitness: AHashMap<PolicyId, f64>,
    /// Largest snake seen during this generation
    pub max_size: usize,
    pub ticks: u64,
}

impl GenerationOutcome {
    pub fn best(&self) -> Option<(PolicyId, f64)> {
        self.fitness
            .iter()
            .map(|(&id, &f)| (id, f))
            .max_by(|a, b| a.1.total_cmp(&b.1).then(b.0.cmp(&a.0)))
    }
}

/// Narrow capability offered to an evolutionary driver.
pub trait Evaluate {
    fn evaluate(&mut self, session: Session, population: Vec<Candidate>) -> Result<GenerationOutcome>;
}

pub struct Episode {
    id: PolicyId,
    grid: Grid,
    snake: Snake,
    policy: Box<dyn Policy>,
    record: FitnessRecord,
    rng: SmallRng,
    ended: Option<EndCause>,
}

impl Episode {
    fn spawn(id: PolicyId, policy: Box<dyn Policy>, config: &SimConfig, seed: u64) -> Result<Self> {
        let ep = &config.episode;
        let mut rng = SmallRng::seed_from_u64(seed);
        let mut grid = Grid::with_fruit_attempts(
            config.cells_per_board_w,
            config.cells_per_board_h,
            ep.fruit_attempts,
            &mut rng,
        )?;
        let snake = Snake::spawn(&mut grid, ep.initial_size, ep.hunger_limit, &mut rng)?;
        Ok(Self::from_parts(id, grid, snake, policy, rng))
    }

    /// Build an episode around an already placed snake.
    pub fn from_parts(id: PolicyId, grid: Grid, snake: Snake, policy: Box<dyn Policy>, rng: SmallRng) -> Self {
        Self {
            id,
            record: FitnessRecord::new(snake.len()),
            grid,
            snake,
            policy,
            rng,
            ended: None,
        }
    }

    pub fn id(&self) -> PolicyId {
        self.id
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn snake(&self) -> &Snake {
        &self.snake
    }

    pub fn snake_mut(&mut self) -> &mut Snake {
        &mut self.snake
    }

    pub fn record(&self) -> &FitnessRecord {
        &self.record
    }

    pub fn ended(&self) -> Option<EndCause> {
        self.ended
    }

    fn request_turn(&mut self, neighbourhood: usize) -> Result<()> {
        self.snake.tick_reset();
        let frame = SensorFrame::observe(&self.snake, &self.grid, neighbourhood);
        if let Some(dir) = self.policy.decide(&frame)? {
            self.snake.set_heading(dir);
        }
        Ok(())
    }

    /// A full board ends the episode; any other failure aborts the generation.
    fn advance(&mut self) -> Result<()> {
        self.snake.update(&mut self.grid);
        match self.grid.respawn_fruit_if_absent(&mut self.rng) {
            Ok(_) => Ok(()),
            Err(SimError::NoSpaceForFruit { .. }) => {
                log::info!("policy {} filled its board at size {}", self.id, self.snake.len());
                self.ended = Some(EndCause::BoardFull);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Apply termination rules and refresh fitness.
    fn settle(&mut self, config: &EpisodeConfig) {
        if self.snake.hungry() {
            self.snake.starve(config.hunger_penalty_steps);
            self.ended.get_or_insert(EndCause::Starved);
        } else if !self.snake.alive() {
            self.ended.get_or_insert(EndCause::Collision);
        }
        self.record
            .refresh(self.snake.len(), self.snake.steps_taken(), self.snake.initial_size());
    }
}

pub struct Evaluator {
    config: SimConfig,
    episodes: Vec<Episode>,
    finished: AHashMap<PolicyId, f64>,
    gate: TickGate,
    rng: SmallRng,
    ticks: u64,
    max_size: usize,
}

impl Evaluator {
    pub fn new(config: SimConfig, seed: u64) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            gate: TickGate::new(config.tick_interval()),
            config,
            episodes: Vec::new(),
            finished: AHashMap::new(),
            rng: SmallRng::seed_from_u64(seed),
            ticks: 0,
            max_size: 0,
        })
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn episodes(&self) -> &[Episode] {
        &self.episodes
    }

    pub fn episodes_mut(&mut self) -> &mut [Episode] {
        &mut self.episodes
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    pub fn is_done(&self) -> bool {
        self.episodes.is_empty()
    }

    /// Spawn one episode per candidate. Policies reading a feature vector of
    /// the wrong length are rejected before any tick runs.
    pub fn begin(&mut self, population: Vec<Candidate>) -> Result<()> {
        let expected = sensors::feature_len(self.config.episode.neighbourhood);
        let mut seen = AHashSet::with_capacity(population.len());
        for candidate in &population {
            if !seen.insert(candidate.id) {
                return Err(SimError::InvalidConfiguration(format!(
                    "policy {} appears more than once in the population",
                    candidate.id
                )));
            }
            if let Some(n) = candidate.policy.expected_inputs() {
                if n != expected {
                    return Err(SimError::PolicyInputMismatch { expected: n, actual: expected });
                }
            }
        }

        self.episodes.clear();
        self.finished.clear();
        self.ticks = 0;
        self.max_size = 0;
        for Candidate { id, policy } in population {
            let seed = self.rng.r#gen();
            let episode = Episode::spawn(id, policy, &self.config, seed)?;
            self.max_size = self.max_size.max(episode.snake.len());
            self.episodes.push(episode);
        }
        Ok(())
    }

    /// Add an already built episode to the active set.
    pub fn push_episode(&mut self, episode: Episode) {
        self.max_size = self.max_size.max(episode.snake.len());
        self.episodes.push(episode);
    }

    /// One batched tick: every agent requests its turn, then every episode
    /// advances, then terminated episodes are culled. Returns the number of
    /// episodes still active.
    pub fn step(&mut self) -> Result<usize> {
        let ep_config = &self.config.episode;

        for episode in &mut self.episodes {
            episode.request_turn(ep_config.neighbourhood)?;
        }

        if ep_config.parallel_advance && self.episodes.len() > 1 {
            self.episodes.par_iter_mut().try_for_each(Episode::advance)?;
        } else {
            self.episodes.iter_mut().try_for_each(Episode::advance)?;
        }

        for episode in &mut self.episodes {
            self.max_size = self.max_size.max(episode.snake.len());
            episode.settle(ep_config);
        }
        self.ticks += 1;

        if let Some(budget) = ep_config.max_ticks {
            if self.ticks >= budget {
                for episode in &mut self.episodes {
                    episode.ended.get_or_insert(EndCause::Budget);
                }
            }
        }

        self.cull();
        Ok(self.episodes.len())
    }

    /// Remove ended episodes, keeping the order of the survivors, and record
    /// their final fitness.
    pub fn cull(&mut self) {
        let finished = &mut self.finished;
        self.episodes.retain(|episode| {
            let Some(cause) = episode.ended.or((!episode.snake.alive()).then_some(EndCause::Collision)) else {
                return true;
            };
            log::debug!(
                "culled policy {} ({cause:?}) size {} steps {} fitness {:.4}",
                episode.id,
                episode.snake.len(),
                episode.record.total_steps,
                episode.record.fitness
            );
            finished.insert(episode.id, episode.record.fitness);
            false
        });
    }

    /// Final fitness of every episode that has ended so far.
    pub fn finished(&self) -> &AHashMap<PolicyId, f64> {
        &self.finished
    }

    /// Run a generation to completion, calling `on_tick` after every tick.
    pub fn run_generation<F>(
        &mut self,
        mut session: Session,
        population: Vec<Candidate>,
        mut on_tick: F,
    ) -> Result<GenerationOutcome>
    where
        F: FnMut(&Evaluator, &Session),
    {
        self.begin(population)?;
        while !self.is_done() {
            if !self.gate.is_unpaced() {
                self.gate.wait();
            }
            self.step()?;
            session.best_size_ever = session.best_size_ever.max(self.max_size);
            on_tick(self, &session);
        }

        log::info!(
            "generation {} finished after {} ticks: max size {}, best ever {}",
            session.generation,
            self.ticks,
            self.max_size,
            session.best_size_ever
        );
        session.generation += 1;
        Ok(GenerationOutcome {
            session,
            fitness: std::mem::take(&mut self.finished),
            max_size: self.max_size,
            ticks: self.ticks,
        })
    }
}

impl Evaluate for Evaluator {
    fn evaluate(&mut self, session: Session, population: Vec<Candidate>) -> Result<GenerationOutcome> {
        self.run_generation(session, population, |_, _| {})
    }
}
