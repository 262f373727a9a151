use serde::{Deserialize, Serialize};

/// Per-episode fitness bookkeeping, refreshed every tick.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FitnessRecord {
    pub max_size_reached: usize,
    pub total_steps: i64,
    pub fitness: f64,
}

impl FitnessRecord {
    pub fn new(initial_size: usize) -> Self {
        Self {
            max_size_reached: initial_size,
            ..Self::default()
        }
    }

    /// Overwrite from the current episode state.
    pub fn refresh(&mut self, current_size: usize, steps_taken: i64, initial_size: usize) {
        self.max_size_reached = self.max_size_reached.max(current_size);
        self.total_steps = steps_taken;
        self.fitness = score(current_size, initial_size, steps_taken);
    }
}

/// `(size - initial)^3 / steps`, zero when no step has counted.
pub fn score(current_size: usize, initial_size: usize, steps_taken: i64) -> f64 {
    if steps_taken <= 0 {
        return 0.0;
    }
    let growth = current_size as f64 - initial_size as f64;
    growth.powi(3) / steps_taken as f64
}
