//! Simulation configuration.
//!
//! Loaded from compiled defaults, then an optional JSON file; the binary
//! applies command-line overrides on top.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::error::SimError;
use crate::grid::DEFAULT_FRUIT_ATTEMPTS;
use crate::policy::DEFAULT_THRESHOLD;
use crate::sensors;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Frame width in pixels for all boards together
    pub board_width: u32,
    /// Frame height in pixels for all boards together
    pub board_height: u32,
    /// Parallel episodes (population size when training)
    pub num_episodes: usize,
    /// Boards per row in the display layout
    pub episodes_per_row: usize,
    pub cells_per_board_w: usize,
    pub cells_per_board_h: usize,
    /// Minimum wall-clock time between ticks, 0 = unpaced
    pub tick_interval_seconds: f64,
    pub episode: EpisodeConfig,
    pub manual: ManualConfig,
    pub evolution: EvolutionConfig,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            board_width: 600,
            board_height: 600,
            num_episodes: 50,
            episodes_per_row: 10,
            cells_per_board_w: 12,
            cells_per_board_h: 12,
            tick_interval_seconds: 0.0,
            episode: EpisodeConfig::default(),
            manual: ManualConfig::default(),
            evolution: EvolutionConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EpisodeConfig {
    pub initial_size: usize,
    /// Ticks without food before a snake counts as hungry
    pub hunger_limit: u32,
    /// Steps deducted from a snake culled for hunger
    pub hunger_penalty_steps: u32,
    /// Neighbourhood window side (even values are rounded up)
    pub neighbourhood: usize,
    pub decision_threshold: f32,
    /// Generation step budget
    pub max_ticks: Option<u64>,
    pub fruit_attempts: u32,
    /// Fan the advance phase out over threads
    pub parallel_advance: bool,
}

impl Default for EpisodeConfig {
    fn default() -> Self {
        Self {
            initial_size: 2,
            hunger_limit: 50,
            hunger_penalty_steps: 50,
            neighbourhood: 5,
            decision_threshold: DEFAULT_THRESHOLD,
            max_ticks: None,
            fruit_attempts: DEFAULT_FRUIT_ATTEMPTS,
            parallel_advance: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ManualConfig {
    pub hunger_limit: u32,
}

impl Default for ManualConfig {
    fn default() -> Self {
        Self { hunger_limit: 200 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EvolutionConfig {
    pub generations: usize,
    pub hidden_layers: Vec<usize>,
    /// Uniform weight perturbation range for children
    pub mutation_sigma: f32,
    /// Best policies carried unchanged into the next generation
    pub elites: usize,
    pub seed: Option<u64>,
}

impl Default for EvolutionConfig {
    fn default() -> Self {
        Self {
            generations: 100,
            hidden_layers: vec![16],
            mutation_sigma: 0.25,
            elites: 1,
            seed: None,
        }
    }
}

impl SimConfig {
    /// Defaults overlaid with the JSON file at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).with_context(|| format!("reading config {}", path.display()))?;
        let config: Self =
            serde_json::from_str(&text).with_context(|| format!("parsing config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), SimError> {
        let bad = |msg: String| Err(SimError::InvalidConfiguration(msg));
        let (w, h) = (self.cells_per_board_w, self.cells_per_board_h);
        let size = self.episode.initial_size;

        if w < 3 || h < 3 {
            return bad(format!("board of {w}x{h} cells has no interior"));
        }
        if size < 2 {
            return bad(format!("initial_size {size} is below 2"));
        }
        if w <= 2 * size || h <= 2 * size {
            return bad(format!("board of {w}x{h} cells cannot spawn a snake of size {size}"));
        }
        if self.num_episodes == 0 || self.episodes_per_row == 0 {
            return bad("num_episodes and episodes_per_row must be positive".into());
        }
        let span = |cells: usize, boards: usize| (cells as u64).checked_mul(boards as u64);
        let fits = |span: Option<u64>, pixels: u32| span.is_some_and(|s| s <= u64::from(pixels));
        if !fits(span(w, self.episodes_per_row), self.board_width)
            || !fits(span(h, self.episode_rows()), self.board_height)
        {
            return bad(format!(
                "{} boards of {w}x{h} cells, {} per row, do not fit a {}x{} frame",
                self.num_episodes, self.episodes_per_row, self.board_width, self.board_height
            ));
        }
        if !self.tick_interval_seconds.is_finite() || self.tick_interval_seconds < 0.0 {
            return bad(format!("tick_interval_seconds {} is not a valid interval", self.tick_interval_seconds));
        }
        if self.episode.neighbourhood == 0 {
            return bad("neighbourhood must be at least 1".into());
        }
        if self.evolution.hidden_layers.contains(&0) {
            return bad("hidden layers must not be empty".into());
        }
        Ok(())
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs_f64(self.tick_interval_seconds)
    }

    /// Board rows needed to lay out every episode.
    pub fn episode_rows(&self) -> usize {
        self.num_episodes.div_ceil(self.episodes_per_row.max(1))
    }

    /// Network layer widths for the configured sensor window.
    pub fn network_layout(&self) -> Vec<usize> {
        let mut sizes = vec![sensors::feature_len(self.episode.neighbourhood)];
        sizes.extend(&self.evolution.hidden_layers);
        sizes.push(crate::policy::OUTPUTS);
        sizes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_valid() {
        let config = SimConfig::default();
        config.validate().unwrap();
        assert_eq!(config.episode_rows(), 5);
        assert_eq!(config.network_layout(), vec![35, 16, 4]);
    }

    #[test]
    fn test_rejects_degenerate_boards() {
        let mut config = SimConfig::default();
        config.cells_per_board_w = 2;
        assert!(matches!(config.validate(), Err(SimError::InvalidConfiguration(_))));

        let mut config = SimConfig::default();
        config.cells_per_board_h = 4;
        assert!(config.validate().is_err());

        let mut config = SimConfig::default();
        config.tick_interval_seconds = f64::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_layout_larger_than_frame() {
        let mut config = SimConfig::default();
        config.num_episodes = 600;
        assert!(matches!(config.validate(), Err(SimError::InvalidConfiguration(_))));

        let mut config = SimConfig::default();
        config.cells_per_board_w = usize::MAX;
        assert!(config.validate().is_err());

        let mut config = SimConfig::default();
        config.num_episodes = 10;
        config.episodes_per_row = 50;
        config.board_width = 600;
        config.validate().unwrap();
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{ "num_episodes": 4, "cells_per_board_w": 20, "episode": {{ "hunger_limit": 80 }} }}"#
        )
        .unwrap();
        let config = SimConfig::load(file.path()).unwrap();
        assert_eq!(config.num_episodes, 4);
        assert_eq!(config.cells_per_board_w, 20);
        assert_eq!(config.cells_per_board_h, 12);
        assert_eq!(config.episode.hunger_limit, 80);
        assert_eq!(config.episode.initial_size, 2);
    }
}
