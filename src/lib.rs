//! Headless snake simulation and fitness engine for evolving neural policies.
//!
//! Each episode runs one snake on its own walled board. An [`Evaluator`]
//! ticks a whole population in lock-step, scores every policy and reports a
//! fitness per [`PolicyId`] to whatever driver implements the selection
//! scheme; [`ElitistDriver`] is the bundled one.

pub mod arcade;
pub mod config;
pub mod error;
pub mod evaluation;
pub mod evolution;
pub mod fitness;
pub mod grid;
pub mod pacing;
pub mod persistence;
pub mod policy;
pub mod pos;
pub mod render;
pub mod sensors;
pub mod snake;

pub use config::SimConfig;
pub use error::{PersistenceError, Result, SimError};
pub use evaluation::{Candidate, Evaluate, Evaluator, GenerationOutcome, PolicyId, Session};
pub use evolution::{ElitistDriver, Winner};
pub use grid::{Cell, Grid};
pub use policy::{FeedForwardNet, KeyboardPolicy, NetworkPolicy, Policy};
pub use pos::{Direction, Pos, Velocity};
pub use sensors::SensorFrame;
pub use snake::Snake;
