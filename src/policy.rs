//! Policies turn a sensor frame into an optional heading request.

use std::sync::mpsc::{self, Receiver, Sender};

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SimError};
use crate::pos::Direction;
use crate::sensors::SensorFrame;

/// Scores for up, down, left, right.
pub const OUTPUTS: usize = 4;

pub const DEFAULT_THRESHOLD: f32 = 0.5;

pub trait Policy: Send {
    /// Length of the feature vector this policy reads, if it reads one.
    fn expected_inputs(&self) -> Option<usize> {
        None
    }

    fn decide(&mut self, frame: &SensorFrame) -> Result<Option<Direction>>;
}

/// Index of the first maximum, issued only when it clears `threshold`.
pub fn decide_heading(outputs: &[f32], threshold: f32) -> Option<Direction> {
    let mut best = 0;
    for (i, &v) in outputs.iter().enumerate() {
        if v > outputs[best] {
            best = i;
        }
    }
    let top = *outputs.get(best)?;
    if top > threshold { Direction::from_index(best) } else { None }
}

/// Anything that maps a feature vector to output scores.
pub trait Network: Send {
    fn input_len(&self) -> usize;
    fn activate(&mut self, inputs: &[f32]) -> Vec<f32>;
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct Layer {
    inputs: usize,
    outputs: usize,
    weights: Vec<f32>, // outputs x inputs, row-major
    biases: Vec<f32>,
}

impl Layer {
    fn random<R: Rng + ?Sized>(inputs: usize, outputs: usize, rng: &mut R) -> Self {
        Self {
            inputs,
            outputs,
            weights: (0..inputs * outputs).map(|_| rng.gen_range(-1.0..1.0)).collect(),
            biases: (0..outputs).map(|_| rng.gen_range(-1.0..1.0)).collect(),
        }
    }

    fn forward(&self, x: &[f32]) -> Vec<f32> {
        self.weights
            .chunks_exact(self.inputs)
            .zip(&self.biases)
            .map(|(row, b)| sigmoid(row.iter().zip(x).map(|(w, v)| w * v).sum::<f32>() + b))
            .collect()
    }
}

fn sigmoid(z: f32) -> f32 {
    let z = (4.9 * z).clamp(-60.0, 60.0);
    1.0 / (1.0 + (-z).exp())
}

/// Fixed-topology feed-forward network with steepened sigmoid units.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FeedForwardNet {
    layers: Vec<Layer>,
}

impl FeedForwardNet {
    /// `sizes` lists every layer width, input first, output last.
    pub fn random<R: Rng + ?Sized>(sizes: &[usize], rng: &mut R) -> Result<Self> {
        if sizes.len() < 2 || sizes.contains(&0) {
            return Err(SimError::InvalidConfiguration(format!("bad network layout {sizes:?}")));
        }
        let layers = sizes.windows(2).map(|w| Layer::random(w[0], w[1], rng)).collect();
        Ok(Self { layers })
    }

    pub fn output_len(&self) -> usize {
        self.layers.last().map_or(0, |l| l.outputs)
    }

    pub fn layer_sizes(&self) -> Vec<usize> {
        let mut sizes: Vec<usize> = self.layers.iter().map(|l| l.inputs).collect();
        sizes.push(self.output_len());
        sizes
    }

    /// Check that the layers chain into a usable network ending in
    /// [`OUTPUTS`] scores. Deserialized networks must pass before use.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.layers.is_empty() {
            return Err("network has no layers".into());
        }
        let mut width = None;
        for (i, layer) in self.layers.iter().enumerate() {
            if layer.inputs == 0 || layer.outputs == 0 {
                return Err(format!("layer {i} is {}x{}", layer.inputs, layer.outputs));
            }
            if layer.inputs.checked_mul(layer.outputs) != Some(layer.weights.len()) {
                return Err(format!(
                    "layer {i} has {} weights for {}x{}",
                    layer.weights.len(),
                    layer.inputs,
                    layer.outputs
                ));
            }
            if layer.biases.len() != layer.outputs {
                return Err(format!("layer {i} has {} biases for {} outputs", layer.biases.len(), layer.outputs));
            }
            if let Some(prev) = width {
                if layer.inputs != prev {
                    return Err(format!("layer {i} reads {} values but the previous layer writes {prev}", layer.inputs));
                }
            }
            width = Some(layer.outputs);
        }
        if self.output_len() != OUTPUTS {
            return Err(format!("network ends in {} outputs, expected {OUTPUTS}", self.output_len()));
        }
        Ok(())
    }

    pub fn forward(&self, inputs: &[f32]) -> Vec<f32> {
        self.layers
            .iter()
            .fold(inputs.to_vec(), |x, layer| layer.forward(&x))
    }

    /// Perturb every weight and bias uniformly within `±sigma`.
    pub fn mutate<R: Rng + ?Sized>(&mut self, sigma: f32, rng: &mut R) {
        if sigma <= 0.0 {
            return;
        }
        for layer in &mut self.layers {
            for v in layer.weights.iter_mut().chain(layer.biases.iter_mut()) {
                *v += rng.gen_range(-sigma..sigma);
            }
        }
    }
}

impl Network for FeedForwardNet {
    fn input_len(&self) -> usize {
        self.layers.first().map_or(0, |l| l.inputs)
    }

    fn activate(&mut self, inputs: &[f32]) -> Vec<f32> {
        self.forward(inputs)
    }
}

/// Wraps a network with the thresholded arg-max decision rule.
pub struct NetworkPolicy<N = FeedForwardNet> {
    net: N,
    threshold: f32,
}

impl<N: Network> NetworkPolicy<N> {
    pub fn new(net: N, threshold: f32) -> Self {
        Self { net, threshold }
    }

    pub fn into_inner(self) -> N {
        self.net
    }
}

impl<N: Network> Policy for NetworkPolicy<N> {
    fn expected_inputs(&self) -> Option<usize> {
        Some(self.net.input_len())
    }

    fn decide(&mut self, frame: &SensorFrame) -> Result<Option<Direction>> {
        let inputs = frame.to_vec();
        if inputs.len() != self.net.input_len() {
            return Err(SimError::PolicyInputMismatch {
                expected: self.net.input_len(),
                actual: inputs.len(),
            });
        }
        let outputs = self.net.activate(&inputs);
        if outputs.len() != OUTPUTS {
            return Err(SimError::PolicyOutputMismatch {
                expected: OUTPUTS,
                actual: outputs.len(),
            });
        }
        Ok(decide_heading(&outputs, self.threshold))
    }
}

/// Direction events from an input source. Only the first event queued since
/// the last tick is used, later ones would be refused by the turn latch anyway.
pub struct KeyboardPolicy {
    events: Receiver<Direction>,
}

impl KeyboardPolicy {
    pub fn channel() -> (Sender<Direction>, Self) {
        let (tx, rx) = mpsc::channel();
        (tx, Self { events: rx })
    }

    /// Drop every queued event.
    pub fn clear(&mut self) {
        while self.events.try_recv().is_ok() {}
    }
}

impl Policy for KeyboardPolicy {
    fn decide(&mut self, _frame: &SensorFrame) -> Result<Option<Direction>> {
        let first = self.events.try_recv().ok();
        self.clear();
        Ok(first)
    }
}
