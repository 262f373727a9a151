use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SimError {
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error("no empty cell left for fruit after {attempts} sampling attempts")]
    NoSpaceForFruit { attempts: u32 },
    #[error("policy expects {expected} inputs but the sensor frame has {actual}")]
    PolicyInputMismatch { expected: usize, actual: usize },
    #[error("policy produced {actual} outputs, expected {expected}")]
    PolicyOutputMismatch { expected: usize, actual: usize },
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("policy file not found: {0}")]
    NotFound(PathBuf),
    #[error("policy file {path} is corrupt: {reason}")]
    Corrupt { path: PathBuf, reason: String },
    #[error("i/o error on {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T, E = SimError> = std::result::Result<T, E>;
