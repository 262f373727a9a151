//! Saving and loading the winning policy.

use std::io::ErrorKind;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::PersistenceError;
use crate::policy::FeedForwardNet;
use crate::sensors::LAYOUT_VERSION;

const FORMAT_VERSION: u32 = 1;

#[derive(Serialize, Deserialize)]
struct SavedPolicy {
    format_version: u32,
    layout_version: u32,
    fitness: f64,
    net: FeedForwardNet,
}

/// Write `net` and its fitness to `path`, replacing any existing file.
pub fn save_policy(path: &Path, net: &FeedForwardNet, fitness: f64) -> Result<(), PersistenceError> {
    let saved = SavedPolicy {
        format_version: FORMAT_VERSION,
        layout_version: LAYOUT_VERSION,
        fitness,
        net: net.clone(),
    };
    let bytes = bincode::serde::encode_to_vec(&saved, bincode::config::standard()).map_err(|e| {
        PersistenceError::Corrupt {
            path: path.to_path_buf(),
            reason: e.to_string(),
        }
    })?;
    std::fs::write(path, bytes).map_err(|source| PersistenceError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    log::info!("saved policy with fitness {fitness:.4} to {}", path.display());
    Ok(())
}

/// Read a policy written by [`save_policy`], returning the network and the
/// fitness it was saved with.
pub fn load_policy(path: &Path) -> Result<(FeedForwardNet, f64), PersistenceError> {
    let bytes = std::fs::read(path).map_err(|source| match source.kind() {
        ErrorKind::NotFound => PersistenceError::NotFound(path.to_path_buf()),
        _ => PersistenceError::Io {
            path: path.to_path_buf(),
            source,
        },
    })?;
    let corrupt = |reason: String| PersistenceError::Corrupt {
        path: path.to_path_buf(),
        reason,
    };

    let (saved, read): (SavedPolicy, usize) =
        bincode::serde::decode_from_slice(&bytes, bincode::config::standard()).map_err(|e| corrupt(e.to_string()))?;
    if read != bytes.len() {
        return Err(corrupt(format!("{} trailing bytes", bytes.len() - read)));
    }
    if saved.format_version != FORMAT_VERSION {
        return Err(corrupt(format!("unsupported format version {}", saved.format_version)));
    }
    if saved.layout_version != LAYOUT_VERSION {
        return Err(corrupt(format!(
            "sensor layout {} does not match {LAYOUT_VERSION}",
            saved.layout_version
        )));
    }
    saved.net.validate().map_err(corrupt)?;
    log::info!("loaded policy with fitness {:.4} from {}", saved.fitness, path.display());
    Ok((saved.net, saved.fitness))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    #[test]
    fn test_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("winner.bin");
        let mut rng = SmallRng::seed_from_u64(1);
        let net = FeedForwardNet::random(&[35, 6, 4], &mut rng).unwrap();

        save_policy(&path, &net, 1.25).unwrap();
        let (loaded, fitness) = load_policy(&path).unwrap();
        assert_eq!(fitness, 1.25);
        let x = vec![0.3; 35];
        assert_eq!(loaded.forward(&x), net.forward(&x));
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nothing.bin");
        assert!(matches!(load_policy(&path), Err(PersistenceError::NotFound(p)) if p == path));
    }

    #[test]
    fn test_garbage_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("garbage.bin");
        std::fs::write(&path, b"not a policy at all").unwrap();
        assert!(matches!(load_policy(&path), Err(PersistenceError::Corrupt { .. })));
    }

    /// Same field order as `SavedPolicy` and the network inside it, without
    /// any shape checks.
    #[derive(Serialize)]
    struct RawLayer {
        inputs: usize,
        outputs: usize,
        weights: Vec<f32>,
        biases: Vec<f32>,
    }

    #[derive(Serialize)]
    struct RawSaved {
        format_version: u32,
        layout_version: u32,
        fitness: f64,
        layers: Vec<RawLayer>,
    }

    fn write_raw(path: &Path, layers: Vec<RawLayer>) {
        let raw = RawSaved {
            format_version: FORMAT_VERSION,
            layout_version: LAYOUT_VERSION,
            fitness: 0.0,
            layers,
        };
        let bytes = bincode::serde::encode_to_vec(&raw, bincode::config::standard()).unwrap();
        std::fs::write(path, bytes).unwrap();
    }

    #[test]
    fn test_malformed_network_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("zero.bin");
        write_raw(
            &path,
            vec![RawLayer {
                inputs: 0,
                outputs: 4,
                weights: vec![],
                biases: vec![0.0; 4],
            }],
        );
        assert!(matches!(load_policy(&path), Err(PersistenceError::Corrupt { .. })));

        let path = dir.path().join("short.bin");
        write_raw(
            &path,
            vec![RawLayer {
                inputs: 35,
                outputs: 4,
                weights: vec![0.1; 7],
                biases: vec![0.0; 4],
            }],
        );
        assert!(matches!(load_policy(&path), Err(PersistenceError::Corrupt { .. })));

        let path = dir.path().join("ok.bin");
        write_raw(
            &path,
            vec![RawLayer {
                inputs: 35,
                outputs: 4,
                weights: vec![0.1; 140],
                biases: vec![0.0; 4],
            }],
        );
        assert!(load_policy(&path).is_ok());
    }

    #[test]
    fn test_version_mismatch_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("old.bin");
        let mut rng = SmallRng::seed_from_u64(2);
        let saved = SavedPolicy {
            format_version: FORMAT_VERSION,
            layout_version: LAYOUT_VERSION + 1,
            fitness: 0.0,
            net: FeedForwardNet::random(&[3, 4], &mut rng).unwrap(),
        };
        let bytes = bincode::serde::encode_to_vec(&saved, bincode::config::standard()).unwrap();
        std::fs::write(&path, bytes).unwrap();
        assert!(matches!(load_policy(&path), Err(PersistenceError::Corrupt { .. })));
    }
}
