// src/error.rs
use thiserror::Error;

/// Typed failures raised while assembling a rig or a mapper.
///
/// Per-frame conditions (missing landmarks, degenerate directions,
/// unresolved bones) are never errors; the mapper recovers from those
/// locally by skipping the affected bone.
#[derive(Debug, Error)]
pub enum RigError {
    #[error("unknown bone name: {0}")]
    UnknownBone(String),

    #[error("reference vector for {bone} is too short to normalize: [{x}, {y}, {z}]")]
    DegenerateReference { bone: &'static str, x: f64, y: f64, z: f64 },
}
