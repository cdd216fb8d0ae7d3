// src/lib.rs
//! Retargets pose-detector landmarks onto a humanoid arm skeleton.
//!
//! One [`PoseMapper::map_pose`] call per detection result turns the frame's
//! shoulder/elbow/wrist landmarks into local rotations for the six arm bones
//! of a [`BoneSink`]. The detector and the renderer stay external; anything
//! that can hand over a [`PoseFrame`] and anything that can take Euler writes
//! will do.
//!
//! ```
//! use pose_rig::{Armature, MapperConfig, PoseMapper, LandmarkSource, SimulatedSource};
//!
//! let mapper = PoseMapper::new(MapperConfig::default()).unwrap();
//! let mut armature = Armature::humanoid_arms();
//! let mut source = SimulatedSource::new();
//!
//! let frame = source.next_frame().unwrap().unwrap();
//! mapper.map_pose(&frame, &mut armature);
//! ```

pub mod error;
pub mod export;
pub mod landmark;
pub mod mapper;
pub mod skeleton;
pub mod source;

pub use error::RigError;
pub use export::RotationExporter;
pub use landmark::{Landmark, LandmarkIndex, PoseFrame, POSE_LANDMARK_COUNT};
pub use mapper::{BoneMode, MapperConfig, PoseMapper};
pub use skeleton::{Armature, BoneId, BoneSink, EulerUpdate, Segment, Side};
pub use source::{JsonlReplaySource, LandmarkSource, SimulatedSource};
