// src/landmark.rs - detector-space landmark types and the pose schema
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::skeleton::Side;

/// Number of landmarks in a full pose detection result.
pub const POSE_LANDMARK_COUNT: usize = 33;

/// A single detected keypoint in normalized detector space.
///
/// `x` and `y` are in `[0, 1]` relative to the image; `z` is relative depth
/// with no fixed unit. Confidence is not carried: the retargeting math never
/// consumes it, and bridges that have one simply drop it.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Landmark {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn to_vector(self) -> Vector3<f64> {
        Vector3::new(self.x, self.y, self.z)
    }

    /// Pixel coordinates for overlay drawing.
    pub fn to_pixel(self, width: u32, height: u32) -> (i32, i32) {
        let px = (self.x * width as f64) as i32;
        let py = (self.y * height as f64) as i32;
        (px, py)
    }
}

/// Pose-schema indices consumed by the arm mapper.
///
/// The detector emits 33 landmarks per frame; only the shoulder/elbow/wrist
/// slots are addressed here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(usize)]
pub enum LandmarkIndex {
    LeftShoulder = 11,
    RightShoulder = 12,
    LeftElbow = 13,
    RightElbow = 14,
    LeftWrist = 15,
    RightWrist = 16,
}

impl LandmarkIndex {
    pub fn shoulder(side: Side) -> Self {
        match side {
            Side::Left => Self::LeftShoulder,
            Side::Right => Self::RightShoulder,
        }
    }

    pub fn elbow(side: Side) -> Self {
        match side {
            Side::Left => Self::LeftElbow,
            Side::Right => Self::RightElbow,
        }
    }

    pub fn wrist(side: Side) -> Self {
        match side {
            Side::Left => Self::LeftWrist,
            Side::Right => Self::RightWrist,
        }
    }
}

/// One frame of detection output. Lives for a single mapper invocation.
///
/// Slots may be `None` when the detector dropped a landmark; a frame shorter
/// than the schema (or empty, for "no detection") is valid and reads as
/// all-missing past its end.
#[derive(Debug, Clone, Default)]
pub struct PoseFrame {
    landmarks: Vec<Option<Landmark>>,
}

impl PoseFrame {
    pub fn new(landmarks: Vec<Option<Landmark>>) -> Self {
        Self { landmarks }
    }

    pub fn from_points(points: Vec<Landmark>) -> Self {
        Self {
            landmarks: points.into_iter().map(Some).collect(),
        }
    }

    /// An empty frame, i.e. "no detection this frame".
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn get(&self, index: LandmarkIndex) -> Option<Landmark> {
        self.landmarks.get(index as usize).copied().flatten()
    }

    pub fn len(&self) -> usize {
        self.landmarks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.landmarks.is_empty()
    }
}
