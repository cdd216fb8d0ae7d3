// src/source.rs - where frames of landmarks come from
use std::io::BufRead;

use anyhow::Result;
use serde::Deserialize;
use tracing::warn;

use crate::landmark::{Landmark, LandmarkIndex, PoseFrame, POSE_LANDMARK_COUNT};

/// Per-frame landmark supplier. A real detector bridge implements this; the
/// crate ships a simulator and an offline replay reader.
pub trait LandmarkSource {
    /// The next frame, or `Ok(None)` once the stream ends. A frame with no
    /// landmarks means "nothing detected" and is a valid value.
    fn next_frame(&mut self) -> Result<Option<PoseFrame>>;
}

/// Deterministic arm-swing generator for demos and tests. No camera, no
/// detector, same schema slots a real detection would fill.
#[derive(Debug, Clone)]
pub struct SimulatedSource {
    time: f64,
    step: f64,
    remaining: Option<usize>,
}

impl SimulatedSource {
    pub fn new() -> Self {
        Self {
            time: 0.0,
            step: 0.033,
            remaining: None,
        }
    }

    /// Stops after `frames` frames instead of running forever.
    pub fn with_frame_limit(frames: usize) -> Self {
        Self {
            remaining: Some(frames),
            ..Self::new()
        }
    }

    /// Seconds of simulated time advanced so far.
    pub fn timestamp(&self) -> f64 {
        self.time
    }
}

impl Default for SimulatedSource {
    fn default() -> Self {
        Self::new()
    }
}

impl LandmarkSource for SimulatedSource {
    fn next_frame(&mut self) -> Result<Option<PoseFrame>> {
        if let Some(remaining) = self.remaining.as_mut() {
            if *remaining == 0 {
                return Ok(None);
            }
            *remaining -= 1;
        }

        let t = self.time;
        self.time += self.step;

        let mut landmarks = vec![None; POSE_LANDMARK_COUNT];
        let mut set = |index: LandmarkIndex, x: f64, y: f64, z: f64| {
            landmarks[index as usize] = Some(Landmark::new(x, y, z));
        };

        set(LandmarkIndex::LeftShoulder, 0.3, 0.4, 0.0);
        set(LandmarkIndex::LeftElbow, 0.35, 0.5 + 0.05 * t.sin(), 0.0);
        set(
            LandmarkIndex::LeftWrist,
            0.4 + 0.1 * (t * 0.5).cos(),
            0.6 + 0.1 * t.sin(),
            0.0,
        );

        set(LandmarkIndex::RightShoulder, 0.7, 0.4, 0.0);
        set(
            LandmarkIndex::RightElbow,
            0.65,
            0.5 + 0.05 * (t + 1.5).sin(),
            0.0,
        );
        set(
            LandmarkIndex::RightWrist,
            0.6 - 0.1 * (t * 0.5 + 1.0).cos(),
            0.6 + 0.1 * (t + 1.5).sin(),
            0.0,
        );

        Ok(Some(PoseFrame::new(landmarks)))
    }
}

#[derive(Debug, Deserialize)]
struct FrameRecord {
    landmarks: Vec<Option<Landmark>>,
}

/// Replays recorded detection sessions: one JSON object per line,
/// `{"landmarks": [{"x": .., "y": .., "z": ..}, null, ...]}`.
///
/// Lines that fail to parse are logged and skipped rather than ending the
/// session; recorded captures routinely carry a truncated final line.
pub struct JsonlReplaySource<R: BufRead> {
    reader: R,
    line: String,
    frames_read: usize,
}

impl<R: BufRead> JsonlReplaySource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line: String::new(),
            frames_read: 0,
        }
    }

    pub fn frames_read(&self) -> usize {
        self.frames_read
    }
}

impl<R: BufRead> LandmarkSource for JsonlReplaySource<R> {
    fn next_frame(&mut self) -> Result<Option<PoseFrame>> {
        loop {
            self.line.clear();
            if self.reader.read_line(&mut self.line)? == 0 {
                return Ok(None);
            }
            let line = self.line.trim();
            if line.is_empty() {
                continue;
            }
            match serde_json::from_str::<FrameRecord>(line) {
                Ok(record) => {
                    self.frames_read += 1;
                    return Ok(Some(PoseFrame::new(record.landmarks)));
                }
                Err(e) => {
                    warn!(error = %e, "skipping malformed replay line");
                }
            }
        }
    }
}
