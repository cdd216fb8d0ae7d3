// src/export.rs - per-session CSV export of the rotations driven onto the rig
use std::fs::File;
use std::path::{Path, PathBuf};

use anyhow::Result;
use chrono::Local;
use csv::Writer;
use serde::Serialize;

use crate::skeleton::{BoneId, BoneSink, Segment, Side};

#[derive(Debug, Serialize)]
struct RotationRecord {
    frame: usize,
    timestamp: f64,

    // Local Euler angles in radians; empty cells are unresolved bones.
    upper_arm_r_x: Option<f64>,
    upper_arm_r_y: Option<f64>,
    upper_arm_r_z: Option<f64>,

    forearm_r_x: Option<f64>,
    forearm_r_y: Option<f64>,
    forearm_r_z: Option<f64>,

    hand_r_x: Option<f64>,
    hand_r_y: Option<f64>,
    hand_r_z: Option<f64>,

    upper_arm_l_x: Option<f64>,
    upper_arm_l_y: Option<f64>,
    upper_arm_l_z: Option<f64>,

    forearm_l_x: Option<f64>,
    forearm_l_y: Option<f64>,
    forearm_l_z: Option<f64>,

    hand_l_x: Option<f64>,
    hand_l_y: Option<f64>,
    hand_l_z: Option<f64>,
}

fn axes(sink: &dyn BoneSink, bone: BoneId) -> (Option<f64>, Option<f64>, Option<f64>) {
    match sink.local_euler(bone) {
        Some(euler) => (Some(euler.x), Some(euler.y), Some(euler.z)),
        None => (None, None, None),
    }
}

/// Buffers one record per mapped frame and writes the session to
/// `<output_dir>/<session_name>/rotations.csv`.
pub struct RotationExporter {
    output_dir: PathBuf,
    session_name: String,
    records: Vec<RotationRecord>,
}

impl RotationExporter {
    pub fn new(output_dir: impl AsRef<Path>, session_name: Option<String>) -> Self {
        let session_name = session_name
            .unwrap_or_else(|| format!("session_{}", Local::now().format("%Y%m%d_%H%M%S")));
        Self {
            output_dir: output_dir.as_ref().to_path_buf(),
            session_name,
            records: Vec::new(),
        }
    }

    /// Snapshots the sink's current local rotations after a mapper pass.
    pub fn add_frame(&mut self, frame: usize, timestamp: f64, sink: &dyn BoneSink) {
        let (upper_arm_r_x, upper_arm_r_y, upper_arm_r_z) =
            axes(sink, BoneId::new(Side::Right, Segment::UpperArm));
        let (forearm_r_x, forearm_r_y, forearm_r_z) =
            axes(sink, BoneId::new(Side::Right, Segment::Forearm));
        let (hand_r_x, hand_r_y, hand_r_z) = axes(sink, BoneId::new(Side::Right, Segment::Hand));
        let (upper_arm_l_x, upper_arm_l_y, upper_arm_l_z) =
            axes(sink, BoneId::new(Side::Left, Segment::UpperArm));
        let (forearm_l_x, forearm_l_y, forearm_l_z) =
            axes(sink, BoneId::new(Side::Left, Segment::Forearm));
        let (hand_l_x, hand_l_y, hand_l_z) = axes(sink, BoneId::new(Side::Left, Segment::Hand));

        self.records.push(RotationRecord {
            frame,
            timestamp,
            upper_arm_r_x,
            upper_arm_r_y,
            upper_arm_r_z,
            forearm_r_x,
            forearm_r_y,
            forearm_r_z,
            hand_r_x,
            hand_r_y,
            hand_r_z,
            upper_arm_l_x,
            upper_arm_l_y,
            upper_arm_l_z,
            forearm_l_x,
            forearm_l_y,
            forearm_l_z,
            hand_l_x,
            hand_l_y,
            hand_l_z,
        });
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn export_csv(&self) -> Result<PathBuf> {
        let csv_path = self
            .output_dir
            .join(&self.session_name)
            .join("rotations.csv");

        if let Some(parent) = csv_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = File::create(&csv_path)?;
        let mut writer = Writer::from_writer(file);
        for record in &self.records {
            writer.serialize(record)?;
        }
        writer.flush()?;
        Ok(csv_path)
    }
}
