// src/mapper.rs - landmark-to-bone-rotation core
use std::path::Path;

use anyhow::{Context, Result};
use nalgebra::{Unit, UnitQuaternion, Vector3};
use serde::Deserialize;
use tracing::trace;

use crate::error::RigError;
use crate::landmark::{LandmarkIndex, PoseFrame};
use crate::skeleton::{BoneId, BoneSink, EulerUpdate, Segment, Side};

/// How a bone's rotation is derived from its landmark pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoneMode {
    /// Minimal quaternion from the rest-pose reference onto the detected
    /// direction, with per-axis clamping.
    Quaternion,
    /// Single in-image `atan2` angle written to Z only. Robust when detector
    /// depth is unreliable.
    Planar,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MapperConfig {
    /// Symmetric clamp applied to every written angle, in degrees.
    #[serde(default = "default_clamp_deg")]
    pub clamp_deg: f64,
    /// Shorter direction vectors than this are treated as missing input.
    #[serde(default = "default_epsilon")]
    pub epsilon: f64,
    #[serde(default = "default_quaternion_mode")]
    pub upper_arm_mode: BoneMode,
    #[serde(default = "default_quaternion_mode")]
    pub forearm_mode: BoneMode,
    #[serde(default = "default_planar_mode")]
    pub hand_mode: BoneMode,
    /// Right-side rest direction of the upper arm in its parent's space.
    /// The left side uses the same vector with X negated.
    #[serde(default = "default_arm_reference")]
    pub upper_arm_reference: [f64; 3],
    /// Right-side rest direction of the forearm.
    #[serde(default = "default_arm_reference")]
    pub forearm_reference: [f64; 3],
}

fn default_clamp_deg() -> f64 {
    180.0
}
fn default_epsilon() -> f64 {
    1e-6
}
fn default_quaternion_mode() -> BoneMode {
    BoneMode::Quaternion
}
fn default_planar_mode() -> BoneMode {
    BoneMode::Planar
}
fn default_arm_reference() -> [f64; 3] {
    [-1.0, -1.0, 0.0]
}

impl Default for MapperConfig {
    fn default() -> Self {
        Self {
            clamp_deg: default_clamp_deg(),
            epsilon: default_epsilon(),
            upper_arm_mode: default_quaternion_mode(),
            forearm_mode: default_quaternion_mode(),
            hand_mode: default_planar_mode(),
            upper_arm_reference: default_arm_reference(),
            forearm_reference: default_arm_reference(),
        }
    }
}

impl MapperConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading mapper config {}", path.display()))?;
        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("parsing mapper config {}", path.display()))?;
        Ok(config)
    }
}

#[derive(Debug, Clone, Copy)]
struct SideRefs {
    upper_arm: Unit<Vector3<f64>>,
    forearm: Unit<Vector3<f64>>,
}

/// Converts one frame of landmarks into local rotations for the six arm
/// bones. Stateless across frames: the only cross-frame coupling is reading
/// orientations already persisted in the sink.
#[derive(Debug, Clone)]
pub struct PoseMapper {
    clamp: f64,
    epsilon: f64,
    upper_arm_mode: BoneMode,
    forearm_mode: BoneMode,
    hand_mode: BoneMode,
    refs: [SideRefs; 2],
}

impl PoseMapper {
    pub fn new(config: MapperConfig) -> Result<Self, RigError> {
        let upper_arm = unit_reference("upper_arm", config.upper_arm_reference, config.epsilon)?;
        let forearm = unit_reference("forearm", config.forearm_reference, config.epsilon)?;

        let right = SideRefs { upper_arm, forearm };
        let left = SideRefs {
            upper_arm: mirror_x(upper_arm),
            forearm: mirror_x(forearm),
        };

        let mut refs = [right; 2];
        refs[Side::Left.index()] = left;
        refs[Side::Right.index()] = right;

        Ok(Self {
            clamp: config.clamp_deg.to_radians(),
            epsilon: config.epsilon,
            upper_arm_mode: config.upper_arm_mode,
            forearm_mode: config.forearm_mode,
            hand_mode: config.hand_mode,
            refs,
        })
    }

    /// Maps the frame onto both arms. Invoked once per detection result;
    /// bones with missing input or no resolved handle keep their previous
    /// rotation.
    pub fn map_pose(&self, frame: &PoseFrame, sink: &mut dyn BoneSink) {
        for side in Side::BOTH {
            self.map_arm(side, frame, sink);
        }
    }

    fn map_arm(&self, side: Side, frame: &PoseFrame, sink: &mut dyn BoneSink) {
        let shoulder = frame.get(LandmarkIndex::shoulder(side));
        let elbow = frame.get(LandmarkIndex::elbow(side));
        let wrist = frame.get(LandmarkIndex::wrist(side));

        // Upper arm first: the forearm basis reads its world orientation.
        if let (Some(shoulder), Some(elbow)) = (shoulder, elbow) {
            let update = self.upper_arm_update(side, shoulder.to_vector(), elbow.to_vector());
            if let Some(update) = update {
                sink.apply(BoneId::new(side, Segment::UpperArm), update);
            }
        } else {
            trace!(?side, "shoulder/elbow missing, upper arm left as-is");
        }

        let (Some(elbow), Some(wrist)) = (elbow, wrist) else {
            trace!(?side, "elbow/wrist missing, forearm and hand left as-is");
            return;
        };
        let (elbow, wrist) = (elbow.to_vector(), wrist.to_vector());

        let update = match self.forearm_mode {
            BoneMode::Quaternion => self.chain_update(
                side,
                elbow,
                wrist,
                BoneId::new(side, Segment::UpperArm),
                &*sink,
            ),
            BoneMode::Planar => self.planar_update(elbow, wrist),
        };
        if let Some(update) = update {
            sink.apply(BoneId::new(side, Segment::Forearm), update);
        }

        let update = match self.hand_mode {
            BoneMode::Quaternion => self.chain_update(
                side,
                elbow,
                wrist,
                BoneId::new(side, Segment::Forearm),
                &*sink,
            ),
            BoneMode::Planar => self.planar_update(elbow, wrist),
        };
        if let Some(update) = update {
            sink.apply(BoneId::new(side, Segment::Hand), update);
        }
    }

    fn upper_arm_update(
        &self,
        side: Side,
        shoulder: Vector3<f64>,
        elbow: Vector3<f64>,
    ) -> Option<EulerUpdate> {
        match self.upper_arm_mode {
            BoneMode::Planar => self.planar_update(shoulder, elbow),
            BoneMode::Quaternion => {
                let direction = Unit::try_new(elbow - shoulder, self.epsilon)?;
                let reference = self.refs[side.index()].upper_arm;
                let rotation = UnitQuaternion::rotation_between_axis(&reference, &direction)?;
                let (_, pitch, yaw) = rotation.euler_angles();
                // Z is negated to bridge detector handedness into bone-local
                // space; X is not derived from a single direction and stays
                // whatever the bone had.
                let update = EulerUpdate {
                    x: None,
                    y: Some(clamp_angle(pitch, self.clamp)),
                    z: Some(-clamp_angle(yaw, self.clamp)),
                };
                update.is_finite().then_some(update)
            }
        }
    }

    /// Child-bone rotation relative to the parent written earlier in the same
    /// invocation. Z is left alone so the child never fights the parent's
    /// twist.
    fn chain_update(
        &self,
        side: Side,
        elbow: Vector3<f64>,
        wrist: Vector3<f64>,
        parent: BoneId,
        sink: &dyn BoneSink,
    ) -> Option<EulerUpdate> {
        let direction = Unit::try_new(wrist - elbow, self.epsilon)?;
        let parent_world = sink.world_orientation(parent)?;
        let rest = self.refs[side.index()].forearm;
        let reference = Unit::new_normalize(parent_world * rest.into_inner());
        let rotation = UnitQuaternion::rotation_between_axis(&reference, &direction)?;
        let (roll, pitch, _) = rotation.euler_angles();
        let update = EulerUpdate {
            x: Some(clamp_angle(roll, self.clamp)),
            y: Some(clamp_angle(pitch, self.clamp)),
            z: None,
        };
        update.is_finite().then_some(update)
    }

    /// Depth-free fallback: one image-plane angle onto Z.
    fn planar_update(&self, from: Vector3<f64>, to: Vector3<f64>) -> Option<EulerUpdate> {
        let dx = to.x - from.x;
        let dy = to.y - from.y;
        if dx.hypot(dy) <= self.epsilon {
            return None;
        }
        let angle = dy.atan2(dx);
        let update = EulerUpdate {
            x: None,
            y: None,
            z: Some(clamp_angle(angle, self.clamp)),
        };
        update.is_finite().then_some(update)
    }
}

fn clamp_angle(angle: f64, limit: f64) -> f64 {
    angle.clamp(-limit, limit)
}

fn mirror_x(v: Unit<Vector3<f64>>) -> Unit<Vector3<f64>> {
    Unit::new_normalize(Vector3::new(-v.x, v.y, v.z))
}

fn unit_reference(
    bone: &'static str,
    raw: [f64; 3],
    epsilon: f64,
) -> Result<Unit<Vector3<f64>>, RigError> {
    Unit::try_new(Vector3::new(raw[0], raw[1], raw[2]), epsilon).ok_or(
        RigError::DegenerateReference {
            bone,
            x: raw[0],
            y: raw[1],
            z: raw[2],
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::landmark::{Landmark, POSE_LANDMARK_COUNT};
    use crate::skeleton::Armature;
    use std::f64::consts::{FRAC_PI_2, FRAC_PI_6, PI};

    fn frame_with(slots: &[(LandmarkIndex, (f64, f64, f64))]) -> PoseFrame {
        let mut landmarks = vec![None; POSE_LANDMARK_COUNT];
        for &(index, (x, y, z)) in slots {
            landmarks[index as usize] = Some(Landmark::new(x, y, z));
        }
        PoseFrame::new(landmarks)
    }

    fn right_arm_frame(
        shoulder: (f64, f64, f64),
        elbow: (f64, f64, f64),
        wrist: (f64, f64, f64),
    ) -> PoseFrame {
        frame_with(&[
            (LandmarkIndex::RightShoulder, shoulder),
            (LandmarkIndex::RightElbow, elbow),
            (LandmarkIndex::RightWrist, wrist),
        ])
    }

    fn mapper() -> PoseMapper {
        PoseMapper::new(MapperConfig::default()).unwrap()
    }

    /// Paints every resolved bone with a sentinel so skipped updates are
    /// distinguishable from identity writes.
    fn paint(armature: &mut Armature, value: f64) {
        for id in BoneId::ALL {
            armature.apply(
                id,
                EulerUpdate {
                    x: Some(value),
                    y: Some(value),
                    z: Some(value),
                },
            );
        }
    }

    #[test]
    fn coincident_shoulder_and_elbow_write_nothing() {
        let mut armature = Armature::humanoid_arms();
        paint(&mut armature, 9.9);
        let frame = right_arm_frame((0.5, 0.5, 0.0), (0.5, 0.5, 0.0), (0.5, 0.5, 0.0));
        mapper().map_pose(&frame, &mut armature);
        for id in BoneId::ALL {
            let euler = armature.local_euler(id).unwrap();
            assert_eq!(euler, Vector3::new(9.9, 9.9, 9.9), "{} was written", id.name());
            assert!(euler.iter().all(|v| v.is_finite()));
        }
    }

    #[test]
    fn rest_pose_direction_is_identity() {
        let mut armature = Armature::humanoid_arms();
        // Shoulder-to-elbow along the right rest reference (-1, -1, 0).
        let frame = right_arm_frame((0.8, 0.8, 0.0), (0.5, 0.5, 0.0), (0.2, 0.2, 0.0));
        mapper().map_pose(&frame, &mut armature);
        let euler = armature
            .local_euler(BoneId::new(Side::Right, Segment::UpperArm))
            .unwrap();
        assert!(euler.y.abs() < 1e-9);
        assert!(euler.z.abs() < 1e-9);
    }

    #[test]
    fn in_plane_swing_lands_on_z_with_flipped_sign() {
        let mut armature = Armature::humanoid_arms();
        // Direction (-1, 1, 0) is the rest reference swung -90 deg about Z,
        // so the raw yaw is -pi/2 and the written Z must be +pi/2.
        let frame = right_arm_frame((0.7, 0.3, 0.0), (0.3, 0.7, 0.0), (0.1, 0.9, 0.0));
        mapper().map_pose(&frame, &mut armature);
        let euler = armature
            .local_euler(BoneId::new(Side::Right, Segment::UpperArm))
            .unwrap();
        assert!(euler.y.abs() < 1e-9, "pitch expected 0, got {}", euler.y);
        assert!(
            (euler.z - FRAC_PI_2).abs() < 1e-9,
            "expected +pi/2, got {}",
            euler.z
        );
        assert_eq!(euler.x, 0.0);
    }

    #[test]
    fn mirrored_landmarks_mirror_the_rotation() {
        let shoulder = (0.6, 0.3, 0.2);
        let elbow = (0.8, 0.6, -0.1);

        let mut right = Armature::humanoid_arms();
        mapper().map_pose(
            &frame_with(&[
                (LandmarkIndex::RightShoulder, shoulder),
                (LandmarkIndex::RightElbow, elbow),
            ]),
            &mut right,
        );

        let mut left = Armature::humanoid_arms();
        mapper().map_pose(
            &frame_with(&[
                (LandmarkIndex::LeftShoulder, (-shoulder.0, shoulder.1, shoulder.2)),
                (LandmarkIndex::LeftElbow, (-elbow.0, elbow.1, elbow.2)),
            ]),
            &mut left,
        );

        let r = right
            .local_euler(BoneId::new(Side::Right, Segment::UpperArm))
            .unwrap();
        let l = left
            .local_euler(BoneId::new(Side::Left, Segment::UpperArm))
            .unwrap();
        assert!((l.y + r.y).abs() < 1e-9, "pitch not mirrored: {} vs {}", l.y, r.y);
        assert!((l.z + r.z).abs() < 1e-9, "yaw not mirrored: {} vs {}", l.z, r.z);
    }

    #[test]
    fn configured_clamp_caps_the_swing() {
        let config = MapperConfig {
            clamp_deg: 30.0,
            ..Default::default()
        };
        let mapper = PoseMapper::new(config).unwrap();
        let mut armature = Armature::humanoid_arms();
        // Raw yaw is -pi/2, well past the 30 deg bound.
        let frame = right_arm_frame((0.7, 0.3, 0.0), (0.3, 0.7, 0.0), (0.1, 0.9, 0.0));
        mapper.map_pose(&frame, &mut armature);
        let euler = armature
            .local_euler(BoneId::new(Side::Right, Segment::UpperArm))
            .unwrap();
        assert!(
            (euler.z - FRAC_PI_6).abs() < 1e-9,
            "expected clamp at +pi/6, got {}",
            euler.z
        );
    }

    #[test]
    fn clamp_angle_caps_out_of_range_input() {
        let raw = 200.0_f64.to_radians();
        assert_eq!(clamp_angle(raw, PI), PI);
        assert_eq!(clamp_angle(-raw, PI), -PI);
        assert_eq!(clamp_angle(0.5, PI), 0.5);
    }

    #[test]
    fn forearm_tracks_current_frame_upper_arm() {
        let elbow = (0.5, 0.5, 0.0);
        let wrist = (0.5, 0.8, 0.1);

        let mut a = Armature::humanoid_arms();
        mapper().map_pose(&right_arm_frame((0.8, 0.8, 0.0), elbow, wrist), &mut a);
        let mut b = Armature::humanoid_arms();
        mapper().map_pose(&right_arm_frame((0.3, 0.1, 0.15), elbow, wrist), &mut b);

        let forearm = BoneId::new(Side::Right, Segment::Forearm);
        let fa = a.local_euler(forearm).unwrap();
        let fb = b.local_euler(forearm).unwrap();
        // Only the shoulder moved; the forearm basis must follow the parent.
        assert!(
            (fa.x - fb.x).abs() > 1e-6 || (fa.y - fb.y).abs() > 1e-6,
            "forearm ignored the upper arm update: {:?} vs {:?}",
            fa,
            fb
        );
    }

    #[test]
    fn forearm_keeps_its_z_twist() {
        let mut armature = Armature::humanoid_arms();
        let forearm = BoneId::new(Side::Right, Segment::Forearm);
        armature.apply(
            forearm,
            EulerUpdate {
                z: Some(0.321),
                ..Default::default()
            },
        );
        let frame = right_arm_frame((0.7, 0.3, 0.0), (0.5, 0.5, 0.1), (0.4, 0.8, 0.0));
        mapper().map_pose(&frame, &mut armature);
        let euler = armature.local_euler(forearm).unwrap();
        assert_eq!(euler.z, 0.321);
    }

    #[test]
    fn hand_defaults_to_planar_angle() {
        let mut armature = Armature::humanoid_arms();
        let frame = right_arm_frame((0.7, 0.3, 0.0), (0.2, 0.2, 0.0), (0.5, 0.6, 0.0));
        mapper().map_pose(&frame, &mut armature);
        let euler = armature
            .local_euler(BoneId::new(Side::Right, Segment::Hand))
            .unwrap();
        let expected = 0.4_f64.atan2(0.3);
        assert!((euler.z - expected).abs() < 1e-9);
        assert_eq!(euler.x, 0.0);
        assert_eq!(euler.y, 0.0);
    }

    #[test]
    fn missing_elbow_skips_the_whole_arm() {
        let mut armature = Armature::humanoid_arms();
        paint(&mut armature, 7.7);
        let frame = frame_with(&[
            (LandmarkIndex::RightShoulder, (0.7, 0.3, 0.0)),
            (LandmarkIndex::RightWrist, (0.4, 0.8, 0.0)),
        ]);
        mapper().map_pose(&frame, &mut armature);
        for segment in [Segment::UpperArm, Segment::Forearm, Segment::Hand] {
            let euler = armature
                .local_euler(BoneId::new(Side::Right, segment))
                .unwrap();
            assert_eq!(euler, Vector3::new(7.7, 7.7, 7.7));
        }
    }

    #[test]
    fn empty_frame_is_a_no_op() {
        let mut armature = Armature::humanoid_arms();
        paint(&mut armature, 1.1);
        mapper().map_pose(&PoseFrame::empty(), &mut armature);
        for id in BoneId::ALL {
            assert_eq!(
                armature.local_euler(id).unwrap(),
                Vector3::new(1.1, 1.1, 1.1)
            );
        }
    }

    #[test]
    fn unresolved_armature_is_tolerated() {
        let mut armature = Armature::new();
        let frame = right_arm_frame((0.7, 0.3, 0.0), (0.5, 0.5, 0.0), (0.4, 0.8, 0.0));
        mapper().map_pose(&frame, &mut armature);
        assert_eq!(armature.resolved_count(), 0);
    }

    #[test]
    fn degenerate_reference_is_rejected_at_build() {
        let config = MapperConfig {
            upper_arm_reference: [0.0, 0.0, 0.0],
            ..Default::default()
        };
        assert!(matches!(
            PoseMapper::new(config),
            Err(RigError::DegenerateReference { bone: "upper_arm", .. })
        ));
    }

    #[test]
    fn config_defaults_survive_partial_json() {
        let config: MapperConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.clamp_deg, 180.0);
        assert_eq!(config.hand_mode, BoneMode::Planar);

        let config: MapperConfig =
            serde_json::from_str(r#"{"clamp_deg": 45.0, "hand_mode": "quaternion"}"#).unwrap();
        assert_eq!(config.clamp_deg, 45.0);
        assert_eq!(config.hand_mode, BoneMode::Quaternion);
        assert_eq!(config.upper_arm_mode, BoneMode::Quaternion);
    }
}
