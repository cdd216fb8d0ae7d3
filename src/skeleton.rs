// src/skeleton.rs - bone identities and the armature the mapper writes into
use std::collections::HashMap;

use nalgebra::{UnitQuaternion, Vector3};
use once_cell::sync::Lazy;

use crate::error::RigError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Left,
    Right,
}

impl Side {
    pub const BOTH: [Side; 2] = [Side::Left, Side::Right];

    pub(crate) fn index(self) -> usize {
        match self {
            Side::Left => 0,
            Side::Right => 1,
        }
    }
}

/// Arm chain segments, ordered parent to child.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Segment {
    UpperArm,
    Forearm,
    Hand,
}

impl Segment {
    fn parent(self) -> Option<Segment> {
        match self {
            Segment::UpperArm => None,
            Segment::Forearm => Some(Segment::UpperArm),
            Segment::Hand => Some(Segment::Forearm),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BoneId {
    pub side: Side,
    pub segment: Segment,
}

impl BoneId {
    pub const ALL: [BoneId; 6] = [
        BoneId::new(Side::Right, Segment::UpperArm),
        BoneId::new(Side::Right, Segment::Forearm),
        BoneId::new(Side::Right, Segment::Hand),
        BoneId::new(Side::Left, Segment::UpperArm),
        BoneId::new(Side::Left, Segment::Forearm),
        BoneId::new(Side::Left, Segment::Hand),
    ];

    pub const fn new(side: Side, segment: Segment) -> Self {
        Self { side, segment }
    }

    /// Canonical rig name, matching the bone names found in the skeletal
    /// asset ("upper_armR", "forearmL", ...).
    pub fn name(self) -> &'static str {
        match (self.side, self.segment) {
            (Side::Right, Segment::UpperArm) => "upper_armR",
            (Side::Right, Segment::Forearm) => "forearmR",
            (Side::Right, Segment::Hand) => "handR",
            (Side::Left, Segment::UpperArm) => "upper_armL",
            (Side::Left, Segment::Forearm) => "forearmL",
            (Side::Left, Segment::Hand) => "handL",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        BONE_NAMES.get(name).copied()
    }
}

static BONE_NAMES: Lazy<HashMap<&'static str, BoneId>> = Lazy::new(|| {
    BoneId::ALL.iter().map(|&id| (id.name(), id)).collect()
});

/// A partial local-rotation write. Axes the algorithm does not derive stay
/// `None` and the bone keeps its previous value on that axis.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EulerUpdate {
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub z: Option<f64>,
}

impl EulerUpdate {
    pub fn is_empty(&self) -> bool {
        self.x.is_none() && self.y.is_none() && self.z.is_none()
    }

    pub fn is_finite(&self) -> bool {
        [self.x, self.y, self.z]
            .iter()
            .flatten()
            .all(|v| v.is_finite())
    }
}

/// Write side of a skeletal rig, as narrow as the mapper needs it.
///
/// `world_orientation` must compose the parent chain: the forearm step reads
/// the upper arm's orientation *after* it was written this frame.
pub trait BoneSink {
    /// Applies a partial rotation. Returns false when the bone is not
    /// resolved, in which case nothing was written.
    fn apply(&mut self, bone: BoneId, update: EulerUpdate) -> bool;

    fn local_euler(&self, bone: BoneId) -> Option<Vector3<f64>>;

    fn world_orientation(&self, bone: BoneId) -> Option<UnitQuaternion<f64>>;
}

#[derive(Debug, Clone)]
struct BoneNode {
    parent: Option<BoneId>,
    euler: Vector3<f64>,
}

/// In-crate bone store with the six-bone arm chain layout.
///
/// Bones are resolved by rig name as the skeletal asset loads; an armature
/// with nothing resolved is valid and absorbs every update as a no-op, which
/// is exactly the situation while the external model is still loading.
#[derive(Debug, Clone, Default)]
pub struct Armature {
    bones: HashMap<BoneId, BoneNode>,
}

impl Armature {
    /// An armature with no bones resolved yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// An armature with all six arm bones resolved, in rest pose.
    pub fn humanoid_arms() -> Self {
        let mut armature = Self::new();
        for id in BoneId::ALL {
            armature
                .resolve(id.name())
                .expect("canonical bone names resolve");
        }
        armature
    }

    /// Registers a bone found in the loaded asset. Unknown names are the
    /// asset's extra bones (spine, fingers, ...) and come back as errors the
    /// caller is free to ignore.
    pub fn resolve(&mut self, name: &str) -> Result<BoneId, RigError> {
        let id = BoneId::from_name(name).ok_or_else(|| RigError::UnknownBone(name.to_string()))?;
        self.bones.entry(id).or_insert(BoneNode {
            parent: id.segment.parent().map(|segment| BoneId::new(id.side, segment)),
            euler: Vector3::zeros(),
        });
        Ok(id)
    }

    pub fn is_resolved(&self, bone: BoneId) -> bool {
        self.bones.contains_key(&bone)
    }

    pub fn resolved_count(&self) -> usize {
        self.bones.len()
    }
}

impl BoneSink for Armature {
    fn apply(&mut self, bone: BoneId, update: EulerUpdate) -> bool {
        let Some(node) = self.bones.get_mut(&bone) else {
            return false;
        };
        if let Some(x) = update.x {
            node.euler.x = x;
        }
        if let Some(y) = update.y {
            node.euler.y = y;
        }
        if let Some(z) = update.z {
            node.euler.z = z;
        }
        true
    }

    fn local_euler(&self, bone: BoneId) -> Option<Vector3<f64>> {
        self.bones.get(&bone).map(|node| node.euler)
    }

    fn world_orientation(&self, bone: BoneId) -> Option<UnitQuaternion<f64>> {
        let node = self.bones.get(&bone)?;
        let local = UnitQuaternion::from_euler_angles(node.euler.x, node.euler.y, node.euler.z);
        match node.parent.and_then(|parent| self.world_orientation(parent)) {
            Some(parent_world) => Some(parent_world * local),
            None => Some(local),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::{FRAC_PI_2, FRAC_PI_3};

    #[test]
    fn canonical_names_round_trip() {
        for id in BoneId::ALL {
            assert_eq!(BoneId::from_name(id.name()), Some(id));
        }
        assert_eq!(BoneId::from_name("spine01"), None);
    }

    #[test]
    fn resolve_rejects_unknown_names() {
        let mut armature = Armature::new();
        assert!(matches!(
            armature.resolve("toeL"),
            Err(RigError::UnknownBone(_))
        ));
        assert!(armature.resolve("forearmR").is_ok());
        assert_eq!(armature.resolved_count(), 1);
    }

    #[test]
    fn apply_on_unresolved_bone_is_refused() {
        let mut armature = Armature::new();
        let update = EulerUpdate {
            z: Some(1.0),
            ..Default::default()
        };
        assert!(!armature.apply(BoneId::new(Side::Right, Segment::UpperArm), update));
        assert_eq!(
            armature.local_euler(BoneId::new(Side::Right, Segment::UpperArm)),
            None
        );
    }

    #[test]
    fn partial_update_leaves_other_axes() {
        let mut armature = Armature::humanoid_arms();
        let bone = BoneId::new(Side::Right, Segment::Forearm);
        armature.apply(
            bone,
            EulerUpdate {
                x: Some(0.1),
                y: Some(0.2),
                z: Some(0.3),
            },
        );
        armature.apply(
            bone,
            EulerUpdate {
                y: Some(0.5),
                ..Default::default()
            },
        );
        let euler = armature.local_euler(bone).unwrap();
        assert_eq!(euler.x, 0.1);
        assert_eq!(euler.y, 0.5);
        assert_eq!(euler.z, 0.3);
    }

    #[test]
    fn world_orientation_composes_parent_chain() {
        let mut armature = Armature::humanoid_arms();
        let upper = BoneId::new(Side::Right, Segment::UpperArm);
        let forearm = BoneId::new(Side::Right, Segment::Forearm);
        armature.apply(
            upper,
            EulerUpdate {
                y: Some(FRAC_PI_2),
                ..Default::default()
            },
        );
        armature.apply(
            forearm,
            EulerUpdate {
                x: Some(FRAC_PI_3),
                ..Default::default()
            },
        );

        let expected = UnitQuaternion::from_euler_angles(0.0, FRAC_PI_2, 0.0)
            * UnitQuaternion::from_euler_angles(FRAC_PI_3, 0.0, 0.0);
        let world = armature.world_orientation(forearm).unwrap();
        assert!(world.angle_to(&expected) < 1e-9);
    }

    #[test]
    fn world_orientation_without_parent_is_local() {
        let mut armature = Armature::new();
        armature.resolve("forearmR").unwrap();
        let forearm = BoneId::new(Side::Right, Segment::Forearm);
        armature.apply(
            forearm,
            EulerUpdate {
                x: Some(0.4),
                ..Default::default()
            },
        );
        let world = armature.world_orientation(forearm).unwrap();
        let local = UnitQuaternion::from_euler_angles(0.4, 0.0, 0.0);
        assert!(world.angle_to(&local) < 1e-9);
    }
}
