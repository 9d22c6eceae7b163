//! Joint angle computation and the label color policy.
//!
//! Angles are taken between 3-component direction vectors via the dot
//! product and arccosine. Degenerate input (a zero-length vector) yields
//! NaN rather than an error; callers check the reading before rendering.

use crate::landmarks::{self, pose, Landmark};
use image::Rgb;

pub const NORMAL_COLOR: Rgb<u8> = Rgb([255, 255, 255]);
pub const WARN_COLOR: Rgb<u8> = Rgb([255, 120, 0]);

/// Threshold above which a reading is rendered in the warning color.
const WARN_DEGREES: f32 = 90.0;

/// Angle in degrees between two direction vectors.
///
/// Returns NaN when either vector has zero magnitude. The cosine ratio is
/// clamped to [-1, 1] before `acos`, since floating-point drift on nearly
/// parallel vectors can push it just outside the domain.
pub fn angle_between(v1: [f32; 3], v2: [f32; 3]) -> f32 {
    let dot = v1[0] * v2[0] + v1[1] * v2[1] + v1[2] * v2[2];
    let m1 = (v1[0] * v1[0] + v1[1] * v1[1] + v1[2] * v1[2]).sqrt();
    let m2 = (v2[0] * v2[0] + v2[1] * v2[1] + v2[2] * v2[2]).sqrt();
    if m1 == 0.0 || m2 == 0.0 {
        return f32::NAN;
    }
    let ratio = (dot / (m1 * m2)).clamp(-1.0, 1.0);
    ratio.acos().to_degrees()
}

/// Angle at vertex `b` from the direction chain `a -> b -> c`, i.e. between
/// the vectors `b - a` and `c - b`. A straight chain reads 0°, a full
/// reversal 180°.
pub fn joint_angle(a: Landmark, b: Landmark, c: Landmark) -> f32 {
    angle_between(
        [b.x - a.x, b.y - a.y, b.z - a.z],
        [c.x - b.x, c.y - b.y, c.z - b.z],
    )
}

/// A derived scalar reading plus the anchor landmark's normalized 2D
/// position, used for label placement.
#[derive(Debug, Clone, Copy)]
pub struct AngleReading {
    pub label: &'static str,
    pub degrees: f32,
    pub anchor: (f32, f32),
}

/// Which vector pair a joint measures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AngleForm {
    /// Direction chain `b - a` vs `c - b`; straight limbs read 0°.
    Chain,
    /// Both vectors rooted at the vertex: `a - b` vs `c - b`.
    Vertex,
}

/// One named joint angle: the three contributing pose indices (vertex in
/// the middle) and how to combine them. The reading anchors at the vertex.
#[derive(Debug, Clone, Copy)]
pub struct JointSpec {
    pub label: &'static str,
    pub points: (usize, usize, usize),
    pub form: AngleForm,
}

impl JointSpec {
    /// Measure this joint against the frame's pose landmarks. `None` when
    /// any contributing landmark is absent.
    pub fn measure(&self, landmarks: &[Option<Landmark>]) -> Option<AngleReading> {
        let (ia, ib, ic) = self.points;
        let a = (*landmarks.get(ia)?)?;
        let b = (*landmarks.get(ib)?)?;
        let c = (*landmarks.get(ic)?)?;
        let degrees = match self.form {
            AngleForm::Chain => joint_angle(a, b, c),
            AngleForm::Vertex => angle_between(
                [a.x - b.x, a.y - b.y, a.z - b.z],
                [c.x - b.x, c.y - b.y, c.z - b.z],
            ),
        };
        Some(AngleReading {
            label: self.label,
            degrees,
            anchor: (b.x, b.y),
        })
    }
}

/// A body region's angle set, gated as a unit: every required index must
/// be present or none of the region's angles are measured that frame.
#[derive(Debug, Clone, Copy)]
pub struct BodyRegion {
    pub name: &'static str,
    pub required: &'static [usize],
    pub joints: &'static [JointSpec],
}

pub const BODY_REGIONS: [BodyRegion; 4] = [
    BodyRegion {
        name: "left arm",
        required: &[
            pose::LEFT_SHOULDER,
            pose::LEFT_ELBOW,
            pose::LEFT_WRIST,
            pose::LEFT_HIP,
        ],
        joints: &[
            JointSpec {
                label: "L.elbow",
                points: (pose::LEFT_SHOULDER, pose::LEFT_ELBOW, pose::LEFT_WRIST),
                form: AngleForm::Chain,
            },
            JointSpec {
                label: "L.shoulder",
                points: (pose::LEFT_ELBOW, pose::LEFT_SHOULDER, pose::LEFT_HIP),
                form: AngleForm::Vertex,
            },
        ],
    },
    BodyRegion {
        name: "right arm",
        required: &[
            pose::RIGHT_SHOULDER,
            pose::RIGHT_ELBOW,
            pose::RIGHT_WRIST,
            pose::RIGHT_HIP,
        ],
        joints: &[
            JointSpec {
                label: "R.elbow",
                points: (pose::RIGHT_SHOULDER, pose::RIGHT_ELBOW, pose::RIGHT_WRIST),
                form: AngleForm::Chain,
            },
            JointSpec {
                label: "R.shoulder",
                points: (pose::RIGHT_ELBOW, pose::RIGHT_SHOULDER, pose::RIGHT_HIP),
                form: AngleForm::Vertex,
            },
        ],
    },
    BodyRegion {
        name: "left leg",
        required: &[pose::LEFT_HIP, pose::LEFT_KNEE, pose::LEFT_ANKLE],
        joints: &[JointSpec {
            label: "L.knee",
            points: (pose::LEFT_HIP, pose::LEFT_KNEE, pose::LEFT_ANKLE),
            form: AngleForm::Chain,
        }],
    },
    BodyRegion {
        name: "right leg",
        required: &[pose::RIGHT_HIP, pose::RIGHT_KNEE, pose::RIGHT_ANKLE],
        joints: &[JointSpec {
            label: "R.knee",
            points: (pose::RIGHT_HIP, pose::RIGHT_KNEE, pose::RIGHT_ANKLE),
            form: AngleForm::Chain,
        }],
    },
];

/// Measure every angle belonging to regions whose full joint set was
/// detected this frame. Regions with any missing joint contribute nothing.
pub fn measure_regions(pose: &[Option<Landmark>]) -> Vec<AngleReading> {
    let mut readings = Vec::new();
    for region in &BODY_REGIONS {
        if !landmarks::all_present(pose, region.required) {
            continue;
        }
        for joint in region.joints {
            if let Some(reading) = joint.measure(pose) {
                readings.push(reading);
            }
        }
    }
    readings
}

/// Fixed display rule: readings past 90° get the warning color.
pub fn label_color(degrees: f32) -> Rgb<u8> {
    if degrees > WARN_DEGREES {
        WARN_COLOR
    } else {
        NORMAL_COLOR
    }
}
