/// A single detected keypoint. `x` and `y` are normalized to the source
/// frame ([0, 1] each); `z` is a relative depth with no fixed unit.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Landmark {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

/// Pose landmarks come in 33 fixed slots. A slot is `None` when the
/// detector's per-landmark visibility fell below the tracking threshold
/// for that frame.
pub type PoseLandmarks = Vec<Option<Landmark>>;

pub const HAND_LANDMARK_COUNT: usize = 21;

/// Indices into the 33-point pose scheme.
pub mod pose {
    pub const LEFT_SHOULDER: usize = 11;
    pub const RIGHT_SHOULDER: usize = 12;
    pub const LEFT_ELBOW: usize = 13;
    pub const RIGHT_ELBOW: usize = 14;
    pub const LEFT_WRIST: usize = 15;
    pub const RIGHT_WRIST: usize = 16;
    pub const LEFT_HIP: usize = 23;
    pub const RIGHT_HIP: usize = 24;
    pub const LEFT_KNEE: usize = 25;
    pub const RIGHT_KNEE: usize = 26;
    pub const LEFT_ANKLE: usize = 27;
    pub const RIGHT_ANKLE: usize = 28;
    pub const COUNT: usize = 33;
}

/// Hand connector topology for the 21-point scheme: wrist out through each
/// finger, plus the palm arc.
pub const HAND_CONNECTIONS: [(usize, usize); 21] = [
    // Thumb
    (0, 1),
    (1, 2),
    (2, 3),
    (3, 4),
    // Index
    (0, 5),
    (5, 6),
    (6, 7),
    (7, 8),
    // Middle
    (9, 10),
    (10, 11),
    (11, 12),
    // Ring
    (13, 14),
    (14, 15),
    (15, 16),
    // Pinky
    (0, 17),
    (17, 18),
    (18, 19),
    (19, 20),
    // Palm
    (5, 9),
    (9, 13),
    (13, 17),
];

/// Body connector topology over the pose scheme.
pub const POSE_CONNECTIONS: [(usize, usize); 16] = [
    // Arms
    (11, 13),
    (13, 15),
    (12, 14),
    (14, 16),
    // Shoulders and torso
    (11, 12),
    (11, 23),
    (12, 24),
    (23, 24),
    // Legs
    (23, 25),
    (25, 27),
    (24, 26),
    (26, 28),
    // Feet
    (27, 29),
    (29, 31),
    (28, 30),
    (30, 32),
];

/// True only when every index in `required` has a detected entry.
///
/// Detection confidence varies frame to frame, so any joint can drop out.
/// Callers gate a whole body region's angle set on this: all joints
/// present, or none of that region's angles are computed this frame.
pub fn all_present(pose: &[Option<Landmark>], required: &[usize]) -> bool {
    required
        .iter()
        .all(|&i| pose.get(i).map_or(false, |slot| slot.is_some()))
}
