//! Geometry and per-frame hand data types.
//!
//! [`RawLandmarkSet`] is what the detector hands back for one hand.
//! [`HandPose`] is the derived, filtered view the rest of the pipeline
//! consumes, and [`HandsFrame`] bundles the poses of one tracker tick.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Landmark indices
// ---------------------------------------------------------------------------

/// Number of landmarks the detector reports per hand.
pub const LANDMARK_COUNT: usize = 21;

pub const WRIST: usize = 0;
pub const THUMB_CMC: usize = 1;
pub const THUMB_MCP: usize = 2;
pub const THUMB_IP: usize = 3;
pub const THUMB_TIP: usize = 4;
pub const INDEX_MCP: usize = 5;
pub const INDEX_PIP: usize = 6;
pub const INDEX_DIP: usize = 7;
pub const INDEX_TIP: usize = 8;
pub const MIDDLE_MCP: usize = 9;
pub const MIDDLE_PIP: usize = 10;
pub const MIDDLE_DIP: usize = 11;
pub const MIDDLE_TIP: usize = 12;
pub const RING_MCP: usize = 13;
pub const RING_PIP: usize = 14;
pub const RING_DIP: usize = 15;
pub const RING_TIP: usize = 16;
pub const PINKY_MCP: usize = 17;
pub const PINKY_PIP: usize = 18;
pub const PINKY_DIP: usize = 19;
pub const PINKY_TIP: usize = 20;

/// Wrist plus the four base knuckles; their mean is the palm center.
pub const PALM_POINTS: [usize; 5] = [WRIST, INDEX_MCP, MIDDLE_MCP, RING_MCP, PINKY_MCP];

/// The four non-thumb fingertips.
pub const FINGERTIPS: [usize; 4] = [INDEX_TIP, MIDDLE_TIP, RING_TIP, PINKY_TIP];

// ---------------------------------------------------------------------------
// Vec2
// ---------------------------------------------------------------------------

/// A point in normalized image space (`[0, 1]` on both axes, y down).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };

    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to `other`.
    pub fn dist(self, other: Vec2) -> f32 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        (dx * dx + dy * dy).sqrt()
    }

    /// Move toward `target` by fraction `a` (`a = 1` snaps).
    pub fn lerp(self, target: Vec2, a: f32) -> Vec2 {
        Vec2 {
            x: self.x + (target.x - self.x) * a,
            y: self.y + (target.y - self.y) * a,
        }
    }

    /// Horizontal flip in normalized space.
    pub fn mirrored(self) -> Vec2 {
        Vec2 {
            x: 1.0 - self.x,
            y: self.y,
        }
    }

    /// Unweighted mean of `points`.  Returns [`Vec2::ZERO`] for an empty slice.
    pub fn mean(points: &[Vec2]) -> Vec2 {
        if points.is_empty() {
            return Vec2::ZERO;
        }
        let (sx, sy) = points
            .iter()
            .fold((0.0_f32, 0.0_f32), |(sx, sy), p| (sx + p.x, sy + p.y));
        let n = points.len() as f32;
        Vec2 {
            x: sx / n,
            y: sy / n,
        }
    }
}

/// Clamp to `[0, 1]`.  NaN maps to 0.
pub fn clamp01(v: f32) -> f32 {
    if v.is_nan() {
        0.0
    } else {
        v.clamp(0.0, 1.0)
    }
}

// ---------------------------------------------------------------------------
// Handedness
// ---------------------------------------------------------------------------

/// Which hand the detector believes it saw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Handedness {
    Left,
    Right,
    #[default]
    Unknown,
}

impl Handedness {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Left => "Left",
            Self::Right => "Right",
            Self::Unknown => "Unknown",
        }
    }
}

impl std::fmt::Display for Handedness {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// RawLandmarkSet
// ---------------------------------------------------------------------------

/// One detected hand exactly as the detector reported it.
#[derive(Debug, Clone, PartialEq)]
pub struct RawLandmarkSet {
    pub landmarks: [Vec2; LANDMARK_COUNT],
    pub handedness: Handedness,
    pub score: f32,
}

impl RawLandmarkSet {
    /// Build from a point slice.  Returns `None` unless exactly
    /// [`LANDMARK_COUNT`] points are supplied.
    pub fn from_points(points: &[Vec2], handedness: Handedness, score: f32) -> Option<Self> {
        let landmarks: [Vec2; LANDMARK_COUNT] = points.try_into().ok()?;
        Some(Self {
            landmarks,
            handedness,
            score,
        })
    }
}

// ---------------------------------------------------------------------------
// HandPose / HandsFrame
// ---------------------------------------------------------------------------

/// Geometric features of one hand after extraction and smoothing.
///
/// `pinch` and `speed` are always within `[0, 1]`.  `open` and `fist` are
/// independent threshold tests; both may be `false` for ambiguous shapes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HandPose {
    pub label: Handedness,
    pub score: f32,
    /// Smoothed landmarks.  `None` in reduced-power mode.
    pub landmarks: Option<[Vec2; LANDMARK_COUNT]>,
    pub center: Vec2,
    pub wrist: Vec2,
    pub pinch: f32,
    pub open: bool,
    pub fist: bool,
    pub speed: f32,
}

/// All hands seen in one tracker tick, in detector order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HandsFrame {
    pub count: usize,
    pub hands: Vec<HandPose>,
}

impl HandsFrame {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_hands(hands: Vec<HandPose>) -> Self {
        Self {
            count: hands.len(),
            hands,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.hands.is_empty()
    }

    /// Drop all hands, keeping the allocation.
    pub fn clear(&mut self) {
        self.hands.clear();
        self.count = 0;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
