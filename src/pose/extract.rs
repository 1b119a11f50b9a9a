//! Per-hand geometric feature extraction.
//!
//! [`extract`] is a pure function of one [`RawLandmarkSet`].  It produces
//! every [`HandPose`] field except `speed`, which needs frame history and is
//! filled in by the temporal filter.
//!
//! ## Features
//!
//! | Feature | Definition                                                   |
//! |---------|--------------------------------------------------------------|
//! | wrist   | landmark 0                                                   |
//! | center  | mean of landmarks 0, 5, 9, 13, 17                            |
//! | pinch   | `clamp01((0.20 - |thumb tip - index tip|) / 0.13)`          |
//! | open    | mean tip-to-wrist > 1.75 × palm size and pinch < 0.75        |
//! | fist    | mean tip-to-wrist < 1.18 × palm size and pinch < 0.45        |
//!
//! Palm size is the wrist to middle-finger-base distance.

use super::types::{
    clamp01, HandPose, RawLandmarkSet, Vec2, FINGERTIPS, INDEX_TIP, LANDMARK_COUNT, MIDDLE_MCP,
    PALM_POINTS, THUMB_TIP, WRIST,
};

/// Fingertip separation at which pinch reaches 0.
pub const PINCH_FAR: f32 = 0.20;
/// Width of the pinch ramp; pinch is 1 at `PINCH_FAR - PINCH_RANGE` and below.
pub const PINCH_RANGE: f32 = 0.13;

const OPEN_TIP_RATIO: f32 = 1.75;
const OPEN_MAX_PINCH: f32 = 0.75;
const FIST_TIP_RATIO: f32 = 1.18;
const FIST_MAX_PINCH: f32 = 0.45;

/// Pinch strength for a thumb-to-index distance `d`.
pub fn pinch_from_distance(d: f32) -> f32 {
    clamp01((PINCH_FAR - d) / PINCH_RANGE)
}

/// Extract features from one raw hand.
///
/// With `mirror_x` every x coordinate is flipped before anything else is
/// computed.  The returned pose always carries the (possibly mirrored)
/// landmarks and `speed = 0`.
///
/// ```
/// use handpose_control::pose::{extract, Handedness, RawLandmarkSet, Vec2};
///
/// let pts = [Vec2::new(0.5, 0.5); 21];
/// let raw = RawLandmarkSet::from_points(&pts, Handedness::Right, 0.9).unwrap();
/// let pose = extract(&raw, false);
/// assert_eq!(pose.pinch, 1.0); // thumb and index tip coincide
/// assert!(!pose.open);
/// ```
pub fn extract(raw: &RawLandmarkSet, mirror_x: bool) -> HandPose {
    let mut lm: [Vec2; LANDMARK_COUNT] = raw.landmarks;
    if mirror_x {
        for p in lm.iter_mut() {
            *p = p.mirrored();
        }
    }

    let wrist = lm[WRIST];
    let palm: [Vec2; 5] = PALM_POINTS.map(|i| lm[i]);
    let center = Vec2::mean(&palm);
    let palm_size = wrist.dist(lm[MIDDLE_MCP]);

    let pinch = pinch_from_distance(lm[THUMB_TIP].dist(lm[INDEX_TIP]));

    let tip_avg = FINGERTIPS.iter().map(|&i| lm[i].dist(wrist)).sum::<f32>()
        / FINGERTIPS.len() as f32;

    let open = tip_avg > palm_size * OPEN_TIP_RATIO && pinch < OPEN_MAX_PINCH;
    let fist = tip_avg < palm_size * FIST_TIP_RATIO && pinch < FIST_MAX_PINCH;

    HandPose {
        label: raw.handedness,
        score: raw.score,
        landmarks: Some(lm),
        center,
        wrist,
        pinch,
        open,
        fist,
        speed: 0.0,
    }
}

// ---------------------------------------------------------------------------
// Test fixtures
// ---------------------------------------------------------------------------

/// Synthetic hand shapes shared by tests across the crate.
#[cfg(test)]
pub(crate) mod fixtures {
    use super::super::types::*;

    /// A hand centred near `(cx, cy)` with fingertips at `reach` from the
    /// wrist and thumb/index tips `pinch_gap` apart.
    pub fn hand(cx: f32, cy: f32, reach: f32, pinch_gap: f32) -> [Vec2; LANDMARK_COUNT] {
        let mut lm = [Vec2::ZERO; LANDMARK_COUNT];
        let wrist = Vec2::new(cx, cy + 0.05);
        lm[WRIST] = wrist;
        // Base knuckles on a row 0.1 above the wrist, symmetric around cx.
        for (k, &i) in [INDEX_MCP, MIDDLE_MCP, RING_MCP, PINKY_MCP].iter().enumerate() {
            lm[i] = Vec2::new(cx - 0.03 + 0.02 * k as f32, cy - 0.05);
        }
        // Fingertips straight up from the wrist at distance `reach`.
        for (k, &i) in FINGERTIPS.iter().enumerate() {
            lm[i] = Vec2::new(cx - 0.03 + 0.02 * k as f32, wrist.y - reach);
        }
        lm[THUMB_TIP] = Vec2::new(lm[INDEX_TIP].x - pinch_gap, lm[INDEX_TIP].y);
        for i in [THUMB_CMC, THUMB_MCP, THUMB_IP] {
            lm[i] = wrist;
        }
        for i in [INDEX_PIP, INDEX_DIP, MIDDLE_PIP, MIDDLE_DIP, RING_PIP, RING_DIP, PINKY_PIP, PINKY_DIP] {
            lm[i] = Vec2::new(cx, cy);
        }
        lm
    }

    /// Fingers spread well beyond the palm, thumb away from index.
    pub fn open_hand(cx: f32, cy: f32, label: Handedness) -> RawLandmarkSet {
        RawLandmarkSet {
            landmarks: hand(cx, cy, 0.25, 0.25),
            handedness: label,
            score: 0.95,
        }
    }

    /// Fingertips curled back to the palm.
    pub fn fist_hand(cx: f32, cy: f32, label: Handedness) -> RawLandmarkSet {
        RawLandmarkSet {
            landmarks: hand(cx, cy, 0.08, 0.25),
            handedness: label,
            score: 0.95,
        }
    }

    /// Open hand with thumb and index tips `gap` apart.
    pub fn pinching_hand(cx: f32, cy: f32, gap: f32, label: Handedness) -> RawLandmarkSet {
        RawLandmarkSet {
            landmarks: hand(cx, cy, 0.25, gap),
            handedness: label,
            score: 0.95,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
