//! Adaptive exponential smoothing of per-hand features.
//!
//! Each hand identity owns one [`HandTrack`] slot holding its last smoothed
//! center, wrist, pinch and landmarks plus its last raw center.  Slots are
//! created on first sight, updated in place while the hand stays visible and
//! dropped on the first tick it is missing.  There is no grace period: a
//! hand that reappears starts cold.
//!
//! ## Smoothing
//!
//! ```text
//! raw_speed = clamp01(|raw - prev_raw| / dt / 1.3)
//! tau       = max(0.02, min(base, base / (1 + raw_speed * 6)))
//! a         = 1 - exp(-dt / tau)          (1 on a jump > 0.09 or raw_speed > 0.85)
//! value'    = value + (raw - value) * a
//! speed     = clamp01(|center' - center| / dt / 1.3)
//! ```

use std::collections::HashMap;

use crate::pose::{clamp01, Handedness, HandPose, Vec2, LANDMARK_COUNT};

/// Default upper bound on the smoothing time constant (seconds).
pub const DEFAULT_BASE_TAU: f32 = 0.10;

const MIN_TAU: f32 = 0.02;
const SPEED_TAU_GAIN: f32 = 6.0;
const SNAP_JUMP: f32 = 0.09;
const SNAP_SPEED: f32 = 0.85;
/// Normalized units per second that map to `speed = 1`.
const SPEED_FULL_SCALE: f32 = 1.3;
const MIN_DT: f32 = 1e-6;

// ---------------------------------------------------------------------------
// HandKey
// ---------------------------------------------------------------------------

/// Per-frame hand identity: detector label plus position in the detector
/// output.  Displays as `"<label>:<index>"`.
///
/// Identity is re-derived every frame, so a handedness flip or a reorder
/// makes the filter restart cold for that hand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandKey {
    pub label: Handedness,
    pub index: usize,
}

impl std::fmt::Display for HandKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.label, self.index)
    }
}

// ---------------------------------------------------------------------------
// HandTrack
// ---------------------------------------------------------------------------

/// Smoothed state of one hand identity.  The landmark buffer is reused
/// across frames.
#[derive(Debug, Clone)]
struct HandTrack {
    center: Vec2,
    wrist: Vec2,
    pinch: f32,
    raw_center: Vec2,
    landmarks: [Vec2; LANDMARK_COUNT],
    has_landmarks: bool,
    generation: u64,
}

impl HandTrack {
    fn cold(pose: &HandPose, generation: u64) -> Self {
        let (landmarks, has_landmarks) = match pose.landmarks {
            Some(lm) => (lm, true),
            None => ([Vec2::ZERO; LANDMARK_COUNT], false),
        };
        Self {
            center: pose.center,
            wrist: pose.wrist,
            pinch: pose.pinch,
            raw_center: pose.center,
            landmarks,
            has_landmarks,
            generation,
        }
    }
}

fn tau(base_tau: f32, speed01: f32) -> f32 {
    (base_tau / (1.0 + speed01 * SPEED_TAU_GAIN))
        .min(base_tau)
        .max(MIN_TAU)
}

fn blend(base_tau: f32, dt: f32, speed01: f32, jump: f32) -> f32 {
    if jump > SNAP_JUMP || speed01 > SNAP_SPEED {
        return 1.0;
    }
    1.0 - (-dt.max(0.0) / tau(base_tau, speed01)).exp()
}

/// Raw-motion speed estimate in `[0, 1]`.
fn normalized_speed(from: Vec2, to: Vec2, dt: f32) -> f32 {
    clamp01(from.dist(to) / dt.max(MIN_DT) / SPEED_FULL_SCALE)
}

// ---------------------------------------------------------------------------
// TemporalFilter
// ---------------------------------------------------------------------------

/// Keyed smoothing of hand poses.
pub struct TemporalFilter {
    base_tau: f32,
    tracks: HashMap<HandKey, HandTrack>,
    generation: u64,
}

impl TemporalFilter {
    pub fn new(base_tau: f32) -> Self {
        Self {
            base_tau: base_tau.max(MIN_TAU),
            tracks: HashMap::new(),
            generation: 0,
        }
    }

    /// Smoothing time constant for a given raw speed.
    pub fn tau_for(&self, speed01: f32) -> f32 {
        tau(self.base_tau, speed01)
    }

    /// Blend factor for one step.
    pub fn alpha(&self, dt: f32, speed01: f32, jump: f32) -> f32 {
        blend(self.base_tau, dt, speed01, jump)
    }

    /// Smooth `poses` in place.
    ///
    /// `poses` is one detector frame in detector order; each pose's `center`,
    /// `wrist`, `pinch`, `speed` and (when `keep_landmarks`) `landmarks` are
    /// overwritten with filtered values.  Identities not present in `poses`
    /// are purged before returning.
    pub fn apply(&mut self, poses: &mut [HandPose], dt: f32, keep_landmarks: bool) {
        self.generation = self.generation.wrapping_add(1);
        let generation = self.generation;
        let base_tau = self.base_tau;

        for (index, pose) in poses.iter_mut().enumerate() {
            let key = HandKey {
                label: pose.label,
                index,
            };

            match self.tracks.get_mut(&key) {
                None => {
                    let track = HandTrack::cold(pose, generation);
                    pose.speed = 0.0;
                    self.tracks.insert(key, track);
                }
                Some(track) => {
                    let raw_center = pose.center;
                    let jump = track.raw_center.dist(raw_center);
                    let raw_speed = normalized_speed(track.raw_center, raw_center, dt);
                    let a = blend(base_tau, dt, raw_speed, jump);

                    let prev_center = track.center;
                    track.center = track.center.lerp(raw_center, a);
                    track.wrist = track.wrist.lerp(pose.wrist, a);
                    track.pinch = clamp01(track.pinch + (pose.pinch - track.pinch) * a);
                    track.raw_center = raw_center;
                    track.generation = generation;

                    if let Some(raw_lm) = pose.landmarks.as_ref() {
                        if track.has_landmarks {
                            for (s, r) in track.landmarks.iter_mut().zip(raw_lm.iter()) {
                                *s = s.lerp(*r, a);
                            }
                        } else {
                            track.landmarks = *raw_lm;
                            track.has_landmarks = true;
                        }
                    }

                    pose.center = track.center;
                    pose.wrist = track.wrist;
                    pose.pinch = track.pinch;
                    pose.speed = normalized_speed(prev_center, track.center, dt);
                    if pose.landmarks.is_some() {
                        pose.landmarks = Some(track.landmarks);
                    }
                }
            }

            if !keep_landmarks {
                pose.landmarks = None;
            }
        }

        self.tracks.retain(|_, t| t.generation == generation);
    }

    /// Drop every track.
    pub fn clear(&mut self) {
        self.tracks.clear();
    }

    /// Number of hand identities currently tracked.
    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// Whether `key` currently has filter state.
    pub fn contains(&self, key: &HandKey) -> bool {
        self.tracks.contains_key(key)
    }
}

impl Default for TemporalFilter {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_TAU)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pose::extract::fixtures::open_hand;
    use crate::pose::extract;

    fn pose_at(x: f32, y: f32, label: Handedness) -> HandPose {
        let mut p = extract(&open_hand(0.5, 0.5, label), false);
        p.center = Vec2::new(x, y);
        p.wrist = Vec2::new(x, y + 0.05);
        p
    }

    #[test]
    fn key_display_format() {
        let k = HandKey {
            label: Handedness::Left,
            index: 1,
        };
        assert_eq!(k.to_string(), "Left:1");
    }

    #[test]
    fn first_sighting_is_cold_start() {
        let mut f = TemporalFilter::default();
        let mut frame = vec![pose_at(0.3, 0.4, Handedness::Right)];
        f.apply(&mut frame, 1.0 / 30.0, true);
        assert_eq!(frame[0].center, Vec2::new(0.3, 0.4));
        assert_eq!(frame[0].speed, 0.0);
        assert_eq!(f.len(), 1);
    }

    #[test]
    fn tau_shrinks_with_speed_and_respects_floor() {
        let f = TemporalFilter::new(0.1);
        assert!((f.tau_for(0.0) - 0.1).abs() < 1e-6);
        assert!(f.tau_for(0.5) < f.tau_for(0.1));
        assert!(f.tau_for(1.0) >= MIN_TAU);
        let tight = TemporalFilter::new(0.03);
        assert!((tight.tau_for(1.0) - MIN_TAU).abs() < 1e-6);
    }

    #[test]
    fn alpha_snaps_on_jump_or_speed() {
        let f = TemporalFilter::default();
        assert_eq!(f.alpha(0.01, 0.0, 0.1), 1.0);
        assert_eq!(f.alpha(0.01, 0.9, 0.0), 1.0);
        let a = f.alpha(0.01, 0.0, 0.0);
        assert!(a > 0.0 && a < 1.0);
    }

    #[test]
    fn large_jump_snaps() {
        let mut f = TemporalFilter::default();
        let dt = 1.0 / 30.0;
        f.apply(&mut [pose_at(0.2, 0.5, Handedness::Left)], dt, false);
        let mut frame = [pose_at(0.4, 0.5, Handedness::Left)];
        f.apply(&mut frame, dt, false);
        assert!((frame[0].center.x - 0.4).abs() < 1e-6);
    }

    #[test]
    fn small_move_is_damped() {
        let mut f = TemporalFilter::default();
        let dt = 1.0 / 60.0;
        f.apply(&mut [pose_at(0.5, 0.5, Handedness::Left)], dt, false);
        let mut frame = [pose_at(0.51, 0.5, Handedness::Left)];
        f.apply(&mut frame, dt, false);
        let x = frame[0].center.x;
        assert!(x > 0.5 && x < 0.51, "x={x}");
        assert!(frame[0].speed > 0.0 && frame[0].speed <= 1.0);
    }

    #[test]
    fn converges_within_one_percent_after_five_tau() {
        let mut f = TemporalFilter::default();
        let dt = 1.0 / 30.0;
        f.apply(&mut [pose_at(0.50, 0.50, Handedness::Right)], dt, false);

        // Small enough to stay below both snap thresholds.
        let start = 0.50;
        let target = 0.52;
        let steps = (5.0 * DEFAULT_BASE_TAU / dt).ceil() as usize + 1;
        let mut x = 0.0;
        for _ in 0..steps {
            let mut frame = [pose_at(target, 0.5, Handedness::Right)];
            f.apply(&mut frame, dt, false);
            x = frame[0].center.x;
        }
        // Residual as a fraction of the step, not of the target.
        let err = (x - target).abs() / (target - start).abs();
        assert!(err < 0.01, "x={x} err={err}");
    }

    #[test]
    fn absent_keys_are_purged_and_restart_cold() {
        let mut f = TemporalFilter::default();
        let dt = 1.0 / 30.0;
        let mut both = [
            pose_at(0.2, 0.5, Handedness::Left),
            pose_at(0.8, 0.5, Handedness::Right),
        ];
        f.apply(&mut both, dt, false);
        assert_eq!(f.len(), 2);

        f.apply(&mut [pose_at(0.2, 0.5, Handedness::Left)], dt, false);
        assert_eq!(f.len(), 1);
        assert!(!f.contains(&HandKey {
            label: Handedness::Right,
            index: 1
        }));

        let mut none: [HandPose; 0] = [];
        f.apply(&mut none, dt, false);
        assert!(f.is_empty());

        let mut back = [pose_at(0.25, 0.5, Handedness::Left)];
        f.apply(&mut back, dt, false);
        assert_eq!(back[0].center, Vec2::new(0.25, 0.5));
        assert_eq!(back[0].speed, 0.0);
    }

    #[test]
    fn reorder_changes_identity() {
        let mut f = TemporalFilter::default();
        let dt = 1.0 / 30.0;
        f.apply(
            &mut [
                pose_at(0.2, 0.5, Handedness::Left),
                pose_at(0.8, 0.5, Handedness::Right),
            ],
            dt,
            false,
        );
        f.apply(
            &mut [
                pose_at(0.8, 0.5, Handedness::Right),
                pose_at(0.2, 0.5, Handedness::Left),
            ],
            dt,
            false,
        );
        assert!(f.contains(&HandKey {
            label: Handedness::Right,
            index: 0
        }));
        assert_eq!(f.len(), 2);
    }

    #[test]
    fn landmarks_dropped_when_not_kept() {
        let mut f = TemporalFilter::default();
        let mut frame = [pose_at(0.5, 0.5, Handedness::Left)];
        assert!(frame[0].landmarks.is_some());
        f.apply(&mut frame, 1.0 / 30.0, false);
        assert!(frame[0].landmarks.is_none());

        let mut frame = [pose_at(0.5, 0.5, Handedness::Left)];
        f.apply(&mut frame, 1.0 / 30.0, true);
        assert!(frame[0].landmarks.is_some());
    }

    #[test]
    fn speed_and_pinch_stay_in_unit_range() {
        let mut f = TemporalFilter::default();
        let dt = 1.0 / 60.0;
        for k in 0..120 {
            let x = 0.5 + 0.3 * ((k as f32) * 0.3).sin();
            let mut frame = [pose_at(x, 0.5, Handedness::Right)];
            frame[0].pinch = if k % 2 == 0 { 1.0 } else { 0.0 };
            f.apply(&mut frame, dt, false);
            assert!((0.0..=1.0).contains(&frame[0].speed));
            assert!((0.0..=1.0).contains(&frame[0].pinch));
        }
    }
}
