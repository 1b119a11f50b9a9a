//! Hands → control channels.
//!
//! [`ControlBus`] is driven once per render tick with the tracker's latest
//! [`HandsFrame`].  It picks one left and one right hand, slews their
//! features into continuous channels and runs the reset and swipe gesture
//! machines.
//!
//! | Channel          | Source                         | tau (s) |
//! |------------------|--------------------------------|---------|
//! | `*_x`            | hand centre x                  | 0.06    |
//! | `*_y`            | `1 - centre y`                 | 0.06    |
//! | `*_pinch`        | pinch                          | 0.05    |
//! | `*_speed`        | filtered speed                 | 0.10    |
//! | `build`          | inter-hand distance            | 0.08    |
//!
//! When a side has no hand its pinch and speed relax to 0 while x and y hold
//! their last value.

use crate::pose::{clamp01, HandPose, Handedness, HandsFrame};

use super::gesture::{exp_slew, ResetGesture, SwipeGesture};
use super::state::{ControlEvents, ControlState};

pub const TAU_POSITION: f32 = 0.06;
pub const TAU_PINCH: f32 = 0.05;
pub const TAU_SPEED: f32 = 0.10;
pub const TAU_BUILD: f32 = 0.08;

/// Inter-hand distance at which `build` starts rising.
pub const BUILD_NEAR: f32 = 0.15;
/// Distance span over which `build` goes from 0 to 1.
pub const BUILD_SPAN: f32 = 0.55;

/// Pick at most one left and one right hand.
///
/// Exact labels win.  A single `Unknown` hand fills the right side first,
/// then the left; it never fills both.
pub fn select_hands(hands: &[HandPose]) -> (Option<&HandPose>, Option<&HandPose>) {
    let mut left = hands.iter().find(|h| h.label == Handedness::Left);
    let mut right = hands.iter().find(|h| h.label == Handedness::Right);
    if let Some(unknown) = hands.iter().find(|h| h.label == Handedness::Unknown) {
        if right.is_none() {
            right = Some(unknown);
        } else if left.is_none() {
            left = Some(unknown);
        }
    }
    (left, right)
}

#[derive(Debug, Clone, Default)]
pub struct ControlBus {
    state: ControlState,
    reset_gesture: ResetGesture,
    swipe: SwipeGesture,
}

impl ControlBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance one tick.  `t` and `dt` are in seconds.
    pub fn update(&mut self, t: f64, dt: f32, frame: &HandsFrame) -> &ControlState {
        let dt = dt.max(0.0);
        let (left, right) = select_hands(&frame.hands);
        let s = &mut self.state;

        s.t = t;
        s.dt = dt;
        s.hands = frame.hands.len();

        slew_side(
            (&mut s.right_x, &mut s.right_y, &mut s.right_pinch, &mut s.right_speed),
            right,
            dt,
        );
        slew_side(
            (&mut s.left_x, &mut s.left_y, &mut s.left_pinch, &mut s.left_speed),
            left,
            dt,
        );

        let build_target = match (left, right) {
            (Some(l), Some(r)) => clamp01((l.center.dist(r.center) - BUILD_NEAR) / BUILD_SPAN),
            _ => 0.0,
        };
        s.build = clamp01(exp_slew(s.build, build_target, dt, TAU_BUILD));

        s.kill = left.is_some_and(|h| h.fist) || right.is_some_and(|h| h.fist);

        let both_open = left.is_some_and(|h| h.open) && right.is_some_and(|h| h.open);
        let reset = self.reset_gesture.update(both_open, dt);

        let open_left_x = left.filter(|h| h.open).map(|h| h.wrist.x);
        let scene_delta = self.swipe.update(t, dt, open_left_x);

        s.events = ControlEvents { reset, scene_delta };
        if reset {
            log::info!("control: reset gesture at t={t:.2}");
        }
        if scene_delta != 0 {
            log::info!("control: scene swipe {scene_delta:+} at t={t:.2}");
        }
        &self.state
    }

    /// Last computed state.
    pub fn state(&self) -> &ControlState {
        &self.state
    }

    /// Return to the cold state: channels centred, gesture timers cleared.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

fn slew_side(
    (x, y, pinch, speed): (&mut f32, &mut f32, &mut f32, &mut f32),
    hand: Option<&HandPose>,
    dt: f32,
) {
    match hand {
        Some(h) => {
            *x = clamp01(exp_slew(*x, h.center.x, dt, TAU_POSITION));
            *y = clamp01(exp_slew(*y, 1.0 - h.center.y, dt, TAU_POSITION));
            *pinch = clamp01(exp_slew(*pinch, h.pinch, dt, TAU_PINCH));
            *speed = clamp01(exp_slew(*speed, h.speed, dt, TAU_SPEED));
        }
        None => {
            *pinch = clamp01(exp_slew(*pinch, 0.0, dt, TAU_PINCH));
            *speed = clamp01(exp_slew(*speed, 0.0, dt, TAU_SPEED));
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pose::Vec2;

    fn pose(label: Handedness, cx: f32, cy: f32) -> HandPose {
        HandPose {
            label,
            score: 0.9,
            landmarks: None,
            center: Vec2::new(cx, cy),
            wrist: Vec2::new(cx, cy + 0.05),
            pinch: 0.0,
            open: false,
            fist: false,
            speed: 0.0,
        }
    }

    fn open(mut p: HandPose) -> HandPose {
        p.open = true;
        p
    }

    const DT: f32 = 1.0 / 60.0;

    #[test]
    fn right_hand_channels_converge() {
        let mut right = pose(Handedness::Right, 0.8, 0.2);
        right.pinch = 0.9;
        let frame = HandsFrame::from_hands(vec![right]);

        let mut bus = ControlBus::new();
        let mut out = ControlState::default();
        for i in 0..180 {
            out = bus.update(i as f64 * DT as f64, DT, &frame).clone();
        }
        assert!((out.right_x - 0.8).abs() < 1e-3, "{}", out.right_x);
        assert!((out.right_y - 0.8).abs() < 1e-3, "{}", out.right_y);
        assert!((out.right_pinch - 0.9).abs() < 1e-3, "{}", out.right_pinch);
        assert_eq!(out.hands, 1);
        assert_eq!(out.build, 0.0);
        assert!(!out.kill);
        // Left side untouched.
        assert_eq!(out.left_x, 0.5);
    }

    #[test]
    fn first_tick_is_slewed_not_snapped() {
        let frame = HandsFrame::from_hands(vec![pose(Handedness::Right, 0.9, 0.5)]);
        let mut bus = ControlBus::new();
        let out = bus.update(0.0, DT, &frame);
        assert!(out.right_x > 0.5 && out.right_x < 0.9);
    }

    #[test]
    fn unknown_hand_fills_one_side_only() {
        let hands = vec![pose(Handedness::Unknown, 0.5, 0.5)];
        let (l, r) = select_hands(&hands);
        assert!(l.is_none());
        assert!(r.is_some());

        let hands = vec![
            pose(Handedness::Right, 0.7, 0.5),
            pose(Handedness::Unknown, 0.2, 0.5),
        ];
        let (l, r) = select_hands(&hands);
        assert_eq!(l.map(|h| h.center.x), Some(0.2));
        assert_eq!(r.map(|h| h.center.x), Some(0.7));
    }

    #[test]
    fn exact_labels_beat_unknown() {
        let hands = vec![
            pose(Handedness::Unknown, 0.1, 0.5),
            pose(Handedness::Left, 0.2, 0.5),
            pose(Handedness::Right, 0.8, 0.5),
        ];
        let (l, r) = select_hands(&hands);
        assert_eq!(l.unwrap().label, Handedness::Left);
        assert_eq!(r.unwrap().label, Handedness::Right);
    }

    #[test]
    fn build_follows_hand_distance() {
        let frame = HandsFrame::from_hands(vec![
            pose(Handedness::Left, 0.1, 0.5),
            pose(Handedness::Right, 0.8, 0.5),
        ]);
        let mut bus = ControlBus::new();
        for i in 0..120 {
            bus.update(i as f64 * DT as f64, DT, &frame);
        }
        // (0.7 - 0.15) / 0.55 = 1
        assert!((bus.state().build - 1.0).abs() < 1e-3);

        // One hand gone: build relaxes to 0.
        let one = HandsFrame::from_hands(vec![pose(Handedness::Right, 0.8, 0.5)]);
        for i in 0..120 {
            bus.update(2.0 + i as f64 * DT as f64, DT, &one);
        }
        assert!(bus.state().build < 1e-3);
    }

    #[test]
    fn kill_when_either_hand_is_a_fist() {
        let mut fist = pose(Handedness::Left, 0.3, 0.5);
        fist.fist = true;
        let frame = HandsFrame::from_hands(vec![fist, pose(Handedness::Right, 0.7, 0.5)]);
        let mut bus = ControlBus::new();
        assert!(bus.update(0.0, DT, &frame).kill);
        let calm = HandsFrame::from_hands(vec![pose(Handedness::Right, 0.7, 0.5)]);
        assert!(!bus.update(DT as f64, DT, &calm).kill);
    }

    #[test]
    fn both_open_for_520_ms_emits_one_reset() {
        let frame = HandsFrame::from_hands(vec![
            open(pose(Handedness::Left, 0.3, 0.5)),
            open(pose(Handedness::Right, 0.7, 0.5)),
        ]);
        let mut bus = ControlBus::new();
        let mut resets = 0;
        for i in 0..40 {
            if bus.update(i as f64 * DT as f64, DT, &frame).events.reset {
                resets += 1;
            }
        }
        assert_eq!(resets, 1);
    }

    #[test]
    fn open_left_swipe_changes_scene() {
        let mut bus = ControlBus::new();
        let mut deltas = Vec::new();
        for i in 0..120 {
            let x = 0.1 + 1.2 * DT * i as f32;
            let frame = HandsFrame::from_hands(vec![open(pose(Handedness::Left, x, 0.5))]);
            let d = bus.update(i as f64 * DT as f64, DT, &frame).events.scene_delta;
            if d != 0 {
                deltas.push(d);
            }
        }
        assert_eq!(deltas, vec![1, 1]);
    }

    #[test]
    fn closed_left_hand_never_swipes() {
        let mut bus = ControlBus::new();
        for i in 0..120 {
            let x = 0.1 + 1.5 * DT * i as f32;
            let frame = HandsFrame::from_hands(vec![pose(Handedness::Left, x, 0.5)]);
            assert_eq!(
                bus.update(1.0 + i as f64 * DT as f64, DT, &frame).events.scene_delta,
                0
            );
        }
    }

    #[test]
    fn hands_counts_every_hand_in_the_frame() {
        let frame = HandsFrame::from_hands(vec![
            pose(Handedness::Left, 0.2, 0.5),
            pose(Handedness::Right, 0.8, 0.5),
            pose(Handedness::Unknown, 0.5, 0.5),
        ]);
        let mut bus = ControlBus::new();
        assert_eq!(bus.update(0.0, DT, &frame).hands, 3);
        assert_eq!(bus.update(DT as f64, DT, &HandsFrame::empty()).hands, 0);
    }

    #[test]
    fn reset_returns_to_cold_state() {
        let frame = HandsFrame::from_hands(vec![pose(Handedness::Right, 0.9, 0.1)]);
        let mut bus = ControlBus::new();
        for i in 0..30 {
            bus.update(i as f64 * DT as f64, DT, &frame);
        }
        bus.reset();
        assert_eq!(bus.state(), &ControlState::default());
    }
}
