//! Per-tick control output.

use serde::Serialize;

/// Discrete, edge-triggered events.  Each is set for exactly one tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ControlEvents {
    /// Both hands were held open long enough.
    pub reset: bool,
    /// `-1`, `0` or `+1` scene step from a left-hand swipe.
    pub scene_delta: i8,
}

impl ControlEvents {
    pub fn any(&self) -> bool {
        self.reset || self.scene_delta != 0
    }
}

/// Continuous channels and events produced by
/// [`ControlBus::update`](super::ControlBus::update).
///
/// Every scalar channel is in `[0, 1]`.  `*_y` channels are flipped so that
/// up is 1.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ControlState {
    /// Render time of this tick (s).
    pub t: f64,
    /// Tick duration (s).
    pub dt: f32,
    /// Number of hands in the frame this tick was computed from, including
    /// any not selected for a side.  The poses themselves stay on the
    /// [`HandsFrame`](crate::pose::HandsFrame) passed to `update`, which
    /// consumers that draw hands read directly.
    pub hands: usize,

    pub right_x: f32,
    pub right_y: f32,
    pub right_pinch: f32,
    pub right_speed: f32,

    pub left_x: f32,
    pub left_y: f32,
    pub left_pinch: f32,
    pub left_speed: f32,

    /// Inter-hand distance mapped to intensity; 0 unless both hands are seen.
    pub build: f32,
    /// Either selected hand is a fist.
    pub kill: bool,

    pub events: ControlEvents,
}

impl Default for ControlState {
    fn default() -> Self {
        Self {
            t: 0.0,
            dt: 0.0,
            hands: 0,
            right_x: 0.5,
            right_y: 0.5,
            right_pinch: 0.0,
            right_speed: 0.0,
            left_x: 0.5,
            left_y: 0.5,
            left_pinch: 0.0,
            left_speed: 0.0,
            build: 0.0,
            kill: false,
            events: ControlEvents::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_centred_and_quiet() {
        let s = ControlState::default();
        assert_eq!(s.right_x, 0.5);
        assert_eq!(s.left_y, 0.5);
        assert_eq!(s.build, 0.0);
        assert!(!s.kill);
        assert!(!s.events.any());
    }

    #[test]
    fn serialises_with_consumer_field_names() {
        let mut s = ControlState::default();
        s.events.scene_delta = -1;
        let v = serde_json::to_value(&s).unwrap();
        assert_eq!(v["rightX"], 0.5);
        assert_eq!(v["leftPinch"], 0.0);
        assert_eq!(v["events"]["sceneDelta"], -1);
        assert_eq!(v["events"]["reset"], false);
    }
}
