//! Gesture state machines and the slew limiter they share with the bus.

/// Hold time before a both-hands-open pose fires `reset` (ms).
pub const RESET_HOLD_MS: f32 = 520.0;

/// Smoothing time constant of the left-wrist velocity (s).
pub const SWIPE_VEL_TAU: f32 = 0.05;
/// Smoothed velocity a swipe must exceed (normalised units / s).
pub const SWIPE_THRESHOLD: f32 = 0.9;
/// Minimum time between two swipes (s).
pub const SWIPE_COOLDOWN_S: f64 = 0.85;

/// Exponential slew toward `target`:
/// `value + (target - value) · (1 - e^(-dt/tau))`.
///
/// ```
/// use handpose_control::control::exp_slew;
///
/// let v = exp_slew(0.0, 1.0, 0.05, 0.05);
/// assert!((v - (1.0 - (-1.0f32).exp())).abs() < 1e-6);
/// assert_eq!(exp_slew(0.3, 1.0, 0.0, 0.05), 0.3);
/// ```
pub fn exp_slew(current: f32, target: f32, dt: f32, tau: f32) -> f32 {
    if dt <= 0.0 {
        return current;
    }
    if tau <= 0.0 {
        return target;
    }
    current + (target - current) * (1.0 - (-dt / tau).exp())
}

// ---------------------------------------------------------------------------
// ResetGesture
// ---------------------------------------------------------------------------

/// Hold-to-reset: both hands open for [`RESET_HOLD_MS`] continuously.
///
/// Any tick without the pose zeroes the accumulator; there is no partial
/// credit.
#[derive(Debug, Clone, Default)]
pub struct ResetGesture {
    both_open_ms: f32,
}

impl ResetGesture {
    /// Returns `true` on the tick the hold completes.
    pub fn update(&mut self, both_open: bool, dt: f32) -> bool {
        if !both_open {
            self.both_open_ms = 0.0;
            return false;
        }
        self.both_open_ms += dt.max(0.0) * 1000.0;
        if self.both_open_ms >= RESET_HOLD_MS {
            self.both_open_ms = 0.0;
            return true;
        }
        false
    }

    pub fn held_ms(&self) -> f32 {
        self.both_open_ms
    }

    pub fn reset(&mut self) {
        self.both_open_ms = 0.0;
    }
}

// ---------------------------------------------------------------------------
// SwipeGesture
// ---------------------------------------------------------------------------

/// Left-hand horizontal swipe to step scenes.
///
/// The wrist x-velocity is estimated from consecutive samples and smoothed
/// with [`SWIPE_VEL_TAU`].  Without an open left hand the estimate decays
/// toward zero and the next sighting starts a fresh difference.  The
/// cooldown is anchored on the last trigger; it starts at `t = 0`.
#[derive(Debug, Clone, Default)]
pub struct SwipeGesture {
    prev_x: Option<f32>,
    vel_x: f32,
    last_trigger_t: f64,
}

impl SwipeGesture {
    /// Feed the open left wrist's x (or `None`).  Returns `-1`, `0` or `+1`.
    pub fn update(&mut self, t: f64, dt: f32, wrist_x: Option<f32>) -> i8 {
        let raw = match (wrist_x, self.prev_x) {
            (Some(x), Some(prev)) if dt > 0.0 => (x - prev) / dt,
            _ => 0.0,
        };
        self.prev_x = wrist_x;
        self.vel_x = exp_slew(self.vel_x, raw, dt, SWIPE_VEL_TAU);

        if self.vel_x.abs() > SWIPE_THRESHOLD && t - self.last_trigger_t >= SWIPE_COOLDOWN_S {
            self.last_trigger_t = t;
            return if self.vel_x > 0.0 { 1 } else { -1 };
        }
        0
    }

    /// Smoothed wrist velocity.
    pub fn velocity(&self) -> f32 {
        self.vel_x
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
