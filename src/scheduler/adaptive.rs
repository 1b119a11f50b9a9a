//! Latency-driven inference gate.
//!
//! [`AdaptiveScheduler`] answers one question per video frame: run the
//! detector now or not?  It tracks an EMA of measured inference latency and
//! derives a target spacing between inferences from it:
//!
//! ```text
//! ema'     = ema + (sample - ema) · α
//! balance' = clamp(balance + over - under, ±3000)
//! desired  = clamp(ema · mul, 1000 / target_fps, max_interval)
//! interval'= interval + (desired - interval) · k     k = 0.25 if balance > 0
//!                                                     k = 0.08 otherwise
//! ```
//!
//! The live interval is never assigned directly, which keeps it from
//! oscillating when latency is noisy.

use crate::config::{ModeProfile, SchedulerConfig};

/// Saturation bound of the over/under-budget balance (ms).
pub const BALANCE_LIMIT: f64 = 3_000.0;
/// Interval blend rate while running over budget.
pub const K_OVER: f64 = 0.25;
/// Interval blend rate otherwise.
pub const K_UNDER: f64 = 0.08;

#[derive(Debug, Clone)]
pub struct AdaptiveScheduler {
    profile: ModeProfile,
    ema_alpha: f64,
    infer_ms_ema: f64,
    balance: f64,
    interval_ms: f64,
    last_infer_at_ms: Option<f64>,
    last_video_time_ms: Option<f64>,
    pause_until_ms: f64,
}

impl AdaptiveScheduler {
    pub fn new(config: &SchedulerConfig, safe_mode: bool) -> Self {
        let profile = config.profile(safe_mode).clone();
        Self {
            ema_alpha: config.ema_alpha,
            infer_ms_ema: profile.budget_ms,
            balance: 0.0,
            interval_ms: profile.min_interval_ms(),
            last_infer_at_ms: None,
            last_video_time_ms: None,
            pause_until_ms: 0.0,
            profile,
        }
    }

    /// Whether a frame with presentation time `video_time_ms`, seen at
    /// `now_ms`, should go to the detector.
    ///
    /// Requires that no pause is active, that the live interval has elapsed
    /// since the last dispatch and that the video advanced since then.
    pub fn should_infer(&self, now_ms: f64, video_time_ms: f64) -> bool {
        if self.is_paused(now_ms) {
            return false;
        }
        if let Some(last) = self.last_infer_at_ms {
            if now_ms - last < self.interval_ms {
                return false;
            }
        }
        if let Some(last_video) = self.last_video_time_ms {
            if video_time_ms <= last_video {
                return false;
            }
        }
        true
    }

    /// Record that a frame was handed to a backend.
    pub fn mark_dispatched(&mut self, now_ms: f64, video_time_ms: f64) {
        self.last_infer_at_ms = Some(now_ms);
        self.last_video_time_ms = Some(video_time_ms);
    }

    /// Feed one measured inference latency.
    pub fn record_latency(&mut self, sample_ms: f64) {
        if !sample_ms.is_finite() || sample_ms < 0.0 {
            log::debug!("scheduler: ignoring latency sample {sample_ms}");
            return;
        }
        self.infer_ms_ema += (sample_ms - self.infer_ms_ema) * self.ema_alpha;

        let budget = self.profile.budget_ms;
        let over = (sample_ms - budget).max(0.0);
        let under = (budget - sample_ms).max(0.0);
        self.balance = (self.balance + over - under).clamp(-BALANCE_LIMIT, BALANCE_LIMIT);

        let desired = self.desired_interval_ms();
        let k = self.blend_rate();
        self.interval_ms += (desired - self.interval_ms) * k;
    }

    /// Interval the live interval is converging to.
    pub fn desired_interval_ms(&self) -> f64 {
        let min = self.profile.min_interval_ms();
        let max = self.profile.max_interval_ms.max(min);
        (self.infer_ms_ema * self.profile.interval_mul).clamp(min, max)
    }

    /// Current interval blend rate.
    pub fn blend_rate(&self) -> f64 {
        if self.balance > 0.0 {
            K_OVER
        } else {
            K_UNDER
        }
    }

    /// Suppress inference until `deadline_ms`.
    pub fn pause_until(&mut self, deadline_ms: f64) {
        self.pause_until_ms = self.pause_until_ms.max(deadline_ms);
        log::debug!("scheduler: paused until {:.0} ms", self.pause_until_ms);
    }

    pub fn is_paused(&self, now_ms: f64) -> bool {
        now_ms < self.pause_until_ms
    }

    /// Switch to another mode profile.  The EMA and live interval carry
    /// over; they converge to the new bounds as samples arrive.
    pub fn set_profile(&mut self, profile: ModeProfile) {
        self.profile = profile;
    }

    /// Forget dispatch history and any pause, keeping the latency model.
    pub fn reset(&mut self) {
        self.last_infer_at_ms = None;
        self.last_video_time_ms = None;
        self.pause_until_ms = 0.0;
    }

    pub fn profile(&self) -> &ModeProfile {
        &self.profile
    }

    pub fn infer_ms_ema(&self) -> f64 {
        self.infer_ms_ema
    }

    pub fn interval_ms(&self) -> f64 {
        self.interval_ms
    }

    pub fn balance(&self) -> f64 {
        self.balance
    }

    pub fn last_video_time_ms(&self) -> Option<f64> {
        self.last_video_time_ms
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn scheduler() -> AdaptiveScheduler {
        AdaptiveScheduler::new(&SchedulerConfig::default(), false)
    }

    #[test]
    fn starts_at_budget_and_min_interval() {
        let s = scheduler();
        assert_eq!(s.infer_ms_ema(), 22.0);
        assert!((s.interval_ms() - 1000.0 / 30.0).abs() < 1e-9);
        assert_eq!(s.balance(), 0.0);
    }

    #[test]
    fn ema_moves_by_alpha() {
        let mut s = scheduler();
        s.record_latency(34.0);
        assert!((s.infer_ms_ema() - (22.0 + 12.0 * 0.12)).abs() < 1e-9);
    }

    #[test]
    fn first_frame_is_eligible() {
        assert!(scheduler().should_infer(0.0, 0.0));
    }

    #[test]
    fn interval_gate_and_video_gate_both_apply() {
        let mut s = scheduler();
        s.mark_dispatched(1_000.0, 500.0);

        // Too soon, video advanced.
        assert!(!s.should_infer(1_010.0, 520.0));
        // Late enough, video frozen.
        assert!(!s.should_infer(1_100.0, 500.0));
        // Late enough, video advanced.
        assert!(s.should_infer(1_100.0, 533.0));
    }

    #[test]
    fn pause_suppresses_everything() {
        let mut s = scheduler();
        s.pause_until(4_000.0);
        assert!(s.is_paused(3_999.0));
        assert!(!s.should_infer(3_999.0, 10.0));
        assert!(s.should_infer(4_000.0, 10.0));
    }

    #[test]
    fn pause_never_shortens() {
        let mut s = scheduler();
        s.pause_until(4_000.0);
        s.pause_until(2_000.0);
        assert!(s.is_paused(3_000.0));
    }

    #[test]
    fn over_budget_adapts_faster() {
        let mut s = scheduler();
        assert_eq!(s.blend_rate(), K_UNDER);
        let before = s.interval_ms();
        s.record_latency(200.0);
        assert_eq!(s.blend_rate(), K_OVER);
        let desired = s.desired_interval_ms();
        let expected = before + (desired - before) * K_OVER;
        assert!((s.interval_ms() - expected).abs() < 1e-9);
    }

    #[test]
    fn balance_saturates() {
        let mut s = scheduler();
        for _ in 0..100 {
            s.record_latency(1_000.0);
        }
        assert_eq!(s.balance(), BALANCE_LIMIT);
        for _ in 0..1_000 {
            s.record_latency(0.0);
        }
        assert_eq!(s.balance(), -BALANCE_LIMIT);
    }

    #[test]
    fn interval_stays_within_profile_bounds() {
        let mut s = scheduler();
        for _ in 0..500 {
            s.record_latency(400.0);
            assert!(s.interval_ms() <= 100.0 + 1e-9);
        }
        assert!((s.interval_ms() - 100.0).abs() < 0.5);

        for _ in 0..2_000 {
            s.record_latency(1.0);
            assert!(s.interval_ms() >= 1000.0 / 30.0 - 1e-9);
        }
        assert!((s.interval_ms() - 1000.0 / 30.0).abs() < 0.5);
    }

    #[test]
    fn reduced_profile_widens_ceiling() {
        let mut s = AdaptiveScheduler::new(&SchedulerConfig::default(), true);
        for _ in 0..500 {
            s.record_latency(400.0);
        }
        assert!(s.interval_ms() > 100.0);
        assert!(s.interval_ms() <= 160.0 + 1e-9);
    }

    #[test]
    fn bad_samples_are_ignored() {
        let mut s = scheduler();
        s.record_latency(f64::NAN);
        s.record_latency(-5.0);
        assert_eq!(s.infer_ms_ema(), 22.0);
    }
}
