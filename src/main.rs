//! Demo entry point — synthetic hands through the full pipeline.
//!
//! # Startup sequence
//!
//! 1. Initialise logging.
//! 2. Load [`TrackerConfig`] from disk (returns default on first run).
//! 3. Create [`tokio`] runtime (multi-thread, 2 workers).
//! 4. Start a [`HandTracker`] on a synthetic camera and detector.
//! 5. Tick tracker and [`ControlBus`] at 60 Hz, logging events and stats.
//!
//! Usage: `handpose-control [seconds]` (default 12).  Set `RUST_LOG=debug`
//! for per-subsystem detail.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;

use handpose_control::{
    camera::{CameraConstraints, CameraError, CameraSource, VideoFrame},
    config::{AppPaths, TrackerConfig},
    control::ControlBus,
    inference::{DetectionResult, DetectorError, DetectorFactory, DetectorOptions, HandDetector},
    pose::{
        types::{
            FINGERTIPS, INDEX_MCP, INDEX_TIP, MIDDLE_MCP, PINKY_MCP, RING_MCP, THUMB_CMC,
            THUMB_IP, THUMB_MCP, THUMB_TIP, WRIST,
        },
        Category, Vec2, LANDMARK_COUNT,
    },
    tracker::HandTracker,
};

const TICK_HZ: f64 = 60.0;

// ---------------------------------------------------------------------------
// Synthetic camera
// ---------------------------------------------------------------------------

/// Emits timing-only frames at the requested rate on a wall clock.
struct SyntheticCamera {
    started: Option<Instant>,
    constraints: Option<CameraConstraints>,
    last_frame_ms: f64,
}

impl SyntheticCamera {
    fn new() -> Self {
        Self {
            started: None,
            constraints: None,
            last_frame_ms: f64::NEG_INFINITY,
        }
    }
}

#[async_trait]
impl CameraSource for SyntheticCamera {
    async fn open(&mut self, constraints: &CameraConstraints) -> Result<(), CameraError> {
        // Device negotiation takes a moment on real hardware.
        tokio::time::sleep(Duration::from_millis(30)).await;
        log::info!(
            "camera: opened {}x{} @ {} fps",
            constraints.width,
            constraints.height,
            constraints.fps
        );
        self.started = Some(Instant::now());
        self.constraints = Some(*constraints);
        Ok(())
    }

    fn apply_constraints(&mut self, constraints: &CameraConstraints) -> Result<(), CameraError> {
        log::info!(
            "camera: constraints now {}x{} @ {} fps",
            constraints.width,
            constraints.height,
            constraints.fps
        );
        self.constraints = Some(*constraints);
        Ok(())
    }

    fn grab_frame(&mut self) -> Option<VideoFrame> {
        let started = self.started?;
        let c = self.constraints?;
        let now_ms = started.elapsed().as_secs_f64() * 1000.0;
        if now_ms - self.last_frame_ms < 1000.0 / f64::from(c.fps.max(1)) {
            return None;
        }
        self.last_frame_ms = now_ms;
        Some(VideoFrame::timing_only(c.width, c.height, now_ms))
    }

    fn close(&mut self) {
        if self.started.take().is_some() {
            log::info!("camera: closed");
        }
    }
}

// ---------------------------------------------------------------------------
// Synthetic detector
// ---------------------------------------------------------------------------

/// Scripted two-hand performance keyed on the frame's presentation time.
///
/// * Left hand opens for the first second of every 4 s cycle and sweeps
///   across the frame in the first 0.4 s of it.
/// * Right hand circles, is a fist for 2 s of every 6 s, and pinches in
///   and out otherwise.
struct SyntheticDetector {
    max_hands: usize,
    cost: Duration,
    ready: bool,
}

impl SyntheticDetector {
    fn new() -> Self {
        Self {
            max_hands: 2,
            cost: Duration::from_millis(8),
            ready: false,
        }
    }
}

impl HandDetector for SyntheticDetector {
    fn init(&mut self, options: &DetectorOptions) -> Result<(), DetectorError> {
        std::thread::sleep(Duration::from_millis(50));
        self.max_hands = options.max_hands;
        self.ready = true;
        log::info!("synthetic detector: loaded (max_hands={})", options.max_hands);
        Ok(())
    }

    fn configure(&mut self, options: &DetectorOptions) -> Result<(), DetectorError> {
        self.max_hands = options.max_hands;
        Ok(())
    }

    fn detect(
        &mut self,
        frame: &VideoFrame,
        _timestamp_ms: f64,
    ) -> Result<Option<DetectionResult>, DetectorError> {
        if !self.ready {
            return Err(DetectorError::NotInitialised);
        }
        std::thread::sleep(self.cost);
        let s = frame.presentation_time_ms / 1000.0;

        let right = {
            let a = s * 0.8;
            let center = Vec2::new(
                (0.35 + 0.12 * a.cos()) as f32,
                (0.45 + 0.12 * a.sin()) as f32,
            );
            if s % 6.0 < 2.0 {
                synth_hand(center, 0.09, 0.25)
            } else {
                let gap = 0.12 + 0.10 * (s * 2.0).sin();
                synth_hand(center, 0.26, gap as f32)
            }
        };

        let left = {
            let p = s % 4.0;
            let x = if p < 0.4 {
                0.80 - (p / 0.4) * 0.5
            } else {
                0.30 + ((p - 0.4) / 3.6) * 0.5
            };
            let reach = if p < 1.0 { 0.26 } else { 0.15 };
            synth_hand(Vec2::new(x as f32, 0.55), reach, 0.25)
        };

        let mut result = DetectionResult {
            landmarks: vec![right, left],
            handednesses: Some(vec![
                vec![Category::named("Left", 0.96)],
                vec![Category::named("Right", 0.97)],
            ]),
        };
        result.landmarks.truncate(self.max_hands);
        if let Some(h) = result.handednesses.as_mut() {
            h.truncate(self.max_hands);
        }
        Ok(Some(result))
    }

    fn close(&mut self) {
        self.ready = false;
        log::info!("synthetic detector: released");
    }
}

/// 21 landmarks for a hand whose palm sits at `center`, fingertips `reach`
/// above the wrist and thumb tip `pinch_gap` left of the index tip.
fn synth_hand(center: Vec2, reach: f32, pinch_gap: f32) -> Vec<Vec2> {
    let mut lm = vec![Vec2::ZERO; LANDMARK_COUNT];
    let wrist = Vec2::new(center.x, center.y + 0.06);
    lm[WRIST] = wrist;
    for (k, &i) in [INDEX_MCP, MIDDLE_MCP, RING_MCP, PINKY_MCP].iter().enumerate() {
        lm[i] = Vec2::new(center.x - 0.03 + 0.02 * k as f32, center.y - 0.04);
    }
    for (k, &tip) in FINGERTIPS.iter().enumerate() {
        let tip_pos = Vec2::new(center.x - 0.03 + 0.02 * k as f32, wrist.y - reach);
        lm[tip] = tip_pos;
        let base = lm[tip - 3];
        lm[tip - 2] = base.lerp(tip_pos, 0.4);
        lm[tip - 1] = base.lerp(tip_pos, 0.7);
    }
    lm[THUMB_TIP] = Vec2::new(lm[INDEX_TIP].x - pinch_gap, lm[INDEX_TIP].y);
    lm[THUMB_CMC] = wrist.lerp(lm[THUMB_TIP], 0.25);
    lm[THUMB_MCP] = wrist.lerp(lm[THUMB_TIP], 0.5);
    lm[THUMB_IP] = wrist.lerp(lm[THUMB_TIP], 0.75);
    lm
}

// ---------------------------------------------------------------------------
// main
// ---------------------------------------------------------------------------

fn main() -> anyhow::Result<()> {
    // 1. Logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("handpose-control demo starting up");

    // 2. Configuration
    let config = TrackerConfig::load().unwrap_or_else(|e| {
        log::warn!("Failed to load config ({e}); using defaults");
        TrackerConfig::default()
    });

    let paths = AppPaths::new();
    if !paths.model_installed() {
        log::info!(
            "No landmark model at {}; running the synthetic detector",
            paths.model_file.display()
        );
    }

    let seconds: f64 = std::env::args()
        .nth(1)
        .and_then(|s| s.parse().ok())
        .unwrap_or(12.0);

    // 3. Tokio runtime
    let rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()?;

    // 4. Tracker
    let factory: DetectorFactory =
        Arc::new(|| Box::new(SyntheticDetector::new()) as Box<dyn HandDetector>);
    let mut tracker = HandTracker::new(config, factory);
    rt.block_on(tracker.start(Box::new(SyntheticCamera::new())))?;

    // 5. Render loop
    let mut bus = ControlBus::new();
    rt.block_on(async {
        let mut ticker = tokio::time::interval(Duration::from_secs_f64(1.0 / TICK_HZ));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        let started = Instant::now();
        let mut last_t = 0.0;
        let mut next_report = 1.0;
        let mut safe_mode_toggled = false;

        loop {
            ticker.tick().await;
            let t = started.elapsed().as_secs_f64();
            let dt = (t - last_t) as f32;
            last_t = t;

            let hands = tracker.update(t, dt);
            let state = bus.update(t, dt, hands);

            if state.events.any() {
                match serde_json::to_string(&state.events) {
                    Ok(json) => log::info!("events @ {t:.2}s: {json}"),
                    Err(e) => log::warn!("events @ {t:.2}s: {e}"),
                }
            }

            if t >= next_report {
                next_report += 1.0;
                log::info!(
                    "t={t:5.1}s hands={} R=({:.2},{:.2}) pinch={:.2} L=({:.2},{:.2}) build={:.2} kill={}",
                    state.hands,
                    state.right_x,
                    state.right_y,
                    state.right_pinch,
                    state.left_x,
                    state.left_y,
                    state.build,
                    state.kill
                );
                let stats = tracker.stats();
                log::info!(
                    "tracker: backend={} ema={:.1}ms interval={:.1}ms inferred={} dropped={}",
                    stats.backend.label(),
                    stats.infer_ms_ema,
                    stats.interval_ms,
                    stats.frames_inferred,
                    stats.frames_dropped
                );
            }

            if !safe_mode_toggled && t >= seconds * 0.5 {
                safe_mode_toggled = true;
                tracker.set_safe_mode(!tracker.config().safe_mode);
            }

            if t >= seconds {
                break;
            }
        }
    });

    tracker.stop();
    log::info!("handpose-control demo finished");
    Ok(())
}
