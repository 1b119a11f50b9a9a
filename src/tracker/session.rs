//! Per-session orchestrator: camera → scheduler → backend → pose → filter.
//!
//! [`HandTracker`] owns every piece of mutable tracking state for one
//! session.  Nothing lives in globals; `start` and `stop` bound the session.
//!
//! # Tick flow
//!
//! ```text
//! update(t, dt)
//!   ├─ router.poll()             worker results / readiness   → process
//!   ├─ settle pending restart
//!   ├─ camera.grab_frame()       (skipped in frame-loop mode)
//!   │     └─ scheduler.should_infer?
//!   │           ├─ worker      → Sent       (result lands on a later tick)
//!   │           └─ main thread → Completed  → process
//!   └─ staleness check           no result for stale_ms while video moved
//!                                → drop cache + filter state
//! ```
//!
//! `update` never waits on the worker.  The returned [`HandsFrame`] is the
//! most recent filtered result.

use thiserror::Error;
use tokio::sync::watch;

use crate::camera::{CameraConstraints, CameraError, CameraSource, VideoFrame};
use crate::config::TrackerConfig;
use crate::filter::TemporalFilter;
use crate::inference::{
    BackendError, BackendKind, Completion, DetectorFactory, DetectorOptions, InferenceRouter,
    MainThreadBackend, Routed,
};
use crate::pose::{self, HandsFrame};
use crate::scheduler::AdaptiveScheduler;

use super::state::{RestartStatus, TrackerState, TrackerStats};

/// Time step assumed for the first filtered result.
const DEFAULT_DT: f32 = 1.0 / 30.0;

// ---------------------------------------------------------------------------
// TrackerError
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Error, PartialEq)]
pub enum TrackerError {
    #[error(transparent)]
    Camera(#[from] CameraError),

    #[error("detector initialisation failed: {0}")]
    Backend(#[from] BackendError),

    #[error("tracker is already running")]
    AlreadyRunning,
}

// ---------------------------------------------------------------------------
// RestartHandle
// ---------------------------------------------------------------------------

/// Resolves once a [`HandTracker::restart_landmarker`] call settles.
///
/// Concurrent restart requests receive handles to the same restart.
#[derive(Debug, Clone)]
pub struct RestartHandle {
    id: u64,
    rx: watch::Receiver<RestartStatus>,
}

impl RestartHandle {
    fn resolved(id: u64, status: RestartStatus) -> Self {
        let (_tx, rx) = watch::channel(status);
        Self { id, rx }
    }

    /// Current status without waiting.
    pub fn status(&self) -> RestartStatus {
        *self.rx.borrow()
    }

    /// `true` when both handles refer to the same restart.
    pub fn same_restart(&self, other: &RestartHandle) -> bool {
        self.id == other.id
    }

    /// Wait until the restart leaves [`RestartStatus::Pending`].  The tracker
    /// must keep ticking for that to happen.
    pub async fn wait(mut self) -> RestartStatus {
        loop {
            let status = *self.rx.borrow_and_update();
            if status.is_done() {
                return status;
            }
            if self.rx.changed().await.is_err() {
                let status = *self.rx.borrow();
                return if status.is_done() {
                    status
                } else {
                    RestartStatus::Abandoned
                };
            }
        }
    }
}

struct PendingRestart {
    id: u64,
    tx: watch::Sender<RestartStatus>,
    rx: watch::Receiver<RestartStatus>,
}

impl PendingRestart {
    fn handle(&self) -> RestartHandle {
        RestartHandle {
            id: self.id,
            rx: self.rx.clone(),
        }
    }

    fn finish(self, status: RestartStatus) {
        // `self.rx` is alive, so this cannot fail.
        let _ = self.tx.send(status);
    }
}

// ---------------------------------------------------------------------------
// HandTracker
// ---------------------------------------------------------------------------

pub struct HandTracker {
    config: TrackerConfig,
    factory: DetectorFactory,
    state: TrackerState,
    camera: Option<Box<dyn CameraSource>>,
    router: Option<InferenceRouter>,
    scheduler: AdaptiveScheduler,
    filter: TemporalFilter,
    /// Latest filtered hands.  Cleared in place, never reallocated.
    cache: HandsFrame,
    infer_enabled: bool,
    /// Frames are pushed through `on_video_frame` instead of pulled.
    frame_loop: bool,
    now_ms: f64,
    last_detect_ts_ms: Option<f64>,
    last_result_ts_ms: Option<f64>,
    last_result_at_ms: Option<f64>,
    latest_video_ms: Option<f64>,
    video_ms_at_result: Option<f64>,
    restart: Option<PendingRestart>,
    restart_seq: u64,
    frames_inferred: u64,
    stale_clears: u64,
}

impl HandTracker {
    /// Create a stopped tracker.  `factory` builds a detector for each
    /// backend that needs one.
    pub fn new(config: TrackerConfig, factory: DetectorFactory) -> Self {
        let scheduler = AdaptiveScheduler::new(&config.scheduler, config.safe_mode);
        Self {
            infer_enabled: config.detector.enabled,
            config,
            factory,
            state: TrackerState::Stopped,
            camera: None,
            router: None,
            scheduler,
            filter: TemporalFilter::default(),
            cache: HandsFrame::empty(),
            frame_loop: false,
            now_ms: 0.0,
            last_detect_ts_ms: None,
            last_result_ts_ms: None,
            last_result_at_ms: None,
            latest_video_ms: None,
            video_ms_at_result: None,
            restart: None,
            restart_seq: 0,
            frames_inferred: 0,
            stale_clears: 0,
        }
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Open `camera` and bring up a detector backend.
    ///
    /// Camera failures are returned as-is.  With the worker preferred the
    /// model loads in the background and failures there only trigger the
    /// main-thread fallback; otherwise the model is loaded before this
    /// returns and its failure is returned.
    pub async fn start(&mut self, mut camera: Box<dyn CameraSource>) -> Result<(), TrackerError> {
        if self.state != TrackerState::Stopped {
            return Err(TrackerError::AlreadyRunning);
        }
        self.state = TrackerState::Starting;
        log::info!(
            "tracker: starting (safe_mode={}, max_hands={})",
            self.config.safe_mode,
            self.config.effective_max_hands()
        );

        let constraints = CameraConstraints::from_profile(self.config.profile());
        if let Err(e) = camera.open(&constraints).await {
            log::error!("tracker: camera unavailable: {e}");
            self.state = TrackerState::Stopped;
            return Err(e.into());
        }

        let options = DetectorOptions::from_config(&self.config);
        let mut router = InferenceRouter::new(
            self.factory.clone(),
            options.clone(),
            self.config.detector.enabled,
            self.config.detector.prefer_worker,
        );

        if self.config.detector.enabled && !self.config.detector.prefer_worker {
            let factory = self.factory.clone();
            let joined = tokio::task::spawn_blocking(move || {
                MainThreadBackend::init_blocking(&factory, &options)
            })
            .await;
            let outcome = joined.unwrap_or_else(|e| Err(BackendError::Spawn(e.to_string())));
            match outcome {
                Ok(backend) => router.install_main(backend),
                Err(e) => {
                    log::error!("tracker: detector initialisation failed: {e}");
                    camera.close();
                    self.state = TrackerState::Stopped;
                    return Err(e.into());
                }
            }
        } else {
            router.start_background();
        }

        self.scheduler = AdaptiveScheduler::new(&self.config.scheduler, self.config.safe_mode);
        self.reset_session();
        self.infer_enabled = self.config.detector.enabled;
        self.camera = Some(camera);
        self.router = Some(router);
        self.state = TrackerState::Running;
        log::info!("tracker: running");
        Ok(())
    }

    /// Close the camera, stop the worker and drop all cached state.  Any
    /// in-flight request is abandoned.
    pub fn stop(&mut self) {
        if self.state == TrackerState::Stopped && self.camera.is_none() && self.router.is_none() {
            return;
        }
        if let Some(mut camera) = self.camera.take() {
            camera.close();
        }
        if let Some(mut router) = self.router.take() {
            router.teardown();
        }
        if let Some(pending) = self.restart.take() {
            pending.finish(RestartStatus::Abandoned);
        }
        self.reset_session();
        self.state = TrackerState::Stopped;
        log::info!("tracker: stopped after {} inferences", self.frames_inferred);
    }

    fn reset_session(&mut self) {
        self.cache.clear();
        self.filter.clear();
        self.frame_loop = false;
        self.last_detect_ts_ms = None;
        self.last_result_ts_ms = None;
        self.last_result_at_ms = None;
        self.latest_video_ms = None;
        self.video_ms_at_result = None;
    }

    // -----------------------------------------------------------------------
    // Per-tick
    // -----------------------------------------------------------------------

    /// Advance the tracker to render time `t` (seconds) and return the
    /// latest hands.
    pub fn update(&mut self, t: f64, _dt: f32) -> &HandsFrame {
        let now_ms = t * 1000.0;
        self.now_ms = now_ms;
        if self.state != TrackerState::Running {
            return &self.cache;
        }

        self.drain_results(now_ms);
        self.settle_restart();

        if !self.frame_loop {
            if let Some(frame) = self.camera.as_mut().and_then(|c| c.grab_frame()) {
                self.schedule(now_ms, frame);
            }
        }

        self.check_staleness(now_ms);
        &self.cache
    }

    /// Push one decoded frame.  Switches the tracker to frame-loop mode:
    /// from now on [`update`](Self::update) only returns the cache.
    pub fn on_video_frame(&mut self, t: f64, frame: VideoFrame) {
        let now_ms = t * 1000.0;
        self.now_ms = now_ms;
        if self.state != TrackerState::Running {
            return;
        }
        if !self.frame_loop {
            log::debug!("tracker: switching to frame-loop mode");
            self.frame_loop = true;
        }
        self.drain_results(now_ms);
        self.settle_restart();
        self.schedule(now_ms, frame);
        self.check_staleness(now_ms);
    }

    fn drain_results(&mut self, now_ms: f64) {
        loop {
            let completion = match self.router.as_mut() {
                Some(router) => router.poll(),
                None => None,
            };
            match completion {
                Some(c) => self.process(now_ms, c),
                None => break,
            }
        }
    }

    fn schedule(&mut self, now_ms: f64, frame: VideoFrame) {
        let video_ms = frame.presentation_time_ms;
        self.latest_video_ms = Some(self.latest_video_ms.map_or(video_ms, |v| v.max(video_ms)));

        if !self.infer_enabled || !self.scheduler.should_infer(now_ms, video_ms) {
            return;
        }
        if self.router.as_ref().map_or(BackendKind::Off, InferenceRouter::kind) == BackendKind::Off
        {
            return;
        }

        let timestamp_ms = self.next_timestamp(now_ms);
        let Some(router) = self.router.as_mut() else {
            return;
        };
        match router.dispatch(frame, timestamp_ms) {
            Routed::Sent => {
                self.last_detect_ts_ms = Some(timestamp_ms);
                self.scheduler.mark_dispatched(now_ms, video_ms);
            }
            Routed::Completed(c) => {
                self.last_detect_ts_ms = Some(timestamp_ms);
                self.scheduler.mark_dispatched(now_ms, video_ms);
                self.process(now_ms, c);
            }
            Routed::Dropped | Routed::Off => {}
        }
    }

    /// Detector timestamps must strictly increase.
    fn next_timestamp(&self, now_ms: f64) -> f64 {
        match self.last_detect_ts_ms {
            Some(last) if now_ms <= last => last + 1.0,
            _ => now_ms,
        }
    }

    fn process(&mut self, now_ms: f64, completion: Completion) {
        self.scheduler.record_latency(completion.infer_ms);
        self.frames_inferred += 1;

        let dt = match self.last_result_ts_ms {
            Some(prev) if completion.timestamp_ms > prev => {
                ((completion.timestamp_ms - prev) / 1000.0) as f32
            }
            _ => DEFAULT_DT,
        };
        self.last_result_ts_ms = Some(completion.timestamp_ms);
        self.last_result_at_ms = Some(now_ms);
        self.video_ms_at_result = self.latest_video_ms;

        let max_hands = self.config.effective_max_hands();
        let mirror_x = self.config.mirror_x;
        self.cache.clear();
        if let Some(result) = completion.result.as_ref() {
            self.cache.hands.extend(
                result
                    .hands()
                    .take(max_hands)
                    .map(|raw| pose::extract(&raw, mirror_x)),
            );
        }

        let keep_landmarks = self.scheduler.profile().emit_landmarks;
        self.filter.apply(&mut self.cache.hands, dt, keep_landmarks);
        self.cache.count = self.cache.hands.len();
        log::trace!(
            "tracker: {} hand(s) in {:.1} ms (ema {:.1} ms)",
            self.cache.count,
            completion.infer_ms,
            self.scheduler.infer_ms_ema()
        );
    }

    fn check_staleness(&mut self, now_ms: f64) {
        if self.cache.is_empty() && self.filter.is_empty() {
            return;
        }
        let Some(last_result) = self.last_result_at_ms else {
            return;
        };
        if now_ms - last_result <= self.scheduler.profile().stale_ms {
            return;
        }
        let video_moved = match (self.latest_video_ms, self.video_ms_at_result) {
            (Some(latest), Some(at_result)) => latest > at_result,
            (Some(_), None) => true,
            _ => false,
        };
        if video_moved {
            log::debug!(
                "tracker: no inference for {:.0} ms, dropping {} stale hand(s)",
                now_ms - last_result,
                self.cache.count
            );
            self.cache.clear();
            self.filter.clear();
            self.stale_clears += 1;
        }
    }

    // -----------------------------------------------------------------------
    // Restart
    // -----------------------------------------------------------------------

    /// Tear the detector down and bring it up again from scratch.
    ///
    /// Inference is paused for the configured window starting now.  While a
    /// restart is pending, further calls return a handle to the same
    /// restart.  The handle resolves on a later [`update`](Self::update)
    /// once a backend is ready or every backend has failed.  Failures are
    /// not surfaced beyond [`RestartStatus::Failed`].
    pub fn restart_landmarker(&mut self) -> RestartHandle {
        if let Some(pending) = &self.restart {
            return pending.handle();
        }
        self.restart_seq += 1;
        let id = self.restart_seq;

        let Some(router) = self.router.as_mut() else {
            log::warn!("tracker: restart requested while stopped");
            return RestartHandle::resolved(id, RestartStatus::Failed);
        };

        let pause_until = self.now_ms + self.config.scheduler.restart_pause_ms;
        self.scheduler.pause_until(pause_until);
        router.restart();
        log::info!("tracker: detector restart #{id}, inference paused until {pause_until:.0} ms");

        let (tx, rx) = watch::channel(RestartStatus::Pending);
        let pending = PendingRestart { id, tx, rx };
        let handle = pending.handle();
        self.restart = Some(pending);
        handle
    }

    fn settle_restart(&mut self) {
        let Some(router) = self.router.as_ref() else {
            return;
        };
        if self.restart.is_none() || !router.is_settled() {
            return;
        }
        let status = if router.kind() == BackendKind::Off {
            RestartStatus::Failed
        } else {
            RestartStatus::Completed
        };
        if let Some(pending) = self.restart.take() {
            log::info!("tracker: restart #{} {:?}", pending.id, status);
            pending.finish(status);
        }
    }

    // -----------------------------------------------------------------------
    // Runtime options
    // -----------------------------------------------------------------------

    /// Switch between the normal and reduced-power profiles.  Frame rate,
    /// camera constraints and the detector's hand count all change; the
    /// next inference uses them.
    pub fn set_safe_mode(&mut self, on: bool) {
        if self.config.safe_mode == on {
            return;
        }
        self.config.safe_mode = on;
        let profile = self.config.profile().clone();
        log::info!(
            "tracker: safe mode {} ({} fps, {}x{})",
            if on { "on" } else { "off" },
            profile.target_fps,
            profile.camera_width,
            profile.camera_height
        );

        if let Some(camera) = self.camera.as_mut() {
            if let Err(e) = camera.apply_constraints(&CameraConstraints::from_profile(&profile)) {
                log::warn!("tracker: camera rejected new constraints: {e}");
            }
        }
        self.scheduler.set_profile(profile);
        self.reconfigure_detector();
    }

    /// Change the number of hands requested from the detector.
    pub fn set_max_hands(&mut self, max_hands: usize) {
        let max_hands = max_hands.max(1);
        if self.config.max_hands == max_hands {
            return;
        }
        self.config.max_hands = max_hands;
        self.reconfigure_detector();
    }

    /// Mirror subsequent results horizontally.
    pub fn set_mirror_x(&mut self, mirror_x: bool) {
        self.config.mirror_x = mirror_x;
    }

    /// Gate inference without tearing down the backend.  Cached hands age
    /// out through the staleness check.
    pub fn set_infer_enabled(&mut self, enabled: bool) {
        self.infer_enabled = enabled;
        if let Some(router) = self.router.as_mut() {
            router.set_enabled(enabled);
        }
    }

    fn reconfigure_detector(&mut self) {
        let options = DetectorOptions::from_config(&self.config);
        if let Some(router) = self.router.as_mut() {
            router.configure(options);
        }
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn state(&self) -> TrackerState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state.is_running()
    }

    /// Latest filtered hands.
    pub fn hands(&self) -> &HandsFrame {
        &self.cache
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    pub fn backend(&self) -> BackendKind {
        self.router.as_ref().map_or(BackendKind::Off, InferenceRouter::kind)
    }

    pub fn last_worker_error(&self) -> Option<&str> {
        self.router.as_ref().and_then(InferenceRouter::last_worker_error)
    }

    pub fn stats(&self) -> TrackerStats {
        TrackerStats {
            state: self.state,
            backend: self.backend(),
            safe_mode: self.config.safe_mode,
            infer_enabled: self.infer_enabled,
            infer_ms_ema: self.scheduler.infer_ms_ema(),
            interval_ms: self.scheduler.interval_ms(),
            frames_inferred: self.frames_inferred,
            frames_dropped: self.router.as_ref().map_or(0, InferenceRouter::frames_dropped),
            stale_clears: self.stale_clears,
            last_worker_error: self.last_worker_error().map(str::to_owned),
            paused: self.scheduler.is_paused(self.now_ms),
            hands: self.cache.count,
        }
    }
}

impl Drop for HandTracker {
    fn drop(&mut self) {
        self.stop();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
