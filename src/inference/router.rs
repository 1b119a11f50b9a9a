//! Backend selection and the one-way worker → main-thread fallback.
//!
//! [`InferenceRouter`] owns at most one [`WorkerBackend`] and one
//! [`MainThreadBackend`] and decides, on every dispatch, which of them runs:
//!
//! ```text
//! disabled by config                  → Off
//! worker allowed and ready            → Worker
//! main-thread backend ready           → MainThread
//! otherwise (still initialising)      → Off
//! ```
//!
//! The first worker failure is latched: the worker is stopped, its message
//! kept as [`last_worker_error`](InferenceRouter::last_worker_error), and a
//! main-thread backend is initialised in the background.  The worker is
//! never tried again for the life of the router.

use thiserror::Error;

use crate::camera::VideoFrame;

use super::detector::{Completion, DetectorError, DetectorFactory, DetectorOptions};
use super::main_thread::MainThreadBackend;
use super::worker::{Dispatch, WorkerBackend, WorkerEvent};

// ---------------------------------------------------------------------------
// BackendError
// ---------------------------------------------------------------------------

/// Errors raised while bringing a backend up.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum BackendError {
    /// An OS thread could not be created.
    #[error("failed to spawn inference thread: {0}")]
    Spawn(String),

    /// The worker went away before it could be addressed.
    #[error("inference worker disconnected")]
    Disconnected,

    #[error(transparent)]
    Detector(#[from] DetectorError),
}

// ---------------------------------------------------------------------------
// BackendKind / Routed
// ---------------------------------------------------------------------------

/// Which backend the next frame would go to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub enum BackendKind {
    Worker,
    MainThread,
    Off,
}

impl BackendKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Worker => "worker",
            Self::MainThread => "main-thread",
            Self::Off => "off",
        }
    }
}

/// Outcome of [`InferenceRouter::dispatch`].
#[derive(Debug, Clone, PartialEq)]
pub enum Routed {
    /// Frame is with the worker; the result arrives through
    /// [`poll`](InferenceRouter::poll).
    Sent,
    /// Main-thread backend ran inline.
    Completed(Completion),
    /// Worker busy; frame released.
    Dropped,
    /// No backend ready; frame released.
    Off,
}

// ---------------------------------------------------------------------------
// InferenceRouter
// ---------------------------------------------------------------------------

pub struct InferenceRouter {
    factory: DetectorFactory,
    options: DetectorOptions,
    enabled: bool,
    prefer_worker: bool,
    /// Cleared on the first worker failure and never set again.
    use_worker: bool,
    worker: Option<WorkerBackend>,
    main: Option<MainThreadBackend>,
    last_worker_error: Option<String>,
    /// Drops accumulated by workers that have since been stopped.
    retired_drops: u64,
}

impl InferenceRouter {
    pub fn new(
        factory: DetectorFactory,
        options: DetectorOptions,
        enabled: bool,
        prefer_worker: bool,
    ) -> Self {
        Self {
            factory,
            options,
            enabled,
            prefer_worker,
            use_worker: prefer_worker,
            worker: None,
            main: None,
            last_worker_error: None,
            retired_drops: 0,
        }
    }

    /// Bring up whichever backend configuration asks for, without blocking.
    /// Worker spawn failures fall back to the main thread.
    pub fn start_background(&mut self) {
        if !self.enabled {
            log::info!("inference disabled by configuration");
            return;
        }
        if self.use_worker {
            match WorkerBackend::spawn(self.factory.clone(), &self.options) {
                Ok(worker) => self.worker = Some(worker),
                Err(e) => self.fail_worker(e.to_string()),
            }
        } else {
            self.start_main_background();
        }
    }

    /// Adopt a main-thread backend that was initialised elsewhere.
    pub fn install_main(&mut self, backend: MainThreadBackend) {
        self.main = Some(backend);
    }

    /// Currently selected backend.
    pub fn kind(&self) -> BackendKind {
        if !self.enabled {
            return BackendKind::Off;
        }
        if self.use_worker && self.worker.as_ref().is_some_and(WorkerBackend::is_ready) {
            return BackendKind::Worker;
        }
        if self.main.as_ref().is_some_and(MainThreadBackend::is_ready) {
            return BackendKind::MainThread;
        }
        BackendKind::Off
    }

    /// `true` once no backend is still initialising.
    pub fn is_settled(&self) -> bool {
        let worker_pending = self
            .worker
            .as_ref()
            .is_some_and(|w| !w.is_ready() && !w.is_failed());
        let main_pending = self
            .main
            .as_ref()
            .is_some_and(MainThreadBackend::is_initializing);
        !worker_pending && !main_pending
    }

    /// Collect readiness changes and worker results.  Returns a completed
    /// worker inference, if one arrived.
    pub fn poll(&mut self) -> Option<Completion> {
        let event = self.worker.as_mut().and_then(WorkerBackend::poll);
        if let Some(main) = self.main.as_mut() {
            main.poll_ready();
        }
        match event {
            Some(WorkerEvent::Completed(c)) => Some(c),
            Some(WorkerEvent::Failed(message)) => {
                self.fail_worker(message);
                None
            }
            None => None,
        }
    }

    /// Route one frame.  The frame is consumed on every path.
    pub fn dispatch(&mut self, frame: VideoFrame, timestamp_ms: f64) -> Routed {
        match self.kind() {
            BackendKind::Off => Routed::Off,
            BackendKind::Worker => {
                let Some(worker) = self.worker.as_mut() else {
                    return Routed::Off;
                };
                match worker.infer(frame, timestamp_ms) {
                    Dispatch::Sent => Routed::Sent,
                    Dispatch::Dropped => Routed::Dropped,
                    Dispatch::Unavailable => Routed::Off,
                    Dispatch::Failed(message) => {
                        self.fail_worker(message);
                        Routed::Off
                    }
                }
            }
            BackendKind::MainThread => self
                .main
                .as_mut()
                .and_then(|m| m.detect(&frame, timestamp_ms))
                .map_or(Routed::Off, Routed::Completed),
        }
    }

    /// Push new detector options to every live backend.
    pub fn configure(&mut self, options: DetectorOptions) {
        if let Some(worker) = self.worker.as_mut() {
            worker.configure(&options);
        }
        if let Some(main) = self.main.as_mut() {
            main.configure(&options);
        }
        self.options = options;
    }

    /// Turn inference on or off without tearing anything down.
    pub fn set_enabled(&mut self, enabled: bool) {
        if enabled && !self.enabled && self.worker.is_none() && self.main.is_none() {
            self.enabled = true;
            self.start_background();
            return;
        }
        self.enabled = enabled;
    }

    /// Tear both backends down and start again from a fresh detector.  The
    /// worker stays disabled if it failed earlier.
    pub fn restart(&mut self) {
        log::info!("inference: restarting detector");
        self.teardown();
        self.start_background();
    }

    /// Stop the worker and release every detector.
    pub fn teardown(&mut self) {
        if let Some(mut worker) = self.worker.take() {
            self.retired_drops += worker.frames_dropped();
            worker.stop();
        }
        if let Some(mut main) = self.main.take() {
            main.teardown();
        }
    }

    pub fn last_worker_error(&self) -> Option<&str> {
        self.last_worker_error.as_deref()
    }

    /// `false` once the worker has failed, or if it was never preferred.
    pub fn uses_worker(&self) -> bool {
        self.use_worker
    }

    pub fn prefers_worker(&self) -> bool {
        self.prefer_worker
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn options(&self) -> &DetectorOptions {
        &self.options
    }

    /// Frames refused because the worker was busy.
    pub fn frames_dropped(&self) -> u64 {
        self.retired_drops + self.worker.as_ref().map_or(0, WorkerBackend::frames_dropped)
    }

    fn fail_worker(&mut self, message: String) {
        log::warn!("inference: worker failed, falling back to main thread: {message}");
        self.last_worker_error = Some(message);
        self.use_worker = false;
        if let Some(mut worker) = self.worker.take() {
            self.retired_drops += worker.frames_dropped();
            worker.stop();
        }
        if self.main.is_none() {
            self.start_main_background();
        }
    }

    fn start_main_background(&mut self) {
        match MainThreadBackend::init_background(self.factory.clone(), &self.options) {
            Ok(main) => self.main = Some(main),
            Err(e) => log::error!("inference: cannot start main-thread backend: {e}"),
        }
    }
}

impl Drop for InferenceRouter {
    fn drop(&mut self) {
        self.teardown();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;
    use crate::inference::detector::{HandDetector, MockDetector};
    use crate::pose::extract::fixtures;
    use crate::pose::Handedness;

    fn options() -> DetectorOptions {
        DetectorOptions {
            wasm_url: "/wasm".into(),
            model_url: "/hand_landmarker.task".into(),
            max_hands: 2,
        }
    }

    fn frame(t: f64) -> VideoFrame {
        VideoFrame::timing_only(640, 480, t)
    }

    /// The first detector built comes from `first`, every later one from
    /// `rest`.  Lets a test break the worker but not the fallback.
    fn split_factory(
        first: Arc<std::sync::Mutex<crate::inference::detector::MockControl>>,
        rest: Arc<std::sync::Mutex<crate::inference::detector::MockControl>>,
    ) -> DetectorFactory {
        let built = Arc::new(AtomicUsize::new(0));
        Arc::new(move || -> Box<dyn HandDetector> {
            if built.fetch_add(1, Ordering::SeqCst) == 0 {
                MockDetector::boxed(first.clone())
            } else {
                MockDetector::boxed(rest.clone())
            }
        })
    }

    fn poll_until(router: &mut InferenceRouter, mut done: impl FnMut(&InferenceRouter) -> bool) -> bool {
        for _ in 0..400 {
            router.poll();
            if done(router) {
                return true;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        false
    }

    #[test]
    fn disabled_router_is_off() {
        let control = MockDetector::control();
        let mut router =
            InferenceRouter::new(MockDetector::factory(control.clone()), options(), false, true);
        router.start_background();
        assert_eq!(router.kind(), BackendKind::Off);
        assert_eq!(router.dispatch(frame(1.0), 1.0), Routed::Off);
        assert_eq!(control.lock().unwrap().inits, 0);
    }

    #[test]
    fn worker_is_selected_once_ready() {
        let control = MockDetector::control();
        control.lock().unwrap().result = Some(MockDetector::result_with(&[
            fixtures::open_hand(0.5, 0.5, Handedness::Right),
        ]));
        let mut router =
            InferenceRouter::new(MockDetector::factory(control), options(), true, true);
        router.start_background();
        assert!(poll_until(&mut router, |r| r.kind() == BackendKind::Worker));

        assert_eq!(router.dispatch(frame(1.0), 1.0), Routed::Sent);
        assert_eq!(router.dispatch(frame(2.0), 2.0), Routed::Dropped);
        assert_eq!(router.frames_dropped(), 1);

        let mut got = None;
        for _ in 0..400 {
            if let Some(c) = router.poll() {
                got = Some(c);
                break;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(got.unwrap().timestamp_ms, 1.0);
    }

    #[test]
    fn worker_error_falls_back_to_main_thread_for_good() {
        let broken = MockDetector::control();
        broken.lock().unwrap().fail_detect = true;
        let healthy = MockDetector::control();
        let mut router = InferenceRouter::new(
            split_factory(broken, healthy.clone()),
            options(),
            true,
            true,
        );
        router.start_background();
        assert!(poll_until(&mut router, |r| r.kind() == BackendKind::Worker));
        assert_eq!(router.dispatch(frame(1.0), 1.0), Routed::Sent);

        assert!(poll_until(&mut router, |r| r.kind() == BackendKind::MainThread));
        assert!(!router.uses_worker());
        assert!(router
            .last_worker_error()
            .unwrap()
            .contains("mock detect failure"));

        for i in 0..5 {
            let t = 10.0 + i as f64;
            assert!(matches!(router.dispatch(frame(t), t), Routed::Completed(_)));
            router.poll();
            assert_eq!(router.kind(), BackendKind::MainThread);
        }
        assert_eq!(healthy.lock().unwrap().detects, 5);
    }

    #[test]
    fn worker_init_failure_also_falls_back() {
        let broken = MockDetector::control();
        broken.lock().unwrap().fail_init = true;
        let healthy = MockDetector::control();
        let mut router =
            InferenceRouter::new(split_factory(broken, healthy), options(), true, true);
        router.start_background();
        assert!(poll_until(&mut router, |r| r.kind() == BackendKind::MainThread));
        assert!(router.last_worker_error().is_some());
    }

    #[test]
    fn restart_keeps_worker_disabled_after_failure() {
        let broken = MockDetector::control();
        broken.lock().unwrap().fail_init = true;
        let healthy = MockDetector::control();
        let mut router = InferenceRouter::new(
            split_factory(broken, healthy.clone()),
            options(),
            true,
            true,
        );
        router.start_background();
        assert!(poll_until(&mut router, |r| r.kind() == BackendKind::MainThread));

        router.restart();
        assert!(poll_until(&mut router, |r| r.is_settled()));
        assert_eq!(router.kind(), BackendKind::MainThread);
        assert!(!router.uses_worker());
        assert_eq!(healthy.lock().unwrap().closes, 1);
    }

    #[test]
    fn main_thread_only_when_worker_not_preferred() {
        let control = MockDetector::control();
        let mut router =
            InferenceRouter::new(MockDetector::factory(control), options(), true, false);
        router.start_background();
        assert!(poll_until(&mut router, |r| r.kind() == BackendKind::MainThread));
        assert!(!router.uses_worker());
        assert_eq!(router.last_worker_error(), None);
    }

    #[test]
    fn configure_reaches_main_thread_detector() {
        let control = MockDetector::control();
        let mut router =
            InferenceRouter::new(MockDetector::factory(control.clone()), options(), true, false);
        router.start_background();
        assert!(poll_until(&mut router, |r| r.kind() == BackendKind::MainThread));

        let mut reduced = options();
        reduced.max_hands = 1;
        router.configure(reduced);
        assert_eq!(router.options().max_hands, 1);
        assert_eq!(
            control.lock().unwrap().last_options.as_ref().map(|o| o.max_hands),
            Some(1)
        );
    }
}
