//! In-line inference backend.
//!
//! [`MainThreadBackend`] runs detection synchronously on the caller's
//! thread; the caller pays the full latency.  Loading the model can happen
//! either up front ([`init_blocking`](MainThreadBackend::init_blocking),
//! used by `start` through `spawn_blocking`) or on a helper thread
//! ([`init_background`](MainThreadBackend::init_background), used after a
//! worker failure or a restart) whose outcome is picked up by
//! [`poll_ready`](MainThreadBackend::poll_ready).

use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::time::Instant;

use crate::camera::VideoFrame;

use super::detector::{
    Completion, DetectorError, DetectorFactory, DetectorOptions, HandDetector,
};
use super::router::BackendError;

type InitOutcome = Result<Box<dyn HandDetector>, DetectorError>;

enum InitState {
    Initializing(Receiver<InitOutcome>),
    Ready(Box<dyn HandDetector>),
    Failed(String),
    Closed,
}

pub struct MainThreadBackend {
    state: InitState,
    options: DetectorOptions,
    /// Options changed while still initialising.
    reconfigure_pending: bool,
}

impl MainThreadBackend {
    /// Build and initialise a detector on the current thread.
    pub fn init_blocking(
        factory: &DetectorFactory,
        options: &DetectorOptions,
    ) -> Result<Self, BackendError> {
        let started = Instant::now();
        let mut detector = factory();
        detector.init(options)?;
        log::info!(
            "main-thread backend: detector ready in {:.0} ms",
            started.elapsed().as_secs_f64() * 1000.0
        );
        Ok(Self {
            state: InitState::Ready(detector),
            options: options.clone(),
            reconfigure_pending: false,
        })
    }

    /// Initialise on a helper thread.  The backend reports not-ready until
    /// [`poll_ready`](Self::poll_ready) observes the outcome.
    pub fn init_background(
        factory: DetectorFactory,
        options: &DetectorOptions,
    ) -> Result<Self, BackendError> {
        let (tx, rx) = mpsc::channel::<InitOutcome>();
        let init_options = options.clone();
        std::thread::Builder::new()
            .name("hand-model-init".into())
            .spawn(move || {
                let mut detector = factory();
                let outcome = detector.init(&init_options).map(|()| detector);
                // Receiver gone means the backend was torn down meanwhile.
                if let Err(mpsc::SendError(Ok(mut detector))) = tx.send(outcome) {
                    log::debug!("main-thread backend: torn down during init, releasing detector");
                    detector.close();
                }
            })
            .map_err(|e| BackendError::Spawn(e.to_string()))?;

        log::debug!("main-thread backend: initialising in background");
        Ok(Self {
            state: InitState::Initializing(rx),
            options: options.clone(),
            reconfigure_pending: false,
        })
    }

    /// Pick up a background initialisation result.  Returns
    /// [`is_ready`](Self::is_ready).
    pub fn poll_ready(&mut self) -> bool {
        let next = match &self.state {
            InitState::Initializing(rx) => match rx.try_recv() {
                Ok(Ok(detector)) => {
                    log::info!("main-thread backend: detector ready");
                    Some(InitState::Ready(detector))
                }
                Ok(Err(e)) => {
                    log::warn!("main-thread backend: init failed: {e}");
                    Some(InitState::Failed(e.to_string()))
                }
                Err(TryRecvError::Empty) => None,
                Err(TryRecvError::Disconnected) => {
                    log::warn!("main-thread backend: init thread exited without a result");
                    Some(InitState::Failed("init thread exited".into()))
                }
            },
            _ => None,
        };
        if let Some(state) = next {
            self.state = state;
            if self.reconfigure_pending {
                self.reconfigure_pending = false;
                let options = self.options.clone();
                self.configure(&options);
            }
        }
        self.is_ready()
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.state, InitState::Ready(_))
    }

    pub fn is_initializing(&self) -> bool {
        matches!(self.state, InitState::Initializing(_))
    }

    /// Reason for a failed initialisation.
    pub fn failure(&self) -> Option<&str> {
        match &self.state {
            InitState::Failed(reason) => Some(reason),
            _ => None,
        }
    }

    /// Run detection inline.  Returns `None` when the detector is not
    /// ready.  A failed pass is logged and reported as a completion with no
    /// result so its latency still counts.
    pub fn detect(&mut self, frame: &VideoFrame, timestamp_ms: f64) -> Option<Completion> {
        let InitState::Ready(detector) = &mut self.state else {
            return None;
        };
        let started = Instant::now();
        let result = match detector.detect(frame, timestamp_ms) {
            Ok(result) => result,
            Err(e) => {
                log::warn!("main-thread backend: detection failed at {timestamp_ms:.1} ms: {e}");
                None
            }
        };
        Some(Completion {
            timestamp_ms,
            infer_ms: started.elapsed().as_secs_f64() * 1000.0,
            result,
        })
    }

    /// Apply new options.  While initialising they are applied as soon as
    /// the detector is ready.
    pub fn configure(&mut self, options: &DetectorOptions) {
        self.options = options.clone();
        match &mut self.state {
            InitState::Ready(detector) => {
                if let Err(e) = detector.configure(options) {
                    log::warn!("main-thread backend: reconfigure failed: {e}");
                }
            }
            InitState::Initializing(_) => self.reconfigure_pending = true,
            InitState::Failed(_) | InitState::Closed => {}
        }
    }

    /// Release the detector.  Idempotent.
    pub fn teardown(&mut self) {
        if let InitState::Ready(detector) = &mut self.state {
            detector.close();
        }
        self.state = InitState::Closed;
    }
}

impl Drop for MainThreadBackend {
    fn drop(&mut self) {
        self.teardown();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
