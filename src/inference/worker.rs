//! Off-thread inference backend.
//!
//! [`WorkerBackend`] owns a dedicated OS thread (`hand-worker`) that holds
//! its own detector instance.  The two sides talk only through
//! [`WorkerRequest`] / [`WorkerReply`] messages over `std::sync::mpsc`.
//!
//! ```text
//! tracker                         hand-worker thread
//!   spawn ──init──────────────────▶ factory() + init
//!         ◀──────────────ready|error
//!   infer(frame) ─infer{frame}────▶ detect (frame moved, dropped after)
//!         ◀─────result|error
//!   stop ──stop───────────────────▶ close + exit
//! ```
//!
//! At most one `infer` is outstanding.  A frame offered while the worker is
//! busy is dropped on the spot.  The first `error` reply, or a dead worker,
//! latches the backend into [`WorkerStatus::Failed`]; it never recovers.

use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::thread::JoinHandle;
use std::time::Instant;

use crate::camera::VideoFrame;

use super::detector::{
    Completion, DetectorError, DetectorFactory, DetectorOptions, HandDetector,
};
use super::protocol::{WorkerReply, WorkerRequest};
use super::router::BackendError;

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// Readiness of the worker's detector.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkerStatus {
    /// `init` sent, no reply yet.
    Initializing,
    /// Detector loaded; frames are accepted.
    Ready,
    /// Latched failure.  The string is the worker's error message.
    Failed(String),
}

/// Outcome of offering a frame to the worker.
#[derive(Debug, Clone, PartialEq)]
pub enum Dispatch {
    /// The frame was handed to the worker.
    Sent,
    /// A request was already in flight; the frame was released.
    Dropped,
    /// The worker is not ready; the frame was released.
    Unavailable,
    /// The worker is gone.  The backend is now failed.
    Failed(String),
}

/// Something the worker reported since the last poll.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkerEvent {
    Completed(Completion),
    Failed(String),
}

// ---------------------------------------------------------------------------
// WorkerBackend
// ---------------------------------------------------------------------------

pub struct WorkerBackend {
    requests: Sender<WorkerRequest>,
    replies: Receiver<WorkerReply>,
    status: WorkerStatus,
    busy: bool,
    stopped: bool,
    frames_sent: u64,
    frames_dropped: u64,
    /// Kept so the thread is not detached while the backend lives.
    _thread: JoinHandle<()>,
}

impl WorkerBackend {
    /// Spawn the worker thread and send `init`.  Returns immediately;
    /// readiness is observed through [`poll`](Self::poll).
    pub fn spawn(factory: DetectorFactory, options: &DetectorOptions) -> Result<Self, BackendError> {
        let (req_tx, req_rx) = mpsc::channel::<WorkerRequest>();
        let (reply_tx, reply_rx) = mpsc::channel::<WorkerReply>();

        let thread = std::thread::Builder::new()
            .name("hand-worker".into())
            .spawn(move || run_worker(factory, req_rx, reply_tx))
            .map_err(|e| BackendError::Spawn(e.to_string()))?;

        req_tx
            .send(WorkerRequest::init(options))
            .map_err(|_| BackendError::Disconnected)?;

        log::info!(
            "worker: spawned (max_hands={}, model={})",
            options.max_hands,
            options.model_url
        );

        Ok(Self {
            requests: req_tx,
            replies: reply_rx,
            status: WorkerStatus::Initializing,
            busy: false,
            stopped: false,
            frames_sent: 0,
            frames_dropped: 0,
            _thread: thread,
        })
    }

    pub fn status(&self) -> &WorkerStatus {
        &self.status
    }

    pub fn is_ready(&self) -> bool {
        self.status == WorkerStatus::Ready
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.status, WorkerStatus::Failed(_))
    }

    /// `true` while a request is outstanding.
    pub fn is_busy(&self) -> bool {
        self.busy
    }

    pub fn frames_sent(&self) -> u64 {
        self.frames_sent
    }

    pub fn frames_dropped(&self) -> u64 {
        self.frames_dropped
    }

    /// Offer `frame` for inference.  Ownership moves into the worker on
    /// [`Dispatch::Sent`]; on every other outcome the frame is dropped
    /// before this returns.
    pub fn infer(&mut self, frame: VideoFrame, timestamp_ms: f64) -> Dispatch {
        if self.status != WorkerStatus::Ready || self.stopped {
            return Dispatch::Unavailable;
        }
        if self.busy {
            self.frames_dropped += 1;
            log::trace!("worker: busy, dropping frame at {timestamp_ms:.1} ms");
            return Dispatch::Dropped;
        }
        match self.requests.send(WorkerRequest::Infer {
            frame,
            timestamp_ms,
        }) {
            Ok(()) => {
                self.busy = true;
                self.frames_sent += 1;
                Dispatch::Sent
            }
            Err(_) => {
                let message = "worker thread exited".to_string();
                self.fail(message.clone());
                Dispatch::Failed(message)
            }
        }
    }

    /// Drain pending replies.  Returns at most one event; `ready` replies
    /// only update [`status`](Self::status).
    pub fn poll(&mut self) -> Option<WorkerEvent> {
        if self.is_failed() || self.stopped {
            return None;
        }
        loop {
            match self.replies.try_recv() {
                Ok(WorkerReply::Ready) => {
                    log::info!("worker: detector ready");
                    self.status = WorkerStatus::Ready;
                }
                Ok(WorkerReply::Error { message }) => {
                    self.fail(message.clone());
                    return Some(WorkerEvent::Failed(message));
                }
                Ok(WorkerReply::InferResult {
                    timestamp_ms,
                    infer_ms,
                    result,
                }) => {
                    self.busy = false;
                    return Some(WorkerEvent::Completed(Completion {
                        timestamp_ms,
                        infer_ms,
                        result,
                    }));
                }
                Err(TryRecvError::Empty) => return None,
                Err(TryRecvError::Disconnected) => {
                    let message = "worker thread exited".to_string();
                    self.fail(message.clone());
                    return Some(WorkerEvent::Failed(message));
                }
            }
        }
    }

    /// Re-send `init` with new options.  Frames are refused until the
    /// worker answers `ready` again.
    pub fn configure(&mut self, options: &DetectorOptions) {
        if self.is_failed() || self.stopped {
            return;
        }
        if self.requests.send(WorkerRequest::init(options)).is_err() {
            self.fail("worker thread exited".into());
            return;
        }
        log::debug!("worker: reconfiguring (max_hands={})", options.max_hands);
        self.status = WorkerStatus::Initializing;
    }

    /// Ask the worker to release its model and exit.  Does not wait; an
    /// in-flight request is abandoned.
    pub fn stop(&mut self) {
        if self.stopped {
            return;
        }
        self.stopped = true;
        self.busy = false;
        let _ = self.requests.send(WorkerRequest::Stop {});
        log::debug!("worker: stop sent");
    }

    fn fail(&mut self, message: String) {
        log::warn!("worker: failed: {message}");
        self.status = WorkerStatus::Failed(message);
        self.busy = false;
    }
}

impl Drop for WorkerBackend {
    fn drop(&mut self) {
        self.stop();
    }
}

// ---------------------------------------------------------------------------
// Worker thread
// ---------------------------------------------------------------------------

fn run_worker(
    factory: DetectorFactory,
    requests: Receiver<WorkerRequest>,
    replies: Sender<WorkerReply>,
) {
    let mut detector: Option<Box<dyn HandDetector>> = None;

    while let Ok(request) = requests.recv() {
        let reply = match request {
            WorkerRequest::Init {
                wasm_url,
                model_url,
                max_hands,
            } => {
                let options = DetectorOptions {
                    wasm_url,
                    model_url,
                    max_hands,
                };
                match load(&factory, &mut detector, &options) {
                    Ok(()) => WorkerReply::Ready,
                    Err(e) => WorkerReply::Error {
                        message: e.to_string(),
                    },
                }
            }
            WorkerRequest::Infer {
                frame,
                timestamp_ms,
            } => {
                let reply = match detector.as_mut() {
                    None => WorkerReply::Error {
                        message: DetectorError::NotInitialised.to_string(),
                    },
                    Some(d) => {
                        let started = Instant::now();
                        match d.detect(&frame, timestamp_ms) {
                            Ok(result) => WorkerReply::InferResult {
                                timestamp_ms,
                                infer_ms: started.elapsed().as_secs_f64() * 1000.0,
                                result,
                            },
                            Err(e) => WorkerReply::Error {
                                message: e.to_string(),
                            },
                        }
                    }
                };
                drop(frame);
                reply
            }
            WorkerRequest::Stop {} => break,
        };

        if replies.send(reply).is_err() {
            break;
        }
    }

    if let Some(mut d) = detector.take() {
        d.close();
    }
    log::debug!("worker: thread exiting");
}

/// Build the detector on first use, reconfigure it afterwards.  A failed
/// load leaves no detector behind.
fn load(
    factory: &DetectorFactory,
    slot: &mut Option<Box<dyn HandDetector>>,
    options: &DetectorOptions,
) -> Result<(), DetectorError> {
    match slot.take() {
        Some(mut d) => match d.configure(options) {
            Ok(()) => {
                *slot = Some(d);
                Ok(())
            }
            Err(e) => {
                d.close();
                Err(e)
            }
        },
        None => {
            let mut d = factory();
            d.init(options)?;
            *slot = Some(d);
            Ok(())
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
