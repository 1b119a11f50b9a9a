//! Camera hand tracking and gesture-driven control signals.
//!
//! ```text
//! camera ─▶ scheduler ─▶ inference (worker | main thread) ─▶ pose ─▶ filter
//!                                                                      │
//!                         ControlState ◀── ControlBus ◀── HandsFrame ◀─┘
//! ```
//!
//! * [`tracker::HandTracker`]: one tracking session, driven per render tick.
//! * [`control::ControlBus`]: slewed control channels, reset and swipe
//!   gestures.
//! * [`inference::HandDetector`]: the seam for the landmark model.
//! * [`camera::CameraSource`]: the seam for the video source.

pub mod camera;
pub mod config;
pub mod control;
pub mod filter;
pub mod inference;
pub mod pose;
pub mod scheduler;
pub mod tracker;
