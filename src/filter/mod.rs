//! Temporal smoothing of per-hand feature streams.
//!
//! [`TemporalFilter`] owns one smoothing slot per [`HandKey`] and is driven
//! once per completed inference by the tracker.  See [`temporal`] for the
//! smoothing law.

pub mod temporal;

pub use temporal::{HandKey, TemporalFilter, DEFAULT_BASE_TAU};
