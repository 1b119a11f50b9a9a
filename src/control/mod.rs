//! Gesture and control-signal layer.
//!
//! ```text
//! HandsFrame ─▶ ControlBus::update(t, dt)
//!                 ├─ select_hands      one Left, one Right (Unknown fallback)
//!                 ├─ exp_slew          continuous channels
//!                 ├─ ResetGesture      both open ≥ 520 ms → reset
//!                 └─ SwipeGesture      open left wrist |v| > 0.9 → sceneDelta
//!               ─▶ ControlState
//! ```

pub mod bus;
pub mod gesture;
pub mod state;

pub use bus::{select_hands, ControlBus};
pub use gesture::{exp_slew, ResetGesture, SwipeGesture};
pub use state::{ControlEvents, ControlState};
