//! Alerting System
//!
//! Turns the raw per-frame probability stream of a fatigue classifier into
//! a stable three-level alert signal (awake / warning / alarm) using
//! consecutive-frame persistence with reset on recovery.

mod config;
mod display;
mod machine;

pub use config::{AlertConfig, AlertConfigError, Polarity};
pub use display::{AlertDisplay, DisplayColor, Overlay};
pub use machine::{AlertLevel, AlertState, AlertStateMachine};
