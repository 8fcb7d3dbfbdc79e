//! Rating engine: converts per-worker telemetry into one bounded,
//! comparable score per hotkey.

pub mod engine;

pub use engine::{RatingCalculator, RatingConfig};
