//! HTTP surface of the validator
//!
//! Provides REST endpoints for:
//! - Worker registration (signed binding claims)
//! - Ratings and raw telemetry inspection
//! - The paginated binding listing peers replicate from

pub mod routes;

pub use routes::{create_router, AppState};
