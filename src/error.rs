//! Error taxonomy shared across subsystems.
//!
//! Remote collaborators (peers, oracles, the telemetry backend) can fail or
//! time out at any moment; those failures are recoverable and must never
//! escalate past the operation that hit them.

use thiserror::Error;

/// A remote call failed, timed out, or returned something unusable.
///
/// The affected registration attempt or sync pass is skipped and retried on
/// the next cycle; other peers and other claims are unaffected.
#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected response: {0}")]
    BadResponse(String),
}
