//! The binding record and the reasons a claim can be turned away.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::crypto::{self, CanonicalValue};

/// An accepted (or submitted) worker-to-hotkey binding.
///
/// `worker` is the primary key: at most one binding may ever exist for a
/// worker, first accepted wins, and an accepted binding is never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Binding {
    pub worker: String,
    pub hotkey: String,
    /// UTC seconds, supplied by the claimant at signing time.
    pub registration_time: i64,
    /// Hex-encoded Ed25519 signature over [`Binding::signed_payload`].
    pub signature: String,
}

impl Binding {
    /// The canonical bytes the claimant signed: the three claim fields,
    /// canonically encoded. Re-derived identically on every validating node.
    pub fn signed_payload(&self) -> Vec<u8> {
        claim_payload(&self.hotkey, &self.worker, self.registration_time)
    }

    /// Signature-only check, used both at acceptance (pipeline step 3) and
    /// when re-validating bindings replicated from a peer.
    pub fn verify_signature(&self) -> bool {
        crypto::verify(&self.hotkey, &self.signed_payload(), &self.signature)
    }
}

/// Canonical claim bytes for the given fields. Exposed separately so the
/// miner-side signer can produce the payload before a [`Binding`] exists.
pub fn claim_payload(hotkey: &str, worker: &str, registration_time: i64) -> Vec<u8> {
    crypto::encode([
        ("hotkey", CanonicalValue::from(hotkey)),
        ("worker", CanonicalValue::from(worker)),
        ("registration_time", CanonicalValue::Int(registration_time)),
    ])
}

/// Why a claim was rejected. Terminal for that one claim; reported to the
/// submitter with the specific reason, never silently dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    #[error("registration timestamp is outside the freshness window")]
    StaleTimestamp,

    #[error("worker is not known to the mining pool")]
    WorkerUnknownToPool,

    #[error("signature verification failed")]
    BadSignature,

    #[error("hotkey is not registered on chain")]
    HotkeyNotRegistered,

    #[error("worker is already registered")]
    AlreadyRegistered,
}
