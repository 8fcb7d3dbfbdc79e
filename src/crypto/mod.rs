//! Cryptographic utilities for the validator
//!
//! Provides the two leaf components every binding claim passes through:
//! - Canonical payload encoding (stable bytes for signing across nodes)
//! - Ed25519 signature verification and the miner-side signing helper

pub mod canonical;
pub mod signing;

pub use canonical::{encode, CanonicalValue};
pub use signing::{verify, Keypair};
