//! Hashpool Validator
//!
//! A validator node in a peer-to-peer mining-pool attestation network:
//! workers bind themselves to a hotkey by signed claim, the validator
//! records and replicates the bindings, and a rating cycle turns pool
//! telemetry into one normalized reputation score per hotkey.
//!
//! ## Module Structure
//!
//! ```text
//! src/
//! ├── lib.rs         - Crate root with re-exports
//! ├── main.rs        - Server entrypoint
//! ├── config.rs      - Configuration management
//! ├── crypto/        - Canonical encoding + Ed25519 verification
//! ├── registry/      - Binding model, acceptance pipeline, oracles
//! ├── database/      - BindingStore contract (memory + SQLite backends)
//! ├── sync/          - Watermarked replication from peer validators
//! ├── telemetry/     - Metrics snapshot types + Prometheus adapter
//! ├── rating/        - Normalized reputation scoring
//! ├── validator.rs   - Snapshot join + rating cycle
//! └── api/           - HTTP endpoints
//! ```

pub mod api;
pub mod config;
pub mod crypto;
pub mod database;
pub mod error;
pub mod rating;
pub mod registry;
pub mod sync;
pub mod telemetry;
pub mod validator;

// Re-export main types for convenience
pub use config::ValidatorConfig;
pub use crypto::Keypair;
pub use database::{BindingStore, MemoryBindingStore, SqliteBindingStore, StoreError};
pub use error::RemoteError;
pub use rating::{RatingCalculator, RatingConfig};
pub use registry::{
    claim_payload, Binding, BindingRegistry, ChainRegistry, PoolMembershipOracle, RegistryError,
    RejectReason, StaticChainRegistry, TelemetryWorkerProvider,
};
pub use sync::{HttpPeerRegistry, PeerRegistry, ReplicationSync, SyncReport};
pub use telemetry::{MinerKey, MinerMetrics, PrometheusClient, TelemetrySource};
pub use validator::Validator;
