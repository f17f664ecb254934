//! Keymint: a lightweight naming registry.
//!
//! Mints short, collision-free identifiers used to rename files and
//! collections, and records a derivation edge each time a new key
//! supersedes an older one, producing a traceable rename lineage. All
//! durable state lives in append-only flat files.

pub mod attrs;
pub mod error;
pub mod lineage;
pub mod registry;
pub mod service;
pub mod store;

pub use error::RegistryError;
pub use lineage::{LineageEdge, LineageLog, MatchMode};
pub use registry::{KeyAlphabet, KeyGenerator, KeySet, MAX_KEYS_TO_TRY, NO_ASSOCIATION};
pub use service::{
    AssignRequest, AssignedKey, ChainEntry, LineageReport, RegistryConfig, RegistryService,
    RegistryStats,
};
