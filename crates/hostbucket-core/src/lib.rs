// # hostbucket-core
//
// Core library for managing the hostname bucket of a Property Manager
// property.
//
// ## Architecture Overview
//
// - **batcher**: Pure diff of current vs desired hostnames into size-limited
//   PATCH batches
// - **HostnameApi**: Trait for talking to the upstream hostname API
// - **StateStore**: Trait for recording what the last apply produced
// - **HostnameEngine**: Plans and applies batches, one settled activation
//   at a time
// - **ProviderRegistry**: Plugin-based registry for hostname API providers
//
// ## Design Principles
//
// 1. **Pure planning**: The batcher performs no I/O and cannot fail
// 2. **Deterministic output**: Batch order depends only on input content
// 3. **Engine-owned sequencing**: Providers make single-shot calls; polling,
//    retries and timeouts live in the engine
// 4. **Library-First**: All core functionality can be used as a library

pub mod batcher;
pub mod config;
pub mod engine;
pub mod error;
pub mod ids;
pub mod model;
pub mod registry;
pub mod state;
pub mod traits;

// Re-export core types for convenience
pub use batcher::{HOSTNAME_LIMIT, Plan};
pub use config::{ApplyConfig, HostbucketConfig, PropertyConfig, ProviderConfig};
pub use engine::{ApplyOutcome, EngineEvent, HostnameEngine};
pub use error::{Error, Result};
pub use model::{
    Action, Activation, ActivationStatus, AddEntry, BatchMetadata, BatchRequest,
    CertProvisioningType, HostnameMap, HostnameRecord, Network, Operation, PropertyRef,
};
pub use registry::ProviderRegistry;
pub use state::{FileStateStore, MemoryStateStore};
pub use traits::{HostnameApi, StateStore};
