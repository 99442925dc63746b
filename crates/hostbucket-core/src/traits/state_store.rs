// # State Store Trait
//
// Defines the interface for recording what an apply produced.
//
// ## Purpose
//
// Planning always reads the current hostnames from the upstream API; the
// store is never consulted for that. It keeps, per property, the outcome of
// the last successful apply:
// - The hostnames attached afterwards (with their derived cname-to)
// - The activation ids the apply started
// - When it happened
//
// ## Implementations
//
// - Memory: `MemoryStateStore`
// - File: `FileStateStore` (JSON)

use async_trait::async_trait;

use crate::model::{HostnameMap, Network};

/// Outcome of the last successful apply for one property
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct AppliedState {
    /// Network the hostnames were applied to
    pub network: Network,
    /// Hostnames attached after the apply
    pub hostnames: HostnameMap,
    /// Activations started by the apply, in submission order
    #[serde(default)]
    pub activation_ids: Vec<String>,
    /// Number of attached hostnames
    pub hostname_count: usize,
    /// Timestamp of the apply
    pub last_updated: chrono::DateTime<chrono::Utc>,
}

impl AppliedState {
    /// Record an apply that just finished
    pub fn new(network: Network, hostnames: HostnameMap, activation_ids: Vec<String>) -> Self {
        Self {
            network,
            hostname_count: hostnames.len(),
            hostnames,
            activation_ids,
            last_updated: chrono::Utc::now(),
        }
    }

    /// Id of the most recent activation, if the apply started any
    pub fn last_activation_id(&self) -> Option<&str> {
        self.activation_ids.last().map(String::as_str)
    }
}

/// Trait for state store implementations
///
/// All methods must be safe to call concurrently from multiple tasks.
/// Stores perform storage I/O only; they never call the upstream API and
/// never decide what to apply.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Get the applied state of a property
    ///
    /// - `Ok(None)`: Nothing recorded for this property
    async fn get_state(&self, property_id: &str) -> Result<Option<AppliedState>, crate::Error>;

    /// Create or replace the applied state of a property
    async fn set_state(&self, property_id: &str, state: &AppliedState)
    -> Result<(), crate::Error>;

    /// Forget a property (no error if it was not recorded)
    async fn delete_state(&self, property_id: &str) -> Result<(), crate::Error>;

    /// List all recorded property ids
    async fn list_properties(&self) -> Result<Vec<String>, crate::Error>;

    /// Persist any pending changes
    async fn flush(&self) -> Result<(), crate::Error>;
}
