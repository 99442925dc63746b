// # Memory State Store
//
// In-memory implementation of StateStore.
//
// Nothing survives a restart. Useful for tests and for one-shot runs that
// only need the outcome of the current apply.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::Error;
use crate::traits::state_store::{AppliedState, StateStore};

/// In-memory state store implementation
///
/// # Example
///
/// ```rust,no_run
/// use hostbucket_core::state::MemoryStateStore;
/// use hostbucket_core::traits::{AppliedState, StateStore};
/// use hostbucket_core::{HostnameMap, Network};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = MemoryStateStore::new();
///
///     let state = AppliedState::new(Network::Staging, HostnameMap::new(), vec!["atv_1".into()]);
///     store.set_state("prp_1", &state).await?;
///
///     let loaded = store.get_state("prp_1").await?;
///     assert_eq!(loaded.unwrap().last_activation_id(), Some("atv_1"));
///
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryStateStore {
    inner: Arc<RwLock<HashMap<String, AppliedState>>>,
}

impl MemoryStateStore {
    /// Create a new empty memory state store
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the number of recorded properties
    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    /// Check if the store is empty
    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn get_state(&self, property_id: &str) -> Result<Option<AppliedState>, Error> {
        Ok(self.inner.read().await.get(property_id).cloned())
    }

    async fn set_state(&self, property_id: &str, state: &AppliedState) -> Result<(), Error> {
        self.inner
            .write()
            .await
            .insert(property_id.to_string(), state.clone());
        Ok(())
    }

    async fn delete_state(&self, property_id: &str) -> Result<(), Error> {
        self.inner.write().await.remove(property_id);
        Ok(())
    }

    async fn list_properties(&self) -> Result<Vec<String>, Error> {
        let mut ids: Vec<String> = self.inner.read().await.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }

    async fn flush(&self) -> Result<(), Error> {
        Ok(())
    }
}
