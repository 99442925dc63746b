// # Hostname API Trait
//
// Defines the interface to the upstream service that owns a property's
// hostname bucket.
//
// ## Implementations
//
// - Akamai Property Manager: `hostbucket-provider-akamai` crate
//
// ## Usage
//
// ```rust,ignore
// use hostbucket_core::{HostnameApi, Network, PropertyRef};
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let api = /* HostnameApi implementation */;
//     let property = PropertyRef::new("prp_1", "ctr_1", "grp_1");
//
//     let current = api.list_hostnames(&property, Network::Staging).await?;
//     println!("{} hostnames attached", current.len());
//
//     Ok(())
// }
// ```

use async_trait::async_trait;

use crate::model::{Activation, BatchRequest, HostnameMap, Network, PropertyRef};

/// Trait for hostname API implementations
///
/// Implementations must be thread-safe and usable across async tasks.
///
/// # Contract
///
/// Every method performs exactly one logical upstream call (pagination
/// inside `list_hostnames` counts as one). Implementations must not retry,
/// sleep, poll or cache; the engine owns sequencing, polling, retry and
/// timeout policy. Errors are returned as-is so the engine can decide.
///
/// `patch_hostnames` is not idempotent: once a batch has been accepted the
/// upstream has started an activation. The engine never calls it twice for
/// the same batch.
#[async_trait]
pub trait HostnameApi: Send + Sync {
    /// List every hostname attached to the property on `network`
    ///
    /// `cname_to` of each returned record is filled from the
    /// network-specific target reported upstream.
    async fn list_hostnames(
        &self,
        property: &PropertyRef,
        network: Network,
    ) -> Result<HostnameMap, crate::Error>;

    /// Submit one batch and return the id of the activation it started
    async fn patch_hostnames(
        &self,
        property: &PropertyRef,
        batch: &BatchRequest,
    ) -> Result<String, crate::Error>;

    /// Fetch the current state of a hostname activation
    async fn get_activation(
        &self,
        property: &PropertyRef,
        activation_id: &str,
    ) -> Result<Activation, crate::Error>;

    /// Get the provider name (for logging/debugging)
    fn provider_name(&self) -> &'static str;
}

/// Helper trait for constructing hostname APIs from configuration
pub trait HostnameApiFactory: Send + Sync {
    /// Create a HostnameApi instance from configuration
    fn create(
        &self,
        config: &crate::config::ProviderConfig,
    ) -> Result<Box<dyn HostnameApi>, crate::Error>;
}
