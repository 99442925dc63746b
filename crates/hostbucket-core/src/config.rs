//! Configuration types for hostname bucket management
//!
//! This module defines all configuration structures used throughout the crate.

use serde::{Deserialize, Serialize};

use crate::batcher::HOSTNAME_LIMIT;
use crate::model::{BatchMetadata, Network, PropertyRef};

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostbucketConfig {
    /// Property whose hostname bucket is managed
    pub property: PropertyConfig,

    /// Upstream API configuration
    pub provider: ProviderConfig,

    /// State store configuration
    #[serde(default)]
    pub state_store: StateStoreConfig,

    /// Apply engine settings
    #[serde(default)]
    pub apply: ApplyConfig,
}

impl HostbucketConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        self.property.validate()?;
        self.provider.validate()?;
        self.apply.validate()?;
        Ok(())
    }
}

/// Property coordinates and the metadata sent with every batch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PropertyConfig {
    /// Property id, with or without the `prp_` prefix
    pub property_id: String,
    /// Contract id, with or without the `ctr_` prefix
    pub contract_id: String,
    /// Group id, with or without the `grp_` prefix
    pub group_id: String,
    /// Network the hostnames are activated on
    #[serde(default = "default_network")]
    pub network: Network,
    /// Free-text note attached to each activation
    #[serde(default)]
    pub note: Option<String>,
    /// Addresses notified about each activation
    #[serde(default)]
    pub notify_emails: Vec<String>,
}

impl PropertyConfig {
    /// Create a property configuration for the staging network
    pub fn new(
        property_id: impl Into<String>,
        contract_id: impl Into<String>,
        group_id: impl Into<String>,
    ) -> Self {
        Self {
            property_id: property_id.into(),
            contract_id: contract_id.into(),
            group_id: group_id.into(),
            network: default_network(),
            note: None,
            notify_emails: Vec::new(),
        }
    }

    /// Set the activation network
    pub fn with_network(mut self, network: Network) -> Self {
        self.network = network;
        self
    }

    /// Set the activation note
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    /// Set the notification addresses
    pub fn with_notify_emails(mut self, emails: Vec<String>) -> Self {
        self.notify_emails = emails;
        self
    }

    /// Property coordinates in prefixed form
    pub fn property_ref(&self) -> PropertyRef {
        PropertyRef::new(&self.property_id, &self.contract_id, &self.group_id)
    }

    /// Metadata copied into every batch
    pub fn batch_metadata(&self) -> BatchMetadata {
        BatchMetadata {
            network: self.network,
            note: self.note.clone(),
            notify_emails: self.notify_emails.clone(),
        }
    }

    /// Validate the property configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        for (name, value) in [
            ("property_id", &self.property_id),
            ("contract_id", &self.contract_id),
            ("group_id", &self.group_id),
        ] {
            if value.trim().is_empty() {
                return Err(crate::Error::config(format!("{name} cannot be empty")));
            }
        }

        for email in &self.notify_emails {
            let valid = email
                .split_once('@')
                .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.'));
            if !valid {
                return Err(crate::Error::config(format!(
                    "Invalid notification email address: '{email}'"
                )));
            }
        }

        Ok(())
    }
}

fn default_network() -> Network {
    Network::Staging
}

/// Upstream API configuration
#[derive(Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProviderConfig {
    /// Akamai Property Manager API with EdgeGrid credentials
    Akamai {
        /// API host, e.g. `akab-xxxx.luna.akamaiapis.net`
        host: String,
        /// EdgeGrid client token
        client_token: String,
        /// EdgeGrid client secret
        client_secret: String,
        /// EdgeGrid access token
        access_token: String,
        /// Account switch key for multi-account credentials
        #[serde(default)]
        account_switch_key: Option<String>,
        /// Override of `https://{host}`; used against test servers
        #[serde(default)]
        base_url: Option<String>,
    },

    /// Custom provider
    Custom {
        /// Factory name to use
        factory: String,
        /// Custom configuration data
        config: serde_json::Value,
    },
}

impl ProviderConfig {
    /// Validate the provider configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            ProviderConfig::Akamai {
                host,
                client_token,
                client_secret,
                access_token,
                ..
            } => {
                for (name, value) in [
                    ("host", host),
                    ("client_token", client_token),
                    ("client_secret", client_secret),
                    ("access_token", access_token),
                ] {
                    if value.trim().is_empty() {
                        return Err(crate::Error::config(format!(
                            "Akamai EdgeGrid {name} cannot be empty"
                        )));
                    }
                }
                if host.contains("://") {
                    return Err(crate::Error::config(
                        "Akamai EdgeGrid host must be a bare hostname without scheme",
                    ));
                }
                Ok(())
            }
            ProviderConfig::Custom { factory, config } => {
                if factory.is_empty() {
                    return Err(crate::Error::config(
                        "Custom provider factory cannot be empty",
                    ));
                }
                if config.is_null() {
                    return Err(crate::Error::config(
                        "Custom provider config cannot be null",
                    ));
                }
                Ok(())
            }
        }
    }

    /// Get the provider type name
    pub fn type_name(&self) -> &str {
        match self {
            ProviderConfig::Akamai { .. } => "akamai",
            ProviderConfig::Custom { factory, .. } => factory,
        }
    }
}

// Credentials must never reach logs.
impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderConfig::Akamai {
                host,
                account_switch_key,
                base_url,
                ..
            } => f
                .debug_struct("Akamai")
                .field("host", host)
                .field("client_token", &"<REDACTED>")
                .field("client_secret", &"<REDACTED>")
                .field("access_token", &"<REDACTED>")
                .field("account_switch_key", account_switch_key)
                .field("base_url", base_url)
                .finish(),
            ProviderConfig::Custom { factory, .. } => f
                .debug_struct("Custom")
                .field("factory", factory)
                .field("config", &"<REDACTED>")
                .finish(),
        }
    }
}

/// State store configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StateStoreConfig {
    /// File-based state store
    File {
        /// Path to the state file
        path: String,
    },

    /// In-memory state store (not persistent)
    #[default]
    Memory,
}

/// Apply engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplyConfig {
    /// Maximum operations per PATCH request
    #[serde(default = "default_batch_limit")]
    pub batch_limit: usize,

    /// Delay between activation status checks (in seconds)
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// How long a single activation may take before the apply gives up
    /// (in seconds)
    #[serde(default = "default_activation_timeout_secs")]
    pub activation_timeout_secs: u64,

    /// Consecutive failed status checks tolerated before giving up
    ///
    /// Only transient errors count; any other error fails immediately.
    #[serde(default = "default_max_poll_errors")]
    pub max_poll_errors: usize,

    /// Capacity of the engine event channel
    ///
    /// When full, new events are dropped (with a warning log).
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

impl ApplyConfig {
    /// Validate the apply configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.batch_limit == 0 || self.batch_limit > HOSTNAME_LIMIT {
            return Err(crate::Error::config(format!(
                "batch_limit must be between 1 and {HOSTNAME_LIMIT}. Got: {}",
                self.batch_limit
            )));
        }
        if self.poll_interval_secs == 0 {
            return Err(crate::Error::config("poll_interval_secs must be > 0"));
        }
        if self.activation_timeout_secs < self.poll_interval_secs {
            return Err(crate::Error::config(format!(
                "activation_timeout_secs ({}) must be at least poll_interval_secs ({})",
                self.activation_timeout_secs, self.poll_interval_secs
            )));
        }
        if self.event_channel_capacity == 0 {
            return Err(crate::Error::config("event_channel_capacity must be > 0"));
        }
        Ok(())
    }
}

impl Default for ApplyConfig {
    fn default() -> Self {
        Self {
            batch_limit: default_batch_limit(),
            poll_interval_secs: default_poll_interval_secs(),
            activation_timeout_secs: default_activation_timeout_secs(),
            max_poll_errors: default_max_poll_errors(),
            event_channel_capacity: default_event_channel_capacity(),
        }
    }
}

fn default_batch_limit() -> usize {
    HOSTNAME_LIMIT
}

fn default_poll_interval_secs() -> u64 {
    60
}

fn default_activation_timeout_secs() -> u64 {
    50 * 60
}

fn default_max_poll_errors() -> usize {
    3
}

fn default_event_channel_capacity() -> usize {
    1000
}
