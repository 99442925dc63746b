//! Hostname bucket data model
//!
//! Types shared by the batcher, the engine and provider implementations.
//! Wire formats are the provider's business; these types only carry the
//! information the upstream API needs.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::ids;

/// How the TLS certificate of a hostname is provisioned
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CertProvisioningType {
    /// Certificate managed automatically by the platform
    Default,
    /// Certificate managed by the customer through CPS
    CpsManaged,
}

impl CertProvisioningType {
    /// Upstream spelling
    pub fn as_str(&self) -> &'static str {
        match self {
            CertProvisioningType::Default => "DEFAULT",
            CertProvisioningType::CpsManaged => "CPS_MANAGED",
        }
    }
}

impl fmt::Display for CertProvisioningType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Activation network
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Network {
    /// Staging network
    Staging,
    /// Production network
    Production,
}

impl Network {
    /// Upstream spelling
    pub fn as_str(&self) -> &'static str {
        match self {
            Network::Staging => "STAGING",
            Network::Production => "PRODUCTION",
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Network {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "STAGING" => Ok(Network::Staging),
            "PRODUCTION" => Ok(Network::Production),
            other => Err(crate::Error::config(format!(
                "Unknown network '{other}'. Valid networks: STAGING, PRODUCTION"
            ))),
        }
    }
}

/// One hostname mapping, keyed elsewhere by its cname-from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostnameRecord {
    /// Certificate provisioning type
    pub cert_provisioning_type: CertProvisioningType,
    /// Target edge hostname id (`ehn_` form)
    pub edge_hostname_id: String,
    /// Delivery target derived by the upstream; never user input
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cname_to: Option<String>,
}

impl HostnameRecord {
    /// Create a record with a normalized edge hostname id
    pub fn new(cert_provisioning_type: CertProvisioningType, edge_hostname_id: &str) -> Self {
        Self {
            cert_provisioning_type,
            edge_hostname_id: ids::edge_hostname_id(edge_hostname_id),
            cname_to: None,
        }
    }

    /// Attach the server-derived delivery target
    pub fn with_cname_to(mut self, cname_to: impl Into<String>) -> Self {
        self.cname_to = Some(cname_to.into());
        self
    }

    /// Equality that ignores `cname_to`
    pub fn content_eq(&self, other: &HostnameRecord) -> bool {
        self.cert_provisioning_type == other.cert_provisioning_type
            && ids::edge_hostname_id(&self.edge_hostname_id)
                == ids::edge_hostname_id(&other.edge_hostname_id)
    }
}

/// Hostnames keyed by cname-from
pub type HostnameMap = HashMap<String, HostnameRecord>;

/// Trim every cname-from and prefix every edge hostname id
///
/// Fails when two keys collapse to the same hostname once trimmed.
pub fn normalize_map(hostnames: HostnameMap) -> Result<HostnameMap, crate::Error> {
    let mut normalized = HostnameMap::with_capacity(hostnames.len());
    for (cname_from, mut record) in hostnames {
        record.edge_hostname_id = ids::edge_hostname_id(&record.edge_hostname_id);
        let cname_from = cname_from.trim().to_string();
        if normalized.contains_key(&cname_from) {
            return Err(crate::Error::invalid_hostname(
                cname_from,
                "duplicate after normalization",
            ));
        }
        normalized.insert(cname_from, record);
    }
    Ok(normalized)
}

/// Check user-declared hostnames before they reach the batcher
pub fn validate_hostnames(hostnames: &HostnameMap) -> Result<(), crate::Error> {
    for (cname_from, record) in hostnames {
        validate_cname_from(cname_from)?;

        let digits = ids::strip_prefix(&record.edge_hostname_id, ids::EDGE_HOSTNAME_PREFIX);
        if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
            return Err(crate::Error::invalid_hostname(
                cname_from,
                format!(
                    "edge hostname id '{}' must look like 'ehn_<number>'",
                    record.edge_hostname_id
                ),
            ));
        }
    }
    Ok(())
}

fn validate_cname_from(cname_from: &str) -> Result<(), crate::Error> {
    let invalid = |reason: String| crate::Error::invalid_hostname(cname_from, reason);

    if cname_from.is_empty() {
        return Err(invalid("hostname cannot be empty".to_string()));
    }
    if cname_from.len() > 253 {
        return Err(invalid(format!("{} chars (max 253)", cname_from.len())));
    }

    for (i, label) in cname_from.split('.').enumerate() {
        // A leading wildcard label is allowed.
        if i == 0 && label == "*" {
            continue;
        }
        if label.is_empty() {
            return Err(invalid("empty label".to_string()));
        }
        if label.len() > 63 {
            return Err(invalid(format!("label '{label}' longer than 63 chars")));
        }
        if !label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
            return Err(invalid(format!("label '{label}' contains invalid characters")));
        }
        if label.starts_with('-') || label.ends_with('-') {
            return Err(invalid(format!("label '{label}' starts or ends with a hyphen")));
        }
    }
    Ok(())
}

/// Kind of a single change; adds sort before removes
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Action {
    /// Attach a hostname
    Add,
    /// Detach a hostname
    Remove,
}

/// A single change computed by the batcher
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operation {
    pub cname_from: String,
    pub cert_provisioning_type: CertProvisioningType,
    pub edge_hostname_id: String,
    pub action: Action,
}

impl Operation {
    pub fn add(cname_from: &str, record: &HostnameRecord) -> Self {
        Self::new(cname_from, record, Action::Add)
    }

    pub fn remove(cname_from: &str, record: &HostnameRecord) -> Self {
        Self::new(cname_from, record, Action::Remove)
    }

    fn new(cname_from: &str, record: &HostnameRecord, action: Action) -> Self {
        Self {
            cname_from: cname_from.to_string(),
            cert_provisioning_type: record.cert_provisioning_type,
            edge_hostname_id: record.edge_hostname_id.clone(),
            action,
        }
    }
}

/// A hostname to attach in a batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddEntry {
    pub cert_provisioning_type: CertProvisioningType,
    pub edge_hostname_id: String,
    pub cname_from: String,
}

/// Fields copied unchanged into every batch of a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchMetadata {
    pub network: Network,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub notify_emails: Vec<String>,
}

impl BatchMetadata {
    pub fn new(network: Network) -> Self {
        Self {
            network,
            note: None,
            notify_emails: Vec::new(),
        }
    }
}

/// One PATCH request worth of changes
///
/// `add.len() + remove.len()` never exceeds the limit the batch was built
/// with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchRequest {
    pub network: Network,
    pub note: Option<String>,
    pub notify_emails: Vec<String>,
    pub add: Vec<AddEntry>,
    pub remove: Vec<String>,
}

impl BatchRequest {
    /// Empty batch carrying the run's metadata
    pub fn new(metadata: &BatchMetadata) -> Self {
        Self {
            network: metadata.network,
            note: metadata.note.clone(),
            notify_emails: metadata.notify_emails.clone(),
            add: Vec::new(),
            remove: Vec::new(),
        }
    }

    /// Number of operations carried
    pub fn len(&self) -> usize {
        self.add.len() + self.remove.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Append an operation to the matching list
    pub fn push(&mut self, op: &Operation) {
        match op.action {
            Action::Add => self.add.push(AddEntry {
                cert_provisioning_type: op.cert_provisioning_type,
                edge_hostname_id: op.edge_hostname_id.clone(),
                cname_from: op.cname_from.clone(),
            }),
            Action::Remove => self.remove.push(op.cname_from.clone()),
        }
    }
}

/// Hostname activation status as reported upstream
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ActivationStatus {
    New,
    Pending,
    Zone1,
    Zone2,
    Zone3,
    Active,
    Aborted,
    Failed,
    Deactivated,
    Inactive,
    PendingDeactivation,
    PendingCancellation,
    /// A status this client does not know about; treated as in progress
    Unknown(String),
}

impl ActivationStatus {
    /// Parse the upstream spelling
    pub fn parse(s: &str) -> Self {
        match s {
            "NEW" => Self::New,
            "PENDING" => Self::Pending,
            "ZONE_1" => Self::Zone1,
            "ZONE_2" => Self::Zone2,
            "ZONE_3" => Self::Zone3,
            "ACTIVE" => Self::Active,
            "ABORTED" => Self::Aborted,
            "FAILED" => Self::Failed,
            "DEACTIVATED" => Self::Deactivated,
            "INACTIVE" => Self::Inactive,
            "PENDING_DEACTIVATION" => Self::PendingDeactivation,
            "PENDING_CANCELLATION" => Self::PendingCancellation,
            other => Self::Unknown(other.to_string()),
        }
    }

    /// Upstream spelling
    pub fn as_str(&self) -> &str {
        match self {
            Self::New => "NEW",
            Self::Pending => "PENDING",
            Self::Zone1 => "ZONE_1",
            Self::Zone2 => "ZONE_2",
            Self::Zone3 => "ZONE_3",
            Self::Active => "ACTIVE",
            Self::Aborted => "ABORTED",
            Self::Failed => "FAILED",
            Self::Deactivated => "DEACTIVATED",
            Self::Inactive => "INACTIVE",
            Self::PendingDeactivation => "PENDING_DEACTIVATION",
            Self::PendingCancellation => "PENDING_CANCELLATION",
            Self::Unknown(s) => s,
        }
    }

    /// The activation completed and the change is live
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Active)
    }

    /// The activation ended without the change going live
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            Self::Aborted | Self::Failed | Self::Deactivated | Self::Inactive
        )
    }

    pub fn is_terminal(&self) -> bool {
        self.is_success() || self.is_failure()
    }
}

impl fmt::Display for ActivationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ActivationStatus {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ActivationStatus {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(Self::parse(&s))
    }
}

/// A hostname activation started by a PATCH
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Activation {
    pub activation_id: String,
    pub network: Network,
    pub status: ActivationStatus,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub notify_emails: Vec<String>,
    #[serde(default)]
    pub submit_date: Option<chrono::DateTime<chrono::Utc>>,
    #[serde(default)]
    pub update_date: Option<chrono::DateTime<chrono::Utc>>,
}

/// Property coordinates, always in prefixed form
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PropertyRef {
    pub property_id: String,
    pub contract_id: String,
    pub group_id: String,
}

impl PropertyRef {
    pub fn new(property_id: &str, contract_id: &str, group_id: &str) -> Self {
        Self {
            property_id: ids::add_prefix(property_id, ids::PROPERTY_PREFIX),
            contract_id: ids::add_prefix(contract_id, ids::CONTRACT_PREFIX),
            group_id: ids::add_prefix(group_id, ids::GROUP_PREFIX),
        }
    }
}

impl fmt::Display for PropertyRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (contract {}, group {})",
            self.property_id, self.contract_id, self.group_id
        )
    }
}
