//! Property Manager API wire types
//!
//! Only the fields the provider reads or writes are modelled; everything
//! else in the responses is ignored.

use chrono::{DateTime, Utc};
use hostbucket_core::{
    Activation, ActivationStatus, BatchRequest, CertProvisioningType, HostnameRecord, Network,
};
use serde::{Deserialize, Serialize};

/// `GET /papi/v1/properties/{propertyId}/hostnames`
#[derive(Debug, Deserialize)]
pub struct HostnamesResponse {
    pub hostnames: HostnamePage,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostnamePage {
    #[serde(default)]
    pub items: Vec<HostnameItem>,
    #[serde(default)]
    pub total_items: Option<usize>,
    #[serde(default)]
    pub next_link: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostnameItem {
    pub cname_from: String,
    #[serde(default)]
    pub staging_cert_type: Option<CertProvisioningType>,
    #[serde(default)]
    pub staging_edge_hostname_id: Option<String>,
    #[serde(default)]
    pub staging_cname_to: Option<String>,
    #[serde(default)]
    pub production_cert_type: Option<CertProvisioningType>,
    #[serde(default)]
    pub production_edge_hostname_id: Option<String>,
    #[serde(default)]
    pub production_cname_to: Option<String>,
}

impl HostnameItem {
    /// The record as attached on `network`; `None` when not attached there
    pub fn into_record(self, network: Network) -> Option<(String, HostnameRecord)> {
        let (cert_type, edge_hostname_id, cname_to) = match network {
            Network::Staging => (
                self.staging_cert_type,
                self.staging_edge_hostname_id,
                self.staging_cname_to,
            ),
            Network::Production => (
                self.production_cert_type,
                self.production_edge_hostname_id,
                self.production_cname_to,
            ),
        };

        let edge_hostname_id = edge_hostname_id?;
        let mut record = HostnameRecord::new(
            cert_type.unwrap_or(CertProvisioningType::Default),
            &edge_hostname_id,
        );
        record.cname_to = cname_to;
        Some((self.cname_from, record))
    }
}

/// `PATCH /papi/v1/properties/{propertyId}/hostnames` body
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PatchHostnamesRequest<'a> {
    pub network: Network,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<&'a str>,
    pub notify_emails: &'a [String],
    pub add: Vec<PatchAdd<'a>>,
    pub remove: &'a [String],
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PatchAdd<'a> {
    pub cert_provisioning_type: CertProvisioningType,
    pub edge_hostname_id: &'a str,
    pub cname_from: &'a str,
}

impl<'a> From<&'a BatchRequest> for PatchHostnamesRequest<'a> {
    fn from(batch: &'a BatchRequest) -> Self {
        Self {
            network: batch.network,
            note: batch.note.as_deref(),
            notify_emails: &batch.notify_emails,
            add: batch
                .add
                .iter()
                .map(|entry| PatchAdd {
                    cert_provisioning_type: entry.cert_provisioning_type,
                    edge_hostname_id: &entry.edge_hostname_id,
                    cname_from: &entry.cname_from,
                })
                .collect(),
            remove: &batch.remove,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatchHostnamesResponse {
    #[serde(default)]
    pub activation_id: Option<String>,
    #[serde(default)]
    pub activation_link: Option<String>,
}

impl PatchHostnamesResponse {
    /// Activation id, taken from the link when not given directly
    pub fn activation_id(&self) -> Option<String> {
        if let Some(id) = self.activation_id.as_deref().filter(|id| !id.is_empty()) {
            return Some(id.to_string());
        }
        self.activation_link.as_deref().and_then(activation_id_from_link)
    }
}

/// `.../hostname-activations/atv_1?contractId=...` → `atv_1`
pub fn activation_id_from_link(link: &str) -> Option<String> {
    let (_, rest) = link.split_once("/hostname-activations/")?;
    let id = rest.split(['?', '/']).next()?;
    (!id.is_empty()).then(|| id.to_string())
}

/// `GET .../hostname-activations/{activationId}`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivationResponse {
    pub hostname_activations: ActivationPage,
}

#[derive(Debug, Deserialize)]
pub struct ActivationPage {
    #[serde(default)]
    pub items: Vec<ActivationItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivationItem {
    pub activation_id: String,
    pub network: Network,
    pub status: ActivationStatus,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub notify_emails: Vec<String>,
    #[serde(default)]
    pub submit_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub update_date: Option<DateTime<Utc>>,
}

impl From<ActivationItem> for Activation {
    fn from(item: ActivationItem) -> Self {
        Activation {
            activation_id: item.activation_id,
            network: item.network,
            status: item.status,
            note: item.note,
            notify_emails: item.notify_emails,
            submit_date: item.submit_date,
            update_date: item.update_date,
        }
    }
}
