// # Akamai Property Manager Hostname Provider
//
// This crate implements `HostnameApi` against the Akamai Property Manager
// API (PAPI) hostname bucket endpoints.
//
// ## Behaviour
//
// - One HTTP request per call, except listing, which follows pagination
// - Full error propagation to the engine (polling, retries and timeouts
//   are owned by HostnameEngine)
// - HTTP timeout configured (30 seconds)
// - Specific error mapping for HTTP status codes (401/403, 404, 409/422,
//   429, 5xx)
// - Requests signed with EdgeGrid (`EG1-HMAC-SHA256`)
//
// Providers never spawn tasks, never cache and never touch the state store.
//
// ## Security Requirements
//
// - EdgeGrid credentials NEVER appear in logs or Debug output
// - Factory fails fast if any credential is empty
//
// ## API Reference
//
// - List hostnames: GET `/papi/v1/properties/{propertyId}/hostnames`
// - Patch hostnames: PATCH `/papi/v1/properties/{propertyId}/hostnames`
// - Activation status: GET
//   `/papi/v1/properties/{propertyId}/hostname-activations/{activationId}`

pub mod edgegrid;
pub mod papi;

use async_trait::async_trait;
use hostbucket_core::config::ProviderConfig;
use hostbucket_core::traits::{HostnameApi, HostnameApiFactory};
use hostbucket_core::{
    Activation, BatchRequest, Error, HostnameMap, Network, PropertyRef, ProviderRegistry, Result,
};
use reqwest::{Method, StatusCode, Url};
use std::time::Duration;

pub use edgegrid::{Credentials, Signer};

/// Default HTTP timeout for API requests (30 seconds)
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Hostnames requested per list page
const PAGE_SIZE: usize = 1000;

const PROVIDER: &str = "akamai";

/// Akamai PAPI hostname provider
///
/// Stateless and single-shot; all coordination is owned by
/// `HostnameEngine`.
pub struct AkamaiPapiClient {
    signer: Signer,
    base_url: Url,
    account_switch_key: Option<String>,
    client: reqwest::Client,
}

impl std::fmt::Debug for AkamaiPapiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AkamaiPapiClient")
            .field("signer", &self.signer)
            .field("base_url", &self.base_url.as_str())
            .field("account_switch_key", &self.account_switch_key)
            .finish()
    }
}

impl AkamaiPapiClient {
    /// Create a client
    ///
    /// `base_url` defaults to `https://{host}`.
    pub fn new(
        credentials: Credentials,
        account_switch_key: Option<String>,
        base_url: Option<&str>,
    ) -> Result<Self> {
        let base_url = match base_url {
            Some(url) => url.to_string(),
            None => format!("https://{}", credentials.host),
        };
        let base_url = Url::parse(&base_url)
            .map_err(|e| Error::config(format!("Invalid Akamai base URL '{base_url}': {e}")))?;

        let client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::http(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            signer: Signer::new(credentials),
            base_url,
            account_switch_key: account_switch_key.filter(|key| !key.is_empty()),
            client,
        })
    }

    fn url(&self, path: &str, property: &PropertyRef, query: &[(&str, String)]) -> Result<Url> {
        let mut url = self
            .base_url
            .join(path)
            .map_err(|e| Error::config(format!("Invalid request path '{path}': {e}")))?;

        {
            let mut pairs = url.query_pairs_mut();
            pairs
                .append_pair("contractId", &property.contract_id)
                .append_pair("groupId", &property.group_id);
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
            if let Some(key) = &self.account_switch_key {
                pairs.append_pair("accountSwitchKey", key);
            }
        }

        Ok(url)
    }

    /// Send a signed request and return the body of a 2xx response
    async fn send(&self, method: Method, url: Url, body: Option<Vec<u8>>, context: &str) -> Result<String> {
        let body = body.unwrap_or_default();
        let authorization = self.signer.authorization(&method, &url, &body)?;

        let mut request = self
            .client
            .request(method, url)
            .header("Authorization", authorization)
            .header("Accept", "application/json")
            .header("PAPI-Use-Prefixes", "true");
        if !body.is_empty() {
            request = request.header("Content-Type", "application/json").body(body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::http(format!("{context}: request failed: {e}")))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unable to read response body".to_string());

        if !status.is_success() {
            return Err(status_error(status, &text, context));
        }
        Ok(text)
    }
}

/// Map a non-success HTTP status to an engine error
fn status_error(status: StatusCode, body: &str, context: &str) -> Error {
    match status.as_u16() {
        401 | 403 => Error::auth(format!(
            "{context}: invalid EdgeGrid credentials or insufficient permissions. Status: {status}"
        )),
        404 => Error::not_found(format!("{context}: {body}")),
        409 | 422 => Error::provider(
            PROVIDER,
            format!("{context}: conflicting hostname change. Status: {status} - {body}"),
        ),
        429 => Error::rate_limited(format!("{context}: Status: {status}")),
        500..=599 => Error::http(format!("{context}: server error (transient): {status} - {body}")),
        _ => Error::provider(PROVIDER, format!("{context}: {status} - {body}")),
    }
}

fn parse<T: serde::de::DeserializeOwned>(text: &str, context: &str) -> Result<T> {
    serde_json::from_str(text)
        .map_err(|e| Error::provider(PROVIDER, format!("{context}: failed to parse response: {e}")))
}

#[async_trait]
impl HostnameApi for AkamaiPapiClient {
    /// List every hostname attached on `network`, page by page
    async fn list_hostnames(&self, property: &PropertyRef, network: Network) -> Result<HostnameMap> {
        let path = format!("/papi/v1/properties/{}/hostnames", property.property_id);
        let mut hostnames = HostnameMap::new();
        let mut offset = 0;

        loop {
            let url = self.url(
                &path,
                property,
                &[
                    ("network", network.as_str().to_string()),
                    ("offset", offset.to_string()),
                    ("limit", PAGE_SIZE.to_string()),
                ],
            )?;
            let text = self.send(Method::GET, url, None, "list hostnames").await?;
            let page = parse::<papi::HostnamesResponse>(&text, "list hostnames")?.hostnames;

            let received = page.items.len();
            hostnames.extend(
                page.items
                    .into_iter()
                    .filter_map(|item| item.into_record(network)),
            );
            offset += received;

            tracing::debug!(
                "Listed {} hostname item(s) of {} for {}",
                offset,
                page.total_items.map_or_else(|| "?".to_string(), |n| n.to_string()),
                property.property_id
            );

            let exhausted = page.total_items.is_some_and(|total| offset >= total);
            if received == 0 || page.next_link.is_none() || exhausted {
                break;
            }
        }

        Ok(hostnames)
    }

    async fn patch_hostnames(&self, property: &PropertyRef, batch: &BatchRequest) -> Result<String> {
        let path = format!("/papi/v1/properties/{}/hostnames", property.property_id);
        let url = self.url(&path, property, &[])?;
        let body = serde_json::to_vec(&papi::PatchHostnamesRequest::from(batch))?;

        tracing::info!(
            "Patching hostnames of {} on {}: {} add(s), {} remove(s)",
            property.property_id,
            batch.network,
            batch.add.len(),
            batch.remove.len()
        );

        let text = self
            .send(Method::PATCH, url, Some(body), "patch hostnames")
            .await?;
        let response: papi::PatchHostnamesResponse = parse(&text, "patch hostnames")?;

        response.activation_id().ok_or_else(|| {
            Error::provider(PROVIDER, "patch hostnames: response carries no activation id")
        })
    }

    async fn get_activation(&self, property: &PropertyRef, activation_id: &str) -> Result<Activation> {
        let path = format!(
            "/papi/v1/properties/{}/hostname-activations/{}",
            property.property_id, activation_id
        );
        let url = self.url(&path, property, &[])?;
        let text = self.send(Method::GET, url, None, "get activation").await?;
        let response: papi::ActivationResponse = parse(&text, "get activation")?;

        response
            .hostname_activations
            .items
            .into_iter()
            .next()
            .map(Activation::from)
            .ok_or_else(|| Error::not_found(format!("Hostname activation {activation_id}")))
    }

    fn provider_name(&self) -> &'static str {
        PROVIDER
    }
}

/// Factory for creating Akamai PAPI clients
pub struct AkamaiPapiFactory;

impl HostnameApiFactory for AkamaiPapiFactory {
    fn create(&self, config: &ProviderConfig) -> Result<Box<dyn HostnameApi>> {
        match config {
            ProviderConfig::Akamai {
                host,
                client_token,
                client_secret,
                access_token,
                account_switch_key,
                base_url,
            } => {
                config.validate()?;
                let credentials = Credentials {
                    host: host.clone(),
                    client_token: client_token.clone(),
                    client_secret: client_secret.clone(),
                    access_token: access_token.clone(),
                };
                Ok(Box::new(AkamaiPapiClient::new(
                    credentials,
                    account_switch_key.clone(),
                    base_url.as_deref(),
                )?))
            }
            _ => Err(Error::config("Invalid config for Akamai provider")),
        }
    }
}

/// Register the Akamai provider with a registry
///
/// # Example
///
/// ```rust
/// use hostbucket_core::ProviderRegistry;
///
/// let registry = ProviderRegistry::new();
/// hostbucket_provider_akamai::register(&registry);
/// assert!(registry.has_provider("akamai"));
/// ```
pub fn register(registry: &ProviderRegistry) {
    registry.register_provider(PROVIDER, Box::new(AkamaiPapiFactory));
}
