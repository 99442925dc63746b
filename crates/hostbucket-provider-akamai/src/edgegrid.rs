// # EdgeGrid request signing
//
// Every Property Manager API call carries an `Authorization` header of the
// form:
//
// ```text
// EG1-HMAC-SHA256 client_token=..;access_token=..;timestamp=..;nonce=..;signature=..
// ```
//
// The signature is an HMAC-SHA256 over the request line, keyed with an
// HMAC of the timestamp under the client secret. No extra headers are
// signed, and only POST bodies contribute a content hash.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use hostbucket_core::{Error, Result};
use reqwest::{Method, Url};
use sha2::{Digest, Sha256};

type HmacSha256 = Hmac<Sha256>;

const ALGORITHM: &str = "EG1-HMAC-SHA256";

/// POST bodies beyond this many bytes are truncated before hashing
const MAX_BODY: usize = 131_072;

/// EdgeGrid client credentials
#[derive(Clone)]
pub struct Credentials {
    /// API host, e.g. `akab-xxxx.luna.akamaiapis.net`
    pub host: String,
    pub client_token: String,
    pub client_secret: String,
    pub access_token: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("host", &self.host)
            .field("client_token", &"<REDACTED>")
            .field("client_secret", &"<REDACTED>")
            .field("access_token", &"<REDACTED>")
            .finish()
    }
}

/// Signs requests with a fixed set of credentials
#[derive(Debug, Clone)]
pub struct Signer {
    credentials: Credentials,
}

impl Signer {
    pub fn new(credentials: Credentials) -> Self {
        Self { credentials }
    }

    pub fn host(&self) -> &str {
        &self.credentials.host
    }

    /// `Authorization` header for a request sent now
    pub fn authorization(&self, method: &Method, url: &Url, body: &[u8]) -> Result<String> {
        let nonce = uuid::Uuid::new_v4().to_string();
        self.authorization_at(method, url, body, &timestamp(Utc::now()), &nonce)
    }

    /// `Authorization` header for a fixed timestamp and nonce
    pub fn authorization_at(
        &self,
        method: &Method,
        url: &Url,
        body: &[u8],
        timestamp: &str,
        nonce: &str,
    ) -> Result<String> {
        let auth_prefix = format!(
            "{ALGORITHM} client_token={};access_token={};timestamp={};nonce={};",
            self.credentials.client_token, self.credentials.access_token, timestamp, nonce
        );

        let signing_key = base64_hmac(self.credentials.client_secret.as_bytes(), timestamp)?;
        let data = data_to_sign(method, url, body, &auth_prefix);
        let signature = base64_hmac(signing_key.as_bytes(), &data)?;

        Ok(format!("{auth_prefix}signature={signature}"))
    }
}

/// Timestamp in EdgeGrid format, e.g. `20240102T03:04:05+0000`
pub fn timestamp(now: DateTime<Utc>) -> String {
    now.format("%Y%m%dT%H:%M:%S+0000").to_string()
}

fn data_to_sign(method: &Method, url: &Url, body: &[u8], auth_prefix: &str) -> String {
    let host = match (url.host_str(), url.port()) {
        (Some(host), Some(port)) => format!("{host}:{port}"),
        (Some(host), None) => host.to_string(),
        (None, _) => String::new(),
    };
    let path_and_query = match url.query() {
        Some(query) => format!("{}?{}", url.path(), query),
        None => url.path().to_string(),
    };

    [
        method.as_str().to_ascii_uppercase(),
        url.scheme().to_string(),
        host,
        path_and_query,
        // no signed headers
        String::new(),
        content_hash(method, body),
        auth_prefix.to_string(),
    ]
    .join("\t")
}

fn content_hash(method: &Method, body: &[u8]) -> String {
    if *method != Method::POST || body.is_empty() {
        return String::new();
    }
    let body = &body[..body.len().min(MAX_BODY)];
    STANDARD.encode(Sha256::digest(body))
}

fn base64_hmac(key: &[u8], data: &str) -> Result<String> {
    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|e| Error::provider("akamai", format!("failed to initialize hmac: {e}")))?;
    mac.update(data.as_bytes());
    Ok(STANDARD.encode(mac.finalize().into_bytes()))
}
