// # HTTP IP Source
//
// This crate provides the HTTP-based public IP resolver for the gddns agent.
//
// ## Purpose
//
// The agent runs behind NAT, so local interfaces do not know the public
// address. A single GET against an external discovery service returns it
// as seen from the internet.
//
// ## Response Formats
//
// - JSON: `{"ip": "203.0.113.7"}` (ipify with `?format=json`)
// - Plain text: `203.0.113.7` (ipify without format, icanhazip, ifconfig.me)
//
// ## Caching
//
// None. Every call performs a fresh request; the reconciler resolves once
// per host per pass.

use gddns_core::traits::IpSource;
use gddns_core::{Error, Result};
use serde::Deserialize;
use std::net::IpAddr;
use std::time::Duration;

/// Request timeout for the discovery service
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// JSON body returned by ipify-style services
#[derive(Debug, Deserialize)]
struct IpResponse {
    ip: String,
}

/// HTTP-based public IP source
pub struct HttpIpSource {
    /// URL to fetch the address from
    url: String,

    /// HTTP client
    client: reqwest::Client,
}

impl HttpIpSource {
    /// Create a new HTTP IP source
    ///
    /// # Parameters
    ///
    /// - `url`: Discovery endpoint (e.g., "https://api.ipify.org?format=json")
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            client: reqwest::Client::builder()
                .timeout(DEFAULT_HTTP_TIMEOUT)
                .build()
                .unwrap_or_default(),
        }
    }

    /// The endpoint this source queries
    pub fn url(&self) -> &str {
        &self.url
    }
}

/// Extract an address from a discovery response body
///
/// JSON objects must carry an `ip` field; anything else is treated as a
/// plain-text address.
fn parse_body(body: &str) -> Result<IpAddr> {
    let body = body.trim();

    let text = if body.starts_with('{') {
        let parsed: IpResponse = serde_json::from_str(body)
            .map_err(|e| Error::malformed(format!("Unexpected IP service response: {}", e)))?;
        parsed.ip
    } else {
        body.to_string()
    };

    text.trim()
        .parse()
        .map_err(|_| Error::malformed(format!("Invalid IP address: {}", text)))
}

#[async_trait::async_trait]
impl IpSource for HttpIpSource {
    async fn current(&self) -> Result<IpAddr> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| Error::http(format!("Request to {} failed: {}", self.url, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::http(format!(
                "IP service {} returned {}",
                self.url, status
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| Error::http(format!("Failed to read response: {}", e)))?;

        let ip = parse_body(&body)?;
        tracing::debug!("Public IP address: {}", ip);
        Ok(ip)
    }

    fn source_name(&self) -> &'static str {
        "http"
    }
}
