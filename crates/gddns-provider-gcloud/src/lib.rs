// # Google Cloud DNS Provider
//
// This crate provides the Google Cloud DNS provider for the gddns agent.
//
// ## Responsibilities
//
// - List the resource record sets for one name in a managed zone
// - Submit a single addition or deletion as a Cloud DNS change
// - Report the status of a previously submitted change
//
// Each trait call makes exactly one API request (plus a token request when
// the cached access token is stale). Retries, polling and scheduling are
// owned by the engine in gddns-core.
//
// ## Security Requirements
//
// - Access tokens and the private key NEVER appear in logs
// - Credentials are passed in explicitly; nothing is read from the environment
//
// ## API Reference
//
// - Cloud DNS API v1: https://cloud.google.com/dns/docs/reference/v1
// - List record sets: GET `/projects/:project/managedZones/:zone/rrsets?name=...&type=...`
// - Create change: POST `/projects/:project/managedZones/:zone/changes`
// - Get change: GET `/projects/:project/managedZones/:zone/changes/:id`

mod auth;

pub use auth::{CLOUD_DNS_SCOPE, DEFAULT_TOKEN_URI, ServiceAccountKey, TokenSource};

use async_trait::async_trait;
use gddns_core::traits::{ChangeHandle, ChangeOp, ChangeStatus, DnsProvider, RecordSet, ZoneRef};
use gddns_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Cloud DNS API base URL
pub const CLOUD_DNS_API_BASE: &str = "https://dns.googleapis.com/dns/v1";

/// Default HTTP timeout for API requests (30 seconds)
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
struct RrsetsResponse {
    #[serde(default)]
    rrsets: Vec<RecordSet>,
}

/// Change request body; exactly one side is populated
#[derive(Debug, Default, Serialize)]
struct ChangeRequest<'a> {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    additions: Vec<&'a RecordSet>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    deletions: Vec<&'a RecordSet>,
}

impl<'a> ChangeRequest<'a> {
    fn new(record: &'a RecordSet, op: ChangeOp) -> Self {
        match op {
            ChangeOp::Create => Self {
                additions: vec![record],
                ..Self::default()
            },
            ChangeOp::Delete => Self {
                deletions: vec![record],
                ..Self::default()
            },
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChangeResponse {
    id: String,
    status: String,
}

/// Google Cloud DNS provider
///
/// # Dry-Run Mode
///
/// When `dry_run` is true, the provider will:
/// - Perform record set listings as usual
/// - Log the intended change payload
/// - Report every change as `done` without submitting it
///
/// # Security
///
/// The Debug implementation does NOT expose credentials.
pub struct GcloudProvider {
    /// Access token source for the service account
    tokens: TokenSource,

    /// API base URL (overridable for tests)
    api_base: String,

    /// HTTP client for API requests
    client: reqwest::Client,

    /// Dry-run mode: list records, but never submit changes
    dry_run: bool,

    /// Identifiers handed out for changes skipped in dry-run mode
    dry_run_changes: AtomicU64,
}

// Custom Debug implementation that hides credentials
impl std::fmt::Debug for GcloudProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GcloudProvider")
            .field("client_email", &self.tokens.client_email())
            .field("credentials", &"<REDACTED>")
            .field("api_base", &self.api_base)
            .field("dry_run", &self.dry_run)
            .finish()
    }
}

impl GcloudProvider {
    /// Create a new Cloud DNS provider
    ///
    /// # Parameters
    ///
    /// - `key`: Service-account key with Cloud DNS read/write permission
    /// - `dry_run`: If true, list records but skip change submission
    ///
    /// # Errors
    ///
    /// Fails when the key's private key cannot be parsed.
    pub fn new(key: ServiceAccountKey, dry_run: bool) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::provider("gcloud", format!("Failed to build HTTP client: {}", e)))?;

        let tokens = TokenSource::new(key, client.clone())?;

        Ok(Self {
            tokens,
            api_base: CLOUD_DNS_API_BASE.to_string(),
            client,
            dry_run,
            dry_run_changes: AtomicU64::new(0),
        })
    }

    /// Create a provider in live mode
    pub fn new_live(key: ServiceAccountKey) -> Result<Self> {
        Self::new(key, false)
    }

    /// Create a provider in dry-run mode
    pub fn new_dry_run(key: ServiceAccountKey) -> Result<Self> {
        Self::new(key, true)
    }

    /// Point the provider at a different API base URL
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    /// Whether changes are only logged
    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Obtain an access token, proving the credentials are accepted
    ///
    /// # Returns
    ///
    /// - `Ok(())`: The token endpoint issued a token
    /// - `Err(Error::Authentication)`: The credentials were rejected
    /// - `Err(Error)`: Any other failure (network, endpoint outage)
    pub async fn authenticate(&self) -> Result<()> {
        self.tokens.access_token().await?;
        tracing::info!("Authenticated as {}", self.tokens.client_email());
        Ok(())
    }

    fn zone_url(&self, zone: &ZoneRef) -> String {
        format!(
            "{}/projects/{}/managedZones/{}",
            self.api_base, zone.project, zone.managed_zone
        )
    }

    /// Send an authorized request and map non-success statuses
    async fn send(
        &self,
        request: reqwest::RequestBuilder,
        zone: &ZoneRef,
        action: &str,
    ) -> Result<reqwest::Response> {
        let token = self.tokens.access_token().await?;

        let response = request
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| Error::http(format!("{} in {}: request failed: {}", action, zone, e)))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unable to read error response".to_string());

        Err(map_status(status.as_u16(), zone, action, &error_text))
    }
}

/// Map a Cloud DNS error status onto the agent's error classes
fn map_status(status: u16, zone: &ZoneRef, action: &str, error_text: &str) -> Error {
    match status {
        401 | 403 => Error::auth(format!(
            "{} in {}: credentials rejected or missing dns.changes permission ({}): {}",
            action, zone, status, error_text
        )),
        400 | 404 => Error::config(format!(
            "{} in {}: project, zone or record rejected ({}): {}",
            action, zone, status, error_text
        )),
        // conditionNotMet on delete, alreadyExists on create
        409 | 412 => Error::precondition(format!(
            "{} in {} ({}): {}",
            action, zone, status, error_text
        )),
        429 => Error::rate_limited(format!("{} in {}: quota exceeded ({})", action, zone, status)),
        500..=599 => Error::http(format!(
            "{} in {}: Cloud DNS server error (transient): {} - {}",
            action, zone, status, error_text
        )),
        _ => Error::provider(
            "gcloud",
            format!("{} in {} failed: {} - {}", action, zone, status, error_text),
        ),
    }
}

#[async_trait]
impl DnsProvider for GcloudProvider {
    /// List record sets named `name` of type `record_type` in `zone`
    ///
    /// # API Call
    ///
    /// ```http
    /// GET /projects/:project/managedZones/:zone/rrsets?name=home.example.com.&type=A
    /// Authorization: Bearer <token>
    /// ```
    async fn list_records(
        &self,
        zone: &ZoneRef,
        name: &str,
        record_type: &str,
    ) -> Result<Vec<RecordSet>> {
        tracing::debug!("Listing {} record sets for {} in {}", record_type, name, zone);

        let request = self
            .client
            .get(format!("{}/rrsets", self.zone_url(zone)))
            .query(&[("name", name), ("type", record_type)]);

        let response = self.send(request, zone, "List record sets").await?;

        let body: RrsetsResponse = response
            .json()
            .await
            .map_err(|e| Error::malformed(format!("Invalid rrsets response: {}", e)))?;

        tracing::debug!("{} record set(s) returned for {}", body.rrsets.len(), name);
        Ok(body.rrsets)
    }

    /// Submit one addition or deletion
    ///
    /// # API Call
    ///
    /// ```http
    /// POST /projects/:project/managedZones/:zone/changes
    /// {"additions": [{"name": "...", "type": "A", "ttl": 300, "rrdatas": ["..."]}]}
    /// ```
    async fn submit_change(
        &self,
        zone: &ZoneRef,
        record: &RecordSet,
        op: ChangeOp,
    ) -> Result<ChangeHandle> {
        let body = ChangeRequest::new(record, op);

        if self.dry_run {
            let id = self.dry_run_changes.fetch_add(1, Ordering::Relaxed) + 1;
            tracing::info!(
                "[DRY-RUN] Would send POST {}/changes with payload: {}",
                self.zone_url(zone),
                serde_json::to_string(&body)?
            );
            return Ok(ChangeHandle {
                id: format!("dry-run-{}", id),
                status: ChangeStatus::Done,
            });
        }

        let action = format!("{} {}", op, record.name);
        let request = self
            .client
            .post(format!("{}/changes", self.zone_url(zone)))
            .json(&body);

        let response = self.send(request, zone, &action).await?;

        let change: ChangeResponse = response
            .json()
            .await
            .map_err(|e| Error::malformed(format!("Invalid change response: {}", e)))?;

        tracing::debug!("Change {} submitted, status {}", change.id, change.status);
        Ok(ChangeHandle {
            id: change.id,
            status: ChangeStatus::from_provider(&change.status),
        })
    }

    /// Read the status of a submitted change
    ///
    /// # API Call
    ///
    /// ```http
    /// GET /projects/:project/managedZones/:zone/changes/:id
    /// ```
    async fn change_status(&self, zone: &ZoneRef, change_id: &str) -> Result<ChangeStatus> {
        if self.dry_run {
            return Ok(ChangeStatus::Done);
        }

        let request = self
            .client
            .get(format!("{}/changes/{}", self.zone_url(zone), change_id));

        let action = format!("Get change {}", change_id);
        let response = self.send(request, zone, &action).await?;

        let change: ChangeResponse = response
            .json()
            .await
            .map_err(|e| Error::malformed(format!("Invalid change response: {}", e)))?;

        Ok(ChangeStatus::from_provider(&change.status))
    }

    fn provider_name(&self) -> &'static str {
        "gcloud"
    }
}
