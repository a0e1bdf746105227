// # DNS Provider Trait
//
// Defines the query and change capabilities the engine needs from a
// managed DNS service.
//
// ## Implementations
//
// - Google Cloud DNS: `gddns-provider-gcloud` crate
//
// ## Usage
//
// ```rust,ignore
// use gddns_core::traits::{ChangeOp, DnsProvider, RecordSet};
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let provider = /* DnsProvider implementation */;
//     let zone = host_config.zone();
//
//     let existing = provider.list_records(&zone, "home.example.com.", "A").await?;
//
//     let record = RecordSet::address("home.example.com.", 300, "203.0.113.7".parse()?);
//     let handle = provider.submit_change(&zone, &record, ChangeOp::Create).await?;
//     let status = provider.change_status(&zone, &handle.id).await?;
//
//     Ok(())
// }
// ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;

/// The managed zone a record lives in
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ZoneRef {
    /// Project owning the zone
    pub project: String,
    /// Managed zone name
    pub managed_zone: String,
    /// DNS name of the zone (e.g. "example.com.")
    pub dns_name: String,
}

impl fmt::Display for ZoneRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.project, self.managed_zone)
    }
}

/// A provider-side resource record set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordSet {
    /// Fully-qualified record name
    pub name: String,

    /// Record type ("A" or "AAAA" for the records we manage)
    #[serde(rename = "type")]
    pub record_type: String,

    /// Time-to-live in seconds
    pub ttl: u32,

    /// Record data; only the first value is considered authoritative
    #[serde(default)]
    pub rrdatas: Vec<String>,
}

impl RecordSet {
    /// Build the single-value address record for `ip`
    pub fn address(name: impl Into<String>, ttl: u32, ip: IpAddr) -> Self {
        Self {
            name: name.into(),
            record_type: record_type_for(ip).to_string(),
            ttl,
            rrdatas: vec![ip.to_string()],
        }
    }

    /// The authoritative (first) value of the record
    pub fn first_value(&self) -> Option<&str> {
        self.rrdatas.first().map(String::as_str)
    }

    /// Whether the authoritative value is `ip`
    ///
    /// Values are compared as addresses where they parse, so "::1" and
    /// "0:0:0:0:0:0:0:1" agree.
    pub fn points_to(&self, ip: IpAddr) -> bool {
        match self.first_value() {
            Some(value) => match value.parse::<IpAddr>() {
                Ok(addr) => addr == ip,
                Err(_) => value == ip.to_string(),
            },
            None => false,
        }
    }
}

impl fmt::Display for RecordSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} ttl={} [{}]",
            self.name,
            self.record_type,
            self.ttl,
            self.rrdatas.join(", ")
        )
    }
}

/// Address record type for an IP
pub fn record_type_for(ip: IpAddr) -> &'static str {
    match ip {
        IpAddr::V4(_) => "A",
        IpAddr::V6(_) => "AAAA",
    }
}

/// The mutation carried by a change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeOp {
    /// Add a record set
    Create,
    /// Remove a record set (must match the provider's copy exactly)
    Delete,
}

impl ChangeOp {
    /// Lower-case name, as used in log lines
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeOp::Create => "create",
            ChangeOp::Delete => "delete",
        }
    }
}

impl fmt::Display for ChangeOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status of a submitted change
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeStatus {
    /// Accepted but not yet applied
    Pending,
    /// Applied
    Done,
    /// The provider gave up on the change
    Failed(String),
}

impl ChangeStatus {
    /// Map a provider status string
    ///
    /// Only `done`, `pending`, `running`, `failed` and `error` are known.
    /// Anything else fails the change rather than being polled forever.
    pub fn from_provider(status: &str) -> Self {
        match status {
            "done" => ChangeStatus::Done,
            "pending" | "running" => ChangeStatus::Pending,
            "failed" | "error" => ChangeStatus::Failed(format!("provider reported status '{}'", status)),
            other => {
                tracing::warn!("Unknown change status '{}'; treating the change as failed", other);
                ChangeStatus::Failed(format!("unknown status '{}'", other))
            }
        }
    }
}

impl fmt::Display for ChangeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangeStatus::Pending => f.write_str("pending"),
            ChangeStatus::Done => f.write_str("done"),
            ChangeStatus::Failed(reason) => write!(f, "failed ({})", reason),
        }
    }
}

/// Handle to a submitted change
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeHandle {
    /// Provider-assigned change id
    pub id: String,
    /// Status reported in the submission response
    pub status: ChangeStatus,
}

/// Trait for DNS provider implementations
///
/// This trait defines the three calls the engine makes against a managed
/// DNS service: list the record sets for a name, submit a change, and read
/// a change's status back.
///
/// # Trust Level: Untrusted
///
/// ## Allowed Capabilities
/// - ✅ Perform HTTP/HTTPS API calls to their endpoints only
/// - ✅ Parse provider-specific responses
/// - ✅ Hold credentials injected at construction time
///
/// ## Forbidden Capabilities
/// - ❌ Spawn tasks or threads
/// - ❌ Poll change status in a loop (owned by `ChangeApplicator`)
/// - ❌ Retry failed calls (the next scheduled pass re-evaluates)
/// - ❌ Decide whether a change is needed (owned by `Reconciler`)
/// - ❌ Read credentials from ambient process state
///
/// ## Error Mapping
///
/// - Rejected credentials or missing permission → `Error::Authentication`
/// - Unknown project/zone, malformed request → `Error::Config`
/// - Record mismatch on delete, duplicate on create → `Error::PreconditionFailed`
/// - Throttling → `Error::RateLimited`
/// - Transport failures and 5xx → `Error::Http`
/// - Any other unexpected status → `Error::Provider`
#[async_trait]
pub trait DnsProvider: Send + Sync {
    /// List the record sets named `name` of type `record_type` in `zone`
    ///
    /// Record sets of other types at the same name (TXT, MX, the other
    /// address family) are never returned.
    ///
    /// # Returns
    ///
    /// - `Ok(Vec<RecordSet>)`: Zero or more record sets; callers use the first
    /// - `Err(Error)`: If the query failed
    async fn list_records(
        &self,
        zone: &ZoneRef,
        name: &str,
        record_type: &str,
    ) -> Result<Vec<RecordSet>, crate::Error>;

    /// Submit a single create-or-delete change
    ///
    /// Exactly one mutation per call. The returned handle carries the
    /// status reported with the submission.
    async fn submit_change(
        &self,
        zone: &ZoneRef,
        record: &RecordSet,
        op: ChangeOp,
    ) -> Result<ChangeHandle, crate::Error>;

    /// Read the current status of a submitted change
    async fn change_status(
        &self,
        zone: &ZoneRef,
        change_id: &str,
    ) -> Result<ChangeStatus, crate::Error>;

    /// Get the provider name (for logging/debugging)
    fn provider_name(&self) -> &'static str;
}
