//! Single-host reconciliation
//!
//! One pass for one host: resolve the public address, read the provider's
//! record set, and converge the two.

use crate::config::HostConfig;
use crate::engine::change::{ChangeApplicator, ChangeOutcome};
use crate::error::{Error, Result};
use crate::traits::{ChangeOp, DnsProvider, IpSource, RecordSet, record_type_for};
use std::net::IpAddr;
use tracing::{debug, error, info, warn};

/// What a reconciliation pass did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PassOutcome {
    /// The record already pointed at the observed address
    Converged {
        /// Observed public address
        ip: IpAddr,
    },

    /// No record existed; a fresh one was submitted
    Created {
        /// Observed public address
        ip: IpAddr,
        /// Result of the create
        create: ChangeOutcome,
    },

    /// A stale record was deleted and a fresh one submitted
    Replaced {
        /// The record as the provider held it before the pass
        previous: RecordSet,
        /// Observed public address
        ip: IpAddr,
        /// Result of the delete
        delete: ChangeOutcome,
        /// Result of the create, `None` when shutdown interrupted the delete
        create: Option<ChangeOutcome>,
    },
}

impl PassOutcome {
    /// Whether shutdown cut this pass short
    pub fn is_interrupted(&self) -> bool {
        match self {
            PassOutcome::Converged { .. } => false,
            PassOutcome::Created { create, .. } => *create == ChangeOutcome::Interrupted,
            PassOutcome::Replaced { delete, create, .. } => {
                *delete == ChangeOutcome::Interrupted
                    || matches!(create, Some(ChangeOutcome::Interrupted))
            }
        }
    }
}

/// Converges one host's DNS record to the observed public address
pub struct Reconciler {
    /// Public address discovery
    ip_source: Box<dyn IpSource>,

    /// DNS query and change capability
    provider: Box<dyn DnsProvider>,

    /// Applies the changes this reconciler decides on
    applicator: ChangeApplicator,
}

impl Reconciler {
    /// Create a new reconciler
    pub fn new(
        ip_source: Box<dyn IpSource>,
        provider: Box<dyn DnsProvider>,
        applicator: ChangeApplicator,
    ) -> Self {
        Self {
            ip_source,
            provider,
            applicator,
        }
    }

    /// Run one reconciliation pass for `host`
    ///
    /// # Returns
    ///
    /// - `Ok(PassOutcome)`: What was done; change failures are reported
    ///   inside the outcome, not as errors
    /// - `Err(Error)`: Resolution or query failed, or the provider
    ///   returned a record for another name. No mutation was attempted.
    ///
    /// Only the record of the observed address family is considered: an
    /// IPv4 address reconciles the `A` record, an IPv6 address the `AAAA`
    /// record. Other record sets at the same name are left untouched.
    pub async fn reconcile(&self, host: &HostConfig) -> Result<PassOutcome> {
        let ip = self.ip_source.current().await?;

        let zone = host.zone();
        let record_type = record_type_for(ip);
        let records = self
            .provider
            .list_records(&zone, &host.host, record_type)
            .await?;
        let desired = RecordSet::address(host.host.as_str(), host.ttl, ip);

        // Only the address record of the observed family is ours to replace
        let Some(existing) = records
            .into_iter()
            .find(|record| record.record_type.eq_ignore_ascii_case(record_type))
        else {
            info!("No record found for {}. Creating a new record: {}", host.host, desired);
            let create = self.apply(host, &desired, ChangeOp::Create).await;
            return Ok(PassOutcome::Created { ip, create });
        };

        debug!(
            "config_host: {} current_ip: {} provider_host: {} provider_ip: {}",
            host.host,
            ip,
            existing.name,
            existing.first_value().unwrap_or("<none>")
        );

        // Reported once, by the scheduler
        if !existing.name.eq_ignore_ascii_case(&host.host) {
            return Err(Error::hostname_mismatch(&host.host, &existing.name));
        }

        if existing.points_to(ip) {
            info!("{} already points at {}. Nothing to do", host.host, ip);
            return Ok(PassOutcome::Converged { ip });
        }

        info!(
            "{} points at {}, current address is {}. Replacing record",
            host.host,
            existing.first_value().unwrap_or("<none>"),
            ip
        );

        let delete = self.apply(host, &existing, ChangeOp::Delete).await;
        if delete == ChangeOutcome::Interrupted {
            warn!(
                "Shutdown interrupted the delete of {}; the fresh record was not submitted",
                host.host
            );
            return Ok(PassOutcome::Replaced {
                previous: existing,
                ip,
                delete,
                create: None,
            });
        }

        // A failed delete still attempts the create
        let create = self.apply(host, &desired, ChangeOp::Create).await;

        Ok(PassOutcome::Replaced {
            previous: existing,
            ip,
            delete,
            create: Some(create),
        })
    }

    async fn apply(&self, host: &HostConfig, record: &RecordSet, op: ChangeOp) -> ChangeOutcome {
        let outcome = self
            .applicator
            .apply(self.provider.as_ref(), &host.zone(), record, op)
            .await;

        if let ChangeOutcome::Failed { reason } = &outcome {
            error!("Failed to {} record set {}: {}", op, record, reason);
        }

        outcome
    }
}
