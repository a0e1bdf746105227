//! Change application
//!
//! Submits one create-or-delete change and waits for the provider to
//! finish applying it. Failures are reported, never retried: the next
//! scheduled pass re-evaluates from scratch.

use crate::config::EngineConfig;
use crate::error::Error;
use crate::traits::{ChangeOp, ChangeStatus, DnsProvider, RecordSet, ZoneRef};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Terminal result of applying one change
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeOutcome {
    /// The provider reported the change as done
    Done {
        /// Number of status polls performed after submission
        polls: u32,
    },

    /// The change was rejected, failed, or could not be followed to completion
    Failed {
        /// Human-readable reason
        reason: String,
    },

    /// Shutdown was requested while waiting for the change
    Interrupted,
}

/// Applies single changes and polls them to completion
///
/// ## Polling
///
/// The submission response carries an initial status. While that status
/// is not `done` the applicator sleeps `poll_interval` and asks again. The
/// first `done` ends polling. With `max_polls` unset there is no upper
/// bound; the process-level interrupt is the only way out of a change
/// that never completes.
///
/// The sleep races the shutdown token, so an interrupt never waits out a
/// full poll interval.
#[derive(Debug, Clone)]
pub struct ChangeApplicator {
    poll_interval: Duration,
    max_polls: Option<u32>,
    shutdown: CancellationToken,
}

impl ChangeApplicator {
    /// Create an applicator from engine settings
    pub fn new(config: &EngineConfig, shutdown: CancellationToken) -> Self {
        Self {
            poll_interval: config.poll_interval,
            max_polls: config.max_polls,
            shutdown,
        }
    }

    /// Apply `op` for `record` in `zone` and wait until it is done
    ///
    /// Exactly one mutation is submitted per call.
    pub async fn apply(
        &self,
        provider: &dyn DnsProvider,
        zone: &ZoneRef,
        record: &RecordSet,
        op: ChangeOp,
    ) -> ChangeOutcome {
        debug!("Submitting {} change for {} in {}", op, record, zone);

        let handle = match provider.submit_change(zone, record, op).await {
            Ok(handle) => handle,
            Err(Error::PreconditionFailed(msg)) => {
                error!(
                    "A precondition for the {} of {} failed. Most likely an error in your configuration file. Error: {}",
                    op, record.name, msg
                );
                return ChangeOutcome::Failed { reason: msg };
            }
            Err(e) => {
                error!(
                    "Provider {} rejected the {} of {}: {}",
                    provider.provider_name(),
                    op,
                    record.name,
                    e
                );
                return ChangeOutcome::Failed {
                    reason: e.to_string(),
                };
            }
        };

        let mut status = handle.status;
        let mut polls: u32 = 0;

        loop {
            match status {
                ChangeStatus::Done => {
                    info!("{} of {} done (change {})", op, record.name, handle.id);
                    return ChangeOutcome::Done { polls };
                }
                ChangeStatus::Failed(reason) => {
                    error!(
                        "{} of {} failed (change {}): {}",
                        op, record.name, handle.id, reason
                    );
                    return ChangeOutcome::Failed { reason };
                }
                ChangeStatus::Pending => {}
            }

            if let Some(max_polls) = self.max_polls
                && polls >= max_polls
            {
                let reason = format!(
                    "change {} still pending after {} polls",
                    handle.id, polls
                );
                error!("Giving up on {} of {}: {}", op, record.name, reason);
                return ChangeOutcome::Failed { reason };
            }

            info!("Waiting for {} change {} to complete", op, handle.id);
            tokio::select! {
                biased;

                _ = self.shutdown.cancelled() => {
                    info!("Shutdown requested while waiting for {} change {}", op, handle.id);
                    return ChangeOutcome::Interrupted;
                }

                _ = tokio::time::sleep(self.poll_interval) => {}
            }

            polls += 1;
            status = match provider.change_status(zone, &handle.id).await {
                Ok(status) => status,
                Err(e) => {
                    error!(
                        "Failed to read status of {} change {}: {}",
                        op, handle.id, e
                    );
                    return ChangeOutcome::Failed {
                        reason: e.to_string(),
                    };
                }
            };
            info!("{} status: {}", op, status);
        }
    }
}
