//! Scheduler loop
//!
//! Drives reconciliation passes over every configured host until the
//! shutdown token is cancelled.

use crate::config::{DdnsConfig, HostConfig, SchedulePolicy};
use crate::engine::change::ChangeApplicator;
use crate::engine::reconciler::Reconciler;
use crate::error::Result;
use crate::traits::{DnsProvider, IpSource};
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Repeatedly reconciles all hosts in configured order
///
/// ## Lifecycle
///
/// 1. Create with [`Scheduler::new()`] or [`Scheduler::from_config()`]
/// 2. Start with [`Scheduler::run()`]
/// 3. Cancel the shutdown token to stop
///
/// ## Threading
///
/// Everything runs sequentially on the caller's task. Hosts are never
/// reconciled concurrently and within a host the delete always completes
/// before the create is submitted.
///
/// ## Shutdown
///
/// The token is checked before each host and raced against every sleep
/// (the pass sleep and the change poll sleep). An in-flight provider call
/// is allowed to finish.
pub struct Scheduler {
    reconciler: Reconciler,
    hosts: Vec<HostConfig>,
    policy: SchedulePolicy,
    shutdown: CancellationToken,

    /// When each host is next due; `None` until its first pass
    next_due: Vec<Option<Instant>>,
}

impl Scheduler {
    /// Create a scheduler over `hosts`
    pub fn new(
        reconciler: Reconciler,
        hosts: Vec<HostConfig>,
        policy: SchedulePolicy,
        shutdown: CancellationToken,
    ) -> Self {
        let next_due = vec![None; hosts.len()];
        Self {
            reconciler,
            hosts,
            policy,
            shutdown,
            next_due,
        }
    }

    /// Build the full engine from a validated configuration
    ///
    /// # Parameters
    ///
    /// - `ip_source`: Public address discovery
    /// - `provider`: DNS query and change capability
    /// - `config`: Agent configuration
    /// - `shutdown`: Token that stops the loop when cancelled
    pub fn from_config(
        ip_source: Box<dyn IpSource>,
        provider: Box<dyn DnsProvider>,
        config: &DdnsConfig,
        shutdown: CancellationToken,
    ) -> Result<Self> {
        config.validate()?;

        let engine = config.engine();
        let applicator = ChangeApplicator::new(&engine, shutdown.clone());
        let reconciler = Reconciler::new(ip_source, provider, applicator);

        Ok(Self::new(
            reconciler,
            config.hosts.clone(),
            engine.schedule,
            shutdown,
        ))
    }

    /// Run passes until shutdown
    ///
    /// # Returns
    ///
    /// - `Ok(())`: Clean shutdown
    /// - `Err(Error)`: Fatal error (bad credentials, unknown zone)
    pub async fn run(&mut self) -> Result<()> {
        info!(
            "Starting reconciliation loop for {} host(s) ({:?} schedule)",
            self.hosts.len(),
            self.policy
        );

        loop {
            let Some(pause) = self.run_pass().await? else {
                break;
            };

            info!("Going to sleep for {} seconds", pause.as_secs());
            tokio::select! {
                biased;

                _ = self.shutdown.cancelled() => break,
                _ = tokio::time::sleep(pause) => {}
            }
        }

        info!("Shutdown signal received, reconciliation loop stopped");
        Ok(())
    }

    /// Run one pass over the hosts that are due
    ///
    /// Under [`SchedulePolicy::LastHost`] every host is due on every pass.
    /// Under [`SchedulePolicy::PerHost`] a host is due once its own
    /// interval has elapsed since its previous pass; on the first pass all
    /// hosts are due.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(pause))`: How long to sleep before the next pass
    /// - `Ok(None)`: Shutdown was requested during the pass
    /// - `Err(Error)`: A fatal error surfaced from a host
    pub async fn run_pass(&mut self) -> Result<Option<Duration>> {
        let pass_start = Instant::now();

        for (idx, host) in self.hosts.iter().enumerate() {
            if self.shutdown.is_cancelled() {
                return Ok(None);
            }

            if self.policy == SchedulePolicy::PerHost
                && let Some(due) = self.next_due[idx]
                && due > pass_start
            {
                continue;
            }

            match self.reconciler.reconcile(host).await {
                Ok(outcome) => {
                    if outcome.is_interrupted() {
                        return Ok(None);
                    }
                }
                Err(e) if e.is_fatal() => {
                    error!("Fatal error while reconciling {}: {}", host.host, e);
                    return Err(e);
                }
                Err(e) if e.is_transient() => {
                    warn!("Skipping {} this pass: {}", host.host, e);
                }
                Err(e) => {
                    error!("Skipping {} this pass: {}", host.host, e);
                }
            }

            self.next_due[idx] = Some(Instant::now() + host.interval());
        }

        Ok(Some(self.pause_after_pass()))
    }

    fn pause_after_pass(&self) -> Duration {
        match self.policy {
            SchedulePolicy::LastHost => self
                .hosts
                .last()
                .map(HostConfig::interval)
                .unwrap_or_default(),
            SchedulePolicy::PerHost => {
                let now = Instant::now();
                self.next_due
                    .iter()
                    .flatten()
                    .map(|due| due.saturating_duration_since(now))
                    .min()
                    .unwrap_or_default()
            }
        }
    }
}
