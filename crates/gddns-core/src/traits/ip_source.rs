// # IP Source Trait
//
// Defines the interface for discovering the host's current public address.
//
// ## Implementations
//
// - HTTP discovery service: `gddns-ip-http` crate
//
// ## Usage
//
// ```rust,ignore
// use gddns_core::IpSource;
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let source = /* IpSource implementation */;
//
//     let current_ip = source.current().await?;
//     println!("public address: {}", current_ip);
//
//     Ok(())
// }
// ```

use async_trait::async_trait;
use std::net::IpAddr;

/// Trait for IP source implementations
///
/// The reconciler calls [`IpSource::current`] once at the start of every
/// pass for every host. Implementations must not cache the answer across
/// calls: a stale address would defeat the whole point of the pass.
///
/// # Errors
///
/// Implementations should distinguish the two failure families, the
/// scheduler logs them differently:
///
/// - transient transport trouble (connection refused, timeout, non-200
///   status) → [`crate::Error::Http`]
/// - an answer that is not an address → [`crate::Error::MalformedResponse`]
///
/// # Trust Level: Semi-Trusted
///
/// IP sources are observers. They must not:
/// - ❌ Perform DNS changes (use `DnsProvider`)
/// - ❌ Retry or sleep (the scheduler re-runs the pass on its own cadence)
/// - ❌ Spawn tasks
#[async_trait]
pub trait IpSource: Send + Sync {
    /// Get the current public IP address
    ///
    /// # Returns
    ///
    /// - `Ok(IpAddr)`: The current IP address
    /// - `Err(Error)`: If unable to determine the current IP
    async fn current(&self) -> Result<IpAddr, crate::Error>;

    /// Get the source name (for logging/debugging)
    fn source_name(&self) -> &'static str {
        "unknown"
    }
}
