// # gddns-core
//
// Core library for the Google Cloud DNS dynamic DNS agent.
//
// ## Architecture Overview
//
// This library provides the reconciliation logic; everything that talks
// to the outside world sits behind a trait:
// - **IpSource**: Trait for discovering the current public address
// - **DnsProvider**: Trait for listing record sets and applying changes
// - **ChangeApplicator**: Submits one change and polls it to completion
// - **Reconciler**: Converges one host's record to the observed address
// - **Scheduler**: Drives passes over all hosts until shutdown
//
// ## Design Principles
//
// 1. **Separation of Concerns**: Core logic is separate from provider and resolver clients
// 2. **Sequential**: One host at a time, delete strictly before create
// 3. **Self-Healing**: No in-pass retries; the next pass re-evaluates from scratch
// 4. **Explicit Shutdown**: A cancellation token is checked at every suspension point
// 5. **Library-First**: The daemon is a thin shell around this crate

pub mod traits;
pub mod engine;
pub mod config;
pub mod error;

// Re-export core types for convenience
pub use traits::{DnsProvider, IpSource};
pub use engine::{ChangeApplicator, ChangeOutcome, PassOutcome, Reconciler, Scheduler};
pub use config::{DdnsConfig, EngineConfig, HostConfig, SchedulePolicy};
pub use error::{Error, Result};
