//! Reconciliation engine
//!
//! The engine is responsible for:
//! - Resolving the current public address via IpSource
//! - Reading the provider's record set for each host
//! - Deciding between no-op, create, and delete-then-create
//! - Applying changes and polling them to completion
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐
//! │  Scheduler  │─── HostConfig (in order) ───┐
//! └─────────────┘                             │
//!                                             ▼
//!                                    ┌──────────────┐
//!                                    │  Reconciler  │
//!                                    └──────────────┘
//!                                             │
//!         ┌───────────────────────────────────┼─────────────────────┐
//!         │                                   │                     │
//!         ▼                                   ▼                     ▼
//! ┌─────────────┐                    ┌──────────────┐     ┌──────────────────┐
//! │  IpSource   │                    │ DnsProvider  │     │ ChangeApplicator │
//! │ (current)   │                    │ (list)       │     │ (submit + poll)  │
//! └─────────────┘                    └──────────────┘     └──────────────────┘
//! ```
//!
//! ## Pass Flow
//!
//! 1. Resolve public IP (failure: skip host this pass)
//! 2. List record sets for the host name
//! 3. None → create; other name → mismatch error; same IP → no-op
//! 4. Different IP → delete stale, then create fresh
//! 5. After the pass, sleep per the schedule policy

pub mod change;
pub mod reconciler;
pub mod scheduler;

pub use change::{ChangeApplicator, ChangeOutcome};
pub use reconciler::{PassOutcome, Reconciler};
pub use scheduler::Scheduler;
