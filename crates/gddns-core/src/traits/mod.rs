//! Core traits for the gddns agent
//!
//! This module defines the abstract interfaces that all implementations must follow.
//!
//! - [`IpSource`]: Discover the current public address
//! - [`DnsProvider`]: Query record sets and apply changes via provider APIs

pub mod ip_source;
pub mod dns_provider;

pub use ip_source::IpSource;
pub use dns_provider::{
    ChangeHandle, ChangeOp, ChangeStatus, DnsProvider, RecordSet, ZoneRef, record_type_for,
};
