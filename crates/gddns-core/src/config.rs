//! Configuration types for the gddns agent
//!
//! This module defines all configuration structures used throughout the crate.
//! Loading the document from disk is the daemon's job; this module only
//! describes its shape and validates it.

use crate::traits::ZoneRef;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default configuration file looked up when no path is given
pub const DEFAULT_CONFIG_PATH: &str = "ddns-config.yaml";

/// Default service-account credential file
pub const DEFAULT_API_KEY_PATH: &str = "ddns-api-key.json";

/// Default public IP discovery endpoint
pub const DEFAULT_IP_RESOLVER_URL: &str = "https://api.ipify.org?format=json";

/// Main agent configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct DdnsConfig {
    /// Path to the service-account credential file
    #[serde(default = "default_api_key")]
    pub api_key: String,

    /// Optional log file, written in addition to the console
    #[serde(default)]
    pub logfile: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// URL of the public IP discovery service
    #[serde(default = "default_ip_resolver_url")]
    pub ip_resolver_url: String,

    /// Seconds between change status polls
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval: u64,

    /// Optional cap on status polls per change (unbounded when absent)
    #[serde(default)]
    pub max_polls: Option<u32>,

    /// How passes are scheduled across hosts
    #[serde(default)]
    pub schedule: SchedulePolicy,

    /// Log intended changes instead of submitting them
    #[serde(default)]
    pub dry_run: bool,

    /// Hosts to keep in sync, processed in this order
    pub hosts: Vec<HostConfig>,
}

impl DdnsConfig {
    /// Create a configuration for the given hosts with defaults everywhere else
    pub fn new(hosts: Vec<HostConfig>) -> Self {
        Self {
            api_key: default_api_key(),
            logfile: None,
            log_level: default_log_level(),
            ip_resolver_url: default_ip_resolver_url(),
            poll_interval: default_poll_interval_secs(),
            max_polls: None,
            schedule: SchedulePolicy::default(),
            dry_run: false,
            hosts,
        }
    }

    /// Validate the configuration
    ///
    /// Runs before any network call is attempted; every failure names the
    /// offending key and, for host entries, the host.
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.api_key.trim().is_empty() {
            return Err(crate::Error::config("api-key cannot be empty"));
        }

        match self.log_level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            other => {
                return Err(crate::Error::config(format!(
                    "log-level '{}' is not valid. Valid levels: trace, debug, info, warn, error",
                    other
                )));
            }
        }

        if !self.ip_resolver_url.starts_with("https://")
            && !self.ip_resolver_url.starts_with("http://")
        {
            return Err(crate::Error::config(format!(
                "ip-resolver-url must use HTTP or HTTPS scheme. Got: {}",
                self.ip_resolver_url
            )));
        }

        self.engine().validate()?;

        if self.hosts.is_empty() {
            return Err(crate::Error::config("No hosts configured"));
        }

        for host in &self.hosts {
            host.validate()?;
        }

        Ok(())
    }

    /// Engine settings derived from this configuration
    pub fn engine(&self) -> EngineConfig {
        EngineConfig {
            poll_interval: Duration::from_secs(self.poll_interval),
            max_polls: self.max_polls,
            schedule: self.schedule,
        }
    }
}

/// One desired-state entry: a host name that should point at our public IP
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostConfig {
    /// Google Cloud project owning the managed zone
    pub project_id: String,

    /// Managed zone name (not the DNS name)
    pub managed_zone: String,

    /// DNS name of the zone, e.g. "example.com."
    pub domain: String,

    /// Fully-qualified host name, must end with '.'
    pub host: String,

    /// Record TTL in seconds
    pub ttl: u32,

    /// Seconds between reconciliation passes for this host
    pub interval: u64,
}

impl HostConfig {
    /// Create a new host entry
    pub fn new(
        project_id: impl Into<String>,
        managed_zone: impl Into<String>,
        domain: impl Into<String>,
        host: impl Into<String>,
    ) -> Self {
        Self {
            project_id: project_id.into(),
            managed_zone: managed_zone.into(),
            domain: domain.into(),
            host: host.into(),
            ttl: default_ttl(),
            interval: default_interval_secs(),
        }
    }

    /// Set the record TTL
    pub fn with_ttl(mut self, ttl: u32) -> Self {
        self.ttl = ttl;
        self
    }

    /// Set the pass interval in seconds
    pub fn with_interval(mut self, interval: u64) -> Self {
        self.interval = interval;
        self
    }

    /// Pass interval as a duration
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval)
    }

    /// The managed zone this host lives in
    pub fn zone(&self) -> ZoneRef {
        ZoneRef {
            project: self.project_id.clone(),
            managed_zone: self.managed_zone.clone(),
            dns_name: self.domain.clone(),
        }
    }

    /// Validate a single host entry
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.project_id.trim().is_empty() {
            return Err(crate::Error::config(format!(
                "project_id cannot be empty (host: {})",
                self.host
            )));
        }

        if self.managed_zone.trim().is_empty() {
            return Err(crate::Error::config(format!(
                "managed_zone cannot be empty (host: {})",
                self.host
            )));
        }

        if self.host.is_empty() {
            return Err(crate::Error::config("host cannot be empty"));
        }

        // Cloud DNS only accepts fully-qualified names
        if !self.host.ends_with('.') {
            return Err(crate::Error::config(format!(
                "host '{}' must end with a '.', e.g. www.example.com.",
                self.host
            )));
        }

        if self.ttl == 0 {
            return Err(crate::Error::config(format!(
                "ttl must be > 0 (host: {})",
                self.host
            )));
        }

        if self.interval == 0 {
            return Err(crate::Error::config(format!(
                "interval must be > 0 (host: {})",
                self.host
            )));
        }

        Ok(())
    }
}

/// How the scheduler spaces reconciliation passes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SchedulePolicy {
    /// Every host is reconciled on its own interval
    #[default]
    PerHost,

    /// Reconcile every host, then sleep for the last host's interval
    LastHost,
}

/// Engine configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// Delay between change status polls
    pub poll_interval: Duration,

    /// Maximum number of status polls per change
    ///
    /// `None` polls until the provider reports a terminal status.
    pub max_polls: Option<u32>,

    /// Pass scheduling policy
    pub schedule: SchedulePolicy,
}

impl EngineConfig {
    /// Validate the engine settings
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.poll_interval.is_zero() {
            return Err(crate::Error::config("poll-interval must be > 0"));
        }
        if self.max_polls == Some(0) {
            return Err(crate::Error::config("max-polls must be > 0 when set"));
        }
        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(default_poll_interval_secs()),
            max_polls: None,
            schedule: SchedulePolicy::default(),
        }
    }
}

fn default_api_key() -> String {
    DEFAULT_API_KEY_PATH.to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_ip_resolver_url() -> String {
    DEFAULT_IP_RESOLVER_URL.to_string()
}

fn default_poll_interval_secs() -> u64 {
    10
}

fn default_ttl() -> u32 {
    300
}

fn default_interval_secs() -> u64 {
    600
}
