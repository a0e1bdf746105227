// # gddnsd - Google Cloud DNS dynamic DNS daemon
//
// The gddnsd daemon is a thin shell around gddns-core. It is responsible for:
// 1. Reading and validating the configuration file
// 2. Initializing logging
// 3. Building the Cloud DNS provider and the public IP resolver
// 4. Running the reconciliation loop until SIGINT or SIGTERM
//
// All reconciliation logic lives in gddns-core.
//
// ## Usage
//
// ```bash
// gddnsd                       # reads ./ddns-config.yaml
// gddnsd /etc/gddns/hosts.yaml
// RUST_LOG=debug gddnsd        # overrides log-level
// ```
//
// ## Example Configuration
//
// ```yaml
// api-key: ddns-api-key.json
// logfile: ddns.log
// log-level: info
// hosts:
//   - project_id: my-project
//     managed_zone: my-zone
//     domain: example.com.
//     host: home.example.com.
//     ttl: 300
//     interval: 600
// ```

use anyhow::{Context, Result};
use clap::Parser;
use gddns_core::config::DEFAULT_CONFIG_PATH;
use gddns_core::{DdnsConfig, Scheduler};
use gddns_ip_http::HttpIpSource;
use gddns_provider_gcloud::{GcloudProvider, ServiceAccountKey};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration, credential or authorization error
/// - 2: Runtime error (unexpected)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DdnsExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error, rejected credentials, or usage error
    ConfigError = 1,
    /// Runtime error (unexpected failure)
    RuntimeError = 2,
}

impl From<DdnsExitCode> for ExitCode {
    fn from(code: DdnsExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Keep DNS records in Google Cloud DNS pointed at this host's public IP
#[derive(Parser, Debug)]
#[command(name = "gddnsd", version, about, long_about = None)]
struct Args {
    /// Configuration file (YAML or JSON, by extension)
    #[arg(value_name = "CONFIG")]
    config: Option<PathBuf>,
}

impl Args {
    fn config_path(&self) -> PathBuf {
        self.config
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
    }
}

/// Load, deserialize and validate the configuration file
///
/// Also checks that the credential file it names exists, so every
/// configuration problem surfaces before any network call.
fn load_config(path: &Path) -> Result<DdnsConfig> {
    if !path.exists() {
        anyhow::bail!("Configuration file not found: {}", path.display());
    }

    let config: DdnsConfig = config::Config::builder()
        .add_source(config::File::from(path))
        .build()
        .with_context(|| format!("Failed to read {}", path.display()))?
        .try_deserialize()
        .with_context(|| format!("Invalid configuration in {}", path.display()))?;

    config.validate()?;

    if !Path::new(&config.api_key).exists() {
        anyhow::bail!(
            "Credential file not found: {}. Set api-key to the service account key file",
            config.api_key
        );
    }

    Ok(config)
}

/// Initialize tracing
///
/// `RUST_LOG` wins over the configured `log-level`. When `logfile` is set
/// every event is also written, without colors, to that file; the file is
/// truncated at startup.
fn init_logging(config: &DdnsConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.to_lowercase()))
        .context("Invalid log filter")?;

    let file_layer = match &config.logfile {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Cannot open log file {}", path))?;
            Some(
                fmt::layer()
                    .with_ansi(false)
                    .with_writer(Mutex::new(file)),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(file_layer)
        .try_init()
        .context("Failed to set tracing subscriber")?;

    Ok(())
}

/// Exit code for an error that ended the daemon
///
/// Fatal agent errors (configuration, rejected credentials) exit with 1;
/// anything else is an unexpected runtime failure.
fn exit_code_for(err: &anyhow::Error) -> DdnsExitCode {
    match err.downcast_ref::<gddns_core::Error>() {
        Some(e) if e.is_fatal() => DdnsExitCode::ConfigError,
        _ => DdnsExitCode::RuntimeError,
    }
}

fn main() -> ExitCode {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            let _ = e.print();
            // --help and --version print to stdout and are not failures
            return if e.use_stderr() {
                DdnsExitCode::ConfigError.into()
            } else {
                DdnsExitCode::CleanShutdown.into()
            };
        }
    };

    let config_path = args.config_path();
    let config = match load_config(&config_path) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            return DdnsExitCode::ConfigError.into();
        }
    };

    if let Err(e) = init_logging(&config) {
        eprintln!("Logging setup error: {:#}", e);
        return DdnsExitCode::ConfigError.into();
    }

    info!("Starting gddnsd daemon");
    info!(
        "Configuration loaded from {}: {} host(s)",
        config_path.display(),
        config.hosts.len()
    );

    let key = match ServiceAccountKey::from_file(&config.api_key) {
        Ok(key) => key,
        Err(e) => {
            error!("{}", e);
            return DdnsExitCode::ConfigError.into();
        }
    };

    // Hosts are reconciled strictly one after another
    let rt = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return DdnsExitCode::RuntimeError.into();
        }
    };

    let result = rt.block_on(async {
        match run_daemon(config, key).await {
            Ok(()) => DdnsExitCode::CleanShutdown,
            Err(e) => {
                error!("Daemon error: {:#}", e);
                exit_code_for(&e)
            }
        }
    });

    result.into()
}

/// Run the daemon until shutdown or a fatal error
async fn run_daemon(config: DdnsConfig, key: ServiceAccountKey) -> Result<()> {
    let provider = GcloudProvider::new(key, config.dry_run)?;
    if provider.is_dry_run() {
        warn!("Cloud DNS provider running in DRY-RUN mode - no changes will be made");
    }

    // Rejected credentials end the daemon here; an unreachable token
    // endpoint does not, the first pass will try again.
    match provider.authenticate().await {
        Ok(()) => {}
        Err(e) if e.is_fatal() => return Err(e.into()),
        Err(e) => warn!("Could not verify credentials at startup: {}", e),
    }

    let ip_source = HttpIpSource::new(config.ip_resolver_url.as_str());
    info!("Resolving public IP via {}", ip_source.url());

    let shutdown = CancellationToken::new();
    spawn_signal_handler(shutdown.clone())?;

    let mut scheduler = Scheduler::from_config(
        Box::new(ip_source),
        Box::new(provider),
        &config,
        shutdown,
    )?;

    scheduler.run().await?;

    info!("Shutting down daemon");
    Ok(())
}

/// What a shutdown signal does
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SignalAction {
    /// Cancel the token and let the current pass wind down
    Graceful,
    /// Shutdown is already underway; leave without waiting
    ForceExit,
}

/// Act on one received signal
///
/// The first signal cancels `shutdown`. Any later one forces exit, so an
/// operator is never stuck behind a hung provider request.
fn on_signal(shutdown: &CancellationToken) -> SignalAction {
    if shutdown.is_cancelled() {
        SignalAction::ForceExit
    } else {
        shutdown.cancel();
        SignalAction::Graceful
    }
}

fn handle_signal(shutdown: &CancellationToken, name: &str) {
    match on_signal(shutdown) {
        SignalAction::Graceful => {
            info!("Received shutdown signal: {}. Send it again to exit immediately", name);
        }
        SignalAction::ForceExit => {
            warn!("Received {} during shutdown; exiting without waiting", name);
            std::process::exit(DdnsExitCode::RuntimeError as i32);
        }
    }
}

/// Handle SIGTERM and SIGINT for the life of the process
///
/// Handlers are installed before returning, so a failure to install them
/// is reported to the caller.
#[cfg(unix)]
fn spawn_signal_handler(shutdown: CancellationToken) -> Result<()> {
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGINT handler: {}", e))?;

    tokio::spawn(async move {
        loop {
            let name = tokio::select! {
                _ = sigterm.recv() => "SIGTERM",
                _ = sigint.recv() => "SIGINT",
            };
            handle_signal(&shutdown, name);
        }
    });

    Ok(())
}

/// Handle CTRL-C for the life of the process
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
fn spawn_signal_handler(shutdown: CancellationToken) -> Result<()> {
    tokio::spawn(async move {
        loop {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to wait for CTRL-C: {}", e);
                shutdown.cancel();
                return;
            }
            handle_signal(&shutdown, "SIGINT");
        }
    });

    Ok(())
}
