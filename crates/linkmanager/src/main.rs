//! # Linkmanager - etcd-driven VXLAN mesh
//!
//! Keeps the VXLAN ports on an Open vSwitch bridge in step with the set of
//! hosts announcing themselves in etcd.
//!
//! ## Architecture
//! ```text
//! Announcer ──set(prefix/addr, ttl)──► etcd ◄──get/wait── Reconciler ──► ovs-vsctl
//! ```
//!
//! The two workers share nothing but the registry.

use anyhow::{Context, Result, bail};
use clap::Parser;
use std::net::Ipv4Addr;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod cluster;
mod config;
mod netdev;
mod registry;
mod tunnel;

#[cfg(test)]
mod testing;

use cluster::{Announcer, AnnouncerConfig, Reconciler, ReconcilerConfig, Signer};
use config::AppConfig;
use linkmanager_common::LinkError;
use registry::EtcdClient;
use tunnel::OvsDriver;

/// Linkmanager - maintain a VXLAN mesh from etcd announcements
#[derive(Parser, Debug)]
#[command(name = "linkmanager")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "config/linkmanager.toml")]
    config: String,

    /// etcd endpoint (overrides config)
    #[arg(short = 's', long, env = "ETCD_SERVER")]
    etcd_server: Option<String>,

    /// Open vSwitch bridge (overrides config)
    #[arg(short, long)]
    bridge: Option<String>,

    /// Network device (overrides config)
    #[arg(short, long)]
    device: Option<String>,

    /// Address to announce (default: first IPv4 address of the device)
    #[arg(short, long)]
    address: Option<String>,

    /// Registry key prefix (overrides config)
    #[arg(short, long)]
    prefix: Option<String>,

    /// Announcement TTL in seconds (overrides config)
    #[arg(short, long)]
    ttl: Option<u64>,

    /// Shared signing secret
    #[arg(short = 'S', long, env = "LINKMANAGER_SECRET", hide_env_values = true)]
    secret: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn", env = "LOG_LEVEL")]
    log_level: String,

    /// Shorthand for --log-level info
    #[arg(short, long)]
    verbose: bool,

    /// Shorthand for --log-level debug
    #[arg(short = 'D', long)]
    debug: bool,

    /// Enable JSON logging output
    #[arg(long, default_value = "false")]
    json_logs: bool,
}

impl Args {
    fn effective_log_level(&self) -> &str {
        if self.debug {
            "debug"
        } else if self.verbose {
            "info"
        } else {
            &self.log_level
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();

    // Parse CLI arguments
    let args = Args::parse();

    // Initialize logging
    init_logging(args.effective_log_level(), args.json_logs)?;

    info!("Starting linkmanager v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = AppConfig::load(&args.config, &args)?;

    // Preconditions: fatal before any loop starts
    if !netdev::device_exists(&config.device) {
        bail!(LinkError::Precondition(format!(
            "network device {} does not exist",
            config.device
        )));
    }
    let driver = OvsDriver::connect(&config.bridge).await?;
    info!(bridge = %driver.bridge(), "Managing bridge");

    let address = local_address(&config).await?;
    info!(address = %address, "Using address");

    let signer = Signer::new(config.signing_key());
    if signer.is_degraded() {
        tracing::warn!("No secret configured, peer announcements are not authenticated");
    }

    let registry = EtcdClient::new(&config.etcd_server)?;
    info!(etcd = %registry.endpoint(), prefix = %config.prefix, "Using registry");

    let reconciler = Reconciler::init(
        ReconcilerConfig {
            local_address: address,
            prefix: config.prefix.clone(),
            ttl_secs: config.ttl_secs,
        },
        signer.clone(),
        registry.clone(),
        driver,
    )
    .await
    .context("Failed to read existing tunnels")?;

    let announcer = Announcer::new(
        AnnouncerConfig {
            address: address.to_string(),
            prefix: config.prefix.clone(),
            ttl_secs: config.ttl_secs,
        },
        signer,
        registry,
    );

    // Listen for signals before any tunnel can be created
    let signal = shutdown_signal()?;

    // Create shutdown broadcast channel
    let (shutdown_tx, _) = tokio::sync::broadcast::channel::<()>(1);

    let announcer_task = tokio::spawn(announcer.run(shutdown_tx.subscribe()));
    let mut reconciler_task = tokio::spawn(reconciler.run(shutdown_tx.subscribe()));

    // Run until a signal arrives or the reconciler dies
    let finished = tokio::select! {
        _ = signal => None,
        result = &mut reconciler_task => Some(result),
    };
    let _ = shutdown_tx.send(());

    let reconciled = match finished {
        Some(result) => result,
        None => {
            info!("Shutdown signal received");
            reconciler_task.await
        }
    };

    if let Err(e) = announcer_task.await {
        tracing::error!(error = %e, "Announcer task failed");
    }

    reconciled
        .context("Reconciler task panicked")?
        .context("Reconciler stopped")?;

    info!("Linkmanager shutdown complete");
    Ok(())
}

/// Configured address, or the first IPv4 address of the device
async fn local_address(config: &AppConfig) -> Result<Ipv4Addr> {
    match config.address {
        Some(ref address) => address
            .parse::<Ipv4Addr>()
            .with_context(|| format!("{address:?} is not a valid IPv4 address")),
        None => Ok(netdev::discover_address(&config.device).await?),
    }
}

/// Install SIGINT and SIGTERM handlers now; the returned future resolves on
/// the first signal, including one delivered before it is polled
#[cfg(unix)]
fn shutdown_signal() -> Result<impl Future<Output = ()>> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut interrupt = signal(SignalKind::interrupt()).context("Failed to listen for SIGINT")?;
    let mut terminate = signal(SignalKind::terminate()).context("Failed to listen for SIGTERM")?;

    Ok(async move {
        tokio::select! {
            _ = interrupt.recv() => {}
            _ = terminate.recv() => {}
        }
    })
}

#[cfg(not(unix))]
fn shutdown_signal() -> Result<impl Future<Output = ()>> {
    Ok(async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    })
}

/// Initialize structured logging with tracing
fn init_logging(level: &str, json: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level))
        // HTTP client internals are noise at debug level
        .add_directive("hyper=warn".parse()?)
        .add_directive("reqwest=warn".parse()?);

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true))
            .init();
    }

    Ok(())
}
