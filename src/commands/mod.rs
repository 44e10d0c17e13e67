//! Command handlers for the CLI application.
//!
//! - `log`: print key events for a single session
//! - `kodi`: relay key events to Kodi with a reconnect loop
//! - `keys`: show profile tables

pub mod keys;
pub mod kodi;
pub mod log;

use anyhow::{bail, Context};
use bluefire::config::BridgeConfig;
use bluefire::device::HidDevice;
use bluefire_transport::{BdAddr, BoxedTransport, ConnectionMode, L2capTransport, MonitorTransport};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use crate::cli::Cli;

/// Result type for command handlers
pub type CommandResult = anyhow::Result<()>;

/// Load the config file and apply command line overrides
pub fn load_config(cli: &Cli) -> anyhow::Result<BridgeConfig> {
    let path = cli.config.clone().unwrap_or_else(BridgeConfig::default_path);
    let mut config = BridgeConfig::load(&path)
        .with_context(|| format!("Failed to load {}", path.display()))?;

    if let Some(address) = cli.address {
        config.address = address;
    }
    if cli.connect {
        config.mode = ConnectionMode::Connect;
    }
    if let Some(timeout) = cli.timeout {
        config.idle_timeout = timeout;
    }
    if let Some(profile) = &cli.profile {
        config.profile = profile.clone();
    }
    Ok(config)
}

/// Install the tracing subscriber; `RUST_LOG` wins over `default_level`
pub fn init_logging(default_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Set up a Ctrl-C handler that sets the given flag to false when triggered.
/// Returns the Arc<AtomicBool> for use in the main loop.
pub fn setup_interrupt_handler() -> Arc<AtomicBool> {
    let running = Arc::new(AtomicBool::new(true));
    let running_clone = Arc::clone(&running);

    ctrlc::set_handler(move || {
        running_clone.store(false, Ordering::SeqCst);
    })
    .ok();

    running
}

/// Build the device for the configured address, profile and transport
pub fn open_device(
    config: &BridgeConfig,
    monitor: bool,
    running: Arc<AtomicBool>,
) -> anyhow::Result<HidDevice> {
    if config.mode == ConnectionMode::Connect && config.address == BdAddr::ANY {
        bail!("A remote address is required in connect mode (--address)");
    }

    let profile = config.active_profile()?;
    let mut transport: BoxedTransport = Arc::new(L2capTransport::new());
    if monitor {
        transport = MonitorTransport::wrap(transport);
    }

    Ok(HidDevice::new(transport, config.address, profile).with_running(running))
}
