//! Relay key events to Kodi

use super::{open_device, setup_interrupt_handler, CommandResult};
use anyhow::Context;
use bluefire::config::BridgeConfig;
use bluefire::events::Direction;
use bluefire::relay::{EventClient, KodiRelay};
use bluefire::session::{DisconnectReason, SessionError};
use bluefire_transport::TransportError;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{info, warn};

pub fn run(
    config: &BridgeConfig,
    host: Option<String>,
    port: Option<u16>,
    monitor: bool,
) -> CommandResult {
    let host = host
        .or_else(|| config.relay.host.clone())
        .context("No Kodi host given (argument or relay.host in the config file)")?;
    let port = port.unwrap_or(config.relay.port);
    info!("Kodi remote proxy started with PID {}", std::process::id());

    let client = EventClient::connect(&host, port)
        .with_context(|| format!("Cannot reach Kodi at {host}:{port}"))?;
    let relay = Arc::new(KodiRelay::new(client, config.relay.keymap.clone()));

    let running = setup_interrupt_handler();
    let mut device = open_device(config, monitor, Arc::clone(&running))?;
    let down = Arc::clone(&relay);
    device.listen(Direction::Down, move |key| down.forward(key, Direction::Down));
    let up = Arc::clone(&relay);
    device.listen(Direction::Up, move |key| up.forward(key, Direction::Up));

    while running.load(Ordering::SeqCst) {
        match device.connect_with_psms(
            config.mode,
            config.idle_timeout(),
            config.control_psm,
            config.interrupt_psm,
        ) {
            Ok(()) => {}
            Err(SessionError::Transport(TransportError::Cancelled)) => break,
            Err(e) => return Err(e.into()),
        }

        // Kodi forgets clients that went quiet, so announce every session
        if let Err(e) = relay.client().send_helo(&config.relay.name) {
            warn!("HELO to {}:{} failed: {}", host, port, e);
        }

        match device.event_loop() {
            DisconnectReason::Interrupted => break,
            reason => info!("Session ended ({}), waiting for the remote again", reason),
        }
    }

    device.disconnect();
    if let Err(e) = relay.client().send_bye() {
        warn!("BYE to {}:{} failed: {}", host, port, e);
    }
    info!("Kodi remote proxy has been terminated...");
    Ok(())
}
