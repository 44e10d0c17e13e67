//! Log key events for one session

use super::{open_device, setup_interrupt_handler, CommandResult};
use bluefire::config::BridgeConfig;
use bluefire::events::Direction;
use bluefire::session::SessionError;
use bluefire_transport::TransportError;
use tracing::info;

pub fn run(config: &BridgeConfig, monitor: bool) -> CommandResult {
    info!("EventLogger started with PID {}", std::process::id());

    let running = setup_interrupt_handler();
    let mut device = open_device(config, monitor, running)?;
    device.listen(Direction::Down, |key| info!("Pressed {}", key));
    device.listen(Direction::Up, |key| info!("Released {}", key));

    info!(
        "Ends after {}s without input ({} profile)",
        config.idle_timeout,
        device.profile().display_name()
    );
    match device.connect_with_psms(
        config.mode,
        config.idle_timeout(),
        config.control_psm,
        config.interrupt_psm,
    ) {
        Ok(()) => {}
        Err(SessionError::Transport(TransportError::Cancelled)) => {
            info!("EventLogger has been terminated...");
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    }

    let reason = device.event_loop();
    info!("Session ended: {}", reason);
    device.disconnect();
    Ok(())
}
