//! HID device facade
//!
//! Wires a [`Session`] to a [`KeyEvents`] engine: input reports received by
//! the session are decoded against the device profile and turned into
//! press/release callbacks.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use bluefire_transport::{BdAddr, BoxedTransport, ConnectionMode, Psm};
use tracing::info;

use crate::channels::ChannelManager;
use crate::events::{Direction, KeyEvents};
use crate::profile::DeviceProfile;
use crate::session::{DisconnectReason, Session, SessionError, SessionState};

/// A Bluetooth HID remote with a fixed key profile
pub struct HidDevice {
    address: BdAddr,
    session: Session,
    events: KeyEvents,
}

impl HidDevice {
    pub const CONTROL_PSM: Psm = Psm::CONTROL;
    pub const INTERRUPT_PSM: Psm = Psm::INTERRUPT;

    pub fn new(
        transport: BoxedTransport,
        address: BdAddr,
        profile: Arc<dyn DeviceProfile>,
    ) -> Self {
        let session = Session::new(ChannelManager::new(transport, address));
        Self::with_session(address, session, profile)
    }

    /// Build around an already configured session
    pub fn with_session(address: BdAddr, session: Session, profile: Arc<dyn DeviceProfile>) -> Self {
        Self {
            address,
            session,
            events: KeyEvents::new(profile),
        }
    }

    /// Stop waiting/listening once `running` is cleared
    pub fn with_running(mut self, running: Arc<AtomicBool>) -> Self {
        self.session = self.session.with_running(running);
        self
    }

    pub fn address(&self) -> &BdAddr {
        &self.address
    }

    pub fn profile(&self) -> &Arc<dyn DeviceProfile> {
        self.events.profile()
    }

    pub fn state(&self) -> SessionState {
        self.session.state()
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn events(&self) -> &KeyEvents {
        &self.events
    }

    /// Register a key callback
    pub fn listen<F>(&mut self, direction: Direction, callback: F)
    where
        F: FnMut(&str) + Send + 'static,
    {
        self.events.listen(direction, callback);
    }

    /// Connect on the standard HID control and interrupt PSMs
    pub fn connect(&mut self, mode: ConnectionMode, idle_timeout: Duration) -> Result<(), SessionError> {
        self.connect_with_psms(mode, idle_timeout, Self::CONTROL_PSM, Self::INTERRUPT_PSM)
    }

    pub fn connect_with_psms(
        &mut self,
        mode: ConnectionMode,
        idle_timeout: Duration,
        control: Psm,
        interrupt: Psm,
    ) -> Result<(), SessionError> {
        self.session.connect(mode, control, interrupt, idle_timeout)?;
        info!("Connected to Bluetooth HID device {}", self.address);
        Ok(())
    }

    pub fn disconnect(&mut self) {
        self.session.disconnect();
    }

    /// Dispatch key events until the session ends
    pub fn event_loop(&mut self) -> DisconnectReason {
        info!("Listening for button events...");
        let events = &mut self.events;
        self.session.listen(|bitmask| events.report(bitmask))
    }
}
