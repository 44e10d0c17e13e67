//! HID session: owns the open channels and runs the receive loop
//!
//! ```text
//!  DISCONNECTED --connect()--> CONNECTING --ok--> CONNECTED
//!       ^                          |                  |
//!       +--------- error ----------+                  |
//!       +---- idle timeout / peer reset / disconnect -+
//! ```
//!
//! The receive loop blocks for at most [`RECV_TIMEOUT`] per call. Every
//! timeout adds that duration to the idle counter; once the counter exceeds
//! the configured idle timeout the session disconnects itself.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bluefire_transport::{ConnectionMode, Psm, Received, TransportError};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::channels::{ChannelManager, ChannelTable};
use crate::report::{self, DecodedReport};

/// Per-call receive timeout on the interrupt channel
pub const RECV_TIMEOUT: Duration = Duration::from_secs(10);

/// Session errors
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("connection failed: {0}")]
    Transport(#[from] TransportError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Connected,
}

/// Why `listen` returned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectReason {
    /// No message for longer than the idle timeout
    IdleTimeout,
    /// The remote closed or reset the link
    PeerReset,
    /// The running flag was cleared
    Interrupted,
    /// `listen` was called without a connection
    NotConnected,
}

impl fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DisconnectReason::IdleTimeout => "idle timeout",
            DisconnectReason::PeerReset => "reset by peer",
            DisconnectReason::Interrupted => "interrupted",
            DisconnectReason::NotConnected => "not connected",
        })
    }
}

pub struct Session {
    manager: ChannelManager,
    state: SessionState,
    channels: ChannelTable,
    interrupt: Psm,
    idle_elapsed: Duration,
    idle_timeout: Duration,
    recv_timeout: Duration,
    running: Option<Arc<AtomicBool>>,
}

impl Session {
    pub fn new(manager: ChannelManager) -> Self {
        Self {
            manager,
            state: SessionState::Disconnected,
            channels: ChannelTable::new(),
            interrupt: Psm::INTERRUPT,
            idle_elapsed: Duration::ZERO,
            idle_timeout: Duration::ZERO,
            recv_timeout: RECV_TIMEOUT,
            running: None,
        }
    }

    pub fn with_recv_timeout(mut self, timeout: Duration) -> Self {
        self.recv_timeout = timeout;
        self
    }

    /// Share a running flag with the session and its channel manager
    pub fn with_running(mut self, running: Arc<AtomicBool>) -> Self {
        self.manager = self.manager.with_running(Arc::clone(&running));
        self.running = Some(running);
        self
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == SessionState::Connected
    }

    pub fn idle_elapsed(&self) -> Duration {
        self.idle_elapsed
    }

    pub fn idle_timeout(&self) -> Duration {
        self.idle_timeout
    }

    /// PSMs of the open channels, control first
    pub fn open_psms(&self) -> Vec<Psm> {
        self.channels.psms()
    }

    fn is_running(&self) -> bool {
        self.running
            .as_ref()
            .map_or(true, |r| r.load(Ordering::SeqCst))
    }

    /// Open the control and interrupt channels
    pub fn connect(
        &mut self,
        mode: ConnectionMode,
        control: Psm,
        interrupt: Psm,
        idle_timeout: Duration,
    ) -> Result<(), SessionError> {
        if self.state != SessionState::Disconnected || !self.channels.is_empty() {
            self.disconnect();
        }

        self.state = SessionState::Connecting;
        self.idle_elapsed = Duration::ZERO;
        self.idle_timeout = idle_timeout;

        match self.manager.open_channels(mode, control, interrupt) {
            Ok(table) => {
                self.channels = table;
                self.interrupt = interrupt;
                self.state = SessionState::Connected;
                info!("Connected to Bluetooth HID device ({} mode)", mode);
                Ok(())
            }
            Err(e) => {
                self.state = SessionState::Disconnected;
                Err(e.into())
            }
        }
    }

    /// Close every open channel; safe to call at any time
    pub fn disconnect(&mut self) {
        if self.state != SessionState::Disconnected {
            debug!("Disconnecting");
        }
        self.state = SessionState::Disconnected;
        self.channels.shutdown_all();
    }

    /// Receive loop; returns only once the session is disconnected
    ///
    /// `on_report` is called with the key bitmask of every input report.
    pub fn listen<F>(&mut self, mut on_report: F) -> DisconnectReason
    where
        F: FnMut(u32),
    {
        if self.state != SessionState::Connected {
            return DisconnectReason::NotConnected;
        }

        while self.state == SessionState::Connected {
            if !self.is_running() {
                info!("Interrupted, disconnecting...");
                self.disconnect();
                return DisconnectReason::Interrupted;
            }

            let Some(channel) = self.channels.get_mut(self.interrupt) else {
                warn!("Interrupt channel {} is gone, disconnecting...", self.interrupt);
                self.disconnect();
                return DisconnectReason::PeerReset;
            };

            match channel.receive(self.recv_timeout) {
                Ok(Received::Data(message)) if message.is_empty() => {}
                Ok(Received::Data(message)) => {
                    self.idle_elapsed = Duration::ZERO;
                    match report::decode(&message) {
                        Ok(DecodedReport {
                            bitmask: Some(bitmask),
                            ..
                        }) => on_report(bitmask),
                        Ok(_) => {}
                        Err(e) => warn!("Dropping report: {}", e),
                    }
                }
                Ok(Received::Timeout) => {
                    self.idle_elapsed += self.recv_timeout;
                    if self.idle_elapsed > self.idle_timeout {
                        self.disconnect();
                        info!(
                            "HID device has been idle for {}s...",
                            self.idle_timeout.as_secs()
                        );
                        return DisconnectReason::IdleTimeout;
                    }
                }
                // Back to the running-flag check without idle time
                Ok(Received::Interrupted) => debug!("Receive interrupted"),
                Ok(Received::PeerClosed) => {
                    warn!("Connection has been reset by peer, disconnecting...");
                    self.disconnect();
                    return DisconnectReason::PeerReset;
                }
                Err(e) => {
                    if e.is_peer_reset() {
                        warn!("Connection has been reset by peer, disconnecting...");
                    } else {
                        warn!("Receive failed ({}), disconnecting...", e);
                    }
                    self.disconnect();
                    return DisconnectReason::PeerReset;
                }
            }
        }

        DisconnectReason::NotConnected
    }
}
