//! Channel manager: opens the control and interrupt channels
//!
//! CONNECT mode dials both PSMs and fails as a whole if either dial fails.
//! LISTEN mode binds both PSMs and keeps accepting until the remote has
//! connected on each of them; accept timeouts are retried without limit.
//! The two PSMs must differ.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bluefire_transport::{BdAddr, BoxedTransport, Channel, ConnectionMode, Psm, TransportError};
use tracing::{debug, info, warn};

/// Per-attempt accept timeout in LISTEN mode
pub const ACCEPT_TIMEOUT: Duration = Duration::from_secs(10);

/// Open channels keyed by PSM, in the order they were requested
#[derive(Default)]
pub struct ChannelTable {
    entries: Vec<(Psm, Box<dyn Channel>)>,
}

impl ChannelTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, psm: Psm, channel: Box<dyn Channel>) {
        match self.entries.iter_mut().find(|(p, _)| *p == psm) {
            Some(entry) => entry.1 = channel,
            None => self.entries.push((psm, channel)),
        }
    }

    pub fn get_mut(&mut self, psm: Psm) -> Option<&mut (dyn Channel + 'static)> {
        self.entries
            .iter_mut()
            .find(|(p, _)| *p == psm)
            .map(|(_, channel)| channel.as_mut())
    }

    pub fn contains(&self, psm: Psm) -> bool {
        self.entries.iter().any(|(p, _)| *p == psm)
    }

    /// PSMs in table order
    pub fn psms(&self) -> Vec<Psm> {
        self.entries.iter().map(|(psm, _)| *psm).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Shut down every channel in table order and empty the table
    ///
    /// A peer that already went away is only worth a warning; other shutdown
    /// failures are logged too, since the channels are dropped either way.
    pub fn shutdown_all(&mut self) {
        for (psm, mut channel) in self.entries.drain(..) {
            match channel.shutdown() {
                Ok(()) => debug!("PSM {} shut down", psm),
                Err(e) if e.is_peer_reset() => {
                    warn!("PSM {}: socket has already been shut down", psm)
                }
                Err(e) => warn!("PSM {}: shutdown failed: {}", psm, e),
            }
        }
    }
}

impl Drop for ChannelTable {
    fn drop(&mut self) {
        if !self.is_empty() {
            self.shutdown_all();
        }
    }
}

/// Opens channel tables against one device address
pub struct ChannelManager {
    transport: BoxedTransport,
    address: BdAddr,
    accept_timeout: Duration,
    running: Option<Arc<AtomicBool>>,
}

impl ChannelManager {
    pub fn new(transport: BoxedTransport, address: BdAddr) -> Self {
        Self {
            transport,
            address,
            accept_timeout: ACCEPT_TIMEOUT,
            running: None,
        }
    }

    pub fn with_accept_timeout(mut self, timeout: Duration) -> Self {
        self.accept_timeout = timeout;
        self
    }

    /// Stop the LISTEN-mode accept loop once `running` is cleared
    pub fn with_running(mut self, running: Arc<AtomicBool>) -> Self {
        self.running = Some(running);
        self
    }

    pub fn address(&self) -> &BdAddr {
        &self.address
    }

    pub fn transport(&self) -> &BoxedTransport {
        &self.transport
    }

    fn is_running(&self) -> bool {
        self.running
            .as_ref()
            .map_or(true, |r| r.load(Ordering::SeqCst))
    }

    /// Open both channels; the table holds control first, then interrupt
    pub fn open_channels(
        &self,
        mode: ConnectionMode,
        control: Psm,
        interrupt: Psm,
    ) -> Result<ChannelTable, TransportError> {
        debug!("Control PSM: {}, Interrupt PSM: {}", control, interrupt);
        if control == interrupt {
            return Err(TransportError::SamePsm(control));
        }
        match mode {
            ConnectionMode::Connect => self.dial(&[control, interrupt]),
            ConnectionMode::Listen => self.accept_all(&[control, interrupt]),
        }
    }

    fn dial(&self, psms: &[Psm]) -> Result<ChannelTable, TransportError> {
        let mut table = ChannelTable::new();
        for &psm in psms {
            match self.transport.connect(&self.address, psm) {
                Ok(channel) => table.insert(psm, channel),
                Err(e) => {
                    // Partially dialled channels are shut down when `table` drops
                    warn!("Dialling {} on PSM {} failed: {}", self.address, psm, e);
                    return Err(e);
                }
            }
        }
        info!("Connected to {}", self.address);
        Ok(table)
    }

    fn accept_all(&self, psms: &[Psm]) -> Result<ChannelTable, TransportError> {
        let mut pending = Vec::with_capacity(psms.len());
        for &psm in psms {
            pending.push((psm, self.transport.listen(&self.address, psm)?));
        }

        // Accepted channels are shut down if `table` drops on an error
        let mut table = ChannelTable::new();
        info!("Waiting for Bluetooth connection...");
        let mut attempt = 0u64;
        while !pending.is_empty() {
            if !self.is_running() {
                info!("Stopped waiting for connection");
                return Err(TransportError::Cancelled);
            }
            attempt += 1;

            while let Some((psm, listener)) = pending.first_mut() {
                let psm = *psm;
                match listener.accept(self.accept_timeout)? {
                    Some(channel) => {
                        debug!("PSM {} accepted on attempt {}", psm, attempt);
                        table.insert(psm, channel);
                        pending.remove(0);
                    }
                    None => {
                        debug!("PSM {} accept timed out (attempt {})", psm, attempt);
                        break;
                    }
                }
            }
        }

        info!("Remote connected on {} channels", table.len());
        Ok(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bluefire_transport::mock::{MockEvent, MockTransport, ScriptedChannel, ScriptedListener};
    use bluefire_transport::Received;
    use std::io;

    fn manager(mock: &Arc<MockTransport>) -> ChannelManager {
        let transport: BoxedTransport = mock.clone();
        ChannelManager::new(transport, BdAddr::ANY).with_accept_timeout(Duration::from_millis(1))
    }

    #[test]
    fn test_connect_mode_dials_both() {
        let mock = Arc::new(MockTransport::new());
        mock.script_connect(Psm::CONTROL, ScriptedChannel::new(Psm::CONTROL));
        mock.script_connect(Psm::INTERRUPT, ScriptedChannel::new(Psm::INTERRUPT));

        let table = manager(&mock)
            .open_channels(ConnectionMode::Connect, Psm::CONTROL, Psm::INTERRUPT)
            .unwrap();
        assert_eq!(table.psms(), vec![Psm::CONTROL, Psm::INTERRUPT]);
        assert_eq!(
            mock.events(),
            vec![MockEvent::Connect(Psm::CONTROL), MockEvent::Connect(Psm::INTERRUPT)]
        );
    }

    #[test]
    fn test_connect_mode_failure_closes_dialled_channels() {
        let mock = Arc::new(MockTransport::new());
        mock.script_connect(Psm::CONTROL, ScriptedChannel::new(Psm::CONTROL));
        mock.script_connect_error(Psm::INTERRUPT, io::ErrorKind::ConnectionRefused);

        let err = manager(&mock)
            .open_channels(ConnectionMode::Connect, Psm::CONTROL, Psm::INTERRUPT)
            .err()
            .unwrap();
        assert!(matches!(err, TransportError::ConnectFailed { psm, .. } if psm == Psm::INTERRUPT));
        assert_eq!(mock.count(&MockEvent::Shutdown(Psm::CONTROL)), 1);
    }

    #[test]
    fn test_listen_mode_retries_until_both_accept() {
        let mock = Arc::new(MockTransport::new());
        mock.script_listener(
            Psm::CONTROL,
            ScriptedListener::new(Psm::CONTROL)
                .timeouts(3)
                .accept(ScriptedChannel::new(Psm::CONTROL)),
        );
        mock.script_listener(
            Psm::INTERRUPT,
            ScriptedListener::new(Psm::INTERRUPT)
                .timeouts(3)
                .accept(ScriptedChannel::new(Psm::INTERRUPT).data(&[0xA1, 0, 0, 1])),
        );

        let mut table = manager(&mock)
            .open_channels(ConnectionMode::Listen, Psm::CONTROL, Psm::INTERRUPT)
            .unwrap();
        assert_eq!(table.psms(), vec![Psm::CONTROL, Psm::INTERRUPT]);
        assert_eq!(mock.count(&MockEvent::Accepted(Psm::CONTROL)), 1);
        assert_eq!(mock.count(&MockEvent::Accepted(Psm::INTERRUPT)), 1);

        let interrupt = table.get_mut(Psm::INTERRUPT).unwrap();
        assert_eq!(
            interrupt.receive(Duration::ZERO).unwrap(),
            Received::Data(vec![0xA1, 0, 0, 1])
        );
    }

    #[test]
    fn test_listen_mode_accepted_psm_is_not_retried() {
        let mock = Arc::new(MockTransport::new());
        mock.script_listener(
            Psm::CONTROL,
            ScriptedListener::new(Psm::CONTROL).accept(ScriptedChannel::new(Psm::CONTROL)),
        );
        mock.script_listener(
            Psm::INTERRUPT,
            ScriptedListener::new(Psm::INTERRUPT)
                .timeouts(2)
                .accept(ScriptedChannel::new(Psm::INTERRUPT)),
        );

        manager(&mock)
            .open_channels(ConnectionMode::Listen, Psm::CONTROL, Psm::INTERRUPT)
            .unwrap();
        assert_eq!(mock.count(&MockEvent::AcceptTimeout(Psm::CONTROL)), 0);
        assert_eq!(mock.count(&MockEvent::AcceptTimeout(Psm::INTERRUPT)), 2);
    }

    #[test]
    fn test_listen_mode_bind_failure() {
        let mock = Arc::new(MockTransport::new());
        mock.script_listen_error(Psm::CONTROL, io::ErrorKind::AddrInUse);

        let err = manager(&mock)
            .open_channels(ConnectionMode::Listen, Psm::CONTROL, Psm::INTERRUPT)
            .err()
            .unwrap();
        assert!(matches!(err, TransportError::ListenFailed { .. }));
    }

    #[test]
    fn test_listen_mode_cancelled() {
        let mock = Arc::new(MockTransport::new());
        mock.script_listener(Psm::CONTROL, ScriptedListener::new(Psm::CONTROL));
        mock.script_listener(Psm::INTERRUPT, ScriptedListener::new(Psm::INTERRUPT));

        let running = Arc::new(AtomicBool::new(false));
        let err = manager(&mock)
            .with_running(running)
            .open_channels(ConnectionMode::Listen, Psm::CONTROL, Psm::INTERRUPT)
            .err()
            .unwrap();
        assert!(matches!(err, TransportError::Cancelled));
    }

    #[test]
    fn test_listen_mode_accept_failure_closes_accepted_channels() {
        let mock = Arc::new(MockTransport::new());
        mock.script_listener(
            Psm::CONTROL,
            ScriptedListener::new(Psm::CONTROL).accept(ScriptedChannel::new(Psm::CONTROL)),
        );
        mock.script_listener(
            Psm::INTERRUPT,
            ScriptedListener::new(Psm::INTERRUPT)
                .timeouts(1)
                .fail(io::ErrorKind::PermissionDenied),
        );

        let err = manager(&mock)
            .open_channels(ConnectionMode::Listen, Psm::CONTROL, Psm::INTERRUPT)
            .err()
            .unwrap();
        assert!(matches!(err, TransportError::AcceptFailed { psm, .. } if psm == Psm::INTERRUPT));
        assert_eq!(mock.count(&MockEvent::Accepted(Psm::CONTROL)), 1);
        assert_eq!(mock.count(&MockEvent::Shutdown(Psm::CONTROL)), 1);
    }

    #[test]
    fn test_same_psm_rejected() {
        let mock = Arc::new(MockTransport::new());
        for mode in [ConnectionMode::Connect, ConnectionMode::Listen] {
            let err = manager(&mock)
                .open_channels(mode, Psm::CONTROL, Psm::CONTROL)
                .err()
                .unwrap();
            assert!(matches!(err, TransportError::SamePsm(psm) if psm == Psm::CONTROL));
        }
        // Rejected before anything is opened
        assert!(mock.events().is_empty());
    }

    #[test]
    fn test_shutdown_all_swallows_peer_reset() {
        let mock = Arc::new(MockTransport::new());
        mock.script_connect(Psm::CONTROL, ScriptedChannel::new(Psm::CONTROL).reset_on_shutdown());
        mock.script_connect(Psm::INTERRUPT, ScriptedChannel::new(Psm::INTERRUPT));

        let mut table = manager(&mock)
            .open_channels(ConnectionMode::Connect, Psm::CONTROL, Psm::INTERRUPT)
            .unwrap();
        table.shutdown_all();
        assert!(table.is_empty());
        assert_eq!(mock.count(&MockEvent::Shutdown(Psm::CONTROL)), 1);
        assert_eq!(mock.count(&MockEvent::Shutdown(Psm::INTERRUPT)), 1);

        // Nothing left to shut down
        table.shutdown_all();
        assert_eq!(mock.count(&MockEvent::Shutdown(Psm::CONTROL)), 1);
    }
}
