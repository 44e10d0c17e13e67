//! MonitorTransport middleware for tracing channel traffic
//!
//! Wraps any Transport implementation and logs every frame received on the
//! channels it opens, plus channel open/accept/shutdown events.
//!
//! # Example
//!
//! ```ignore
//! use bluefire_transport::{L2capTransport, MonitorTransport};
//!
//! let transport = MonitorTransport::wrap(Arc::new(L2capTransport::new()));
//! // Every received report is now logged as hex
//! ```

use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::error::TransportError;
use crate::types::{BdAddr, Psm, Received};
use crate::{BoxedTransport, Channel, Listener, Transport};

/// Transport middleware that logs all traffic
pub struct MonitorTransport {
    inner: BoxedTransport,
}

impl MonitorTransport {
    /// Wrap a transport with monitoring middleware
    pub fn wrap(transport: BoxedTransport) -> BoxedTransport {
        Arc::new(Self { inner: transport })
    }
}

impl Transport for MonitorTransport {
    fn connect(&self, addr: &BdAddr, psm: Psm) -> Result<Box<dyn Channel>, TransportError> {
        let channel = self.inner.connect(addr, psm)?;
        info!("[{}] connected to {} on PSM {}", self.inner.name(), addr, psm);
        Ok(Box::new(MonitorChannel { inner: channel }))
    }

    fn listen(&self, addr: &BdAddr, psm: Psm) -> Result<Box<dyn Listener>, TransportError> {
        let listener = self.inner.listen(addr, psm)?;
        info!("[{}] listening on {} PSM {}", self.inner.name(), addr, psm);
        Ok(Box::new(MonitorListener { inner: listener }))
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}

struct MonitorListener {
    inner: Box<dyn Listener>,
}

impl Listener for MonitorListener {
    fn psm(&self) -> Psm {
        self.inner.psm()
    }

    fn accept(&mut self, timeout: Duration) -> Result<Option<Box<dyn Channel>>, TransportError> {
        let accepted = self.inner.accept(timeout)?;
        Ok(accepted.map(|channel| {
            info!("PSM {}: accepted", channel.psm());
            Box::new(MonitorChannel { inner: channel }) as Box<dyn Channel>
        }))
    }
}

struct MonitorChannel {
    inner: Box<dyn Channel>,
}

impl Channel for MonitorChannel {
    fn psm(&self) -> Psm {
        self.inner.psm()
    }

    fn receive(&mut self, timeout: Duration) -> Result<Received, TransportError> {
        let received = self.inner.receive(timeout)?;
        match &received {
            Received::Data(bytes) => {
                info!("PSM {} <- {}", self.psm(), format_hex(bytes));
            }
            Received::PeerClosed => info!("PSM {}: peer closed", self.psm()),
            Received::Timeout | Received::Interrupted => {}
        }
        Ok(received)
    }

    fn shutdown(&mut self) -> Result<(), TransportError> {
        info!("PSM {}: shutdown", self.psm());
        self.inner.shutdown()
    }
}

/// Space separated uppercase hex, e.g. `A1 00 02 00`
fn format_hex(data: &[u8]) -> String {
    data.iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}
