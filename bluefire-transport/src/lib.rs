//! Transport abstraction layer for Bluetooth HID channels
//!
//! A Bluetooth HID device talks over two L2CAP channels: control (PSM 0x11)
//! and interrupt (PSM 0x13). This crate hides how those channels are opened
//! behind three object-safe traits:
//!
//! ```text
//! [Transport]  ← connect(addr, psm) / listen(addr, psm)
//!     |
//! [Listener]   ← accept(timeout), LISTEN mode only
//!     |
//! [Channel]    ← receive(timeout) / shutdown()
//! ```
//!
//! Backends:
//!
//! - L2CAP sockets (Linux, via `AF_BLUETOOTH`)
//! - Monitor decorator (logs every received frame)
//! - Scripted in-memory transport (`mock` feature, for tests)

pub mod error;
pub mod types;

mod l2cap;
mod monitor;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use error::TransportError;
pub use l2cap::L2capTransport;
pub use monitor::MonitorTransport;
pub use types::{BdAddr, ConnectionMode, Psm, Received};

use std::sync::Arc;
use std::time::Duration;

/// A connected, reliable, message-oriented channel
pub trait Channel: Send {
    /// PSM this channel is bound to
    fn psm(&self) -> Psm;

    /// Block until a message arrives, the timeout elapses, or the peer goes away
    ///
    /// Fatal socket errors come back as `Err`; a reset link is reported as
    /// either `Ok(Received::PeerClosed)` or `Err(TransportError::PeerReset)`
    /// depending on how the backend learns about it.
    fn receive(&mut self, timeout: Duration) -> Result<Received, TransportError>;

    /// Orderly shutdown of both directions
    ///
    /// Returns `Err(TransportError::PeerReset)` if the remote side already
    /// closed the link.
    fn shutdown(&mut self) -> Result<(), TransportError>;
}

/// A bound, listening endpoint waiting for the remote to connect
pub trait Listener: Send {
    /// PSM this listener is bound to
    fn psm(&self) -> Psm;

    /// Wait up to `timeout` for an inbound connection
    ///
    /// # Returns
    /// `None` on timeout, `Some(channel)` once the remote connected
    fn accept(&mut self, timeout: Duration) -> Result<Option<Box<dyn Channel>>, TransportError>;
}

/// The core transport trait - all backends implement this
pub trait Transport: Send + Sync {
    /// Dial out to `addr` on `psm`
    fn connect(&self, addr: &BdAddr, psm: Psm) -> Result<Box<dyn Channel>, TransportError>;

    /// Bind `psm` on the local adapter `addr` and start listening
    fn listen(&self, addr: &BdAddr, psm: Psm) -> Result<Box<dyn Listener>, TransportError>;

    /// Short name for log lines
    fn name(&self) -> &str;
}

/// Type alias for a shared transport
pub type BoxedTransport = Arc<dyn Transport>;
