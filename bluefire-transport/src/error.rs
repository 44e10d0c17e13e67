//! Transport error types

use std::io;

use thiserror::Error;

use crate::types::Psm;

/// Errors that can occur during transport operations
#[derive(Error, Debug)]
pub enum TransportError {
    // Connection setup
    #[error("Failed to connect to PSM {psm}: {source}")]
    ConnectFailed {
        psm: Psm,
        #[source]
        source: io::Error,
    },

    #[error("Failed to listen on PSM {psm}: {source}")]
    ListenFailed {
        psm: Psm,
        #[source]
        source: io::Error,
    },

    #[error("Failed to accept on PSM {psm}: {source}")]
    AcceptFailed {
        psm: Psm,
        #[source]
        source: io::Error,
    },

    #[error("Control and interrupt channels cannot share PSM {0}")]
    SamePsm(Psm),

    // Established channels
    #[error("Connection reset by peer")]
    PeerReset,

    #[error("I/O error: {0}")]
    Io(io::Error),

    // Setup
    #[error("Invalid Bluetooth address: {0}")]
    InvalidAddress(String),

    #[error("Waiting for connection was cancelled")]
    Cancelled,

    #[error("L2CAP sockets are not supported on this platform")]
    Unsupported,
}

impl TransportError {
    /// Whether this error means the remote side went away
    pub fn is_peer_reset(&self) -> bool {
        matches!(self, TransportError::PeerReset)
    }
}

/// Errno values that mean the peer dropped the link
fn is_reset_kind(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::NotConnected
            | io::ErrorKind::BrokenPipe
    )
}

impl From<io::Error> for TransportError {
    fn from(e: io::Error) -> Self {
        if is_reset_kind(&e) {
            TransportError::PeerReset
        } else {
            TransportError::Io(e)
        }
    }
}
