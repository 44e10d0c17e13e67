//! Common types for transport layer

use std::fmt;
use std::str::FromStr;

use crate::error::TransportError;

/// L2CAP Protocol/Service Multiplexer
///
/// Selects a logical channel on a connection-oriented Bluetooth link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Psm(pub u16);

impl Psm {
    /// HID control channel
    pub const CONTROL: Psm = Psm(0x0011);
    /// HID interrupt channel
    pub const INTERRUPT: Psm = Psm(0x0013);

    pub fn value(self) -> u16 {
        self.0
    }
}

impl From<u16> for Psm {
    fn from(value: u16) -> Self {
        Psm(value)
    }
}

impl fmt::Display for Psm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:04X}", self.0)
    }
}

impl FromStr for Psm {
    type Err = String;

    /// Accepts decimal (`19`) or hex (`0x13`)
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
            Some(hex) => u16::from_str_radix(hex, 16),
            None => s.parse::<u16>(),
        };
        parsed
            .map(Psm)
            .map_err(|e| format!("Invalid PSM '{}': {}", s, e))
    }
}

/// Bluetooth device address (BD_ADDR)
///
/// Stored most-significant byte first, as written: `54:4A:16:4D:AC:32`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct BdAddr(pub [u8; 6]);

impl BdAddr {
    /// `00:00:00:00:00:00` - bind to any local adapter
    pub const ANY: BdAddr = BdAddr([0; 6]);

    /// Bytes in the little-endian order the kernel's `bdaddr_t` uses
    pub fn to_le_bytes(self) -> [u8; 6] {
        let mut b = self.0;
        b.reverse();
        b
    }
}

impl fmt::Display for BdAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = &self.0;
        write!(
            f,
            "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
            b[0], b[1], b[2], b[3], b[4], b[5]
        )
    }
}

impl FromStr for BdAddr {
    type Err = TransportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || TransportError::InvalidAddress(s.to_string());
        let mut bytes = [0u8; 6];
        let mut parts = s.trim().split(':');

        for byte in bytes.iter_mut() {
            let part = parts.next().ok_or_else(invalid)?;
            if part.len() != 2 {
                return Err(invalid());
            }
            *byte = u8::from_str_radix(part, 16).map_err(|_| invalid())?;
        }
        if parts.next().is_some() {
            return Err(invalid());
        }

        Ok(BdAddr(bytes))
    }
}

/// How the control/interrupt channels get established
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionMode {
    /// Dial out to the remote device
    Connect,
    /// Wait for the remote device to connect to us
    #[default]
    Listen,
}

impl ConnectionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionMode::Connect => "connect",
            ConnectionMode::Listen => "listen",
        }
    }
}

impl fmt::Display for ConnectionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConnectionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "connect" | "dial" => Ok(ConnectionMode::Connect),
            "listen" | "accept" => Ok(ConnectionMode::Listen),
            _ => Err(format!("Unknown connection mode: {}", s)),
        }
    }
}

/// Outcome of a single blocking receive
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Received {
    /// A message arrived
    Data(Vec<u8>),
    /// Nothing arrived before the timeout
    Timeout,
    /// The remote side closed the channel
    PeerClosed,
    /// A signal cut the wait short
    Interrupted,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bdaddr_roundtrip() {
        let addr: BdAddr = "54:4A:16:4D:AC:32".parse().unwrap();
        assert_eq!(addr.0, [0x54, 0x4A, 0x16, 0x4D, 0xAC, 0x32]);
        assert_eq!(addr.to_string(), "54:4A:16:4D:AC:32");
        assert_eq!(addr.to_le_bytes(), [0x32, 0xAC, 0x4D, 0x16, 0x4A, 0x54]);
    }

    #[test]
    fn test_bdaddr_lowercase() {
        let addr: BdAddr = "00:1a:7d:da:71:13".parse().unwrap();
        assert_eq!(addr.to_string(), "00:1A:7D:DA:71:13");
    }

    #[test]
    fn test_bdaddr_rejects_garbage() {
        for bad in ["", "00:11:22:33:44", "00:11:22:33:44:55:66", "0:11:22:33:44:55", "zz:11:22:33:44:55"] {
            assert!(
                matches!(bad.parse::<BdAddr>(), Err(TransportError::InvalidAddress(_))),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_psm_parse() {
        assert_eq!("0x13".parse::<Psm>().unwrap(), Psm::INTERRUPT);
        assert_eq!("17".parse::<Psm>().unwrap(), Psm::CONTROL);
        assert!("0xZZ".parse::<Psm>().is_err());
        assert_eq!(Psm::INTERRUPT.to_string(), "0x0013");
    }

    #[test]
    fn test_mode_parse() {
        assert_eq!("CONNECT".parse::<ConnectionMode>(), Ok(ConnectionMode::Connect));
        assert_eq!("listen".parse::<ConnectionMode>(), Ok(ConnectionMode::Listen));
        assert!("bogus".parse::<ConnectionMode>().is_err());
    }
}
