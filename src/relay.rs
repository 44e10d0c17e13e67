//! Kodi EventServer relay
//!
//! Forwards key presses and releases to Kodi over its UDP EventServer
//! protocol. Every packet is a single datagram: a fixed 32-byte big-endian
//! header followed by a type-specific payload.
//!
//! ```text
//! "XBMC" | ver 2.0 | type | seq | maxseq | payload len | token | 10 x 0
//!    4       2        2     4      4          2           4       10
//! ```

use std::collections::BTreeMap;
use std::io;
use std::net::{ToSocketAddrs, UdpSocket};
use std::time::{SystemTime, UNIX_EPOCH};

use thiserror::Error;
use tracing::{debug, warn};
use zerocopy::network_endian::{U16, U32};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::events::Direction;

/// Default EventServer port
pub const DEFAULT_PORT: u16 = 9777;

/// Longest device name sent in a HELO, in characters
pub const MAX_NAME_LEN: usize = 128;

/// Keyboard keymap used for named buttons
const KEYBOARD_MAP: &str = "KB";

/// Packet types
pub mod packet_type {
    pub const HELO: u16 = 0x01;
    pub const BYE: u16 = 0x02;
    pub const BUTTON: u16 = 0x03;
}

/// Button flags
pub mod button_flags {
    pub const USE_NAME: u16 = 0x01;
    pub const DOWN: u16 = 0x02;
    pub const UP: u16 = 0x04;
    pub const USE_AMOUNT: u16 = 0x08;
    pub const VKEY: u16 = 0x40;
}

/// Relay errors
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("relay socket error: {0}")]
    Io(#[from] io::Error),

    #[error("cannot resolve {0}")]
    Resolve(String),

    #[error("no Kodi button mapped for {0}")]
    Unmapped(String),
}

/// Fixed packet header
#[derive(Debug, Clone, Copy, IntoBytes, FromBytes, KnownLayout, Immutable)]
#[repr(C)]
pub struct PacketHeader {
    pub signature: [u8; 4],
    pub version: U16,
    pub packet_type: U16,
    pub sequence: U32,
    pub max_sequence: U32,
    pub payload_size: U16,
    pub token: U32,
    _reserved: [u8; 10],
}

impl PacketHeader {
    pub const SIGNATURE: [u8; 4] = *b"XBMC";
    pub const VERSION: u16 = 0x0200;
    pub const SIZE: usize = 32;

    /// Header for a single-datagram packet
    pub fn new(packet_type: u16, payload_size: u16, token: u32) -> Self {
        Self {
            signature: Self::SIGNATURE,
            version: U16::new(Self::VERSION),
            packet_type: U16::new(packet_type),
            sequence: U32::new(1),
            max_sequence: U32::new(1),
            payload_size: U16::new(payload_size),
            token: U32::new(token),
            _reserved: [0; 10],
        }
    }
}

/// Fixed part of a HELO payload, after the device name
#[derive(Debug, Clone, Copy, IntoBytes, FromBytes, KnownLayout, Immutable)]
#[repr(C)]
struct HeloTail {
    icon_type: u8,
    port: U16,
    _reserved: [u8; 8],
}

/// Fixed part of a BUTTON payload, before the map and button names
#[derive(Debug, Clone, Copy, IntoBytes, FromBytes, KnownLayout, Immutable)]
#[repr(C)]
struct ButtonFields {
    code: U16,
    flags: U16,
    amount: U16,
}

/// A button to press or release
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Button<'a> {
    /// Named button in the keyboard keymap, e.g. `"enter"`
    Named(&'a str),
    /// Raw button code
    Code(u16),
}

fn packet(packet_type: u16, payload: &[u8], token: u32) -> Vec<u8> {
    let header = PacketHeader::new(packet_type, payload.len() as u16, token);
    let mut buf = Vec::with_capacity(PacketHeader::SIZE + payload.len());
    buf.extend_from_slice(header.as_bytes());
    buf.extend_from_slice(payload);
    buf
}

/// Append `s`, cut to at most `max_chars` characters, and a NUL
fn push_cstr(buf: &mut Vec<u8>, s: &str, max_chars: usize) {
    let end = s.char_indices().nth(max_chars).map_or(s.len(), |(i, _)| i);
    buf.extend_from_slice(s[..end].as_bytes());
    buf.push(0);
}

/// Encode a HELO announcing `name`
pub fn encode_helo(name: &str, token: u32) -> Vec<u8> {
    let mut payload = Vec::with_capacity(name.len() + 1 + 11);
    push_cstr(&mut payload, name, MAX_NAME_LEN);
    let tail = HeloTail {
        icon_type: 0,
        port: U16::new(0),
        _reserved: [0; 8],
    };
    payload.extend_from_slice(tail.as_bytes());
    packet(packet_type::HELO, &payload, token)
}

/// Encode a BYE
pub fn encode_bye(token: u32) -> Vec<u8> {
    packet(packet_type::BYE, &[], token)
}

/// Encode a BUTTON press or release
pub fn encode_button(button: Button<'_>, direction: Direction, token: u32) -> Vec<u8> {
    let edge = match direction {
        Direction::Down => button_flags::DOWN,
        Direction::Up => button_flags::UP,
    };
    let mut payload = Vec::new();
    match button {
        Button::Named(name) => {
            let fields = ButtonFields {
                code: U16::new(0),
                flags: U16::new(
                    button_flags::VKEY
                        | button_flags::USE_AMOUNT
                        | button_flags::USE_NAME
                        | edge,
                ),
                amount: U16::new(0),
            };
            payload.extend_from_slice(fields.as_bytes());
            push_cstr(&mut payload, KEYBOARD_MAP, usize::MAX);
            push_cstr(&mut payload, name, usize::MAX);
        }
        Button::Code(code) => {
            let fields = ButtonFields {
                code: U16::new(code),
                flags: U16::new(button_flags::USE_AMOUNT | edge),
                amount: U16::new(0),
            };
            payload.extend_from_slice(fields.as_bytes());
            payload.extend_from_slice(&[0, 0]);
        }
    }
    packet(packet_type::BUTTON, &payload, token)
}

/// Seconds since the epoch, truncated to 32 bits
fn session_token() -> u32 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as u32)
        .unwrap_or(0)
}

/// UDP client for one EventServer
pub struct EventClient {
    socket: UdpSocket,
    token: u32,
}

impl EventClient {
    pub fn connect(host: &str, port: u16) -> Result<Self, RelayError> {
        let target = (host, port)
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| RelayError::Resolve(format!("{host}:{port}")))?;
        let bind = if target.is_ipv4() { "0.0.0.0:0" } else { "[::]:0" };
        let socket = UdpSocket::bind(bind)?;
        socket.connect(target)?;
        debug!("EventServer client for {}", target);
        Ok(Self {
            socket,
            token: session_token(),
        })
    }

    pub fn token(&self) -> u32 {
        self.token
    }

    fn send(&self, datagram: &[u8]) -> Result<(), RelayError> {
        self.socket.send(datagram)?;
        Ok(())
    }

    pub fn send_helo(&self, name: &str) -> Result<(), RelayError> {
        self.send(&encode_helo(name, self.token))
    }

    pub fn send_bye(&self) -> Result<(), RelayError> {
        self.send(&encode_bye(self.token))
    }

    pub fn send_button(&self, button: Button<'_>, direction: Direction) -> Result<(), RelayError> {
        self.send(&encode_button(button, direction, self.token))
    }
}

/// Kodi button names for the Fire TV remote keys
pub fn default_keymap() -> BTreeMap<String, String> {
    [
        ("KEY_KPENTER", "enter"),
        ("KEY_BACK", "browser_back"),
        ("KEY_MENU", "menu"),
        ("KEY_LEFT", "left"),
        ("KEY_UP", "up"),
        ("KEY_RIGHT", "right"),
        ("KEY_DOWN", "down"),
        ("KEY_REWIND", "rewind"),
        ("KEY_FASTFORWARD", "fastforward"),
        ("KEY_PLAYPAUSE", "play_pause"),
        ("KEY_HOMEPAGE", "browser_home"),
        ("KEY_SEARCH", "browser_search"),
    ]
    .into_iter()
    .map(|(key, button)| (key.to_string(), button.to_string()))
    .collect()
}

/// Relays key transitions to Kodi as named keyboard buttons
pub struct KodiRelay {
    client: EventClient,
    keymap: BTreeMap<String, String>,
}

impl KodiRelay {
    pub fn new(client: EventClient, keymap: BTreeMap<String, String>) -> Self {
        Self { client, keymap }
    }

    pub fn client(&self) -> &EventClient {
        &self.client
    }

    /// Kodi button for a key name
    pub fn button_for(&self, key: &str) -> Option<&str> {
        self.keymap.get(key).map(String::as_str)
    }

    pub fn send(&self, key: &str, direction: Direction) -> Result<(), RelayError> {
        let button = self
            .button_for(key)
            .ok_or_else(|| RelayError::Unmapped(key.to_string()))?;
        debug!("Kodi {} {} ({})", direction, button, key);
        self.client.send_button(Button::Named(button), direction)
    }

    pub fn press(&self, key: &str) -> Result<(), RelayError> {
        self.send(key, Direction::Down)
    }

    pub fn release(&self, key: &str) -> Result<(), RelayError> {
        self.send(key, Direction::Up)
    }

    /// Send and log failures; for use inside key callbacks
    pub fn forward(&self, key: &str, direction: Direction) {
        if let Err(e) = self.send(key, direction) {
            warn!("{}", e);
        }
    }
}
