//! bluefire - Bluetooth HID remote bridge
//!
//! Connects to (or waits for) a Bluetooth HID remote over its control and
//! interrupt L2CAP channels, decodes input reports into key names and fires
//! press/release callbacks.
//!
//! ```text
//! ChannelManager -> Session::listen -> report::decode
//!                                           |
//!                        DeviceProfile -> KeyEvents -> callbacks
//! ```

pub mod channels;
pub mod config;
pub mod device;
pub mod events;
pub mod profile;
pub mod relay;
pub mod report;
pub mod session;

pub use bluefire_transport as transport;
pub use channels::{ChannelManager, ChannelTable};
pub use config::BridgeConfig;
pub use device::HidDevice;
pub use events::{Direction, KeyEvents};
pub use profile::{DeviceProfile, FireTvRemote, KeyTable};
pub use report::{decode, DecodeError, DecodedReport};
pub use session::{DisconnectReason, Session, SessionError, SessionState};
