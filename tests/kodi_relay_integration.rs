//! Integration tests for the Kodi relay path.
//!
//! A scripted remote session feeds `KodiRelay` callbacks, and a local UDP
//! socket stands in for Kodi's EventServer.

use std::net::UdpSocket;
use std::sync::Arc;
use std::time::Duration;

use bluefire::config::BridgeConfig;
use bluefire::device::HidDevice;
use bluefire::events::Direction;
use bluefire::relay::{packet_type, EventClient, KodiRelay, PacketHeader};
use bluefire::session::DisconnectReason;
use bluefire_transport::mock::{MockTransport, ScriptedChannel};
use bluefire_transport::{BdAddr, ConnectionMode, Psm, Transport};
use zerocopy::FromBytes;

fn kodi() -> (UdpSocket, u16) {
    let server = UdpSocket::bind("127.0.0.1:0").unwrap();
    server
        .set_read_timeout(Some(Duration::from_secs(5)))
        .unwrap();
    let port = server.local_addr().unwrap().port();
    (server, port)
}

/// Next datagram as (packet type, payload)
fn next_packet(server: &UdpSocket) -> (u16, Vec<u8>) {
    let mut buf = [0u8; 512];
    let n = server.recv(&mut buf).unwrap();
    let header = PacketHeader::read_from_bytes(&buf[..PacketHeader::SIZE]).unwrap();
    assert_eq!(header.signature, *b"XBMC");
    assert_eq!(header.version.get(), 0x0200);
    assert_eq!(header.payload_size.get() as usize, n - PacketHeader::SIZE);
    (header.packet_type.get(), buf[PacketHeader::SIZE..n].to_vec())
}

fn button_name(payload: &[u8]) -> (u16, String) {
    let flags = u16::from_be_bytes([payload[2], payload[3]]);
    // code, flags, amount, then "KB\0" and the button name
    assert_eq!(&payload[6..9], b"KB\0");
    let name = &payload[9..payload.len() - 1];
    (flags, String::from_utf8(name.to_vec()).unwrap())
}

#[test]
fn remote_presses_reach_kodi_as_named_buttons() {
    let (server, port) = kodi();
    let config = BridgeConfig::default();

    let client = EventClient::connect("127.0.0.1", port).unwrap();
    client.send_helo(&config.relay.name).unwrap();
    let relay = Arc::new(KodiRelay::new(client, config.relay.keymap.clone()));

    let mock = Arc::new(MockTransport::new());
    mock.script_connect(Psm::CONTROL, ScriptedChannel::new(Psm::CONTROL));
    mock.script_connect(
        Psm::INTERRUPT,
        ScriptedChannel::new(Psm::INTERRUPT)
            .data(&[0xA1, 0x40, 0x00, 0x00]) // KPENTER
            .data(&[0xA1, 0x00, 0x00, 0x00])
            .peer_closed(),
    );
    let transport: Arc<dyn Transport> = mock.clone();
    let mut device = HidDevice::new(transport, BdAddr::ANY, config.active_profile().unwrap());
    let down = Arc::clone(&relay);
    device.listen(Direction::Down, move |key| down.forward(key, Direction::Down));
    let up = Arc::clone(&relay);
    device.listen(Direction::Up, move |key| up.forward(key, Direction::Up));

    device
        .connect(ConnectionMode::Connect, config.idle_timeout())
        .unwrap();
    assert_eq!(device.event_loop(), DisconnectReason::PeerReset);

    let (kind, payload) = next_packet(&server);
    assert_eq!(kind, packet_type::HELO);
    assert!(payload.starts_with(b"Fire TV Remote\0"));

    let (kind, payload) = next_packet(&server);
    assert_eq!(kind, packet_type::BUTTON);
    assert_eq!(button_name(&payload), (0x4B, "enter".to_string()));

    let (kind, payload) = next_packet(&server);
    assert_eq!(kind, packet_type::BUTTON);
    assert_eq!(button_name(&payload), (0x4D, "enter".to_string()));

    relay.client().send_bye().unwrap();
    let (kind, payload) = next_packet(&server);
    assert_eq!(kind, packet_type::BYE);
    assert!(payload.is_empty());
}

#[test]
fn keymap_from_config_overrides_defaults() {
    let (server, port) = kodi();
    let config = BridgeConfig::from_toml(
        r#"
[relay]
name = "Living room remote"

[relay.keymap]
KEY_KPENTER = "select"
"#,
    )
    .unwrap();
    assert_eq!(config.relay.name, "Living room remote");
    assert_eq!(config.relay.keymap.len(), 1);

    let relay = KodiRelay::new(
        EventClient::connect("127.0.0.1", port).unwrap(),
        config.relay.keymap.clone(),
    );
    relay.press("KEY_KPENTER").unwrap();
    let (_, payload) = next_packet(&server);
    assert_eq!(button_name(&payload).1, "select");

    // Keys outside the configured keymap are not forwarded
    assert!(relay.press("KEY_UP").is_err());
}
