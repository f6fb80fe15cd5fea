use std::io;

use tilt_monitor::bluetooth::{collect_beacons, decode_event, DecodedEvent, PacketSource, ReportAddressing};
use tilt_monitor::error::DecodeError;
use tilt_monitor::tilt::{distinct, TiltTable};
use tilt_monitor::utils::build_readings;

const PURPLE: &str = "a495bb40c5b14b44b5121370f02d74de";
const ORANGE: &str = "a495bb50c5b14b44b5121370f02d74de";

fn uuid_bytes(hex: &str) -> Vec<u8> {
    (0..hex.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&hex[i..i + 2], 16).unwrap())
        .collect()
}

/// LE meta advertising report carrying one iBeacon report
fn advertising_packet(uuid: &str, major: u16, minor: u16) -> Vec<u8> {
    let mut data = vec![0x02, 0x01, 0x06, 0x1a, 0xff, 0x4c, 0x00, 0x02, 0x15];
    data.extend_from_slice(&uuid_bytes(uuid));
    data.extend_from_slice(&major.to_be_bytes());
    data.extend_from_slice(&minor.to_be_bytes());
    data.push(0xc5);

    let mut payload = vec![0x01, 0x00, 0x01, 0xde, 0xad, 0xbe, 0xef, 0x12, 0xc4, data.len() as u8];
    payload.extend_from_slice(&data);
    payload.push(0xaf);

    let mut packet = vec![0x04, 0x3e, (payload.len() + 1) as u8, 0x02];
    packet.extend_from_slice(&payload);
    packet
}

struct Replay(Vec<Vec<u8>>);

impl PacketSource for Replay {
    fn receive(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.0.is_empty() {
            return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "no more packets"));
        }
        let packet = self.0.remove(0);
        buf[..packet.len()].copy_from_slice(&packet);
        Ok(packet.len())
    }
}

#[test]
fn known_tilt_resolves_to_color() {
    let packet = advertising_packet(PURPLE, 0x0042, 0x03f2);
    let beacons = decode_event(&packet, ReportAddressing::Legacy).unwrap().into_beacons();

    assert_eq!(beacons.len(), 1);
    assert_eq!(beacons[0].uuid, PURPLE);
    assert_eq!(beacons[0].major, 0x0042);
    assert_eq!(beacons[0].minor, 0x03f2);
    assert_eq!(TiltTable::new().resolve_color(&beacons[0].uuid), Some("Purple"));
}

#[test]
fn unknown_subevent_produces_nothing() {
    let packet = [0x04, 0x3e, 0x03, 0xff, 0x01, 0x02];
    let event = decode_event(&packet, ReportAddressing::Legacy).unwrap();
    assert_eq!(event, DecodedEvent::UnknownSubevent(0xff));
    assert!(event.into_beacons().is_empty());
}

#[test]
fn short_advertising_payload_is_truncated() {
    let mut packet = vec![0x04, 0x3e, 0x15, 0x02, 0x01];
    packet.extend_from_slice(&[0u8; 19]);
    assert!(matches!(
        decode_event(&packet, ReportAddressing::Legacy),
        Err(DecodeError::TruncatedReport { .. })
    ));
}

#[test]
fn one_cycle_dedups_and_reports() {
    let mut source = Replay(vec![
        advertising_packet(PURPLE, 66, 1052),
        vec![0x04, 0x0f, 0x04, 0x00, 0x01, 0x0b, 0x20],
        advertising_packet(PURPLE, 67, 1051),
        advertising_packet("00112233445566778899aabbccddeeff", 1, 1),
        advertising_packet(ORANGE, 75, 1003),
    ]);

    let beacons = collect_beacons(&mut source, 5, ReportAddressing::Legacy).unwrap();
    assert_eq!(beacons.len(), 4);

    let beacons = distinct(beacons);
    assert_eq!(beacons.len(), 3);
    assert_eq!(beacons.iter().filter(|b| b.uuid == PURPLE).count(), 1);
    assert_eq!(beacons[0].major, 66);

    let readings = build_readings(&beacons, &TiltTable::new(), "2026-10-19T09:00:00.000000", false);
    let summary: Vec<(&str, u16, u16)> = readings
        .iter()
        .map(|r| (r.color.as_str(), r.temp, r.gravity))
        .collect();
    assert_eq!(summary, vec![("Purple", 66, 1052), ("Orange", 75, 1003)]);
    assert_eq!(
        readings[1].to_string(),
        "{color: Orange, timestamp: 2026-10-19T09:00:00.000000, temp: 75, gravity: 1003}"
    );
}
