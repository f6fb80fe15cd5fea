/// HCI event framing and LE meta event dispatch
use log::debug;

use crate::bluetooth::advertising::{extract_beacons, ReportAddressing};
use crate::codec::{decode_address, decode_le16};
use crate::error::{DecodeError, DecodeResult};
use crate::models::BeaconRecord;

// HCI packet types
pub const HCI_COMMAND_PKT: u8 = 0x01;
pub const HCI_EVENT_PKT: u8 = 0x04;

pub const LE_META_EVENT: u8 = 0x3e;

// LE meta subevents
pub const EVT_LE_CONN_COMPLETE: u8 = 0x01;
pub const EVT_LE_ADVERTISING_REPORT: u8 = 0x02;
pub const EVT_LE_CONN_UPDATE_COMPLETE: u8 = 0x03;
pub const EVT_LE_READ_REMOTE_USED_FEATURES_COMPLETE: u8 = 0x04;

/// Largest packet a single receive hands us
pub const MAX_PACKET_SIZE: usize = 255;

const HEADER_LEN: usize = 3;
const CONN_COMPLETE_LEN: usize = 18;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HciEventHeader {
    pub packet_type: u8,
    pub event_code: u8,
    pub param_len: u8,
}

impl HciEventHeader {
    /// Read the three header bytes and check the declared parameter length
    /// against what the packet actually holds.
    pub fn parse(packet: &[u8]) -> DecodeResult<Self> {
        let [packet_type, event_code, param_len] = match packet {
            [a, b, c, ..] => [*a, *b, *c],
            _ => {
                return Err(DecodeError::MalformedHeader {
                    declared: HEADER_LEN,
                    available: packet.len(),
                })
            }
        };

        let available = packet.len() - HEADER_LEN;
        if param_len as usize != available {
            return Err(DecodeError::MalformedHeader {
                declared: param_len as usize,
                available,
            });
        }

        Ok(HciEventHeader {
            packet_type,
            event_code,
            param_len,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeMetaSubevent {
    ConnectionComplete,
    AdvertisingReport,
    ConnectionUpdateComplete,
    ReadRemoteUsedFeaturesComplete,
    Unknown(u8),
}

impl From<u8> for LeMetaSubevent {
    fn from(code: u8) -> Self {
        match code {
            EVT_LE_CONN_COMPLETE => LeMetaSubevent::ConnectionComplete,
            EVT_LE_ADVERTISING_REPORT => LeMetaSubevent::AdvertisingReport,
            EVT_LE_CONN_UPDATE_COMPLETE => LeMetaSubevent::ConnectionUpdateComplete,
            EVT_LE_READ_REMOTE_USED_FEATURES_COMPLETE => LeMetaSubevent::ReadRemoteUsedFeaturesComplete,
            other => LeMetaSubevent::Unknown(other),
        }
    }
}

/// LE Connection Complete parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionComplete {
    pub status: u8,
    pub handle: u16,
    pub role: u8,
    pub peer_address_type: u8,
    pub peer_address: String,
    pub interval: u16,
    pub latency: u16,
    pub supervision_timeout: u16,
    pub master_clock_accuracy: u8,
}

impl ConnectionComplete {
    /// Layout: status, handle, role, peer address type, peer address,
    /// interval, latency, supervision timeout, clock accuracy.
    pub fn parse(payload: &[u8]) -> DecodeResult<Self> {
        if payload.len() < CONN_COMPLETE_LEN {
            return Err(DecodeError::TruncatedInput {
                needed: CONN_COMPLETE_LEN,
                available: payload.len(),
            });
        }

        Ok(ConnectionComplete {
            status: payload[0],
            handle: decode_le16(&payload[1..3])?,
            role: payload[3],
            peer_address_type: payload[4],
            peer_address: decode_address(&payload[5..11])?,
            interval: decode_le16(&payload[11..13])?,
            latency: decode_le16(&payload[13..15])?,
            supervision_timeout: decode_le16(&payload[15..17])?,
            master_clock_accuracy: payload[17],
        })
    }
}

/// What one HCI event packet turned out to be
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodedEvent {
    Advertising(Vec<BeaconRecord>),
    ConnectionComplete(ConnectionComplete),
    ConnectionUpdateComplete,
    ReadRemoteUsedFeaturesComplete,
    UnknownSubevent(u8),
    UnhandledEvent(u8),
}

impl DecodedEvent {
    /// Beacons carried by the event, if any
    pub fn into_beacons(self) -> Vec<BeaconRecord> {
        match self {
            DecodedEvent::Advertising(beacons) => beacons,
            _ => Vec::new(),
        }
    }
}

/// Decode one HCI event packet.
///
/// Only framing problems are errors; events and subevents this monitor has
/// no use for come back as `UnhandledEvent` / `UnknownSubevent`.
pub fn decode_event(packet: &[u8], mode: ReportAddressing) -> DecodeResult<DecodedEvent> {
    let header = HciEventHeader::parse(packet)?;

    if header.event_code != LE_META_EVENT {
        return Ok(DecodedEvent::UnhandledEvent(header.event_code));
    }

    let params = &packet[HEADER_LEN..];
    let (subevent, payload) = match params.split_first() {
        Some((code, rest)) => (LeMetaSubevent::from(*code), rest),
        None => {
            return Err(DecodeError::TruncatedInput {
                needed: 1,
                available: 0,
            })
        }
    };

    let event = match subevent {
        LeMetaSubevent::ConnectionComplete => {
            let complete = ConnectionComplete::parse(payload)?;
            debug!(
                "LE connection complete: status=0x{:02x} handle=0x{:04x} role=0x{:02x} address={}",
                complete.status, complete.handle, complete.role, complete.peer_address
            );
            DecodedEvent::ConnectionComplete(complete)
        }
        LeMetaSubevent::AdvertisingReport => DecodedEvent::Advertising(extract_beacons(payload, mode)?),
        LeMetaSubevent::ConnectionUpdateComplete => DecodedEvent::ConnectionUpdateComplete,
        LeMetaSubevent::ReadRemoteUsedFeaturesComplete => DecodedEvent::ReadRemoteUsedFeaturesComplete,
        LeMetaSubevent::Unknown(code) => DecodedEvent::UnknownSubevent(code),
    };

    Ok(event)
}
