/// LE advertising report decoding and iBeacon field extraction
///
/// A Tilt advertises an Apple iBeacon: the manufacturer-specific AD structure
/// ends with a 16-byte proximity UUID, a big-endian major (temperature), a
/// big-endian minor (gravity) and a signed TX power byte. The controller then
/// appends one RSSI byte to the report. Counting back from the end of a
/// report therefore gives:
///
/// - `[end-22, end-6)`: UUID
/// - `[end-6, end-4)`: major
/// - `[end-4, end-2)`: minor
/// - `end-2`: TX power, `end-1`: RSSI
use log::debug;

use crate::codec::{to_hex_string, to_uint};
use crate::error::{DecodeError, DecodeResult};
use crate::models::BeaconRecord;

/// Bytes counted back from a report's end that cover UUID, major and minor
pub const BEACON_WINDOW_LEN: usize = 22;

// event type, address type, address, data length
const REPORT_HEADER_LEN: usize = 1 + 1 + 6 + 1;
const RSSI_LEN: usize = 1;

/// How reports inside one advertising-report subevent are located
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReportAddressing {
    /// Every report reads the window at the end of the whole payload, so a
    /// packet carrying several reports yields the last one repeated.
    #[default]
    Legacy,
    /// Walk the reports using each one's declared data length.
    Advancing,
}

/// Extract one `BeaconRecord` per report from an LE advertising-report
/// subevent payload (`payload[0]` is the report count).
///
/// Fails on the first report that cannot be read; nothing from that packet
/// is returned.
pub fn extract_beacons(payload: &[u8], mode: ReportAddressing) -> DecodeResult<Vec<BeaconRecord>> {
    let num_reports = match payload.first() {
        Some(n) => *n as usize,
        None => {
            return Err(DecodeError::TruncatedReport {
                needed: 1,
                available: 0,
            })
        }
    };

    let mut beacons = Vec::with_capacity(num_reports);
    match mode {
        ReportAddressing::Legacy => {
            for _ in 0..num_reports {
                beacons.push(beacon_at(payload, payload.len())?);
            }
        }
        ReportAddressing::Advancing => {
            let mut offset = 1;
            for index in 0..num_reports {
                let end = report_end(payload, offset)?;
                if end - offset < BEACON_WINDOW_LEN {
                    return Err(DecodeError::TruncatedReport {
                        needed: BEACON_WINDOW_LEN,
                        available: end - offset,
                    });
                }
                debug!("Report {} spans payload bytes {}..{}", index, offset, end);
                beacons.push(beacon_at(payload, end)?);
                offset = end;
            }
        }
    }

    Ok(beacons)
}

/// End offset (exclusive) of the report starting at `offset`.
fn report_end(payload: &[u8], offset: usize) -> DecodeResult<usize> {
    let data_len_at = offset + REPORT_HEADER_LEN - 1;
    let data_len = match payload.get(data_len_at) {
        Some(len) => *len as usize,
        None => {
            return Err(DecodeError::TruncatedReport {
                needed: REPORT_HEADER_LEN,
                available: payload.len().saturating_sub(offset),
            })
        }
    };

    let end = offset + REPORT_HEADER_LEN + data_len + RSSI_LEN;
    if end > payload.len() {
        return Err(DecodeError::TruncatedReport {
            needed: end - offset,
            available: payload.len() - offset,
        });
    }
    Ok(end)
}

/// Read UUID/major/minor from the window ending at `end`.
fn beacon_at(payload: &[u8], end: usize) -> DecodeResult<BeaconRecord> {
    if end < BEACON_WINDOW_LEN || end > payload.len() {
        return Err(DecodeError::TruncatedReport {
            needed: BEACON_WINDOW_LEN,
            available: end.min(payload.len()),
        });
    }

    let window = &payload[end - BEACON_WINDOW_LEN..end];
    // Both fields are two-byte spans, so the weighted sum fits in u16
    Ok(BeaconRecord {
        uuid: to_hex_string(&window[0..16]),
        major: to_uint(&window[16..18]) as u16,
        minor: to_uint(&window[18..20]) as u16,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const RED: [u8; 16] = [
        0xa4, 0x95, 0xbb, 0x10, 0xc5, 0xb1, 0x4b, 0x44, 0xb5, 0x12, 0x13, 0x70, 0xf0, 0x2d, 0x74, 0xde,
    ];
    const PINK: [u8; 16] = [
        0xa4, 0x95, 0xbb, 0x80, 0xc5, 0xb1, 0x4b, 0x44, 0xb5, 0x12, 0x13, 0x70, 0xf0, 0x2d, 0x74, 0xde,
    ];

    /// One report: ADV_NONCONN_IND from a random address with a full
    /// iBeacon AD payload.
    fn ibeacon_report(uuid: &[u8; 16], major: u16, minor: u16) -> Vec<u8> {
        let mut data = vec![0x02, 0x01, 0x04, 0x1a, 0xff, 0x4c, 0x00, 0x02, 0x15];
        data.extend_from_slice(uuid);
        data.extend_from_slice(&major.to_be_bytes());
        data.extend_from_slice(&minor.to_be_bytes());
        data.push(0xc5);

        let mut report = vec![0x03, 0x01, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66, data.len() as u8];
        report.extend_from_slice(&data);
        report.push(0xb8);
        report
    }

    fn payload(reports: &[Vec<u8>]) -> Vec<u8> {
        let mut payload = vec![reports.len() as u8];
        for report in reports {
            payload.extend_from_slice(report);
        }
        payload
    }

    #[test]
    fn test_single_report_both_modes() {
        let payload = payload(&[ibeacon_report(&RED, 68, 1050)]);
        for mode in [ReportAddressing::Legacy, ReportAddressing::Advancing] {
            let beacons = extract_beacons(&payload, mode).unwrap();
            assert_eq!(
                beacons,
                vec![BeaconRecord {
                    uuid: "a495bb10c5b14b44b5121370f02d74de".to_string(),
                    major: 68,
                    minor: 1050,
                }]
            );
        }
    }

    #[test]
    fn test_legacy_repeats_last_window() {
        let payload = payload(&[ibeacon_report(&RED, 68, 1050), ibeacon_report(&PINK, 70, 1012)]);
        let beacons = extract_beacons(&payload, ReportAddressing::Legacy).unwrap();
        assert_eq!(beacons.len(), 2);
        assert_eq!(beacons[0], beacons[1]);
        assert_eq!(beacons[0].uuid, to_hex_string(&PINK));
        assert_eq!(beacons[0].major, 70);
    }

    #[test]
    fn test_advancing_reads_each_report() {
        let payload = payload(&[ibeacon_report(&RED, 68, 1050), ibeacon_report(&PINK, 70, 1012)]);
        let beacons = extract_beacons(&payload, ReportAddressing::Advancing).unwrap();
        assert_eq!(beacons.len(), 2);
        assert_eq!(beacons[0].uuid, to_hex_string(&RED));
        assert_eq!((beacons[0].major, beacons[0].minor), (68, 1050));
        assert_eq!(beacons[1].uuid, to_hex_string(&PINK));
        assert_eq!((beacons[1].major, beacons[1].minor), (70, 1012));
    }

    #[test]
    fn test_short_payload_is_truncated_report() {
        let payload = [0x01; 21];
        for mode in [ReportAddressing::Legacy, ReportAddressing::Advancing] {
            assert!(matches!(
                extract_beacons(&payload, mode),
                Err(DecodeError::TruncatedReport { .. })
            ));
        }
        assert!(matches!(
            extract_beacons(&[], ReportAddressing::Legacy),
            Err(DecodeError::TruncatedReport { .. })
        ));
    }

    #[test]
    fn test_advancing_rejects_overlong_data_length() {
        let mut report = ibeacon_report(&RED, 68, 1050);
        report[8] = 0xf0;
        let payload = payload(&[report]);
        assert!(matches!(
            extract_beacons(&payload, ReportAddressing::Advancing),
            Err(DecodeError::TruncatedReport { .. })
        ));
    }

    #[test]
    fn test_second_report_failure_drops_whole_packet() {
        let mut payload = payload(&[ibeacon_report(&RED, 68, 1050)]);
        payload[0] = 2;
        assert!(extract_beacons(&payload, ReportAddressing::Advancing).is_err());
    }

    #[test]
    fn test_zero_reports() {
        let mut payload = vec![0u8; 30];
        payload[0] = 0;
        for mode in [ReportAddressing::Legacy, ReportAddressing::Advancing] {
            assert!(extract_beacons(&payload, mode).unwrap().is_empty());
        }
    }
}
