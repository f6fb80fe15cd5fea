/// Bluetooth Low Energy scanning and Tilt beacon collection
use futures_util::StreamExt;
use log::{debug, error, info, warn};
use std::io;
use tokio::task::JoinHandle;

use crate::bluetooth::advertising::ReportAddressing;
use crate::bluetooth::hci::{decode_event, DecodedEvent, MAX_PACKET_SIZE};
use crate::bluetooth::socket::{FilterGuard, HciFilter, HciSocket};
use crate::models::BeaconRecord;

/// Anything that hands out one HCI packet per call
pub trait PacketSource {
    fn receive(&mut self, buf: &mut [u8]) -> io::Result<usize>;
}

impl PacketSource for FilterGuard<'_> {
    fn receive(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.socket().recv(buf)
    }
}

/// Receive `loop_count` packets and decode the beacons they carry
///
/// Packets that fail to decode are logged and skipped. A receive error ends
/// the batch and is returned.
///
/// # Arguments
/// * `source` - Where packets come from
/// * `loop_count` - Number of packets to read for this batch
/// * `mode` - How multi-report advertising events are walked
///
/// # Returns
/// Every beacon seen, in arrival order, duplicates included
pub fn collect_beacons<S: PacketSource>(
    source: &mut S,
    loop_count: usize,
    mode: ReportAddressing,
) -> io::Result<Vec<BeaconRecord>> {
    let mut beacons = Vec::new();
    let mut buf = [0u8; MAX_PACKET_SIZE];

    for _ in 0..loop_count {
        let n = source.receive(&mut buf)?;
        let packet = &buf[..n];

        match decode_event(packet, mode) {
            Ok(DecodedEvent::Advertising(found)) => beacons.extend(found),
            Ok(DecodedEvent::UnhandledEvent(code)) => {
                debug!("Skipping HCI event 0x{:02x}", code);
            }
            Ok(DecodedEvent::UnknownSubevent(code)) => {
                debug!("Skipping unknown LE subevent 0x{:02x}", code);
            }
            Ok(other) => debug!("Ignoring LE event: {:?}", other),
            Err(e) => warn!("Dropping malformed packet ({} bytes): {}", n, e),
        }
    }

    Ok(beacons)
}

/// Read one batch from the socket with only HCI events let through
///
/// The socket's previous filter is restored when the batch ends, whether it
/// succeeded or not.
pub fn parse_events(
    socket: &HciSocket,
    loop_count: usize,
    mode: ReportAddressing,
) -> io::Result<Vec<BeaconRecord>> {
    let mut guard = socket.install_filter(HciFilter::events_only())?;
    collect_beacons(&mut guard, loop_count, mode)
}

/// Ask the controller to scan directly over the raw socket
pub fn start_hci_scan(socket: &HciSocket) -> io::Result<()> {
    socket.le_set_scan_parameters()?;
    socket.le_set_scan_enable(true)?;
    info!("LE scan enabled on hci{}", socket.dev_id());
    Ok(())
}

pub fn stop_hci_scan(socket: &HciSocket) -> io::Result<()> {
    socket.le_set_scan_enable(false)?;
    info!("LE scan disabled on hci{}", socket.dev_id());
    Ok(())
}

/// LE discovery driven through bluetoothd
///
/// While this is alive the controller keeps scanning and its advertising
/// reports show up on any raw HCI socket bound to the same adapter.
pub struct BluezDiscovery {
    _session: bluer::Session,
    handle: JoinHandle<()>,
}

impl BluezDiscovery {
    pub async fn start(dev_id: u16) -> Result<Self, Box<dyn std::error::Error>> {
        // Initialize Bluetooth session
        let session = match bluer::Session::new().await {
            Ok(session) => session,
            Err(e) => {
                error!("Failed to create Bluetooth session: {}", e);
                return Err(e.into());
            }
        };

        let adapter_name = format!("hci{}", dev_id);
        let adapter = match session.adapter(&adapter_name) {
            Ok(adapter) => adapter,
            Err(e) => {
                error!("Failed to get Bluetooth adapter {}: {}", adapter_name, e);
                return Err(e.into());
            }
        };

        // Ensure Bluetooth adapter is powered on
        if let Err(e) = adapter.set_powered(true).await {
            error!("Failed to power on adapter: {}", e);
            return Err(e.into());
        }

        // Repeated advertisements are the whole point, keep duplicates
        let filter = bluer::DiscoveryFilter {
            transport: bluer::DiscoveryTransport::Le,
            duplicate_data: true,
            ..Default::default()
        };

        // Apply the discovery filter (warn if it fails, but continue)
        if let Err(e) = adapter.set_discovery_filter(filter).await {
            warn!("Failed to set discovery filter: {}", e);
        }

        let handle = match adapter.discover_devices().await {
            Ok(discovery_stream) => tokio::spawn(async move {
                let mut stream = discovery_stream;
                while let Some(event) = stream.next().await {
                    debug!("Discovery event: {:?}", event);
                }
            }),
            Err(e) => {
                error!("Failed to start device discovery: {}", e);
                return Err(e.into());
            }
        };

        info!("BlueZ discovery running on {}", adapter_name);
        Ok(BluezDiscovery {
            _session: session,
            handle,
        })
    }
}

impl Drop for BluezDiscovery {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
