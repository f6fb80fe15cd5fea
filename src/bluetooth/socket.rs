/// Raw HCI socket access on Linux
///
/// Opens `AF_BLUETOOTH`/`BTPROTO_HCI` on the raw channel, which sees every
/// event the controller sends to the host, including advertising reports
/// triggered by someone else's scan.
use log::{debug, warn};
use std::io;
use std::mem;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd};

use crate::bluetooth::hci::{HCI_COMMAND_PKT, HCI_EVENT_PKT};

const BTPROTO_HCI: libc::c_int = 1;
const SOL_HCI: libc::c_int = 0;
const HCI_FILTER: libc::c_int = 2;
const HCI_CHANNEL_RAW: u16 = 0;

const OGF_LE_CTL: u16 = 0x08;
const OCF_LE_SET_SCAN_PARAMETERS: u16 = 0x000b;
const OCF_LE_SET_SCAN_ENABLE: u16 = 0x000c;

const LE_SCAN_ACTIVE: u8 = 0x01;
const LE_RANDOM_ADDRESS: u8 = 0x01;
const LE_SCAN_INTERVAL: u16 = 0x0010;
const LE_SCAN_WINDOW: u16 = 0x0010;

#[repr(C)]
struct SockaddrHci {
    hci_family: libc::sa_family_t,
    hci_dev: u16,
    hci_channel: u16,
}

/// Kernel-side packet filter for an HCI socket
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HciFilter {
    pub type_mask: u32,
    pub event_mask: [u32; 2],
    pub opcode: u16,
}

impl HciFilter {
    /// Pass every HCI event, nothing else.
    pub fn events_only() -> Self {
        HciFilter {
            type_mask: 1 << (HCI_EVENT_PKT & 31),
            event_mask: [u32::MAX; 2],
            opcode: 0,
        }
    }
}

#[derive(Debug)]
pub struct HciSocket {
    fd: OwnedFd,
    dev_id: u16,
}

impl HciSocket {
    /// Open a raw HCI socket bound to `hci<dev_id>`.
    pub fn open(dev_id: u16) -> io::Result<Self> {
        let fd = unsafe {
            libc::socket(
                libc::AF_BLUETOOTH,
                libc::SOCK_RAW | libc::SOCK_CLOEXEC,
                BTPROTO_HCI,
            )
        };
        if fd < 0 {
            return Err(io::Error::last_os_error());
        }
        // Closed on drop from here on
        let fd = unsafe { OwnedFd::from_raw_fd(fd) };

        let addr = SockaddrHci {
            hci_family: libc::AF_BLUETOOTH as libc::sa_family_t,
            hci_dev: dev_id,
            hci_channel: HCI_CHANNEL_RAW,
        };
        let ret = unsafe {
            libc::bind(
                fd.as_raw_fd(),
                &addr as *const _ as *const libc::sockaddr,
                mem::size_of::<SockaddrHci>() as libc::socklen_t,
            )
        };
        if ret < 0 {
            return Err(io::Error::last_os_error());
        }

        debug!("Opened raw HCI socket on hci{}", dev_id);
        Ok(HciSocket { fd, dev_id })
    }

    pub fn dev_id(&self) -> u16 {
        self.dev_id
    }

    /// Blocking receive of one packet, retried on EINTR.
    pub fn recv(&self, buf: &mut [u8]) -> io::Result<usize> {
        loop {
            let n = unsafe {
                libc::recv(
                    self.fd.as_raw_fd(),
                    buf.as_mut_ptr() as *mut libc::c_void,
                    buf.len(),
                    0,
                )
            };
            if n >= 0 {
                return Ok(n as usize);
            }
            let e = io::Error::last_os_error();
            if e.kind() != io::ErrorKind::Interrupted {
                return Err(e);
            }
        }
    }

    pub fn filter(&self) -> io::Result<HciFilter> {
        let mut filter = HciFilter::default();
        let mut len = mem::size_of::<HciFilter>() as libc::socklen_t;
        let ret = unsafe {
            libc::getsockopt(
                self.fd.as_raw_fd(),
                SOL_HCI,
                HCI_FILTER,
                &mut filter as *mut _ as *mut libc::c_void,
                &mut len,
            )
        };
        if ret < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(filter)
    }

    pub fn set_filter(&self, filter: &HciFilter) -> io::Result<()> {
        let ret = unsafe {
            libc::setsockopt(
                self.fd.as_raw_fd(),
                SOL_HCI,
                HCI_FILTER,
                filter as *const _ as *const libc::c_void,
                mem::size_of::<HciFilter>() as libc::socklen_t,
            )
        };
        if ret < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    /// Install `filter` until the returned guard is dropped, then put the
    /// previous filter back.
    pub fn install_filter(&self, filter: HciFilter) -> io::Result<FilterGuard<'_>> {
        let previous = self.filter()?;
        self.set_filter(&filter)?;
        Ok(FilterGuard {
            socket: self,
            previous,
        })
    }

    /// Send an HCI command packet.
    pub fn send_command(&self, ogf: u16, ocf: u16, params: &[u8]) -> io::Result<()> {
        let packet = command_packet(ogf, ocf, params)?;
        let n = unsafe {
            libc::write(
                self.fd.as_raw_fd(),
                packet.as_ptr() as *const libc::c_void,
                packet.len(),
            )
        };
        if n < 0 {
            return Err(io::Error::last_os_error());
        }
        if n as usize != packet.len() {
            return Err(io::Error::new(
                io::ErrorKind::WriteZero,
                format!("short HCI command write: {} of {} bytes", n, packet.len()),
            ));
        }
        Ok(())
    }

    /// Active scan from a random address with the default interval/window.
    pub fn le_set_scan_parameters(&self) -> io::Result<()> {
        let mut params = Vec::with_capacity(7);
        params.push(LE_SCAN_ACTIVE);
        params.extend_from_slice(&LE_SCAN_INTERVAL.to_le_bytes());
        params.extend_from_slice(&LE_SCAN_WINDOW.to_le_bytes());
        params.push(LE_RANDOM_ADDRESS);
        params.push(0x00); // accept all advertisers
        self.send_command(OGF_LE_CTL, OCF_LE_SET_SCAN_PARAMETERS, &params)
    }

    pub fn le_set_scan_enable(&self, enable: bool) -> io::Result<()> {
        // Duplicate filtering off: a Tilt repeats the same payload
        self.send_command(OGF_LE_CTL, OCF_LE_SET_SCAN_ENABLE, &[enable as u8, 0x00])
    }
}

/// Restores the socket's previous filter when dropped
pub struct FilterGuard<'a> {
    socket: &'a HciSocket,
    previous: HciFilter,
}

impl FilterGuard<'_> {
    pub fn socket(&self) -> &HciSocket {
        self.socket
    }
}

impl Drop for FilterGuard<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.socket.set_filter(&self.previous) {
            warn!("Failed to restore HCI filter on hci{}: {}", self.socket.dev_id, e);
        }
    }
}

/// `[0x01][opcode lo][opcode hi][len][params]`, opcode = ogf << 10 | ocf
pub fn command_packet(ogf: u16, ocf: u16, params: &[u8]) -> io::Result<Vec<u8>> {
    let len = u8::try_from(params.len()).map_err(|_| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("HCI command parameters too long: {} bytes", params.len()),
        )
    })?;
    let opcode = (ogf << 10) | (ocf & 0x03ff);

    let mut packet = Vec::with_capacity(4 + params.len());
    packet.push(HCI_COMMAND_PKT);
    packet.extend_from_slice(&opcode.to_le_bytes());
    packet.push(len);
    packet.extend_from_slice(params);
    Ok(packet)
}
