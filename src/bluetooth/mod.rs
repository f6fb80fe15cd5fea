pub mod advertising;
pub mod hci;
pub mod scanner;
pub mod socket;

pub use advertising::{extract_beacons, ReportAddressing};
pub use hci::{decode_event, DecodedEvent, LeMetaSubevent};
pub use scanner::{collect_beacons, parse_events, PacketSource};
pub use socket::HciSocket;
