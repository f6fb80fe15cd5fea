//! Tilt hydrometer monitor: decodes LE advertising reports from a raw HCI
//! socket and turns Tilt iBeacons into temperature/gravity readings.
pub mod bluetooth;
pub mod codec;
pub mod config;
pub mod error;
pub mod models;
pub mod tilt;
pub mod utils;
