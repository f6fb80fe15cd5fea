use log::{info, warn};
use std::env;
use std::str::FromStr;
use std::time::Duration;
use time::UtcOffset;

use crate::bluetooth::advertising::ReportAddressing;

const DEFAULT_BATCH_SIZE: usize = 10;
const DEFAULT_POLL_INTERVAL_SECS: u64 = 10;

/// Who keeps the controller scanning
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanDriver {
    /// LE scan commands written straight to the raw HCI socket
    Hci,
    /// bluetoothd discovery via bluer
    Bluez,
}

impl FromStr for ScanDriver {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hci" => Ok(ScanDriver::Hci),
            "bluez" => Ok(ScanDriver::Bluez),
            other => Err(format!("unknown scan driver '{}' (expected hci or bluez)", other)),
        }
    }
}

impl FromStr for ReportAddressing {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "legacy" => Ok(ReportAddressing::Legacy),
            "advancing" => Ok(ReportAddressing::Advancing),
            other => Err(format!(
                "unknown report addressing '{}' (expected legacy or advancing)",
                other
            )),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub hci_device: u16,
    pub batch_size: usize,
    pub poll_interval: Duration,
    pub addressing: ReportAddressing,
    pub celsius: bool,
    pub scan_driver: ScanDriver,
    /// Offset seen at startup. Each cycle re-reads it through
    /// `utils::local_offset_or`, but on Linux `time` refuses the lookup once
    /// the blocking pool has threads, so after a daylight-saving change this
    /// startup value can stay in use until restart.
    pub local_offset: UtcOffset,
}

impl MonitorConfig {
    /// Load from the environment (and `.env`), capturing the local UTC offset.
    ///
    /// Call before any threads are started: the offset lookup refuses to run
    /// in a multi-threaded process.
    pub fn new() -> Result<Self, Box<dyn std::error::Error>> {
        // Load environment variables
        dotenv::dotenv().ok();

        let mut config = Self::from_lookup(|key| env::var(key).ok())?;
        config.local_offset = match UtcOffset::current_local_offset() {
            Ok(offset) => offset,
            Err(e) => {
                warn!("Could not determine local UTC offset ({}), timestamps use UTC", e);
                UtcOffset::UTC
            }
        };

        info!(
            "Config: hci{}, {} packets per batch every {}s, {:?} report addressing, scan driver {:?}{}",
            config.hci_device,
            config.batch_size,
            config.poll_interval.as_secs(),
            config.addressing,
            config.scan_driver,
            if config.celsius { ", Celsius output" } else { "" }
        );

        Ok(config)
    }

    /// Build from any key lookup; unset keys take their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, Box<dyn std::error::Error>>
    where
        F: Fn(&str) -> Option<String>,
    {
        let hci_device = parse_var(&lookup, "TILT_HCI_DEVICE", 0u16)?;
        let batch_size = parse_var(&lookup, "TILT_BATCH_SIZE", DEFAULT_BATCH_SIZE)?;
        let poll_secs = parse_var(&lookup, "TILT_POLL_INTERVAL_SECS", DEFAULT_POLL_INTERVAL_SECS)?;
        let addressing = parse_var(&lookup, "TILT_REPORT_ADDRESSING", ReportAddressing::Legacy)?;
        let celsius = parse_var(&lookup, "TILT_CELSIUS", false)?;
        let scan_driver = parse_var(&lookup, "TILT_SCAN_DRIVER", ScanDriver::Hci)?;

        if batch_size == 0 {
            return Err("TILT_BATCH_SIZE must be at least 1".into());
        }

        Ok(MonitorConfig {
            hci_device,
            batch_size,
            poll_interval: Duration::from_secs(poll_secs),
            addressing,
            celsius,
            scan_driver,
            local_offset: UtcOffset::UTC,
        })
    }
}

fn parse_var<F, T>(lookup: &F, key: &str, default: T) -> Result<T, Box<dyn std::error::Error>>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|e| format!("Invalid {} '{}': {}", key, raw, e).into()),
        _ => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = MonitorConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config.hci_device, 0);
        assert_eq!(config.batch_size, 10);
        assert_eq!(config.poll_interval, Duration::from_secs(10));
        assert_eq!(config.addressing, ReportAddressing::Legacy);
        assert!(!config.celsius);
        assert_eq!(config.scan_driver, ScanDriver::Hci);
        assert_eq!(config.local_offset, UtcOffset::UTC);
    }

    #[test]
    fn test_overrides() {
        let config = MonitorConfig::from_lookup(lookup_from(&[
            ("TILT_HCI_DEVICE", "1"),
            ("TILT_BATCH_SIZE", "25"),
            ("TILT_POLL_INTERVAL_SECS", "30"),
            ("TILT_REPORT_ADDRESSING", "Advancing"),
            ("TILT_CELSIUS", "true"),
            ("TILT_SCAN_DRIVER", " bluez "),
        ]))
        .unwrap();
        assert_eq!(config.hci_device, 1);
        assert_eq!(config.batch_size, 25);
        assert_eq!(config.poll_interval, Duration::from_secs(30));
        assert_eq!(config.addressing, ReportAddressing::Advancing);
        assert!(config.celsius);
        assert_eq!(config.scan_driver, ScanDriver::Bluez);
    }

    #[test]
    fn test_blank_value_uses_default() {
        let config = MonitorConfig::from_lookup(lookup_from(&[("TILT_BATCH_SIZE", "  ")])).unwrap();
        assert_eq!(config.batch_size, 10);
    }

    #[test]
    fn test_invalid_values_rejected() {
        for (key, value) in [
            ("TILT_HCI_DEVICE", "hci0"),
            ("TILT_BATCH_SIZE", "0"),
            ("TILT_REPORT_ADDRESSING", "fixed"),
            ("TILT_CELSIUS", "yes"),
            ("TILT_SCAN_DRIVER", "dbus"),
        ] {
            assert!(
                MonitorConfig::from_lookup(lookup_from(&[(key, value)])).is_err(),
                "{}={} should be rejected",
                key,
                value
            );
        }
    }
}
