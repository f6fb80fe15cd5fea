use std::fmt;

/// iBeacon identity and payload fields pulled out of one advertising report
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BeaconRecord {
    pub uuid: String,
    pub major: u16,
    pub minor: u16,
}

/// One reported Tilt measurement
#[derive(Debug, Clone, PartialEq)]
pub struct TiltReading {
    pub color: String,
    pub timestamp: String,
    /// Beacon major, in the hydrometer's native Fahrenheit units
    pub temp: u16,
    /// Beacon minor, specific gravity x 1000
    pub gravity: u16,
    pub temp_celsius: Option<f64>,
}

impl fmt::Display for TiltReading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{color: {}, timestamp: {}, temp: {}, gravity: {}",
            self.color, self.timestamp, self.temp, self.gravity
        )?;
        if let Some(celsius) = self.temp_celsius {
            write!(f, ", temp_c: {:.2}", celsius)?;
        }
        write!(f, "}}")
    }
}
