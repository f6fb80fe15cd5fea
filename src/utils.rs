/// Utility functions for reading construction and formatting
use log::debug;
use time::{format_description, OffsetDateTime, UtcOffset};

use crate::models::{BeaconRecord, TiltReading};
use crate::tilt::TiltTable;

/// Format a timestamp as ISO-8601 without an offset suffix
///
/// Produces `YYYY-MM-DDTHH:MM:SS.ffffff` in whatever offset `dt` carries.
/// Falls back to default string representation if formatting fails.
pub fn format_datetime(dt: &OffsetDateTime) -> String {
    let format = format_description::parse(
        "[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:6]",
    )
    .expect("Failed to create format description");
    dt.format(&format).unwrap_or_else(|_| dt.to_string())
}

/// Current time shifted to the given local offset
pub fn now_local(offset: UtcOffset) -> OffsetDateTime {
    OffsetDateTime::now_utc().to_offset(offset)
}

/// Current local offset, or `fallback` when `time` can't determine it
/// (on Linux, whenever the process has more than one thread)
pub fn local_offset_or(fallback: UtcOffset) -> UtcOffset {
    UtcOffset::current_local_offset().unwrap_or(fallback)
}

/// Convert Fahrenheit to Celsius, rounded to two decimal places
pub fn to_celsius(fahrenheit: f64) -> f64 {
    ((fahrenheit - 32.0) / 1.8 * 100.0).round() / 100.0
}

/// Turn one deduplicated batch of beacons into Tilt readings
///
/// Beacons whose UUID is not in the table are skipped.
///
/// # Arguments
/// * `beacons` - Deduplicated beacon records from one polling cycle
/// * `table` - Tilt UUID to colour lookup
/// * `timestamp` - Formatted time stamped onto every reading of the batch
/// * `celsius` - Also fill in `temp_celsius`
///
/// # Returns
/// Readings in the same order as the recognized beacons
pub fn build_readings(
    beacons: &[BeaconRecord],
    table: &TiltTable,
    timestamp: &str,
    celsius: bool,
) -> Vec<TiltReading> {
    beacons
        .iter()
        .filter_map(|beacon| {
            let color = match table.resolve_color(&beacon.uuid) {
                Some(color) => color,
                None => {
                    debug!("Ignoring non-Tilt beacon {}", beacon.uuid);
                    return None;
                }
            };

            Some(TiltReading {
                color: color.to_string(),
                timestamp: timestamp.to_string(),
                temp: beacon.major,
                gravity: beacon.minor,
                temp_celsius: celsius.then(|| to_celsius(f64::from(beacon.major))),
            })
        })
        .collect()
}
