/// Tilt colour lookup and per-batch beacon deduplication
use std::collections::{HashMap, HashSet};

use crate::models::BeaconRecord;

const TILT_UUIDS: [(&str, &str); 8] = [
    ("a495bb10c5b14b44b5121370f02d74de", "Red"),
    ("a495bb20c5b14b44b5121370f02d74de", "Green"),
    ("a495bb30c5b14b44b5121370f02d74de", "Black"),
    ("a495bb40c5b14b44b5121370f02d74de", "Purple"),
    ("a495bb50c5b14b44b5121370f02d74de", "Orange"),
    ("a495bb60c5b14b44b5121370f02d74de", "Blue"),
    ("a495bb70c5b14b44b5121370f02d74de", "Yellow"),
    ("a495bb80c5b14b44b5121370f02d74de", "Pink"),
];

/// Known Tilt beacon UUIDs and their colours.
///
/// Built once at startup and handed to whatever needs to resolve colours.
#[derive(Debug, Clone)]
pub struct TiltTable {
    colors: HashMap<String, String>,
}

impl TiltTable {
    pub fn new() -> Self {
        let colors = TILT_UUIDS
            .iter()
            .map(|(uuid, color)| (uuid.to_string(), color.to_string()))
            .collect();
        TiltTable { colors }
    }

    /// Colour for a lowercase hex UUID, `None` if it isn't a Tilt
    pub fn resolve_color(&self, uuid: &str) -> Option<&str> {
        self.colors.get(uuid).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }
}

impl Default for TiltTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Drop repeated UUIDs, keeping the first record seen for each.
pub fn distinct(records: Vec<BeaconRecord>) -> Vec<BeaconRecord> {
    let mut seen = HashSet::new();
    records
        .into_iter()
        .filter(|record| seen.insert(record.uuid.clone()))
        .collect()
}
