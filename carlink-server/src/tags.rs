//! In-memory tag map.

use crate::handler::{TagLookup, TreasureNotifier};
use carlink_core::{TagRecord, TagSerial, tag_kind};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::collections::HashMap;

/// Map of RFID tags to field records, with found-state for parking points.
///
/// Every record whose kind is a parking point registers its coordinate once;
/// several tags may share a coordinate.
#[derive(Default)]
pub struct TagMap {
    records: RwLock<HashMap<TagSerial, TagRecord>>,
    treasures: RwLock<BTreeMap<(u8, u8), bool>>,
}

impl TagMap {
    /// Creates an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces the record for its serial.
    pub fn insert(&self, record: TagRecord) {
        if tag_kind::is_parking(record.kind) {
            self.treasures
                .write()
                .entry(record.coordinate())
                .or_insert(false);
        }
        self.records.write().insert(record.serial, record);
    }

    /// Returns the number of known tags.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    /// Returns true if the map knows no tags.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    /// Returns the number of distinct parking coordinates.
    #[must_use]
    pub fn treasure_count(&self) -> usize {
        self.treasures.read().len()
    }

    /// Returns the number of parking coordinates found this round.
    #[must_use]
    pub fn found_count(&self) -> usize {
        self.treasures.read().values().filter(|found| **found).count()
    }

    /// Returns true once every parking coordinate has been found.
    #[must_use]
    pub fn all_found(&self) -> bool {
        self.found_count() == self.treasure_count()
    }

    /// Returns whether the coordinate is a parking point and has been found.
    #[must_use]
    pub fn is_found(&self, coordinate: (u8, u8)) -> Option<bool> {
        self.treasures.read().get(&coordinate).copied()
    }
}

impl FromIterator<TagRecord> for TagMap {
    fn from_iter<I: IntoIterator<Item = TagRecord>>(iter: I) -> Self {
        let map = Self::new();
        for record in iter {
            map.insert(record);
        }
        map
    }
}

impl TagLookup for TagMap {
    fn lookup(&self, serial: TagSerial) -> TagRecord {
        self.records
            .read()
            .get(&serial)
            .copied()
            .unwrap_or_else(|| TagRecord::unknown(serial))
    }
}

impl TreasureNotifier for TagMap {
    fn notify_found(&self, serial: TagSerial) {
        let record = self.lookup(serial);
        let mut treasures = self.treasures.write();
        if let Some(found) = treasures.get_mut(&record.coordinate())
            && !*found
        {
            *found = true;
            tracing::info!("Parking point ({},{}) found", record.x, record.y);
        }
    }

    fn reset(&self) {
        for found in self.treasures.write().values_mut() {
            *found = false;
        }
    }
}
