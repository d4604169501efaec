//! Collaborator traits consumed by the dispatcher and the control surface.
//!
//! The server core only depends on these contracts. Default in-memory
//! implementations live in [`crate::tags`], [`crate::parking`],
//! [`crate::round`] and [`crate::log`].

use carlink_core::{TagRecord, TagSerial};
use std::sync::Arc;

/// Lookup of the map record for an RFID tag.
pub trait TagLookup: Send + Sync {
    /// Returns the record for `serial`, or [`TagRecord::unknown`] if the map
    /// does not contain it.
    fn lookup(&self, serial: TagSerial) -> TagRecord;
}

/// Receives every tag a device has read.
///
/// Calls are fire-and-forget: replies to devices never depend on them.
pub trait TreasureNotifier: Send + Sync {
    /// Called after the reply to a REQUEST_RFID has been queued.
    fn notify_found(&self, serial: TagSerial);

    /// Called when a new round starts.
    fn reset(&self) {}
}

/// Tracks which devices have reported ROUND_COMPLETE in the current round.
pub trait ParkingTracker: Send + Sync {
    /// Starts a new round expecting the given aliases. Returns the number of
    /// devices expected to report.
    fn init_round(&self, aliases: &[u8]) -> usize;

    /// Records a ROUND_COMPLETE from `alias`.
    fn report(&self, alias: u8);

    /// Returns true once every expected alias has reported.
    fn all_reported(&self) -> bool;
}

/// Ends a round when every device has completed it.
pub trait RoundControl: Send + Sync {
    /// Requests the round to stop.
    fn signal_stop(&self);
}

/// Human-readable log of server activity.
///
/// Appending is best-effort and must not block protocol processing.
pub trait LogSink: Send + Sync {
    /// Appends one line of text.
    fn append(&self, text: &str);
}

/// The external collaborators a dispatcher calls out to.
#[derive(Clone)]
pub struct Collaborators {
    /// Tag map.
    pub tags: Arc<dyn TagLookup>,
    /// Receiver of every tag read.
    pub treasures: Arc<dyn TreasureNotifier>,
    /// Round completion tracker.
    pub tracker: Arc<dyn ParkingTracker>,
    /// Round stop entry point.
    pub round_control: Arc<dyn RoundControl>,
    /// Activity log.
    pub log: Arc<dyn LogSink>,
}

/// Tag lookup that knows no tags.
#[derive(Debug, Default, Clone, Copy)]
pub struct EmptyMap;

impl TagLookup for EmptyMap {
    fn lookup(&self, serial: TagSerial) -> TagRecord {
        TagRecord::unknown(serial)
    }
}

impl TreasureNotifier for EmptyMap {
    fn notify_found(&self, _serial: TagSerial) {}
}
