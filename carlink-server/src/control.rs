//! Control surface: round start/stop, operator broadcasts and registry
//! queries, callable from any thread.
//!
//! Actions here push frames straight onto the outbound queue and raise a
//! force-flush so the connection loop writes them without waiting for the
//! next client message.

use crate::handler::{LogSink, ParkingTracker, TreasureNotifier};
use crate::registry::{ClientRegistry, ClientSlot};
use crate::round::RoundState;
use carlink_channel::OutboundQueue;
use carlink_core::{Message, alias, encode};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::Notify;

/// Flags shared between the connection loop and the control surface.
#[derive(Debug, Default)]
pub struct LoopSignal {
    running: AtomicBool,
    force_flush: AtomicBool,
    wake: Notify,
}

impl LoopSignal {
    /// Creates a signal in the stopped state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true while the connection loop should keep running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub(crate) fn set_running(&self) {
        self.running.store(true, Ordering::SeqCst);
    }

    /// Asks the connection loop to exit and wakes it.
    pub fn request_stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        self.wake.notify_one();
    }

    /// Asks the connection loop to flush the outbound queue and wakes it.
    pub fn request_flush(&self) {
        self.force_flush.store(true, Ordering::SeqCst);
        self.wake.notify_one();
    }

    /// Clears and returns the pending force-flush flag.
    pub fn take_flush(&self) -> bool {
        self.force_flush.swap(false, Ordering::SeqCst)
    }

    /// Returns true if a force-flush is pending.
    #[must_use]
    pub fn flush_pending(&self) -> bool {
        self.force_flush.load(Ordering::SeqCst)
    }

    /// Resolves when [`request_stop`](Self::request_stop) or
    /// [`request_flush`](Self::request_flush) is called.
    pub async fn woken(&self) {
        self.wake.notified().await;
    }
}

/// Cloneable handle for the operator side of the server.
#[derive(Clone)]
pub struct ControlSurface {
    registry: Arc<ClientRegistry>,
    outbound: Arc<OutboundQueue>,
    signal: Arc<LoopSignal>,
    round: Arc<RoundState>,
    tracker: Arc<dyn ParkingTracker>,
    treasures: Arc<dyn TreasureNotifier>,
    log: Arc<dyn LogSink>,
}

impl ControlSurface {
    /// Creates a control surface over shared server state.
    #[must_use]
    pub fn new(
        registry: Arc<ClientRegistry>,
        outbound: Arc<OutboundQueue>,
        signal: Arc<LoopSignal>,
        round: Arc<RoundState>,
        tracker: Arc<dyn ParkingTracker>,
        treasures: Arc<dyn TreasureNotifier>,
        log: Arc<dyn LogSink>,
    ) -> Self {
        Self {
            registry,
            outbound,
            signal,
            round,
            tracker,
            treasures,
            log,
        }
    }

    /// Starts a round: resets the treasure state, seeds the parking tracker
    /// with the registered aliases and sends ROUND_START to every client.
    pub fn start_round(&self) {
        self.treasures.reset();

        let expected = self.tracker.init_round(&self.registry.aliases());
        self.log
            .append(&format!("[INFO] There are {expected} cars to park.\n"));

        self.round.begin();
        self.push_to_all(&Message::round_start());
        self.signal.request_flush();
        self.log.append("[INFO] Round started\n");
        tracing::info!(expected, "Round started");
    }

    /// Stops the round and sends ROUND_END to every client.
    pub fn stop_round(&self) {
        self.round.end();
        self.push_to_all(&Message::round_end());
        self.signal.request_flush();
        self.log.append("[INFO] Round stopped\n");
        tracing::info!(elapsed = ?self.round.since_start(), "Round stopped");
    }

    /// Sends an operator message to every client as a CUSTOM_BROADCAST from
    /// the server identity.
    pub fn toggle_broadcast(&self, text: &str) {
        self.log.append(&format!("[INFO] Broadcast: {text}\n"));
        let message = Message::custom_broadcast(alias::SERVER, text.as_bytes().to_vec());
        self.push_to_all(&message);
        self.signal.request_flush();
    }

    /// Returns the alias of the client connected from `address`.
    #[must_use]
    pub fn alias_of_address(&self, address: &str) -> u8 {
        self.registry.alias_of_address(address)
    }

    /// Returns the alias of the client in slot `index`.
    #[must_use]
    pub fn alias_of_index(&self, index: usize) -> u8 {
        self.registry.alias_of(index)
    }

    /// Returns the slot of the client connected from `address`.
    #[must_use]
    pub fn find_slot_by_address(&self, address: &str) -> Option<usize> {
        self.registry.find_by_address(address)
    }

    /// Returns a copy of the slot table.
    #[must_use]
    pub fn slots(&self) -> Vec<ClientSlot> {
        self.registry.snapshot()
    }

    /// Returns true while a round is in progress.
    #[must_use]
    pub fn round_active(&self) -> bool {
        self.round.is_active()
    }

    /// Returns the running time of the round in progress.
    #[must_use]
    pub fn round_elapsed(&self) -> Option<Duration> {
        self.round.elapsed()
    }

    fn push_to_all(&self, message: &Message) {
        let frame = bytes::Bytes::from(encode(message));
        for index in self.registry.occupied_slots() {
            self.outbound.push(index, frame.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::MessageLog;
    use crate::parking::ParkRecorder;
    use crate::tags::TagMap;
    use carlink_core::{TagRecord, tag_kind};

    struct Fixture {
        registry: Arc<ClientRegistry>,
        outbound: Arc<OutboundQueue>,
        signal: Arc<LoopSignal>,
        tracker: Arc<ParkRecorder>,
        tags: Arc<TagMap>,
        log: Arc<MessageLog>,
        control: ControlSurface,
    }

    fn fixture() -> Fixture {
        let registry = Arc::new(ClientRegistry::new());
        let outbound = Arc::new(OutboundQueue::new());
        let signal = Arc::new(LoopSignal::new());
        let tracker = Arc::new(ParkRecorder::new());
        let tags = Arc::new(TagMap::new());
        let log = Arc::new(MessageLog::default());
        let control = ControlSurface::new(
            Arc::clone(&registry),
            Arc::clone(&outbound),
            Arc::clone(&signal),
            Arc::new(RoundState::new()),
            tracker.clone(),
            tags.clone(),
            log.clone(),
        );
        Fixture {
            registry,
            outbound,
            signal,
            tracker,
            tags,
            log,
            control,
        }
    }

    #[test]
    fn test_start_round_pushes_to_occupied_slots() {
        let f = fixture();
        f.registry.occupy(0, "10.0.0.5");
        f.registry.occupy(3, "10.0.0.8");
        assert!(f.registry.assign_alias(0, 0x20));

        f.control.start_round();

        let items = f.outbound.drain();
        let destinations: Vec<_> = items.iter().map(|item| item.destination).collect();
        assert_eq!(destinations, vec![0, 3]);
        assert!(items.iter().all(|item| item.frame[..] == [0x20, 0x01]));
        assert!(f.signal.take_flush());
        assert!(f.control.round_active());
        assert_eq!(f.tracker.expected_count(), 1);
        assert!(f.log.contains("There are 1 cars to park."));
        assert!(f.log.contains("Round started"));
    }

    #[test]
    fn test_start_round_resets_treasures() {
        let f = fixture();
        f.tags
            .insert(TagRecord::new([0, 0, 0, 9], 2, 2, tag_kind::PARK_3));
        f.tags.notify_found([0, 0, 0, 9]);
        assert_eq!(f.tags.found_count(), 1);

        f.control.start_round();
        assert_eq!(f.tags.found_count(), 0);
    }

    #[test]
    fn test_stop_round() {
        let f = fixture();
        f.registry.occupy(1, "10.0.0.6");
        f.control.start_round();
        f.outbound.drain();
        f.signal.take_flush();

        f.control.stop_round();
        let items = f.outbound.drain();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].destination, 1);
        assert_eq!(&items[0].frame[..], &[0x21, 0x01]);
        assert!(f.signal.flush_pending());
        assert!(!f.control.round_active());
        assert!(f.control.round_elapsed().is_none());
    }

    #[test]
    fn test_toggle_broadcast() {
        let f = fixture();
        f.registry.occupy(0, "10.0.0.5");
        f.registry.occupy(2, "10.0.0.7");

        f.control.toggle_broadcast("go");
        let items = f.outbound.drain();
        assert_eq!(items.len(), 2);
        for item in &items {
            assert_eq!(&item.frame[..], &[0x71, 0x01, b'g', b'o']);
        }
        assert!(f.signal.take_flush());
        assert!(!f.signal.take_flush());
        assert!(f.log.contains("Broadcast: go"));
    }

    #[test]
    fn test_queries() {
        let f = fixture();
        f.registry.occupy(4, "10.0.0.9");
        assert!(f.registry.assign_alias(4, 0x44));

        assert_eq!(f.control.alias_of_address("10.0.0.9"), 0x44);
        assert_eq!(f.control.alias_of_index(4), 0x44);
        assert_eq!(f.control.alias_of_index(9), alias::UNASSIGNED);
        assert_eq!(f.control.find_slot_by_address("10.0.0.9"), Some(4));
        assert_eq!(f.control.find_slot_by_address("10.0.0.1"), None);
        assert_eq!(f.control.slots().len(), crate::registry::MAX_CLIENTS);
    }

    #[test]
    fn test_loop_signal() {
        let signal = LoopSignal::new();
        assert!(!signal.is_running());
        signal.set_running();
        assert!(signal.is_running());
        signal.request_stop();
        assert!(!signal.is_running());

        assert!(!signal.take_flush());
        signal.request_flush();
        assert!(signal.take_flush());
        assert!(!signal.flush_pending());
    }
}
