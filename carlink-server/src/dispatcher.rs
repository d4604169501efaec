//! Request dispatcher: applies one decoded device message to the registry and
//! collaborators and queues the replies.

use crate::handler::Collaborators;
use crate::registry::ClientRegistry;
use crate::round::RoundState;
use carlink_channel::OutboundQueue;
use carlink_core::{Message, MessageType, TagSerial, alias, encode};
use std::sync::Arc;

/// Routes decoded messages by type.
///
/// Replies and forwards are only queued; the connection loop writes them on
/// its next flush.
pub struct RequestDispatcher {
    registry: Arc<ClientRegistry>,
    outbound: Arc<OutboundQueue>,
    round: Arc<RoundState>,
    collaborators: Collaborators,
}

impl RequestDispatcher {
    /// Creates a dispatcher over shared server state.
    #[must_use]
    pub fn new(
        registry: Arc<ClientRegistry>,
        outbound: Arc<OutboundQueue>,
        round: Arc<RoundState>,
        collaborators: Collaborators,
    ) -> Self {
        Self {
            registry,
            outbound,
            round,
            collaborators,
        }
    }

    /// Handles `message` received from the client in slot `requester`.
    ///
    /// Returns false if the message was dropped without being processed.
    pub fn dispatch(&self, requester: usize, message: &Message) -> bool {
        if message.kind == MessageType::Invalid {
            tracing::warn!(slot = requester, "Dropping invalid message");
            self.collaborators
                .log
                .append(&format!("[WARN] {requester}: invalid message dropped\n"));
            return false;
        }

        self.collaborators
            .log
            .append(&format!("[MSG] {requester}: {message}\n"));

        match message.kind {
            MessageType::Register => self.on_register(requester, message.id),
            MessageType::RequestRfid => self.on_request_rfid(requester, message.payload()),
            MessageType::RoundComplete => self.on_round_complete(requester),
            MessageType::Custom => self.on_custom(requester, message.id, message.payload()),
            MessageType::CustomBroadcast => self.on_broadcast(requester, message.payload()),
            MessageType::RoundStart | MessageType::RoundEnd | MessageType::Invalid => {
                tracing::warn!(
                    slot = requester,
                    kind = message.kind.as_u8(),
                    "Server-only message type from client"
                );
                return false;
            }
        }
        true
    }

    fn on_register(&self, requester: usize, requested: u8) {
        let accepted = self.registry.assign_alias(requester, requested);
        if accepted {
            tracing::info!(slot = requester, alias = requested, "Alias registered");
        } else {
            tracing::info!(slot = requester, alias = requested, "Alias rejected");
        }
        self.send(requester, &Message::register_reply(requested, accepted));
    }

    fn on_request_rfid(&self, requester: usize, payload: &[u8]) {
        let Ok(serial) = TagSerial::try_from(payload) else {
            tracing::warn!(slot = requester, len = payload.len(), "Malformed RFID request");
            return;
        };

        let record = self.collaborators.tags.lookup(serial);
        self.collaborators
            .log
            .append(&format!("[MSG/MAP] {record}\n"));

        let reply = Message::new(
            MessageType::RequestRfid,
            alias::UNASSIGNED,
            Some(record.to_bytes().to_vec()),
        );
        self.send(requester, &reply);
        self.collaborators.treasures.notify_found(serial);
    }

    fn on_round_complete(&self, requester: usize) {
        let who = self.registry.alias_of(requester);
        self.collaborators.tracker.report(who);

        if self.collaborators.tracker.all_reported() && self.round.finish() {
            self.collaborators
                .log
                .append("[INFO] All cars completed.\n");
            tracing::info!("All cars completed");
            self.collaborators.round_control.signal_stop();
        }
    }

    fn on_custom(&self, requester: usize, destination: u8, payload: &[u8]) {
        let source = self.registry.alias_of(requester);
        let target = self.registry.find_by_alias(destination);

        self.send(requester, &Message::custom_ack(source, target.is_some()));
        if let Some(target) = target {
            self.send(target, &Message::custom(source, payload));
        }
    }

    fn on_broadcast(&self, requester: usize, payload: &[u8]) {
        let source = self.registry.alias_of(requester);
        self.send(requester, &Message::custom_ack(source, true));

        let frame = bytes::Bytes::from(encode(&Message::custom(source, payload)));
        for index in self.registry.occupied_slots() {
            if index != requester {
                self.outbound.push(index, frame.clone());
            }
        }
    }

    fn send(&self, destination: usize, message: &Message) {
        self.outbound.push(destination, encode(message));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::{LogSink, ParkingTracker, RoundControl, TagLookup, TreasureNotifier};
    use crate::log::MessageLog;
    use crate::parking::ParkRecorder;
    use crate::tags::TagMap;
    use carlink_channel::OutboundItem;
    use carlink_core::{TagRecord, decode_downlink, tag_kind};
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingStop {
        calls: AtomicUsize,
    }

    impl RoundControl for CountingStop {
        fn signal_stop(&self) {
            self.calls.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[derive(Default)]
    struct RecordingNotifier {
        seen: Mutex<Vec<TagSerial>>,
    }

    impl TreasureNotifier for RecordingNotifier {
        fn notify_found(&self, serial: TagSerial) {
            self.seen.lock().push(serial);
        }
    }

    struct Harness {
        registry: Arc<ClientRegistry>,
        outbound: Arc<OutboundQueue>,
        round: Arc<RoundState>,
        tracker: Arc<ParkRecorder>,
        stop: Arc<CountingStop>,
        notifier: Arc<RecordingNotifier>,
        log: Arc<MessageLog>,
        dispatcher: RequestDispatcher,
    }

    fn harness_with(tags: Arc<dyn TagLookup>) -> Harness {
        let registry = Arc::new(ClientRegistry::new());
        let outbound = Arc::new(OutboundQueue::new());
        let round = Arc::new(RoundState::new());
        let tracker = Arc::new(ParkRecorder::new());
        let stop = Arc::new(CountingStop::default());
        let notifier = Arc::new(RecordingNotifier::default());
        let log = Arc::new(MessageLog::default());

        let collaborators = Collaborators {
            tags,
            treasures: notifier.clone(),
            tracker: tracker.clone(),
            round_control: stop.clone(),
            log: log.clone() as Arc<dyn LogSink>,
        };
        let dispatcher = RequestDispatcher::new(
            Arc::clone(&registry),
            Arc::clone(&outbound),
            Arc::clone(&round),
            collaborators,
        );

        Harness {
            registry,
            outbound,
            round,
            tracker,
            stop,
            notifier,
            log,
            dispatcher,
        }
    }

    fn harness() -> Harness {
        harness_with(Arc::new(TagMap::new()))
    }

    fn connect(h: &Harness, index: usize, address: &str, alias: u8) {
        h.registry.occupy(index, address);
        assert!(h.registry.assign_alias(index, alias));
    }

    fn decoded(item: &OutboundItem) -> Message {
        decode_downlink(&item.frame)
    }

    #[test]
    fn test_register_accepted() {
        let h = harness();
        h.registry.occupy(0, "10.0.0.5");

        assert!(h.dispatcher.dispatch(0, &Message::register(0x20)));

        let items = h.outbound.drain();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].destination, 0);
        assert_eq!(&items[0].frame[..], b"\x01\x20OK");
        assert_eq!(h.registry.alias_of(0), 0x20);
    }

    #[test]
    fn test_register_duplicate_rejected() {
        let h = harness();
        connect(&h, 0, "10.0.0.5", 0x20);
        h.registry.occupy(1, "10.0.0.6");

        h.dispatcher.dispatch(1, &Message::register(0x20));

        let items = h.outbound.drain();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].destination, 1);
        assert_eq!(&items[0].frame[..], b"\x01\x20FAIL");
        assert_eq!(h.registry.alias_of(1), alias::UNASSIGNED);
    }

    #[test]
    fn test_custom_delivered() {
        let h = harness();
        connect(&h, 0, "10.0.0.5", 0x20);
        connect(&h, 1, "10.0.0.6", 0x30);

        h.dispatcher.dispatch(0, &Message::custom(0x30, "hi"));

        let items = h.outbound.drain();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].destination, 0);
        assert_eq!(decoded(&items[0]), Message::custom(0x20, "OK"));
        assert_eq!(items[1].destination, 1);
        assert_eq!(decoded(&items[1]), Message::custom(0x20, "hi"));
    }

    #[test]
    fn test_custom_unknown_destination() {
        let h = harness();
        connect(&h, 0, "10.0.0.5", 0x20);
        connect(&h, 1, "10.0.0.6", 0x30);

        h.dispatcher.dispatch(0, &Message::custom(0x99, "hi"));

        let items = h.outbound.drain();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].destination, 0);
        assert_eq!(decoded(&items[0]), Message::custom(0x20, "FAIL"));
    }

    #[test]
    fn test_custom_ack_for_every_request() {
        let h = harness();
        connect(&h, 0, "10.0.0.5", 0x20);
        connect(&h, 2, "10.0.0.7", 0x40);

        for destination in [0x40, 0x41, 0x20, alias::UNASSIGNED] {
            h.dispatcher.dispatch(0, &Message::custom(destination, [7u8]));
            let acks: Vec<_> = h
                .outbound
                .drain()
                .into_iter()
                .filter(|item| item.destination == 0)
                .map(|item| decoded(&item))
                .filter(|m| m.payload() == b"OK" || m.payload() == b"FAIL")
                .collect();
            assert_eq!(acks.len(), 1, "destination 0x{destination:02X}");
            let resolved = h.registry.find_by_alias(destination).is_some();
            assert_eq!(acks[0].is_ok(), resolved);
        }
    }

    #[test]
    fn test_custom_from_unregistered_sender() {
        let h = harness();
        h.registry.occupy(0, "10.0.0.5");
        connect(&h, 1, "10.0.0.6", 0x30);

        h.dispatcher.dispatch(0, &Message::custom(0x30, "x"));

        let items = h.outbound.drain();
        assert_eq!(decoded(&items[1]), Message::custom(alias::UNASSIGNED, "x"));
    }

    #[test]
    fn test_broadcast_fan_out() {
        let h = harness();
        connect(&h, 0, "10.0.0.5", 0x20);
        connect(&h, 1, "10.0.0.6", 0x30);
        connect(&h, 3, "10.0.0.8", 0x40);
        h.registry.occupy(4, "10.0.0.9");

        h.dispatcher
            .dispatch(1, &Message::custom_broadcast(alias::UNASSIGNED, "all"));

        let items = h.outbound.drain();
        assert_eq!(items.len(), 4);
        assert_eq!(items[0].destination, 1);
        assert_eq!(decoded(&items[0]), Message::custom(0x30, "OK"));

        let forwarded = &items[1..];
        let destinations: Vec<_> = forwarded.iter().map(|item| item.destination).collect();
        assert_eq!(destinations, vec![0, 3, 4]);
        for item in forwarded {
            assert_eq!(&item.frame[..], b"\x70\x30all");
        }
    }

    #[test]
    fn test_broadcast_alone() {
        let h = harness();
        connect(&h, 2, "10.0.0.7", 0x20);

        h.dispatcher.dispatch(2, &Message::custom_broadcast(0, "solo"));

        let items = h.outbound.drain();
        assert_eq!(items.len(), 1);
        assert!(decoded(&items[0]).is_ok());
    }

    #[test]
    fn test_request_rfid_unknown_tag() {
        let h = harness();
        h.registry.occupy(0, "10.0.0.5");

        h.dispatcher
            .dispatch(0, &Message::request_rfid([0x01, 0x02, 0x03, 0x04]));

        let items = h.outbound.drain();
        assert_eq!(items.len(), 1);
        let frame = &items[0].frame;
        assert_eq!(frame[0], 0x10);
        assert_eq!(
            &frame[1..8],
            &[0x01, 0x02, 0x03, 0x04, 0xFF, 0xFF, tag_kind::INVALID]
        );
        assert_eq!(*h.notifier.seen.lock(), vec![[0x01, 0x02, 0x03, 0x04]]);
        assert!(h.log.contains("[MSG/MAP] 01020304, (255,255), 0xFF"));
    }

    #[test]
    fn test_request_rfid_known_tag() {
        let map = TagMap::new();
        map.insert(TagRecord::new([0xDE, 0xAD, 0xBE, 0xEF], 4, 12, tag_kind::PARK_2));
        let h = harness_with(Arc::new(map));
        h.registry.occupy(0, "10.0.0.5");

        h.dispatcher
            .dispatch(0, &Message::request_rfid([0xDE, 0xAD, 0xBE, 0xEF]));

        let items = h.outbound.drain();
        let record = TagRecord::from_bytes(&items[0].frame[1..]).unwrap();
        assert_eq!(record.coordinate(), (4, 12));
        assert_eq!(record.kind, tag_kind::PARK_2);
    }

    #[test]
    fn test_round_complete_signals_once() {
        let h = harness();
        connect(&h, 0, "10.0.0.5", 0x20);
        connect(&h, 1, "10.0.0.6", 0x30);
        h.tracker.init_round(&h.registry.aliases());
        h.round.begin();

        h.dispatcher.dispatch(0, &Message::round_complete());
        assert_eq!(h.stop.calls.load(Ordering::SeqCst), 0);

        h.dispatcher.dispatch(1, &Message::round_complete());
        assert_eq!(h.stop.calls.load(Ordering::SeqCst), 1);
        assert!(h.log.contains("All cars completed."));

        h.dispatcher.dispatch(1, &Message::round_complete());
        h.dispatcher.dispatch(0, &Message::round_complete());
        assert_eq!(h.stop.calls.load(Ordering::SeqCst), 1);
        assert!(h.outbound.is_empty());
    }

    #[test]
    fn test_round_complete_next_round_signals_again() {
        let h = harness();
        connect(&h, 0, "10.0.0.5", 0x20);

        for expected_calls in 1..=2 {
            h.tracker.init_round(&h.registry.aliases());
            h.round.begin();
            h.dispatcher.dispatch(0, &Message::round_complete());
            assert_eq!(h.stop.calls.load(Ordering::SeqCst), expected_calls);
        }
    }

    #[test]
    fn test_round_complete_without_round() {
        let h = harness();
        connect(&h, 0, "10.0.0.5", 0x20);

        h.dispatcher.dispatch(0, &Message::round_complete());
        assert_eq!(h.stop.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_invalid_is_dropped() {
        let h = harness();
        connect(&h, 0, "10.0.0.5", 0x20);

        assert!(!h.dispatcher.dispatch(0, &Message::invalid()));
        assert!(!h.dispatcher.dispatch(0, &Message::round_start()));
        assert!(h.outbound.is_empty());
        assert_eq!(h.registry.alias_of(0), 0x20);
        assert!(h.log.contains("invalid message dropped"));
    }

    #[test]
    fn test_dispatch_logs_message() {
        let h = harness();
        connect(&h, 0, "10.0.0.5", 0x20);
        connect(&h, 1, "10.0.0.6", 0x30);

        h.dispatcher.dispatch(0, &Message::custom(0x30, "hi"));
        assert!(h.log.contains("[MSG] 0: 0x70, 0x30, hi"));
    }

    #[test]
    fn test_tracker_sees_requester_alias() {
        let h = harness();
        connect(&h, 3, "10.0.0.8", 0x44);
        h.tracker.init_round(&h.registry.aliases());

        h.dispatcher.dispatch(3, &Message::round_complete());
        assert_eq!(h.tracker.parked_aliases(), vec![0x44]);
    }
}
