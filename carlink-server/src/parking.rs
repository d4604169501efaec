//! Parking tracker for round completion.

use crate::handler::ParkingTracker;
use carlink_core::alias;
use parking_lot::Mutex;

#[derive(Debug, Default)]
struct ParkState {
    expected: Vec<u8>,
    parked: Vec<bool>,
}

/// Records which registered devices have parked in the current round.
#[derive(Debug, Default)]
pub struct ParkRecorder {
    state: Mutex<ParkState>,
}

impl ParkRecorder {
    /// Creates a recorder expecting nobody.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the aliases that have parked, in registration order.
    #[must_use]
    pub fn parked_aliases(&self) -> Vec<u8> {
        let state = self.state.lock();
        state
            .expected
            .iter()
            .zip(&state.parked)
            .filter(|(_, parked)| **parked)
            .map(|(alias, _)| *alias)
            .collect()
    }

    /// Returns the number of devices expected this round.
    #[must_use]
    pub fn expected_count(&self) -> usize {
        self.state.lock().expected.len()
    }

    /// Returns the number of devices that have parked.
    #[must_use]
    pub fn parked_count(&self) -> usize {
        self.state.lock().parked.iter().filter(|p| **p).count()
    }
}

impl ParkingTracker for ParkRecorder {
    fn init_round(&self, aliases: &[u8]) -> usize {
        let expected: Vec<u8> = aliases
            .iter()
            .copied()
            .filter(|a| *a != alias::UNASSIGNED)
            .collect();
        let count = expected.len();

        let mut state = self.state.lock();
        state.parked = vec![false; count];
        state.expected = expected;
        count
    }

    fn report(&self, who: u8) {
        let mut state = self.state.lock();
        let ParkState { expected, parked } = &mut *state;
        if let Some(slot) = expected
            .iter()
            .zip(parked.iter_mut())
            .find_map(|(a, p)| (*a == who && !*p).then_some(p))
        {
            *slot = true;
        }
    }

    fn all_reported(&self) -> bool {
        let state = self.state.lock();
        state.parked.iter().all(|p| *p)
    }
}
