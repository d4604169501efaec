//! Round state and the default round timer.

use crate::control::ControlSurface;
use crate::handler::RoundControl;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Whether a round is in progress, and when it started.
///
/// Completion is latched: [`finish`](Self::finish) succeeds once per round,
/// so a late ROUND_COMPLETE never ends a round twice.
#[derive(Debug, Default)]
pub struct RoundState {
    active: AtomicBool,
    started: Mutex<Option<Instant>>,
}

impl RoundState {
    /// Creates a state with no round in progress.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks a round as started.
    pub fn begin(&self) {
        *self.started.lock() = Some(Instant::now());
        self.active.store(true, Ordering::SeqCst);
    }

    /// Marks the round as over.
    pub fn end(&self) {
        self.active.store(false, Ordering::SeqCst);
    }

    /// Returns true while a round is in progress.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Ends the round, returning true only for the call that ended it.
    pub fn finish(&self) -> bool {
        self.active.swap(false, Ordering::SeqCst)
    }

    /// Returns the time since the most recent round started, whether or not
    /// it is still running.
    #[must_use]
    pub fn since_start(&self) -> Option<Duration> {
        self.started.lock().map(|started| started.elapsed())
    }

    /// Returns the running time of the round in progress.
    #[must_use]
    pub fn elapsed(&self) -> Option<Duration> {
        if self.is_active() {
            self.since_start()
        } else {
            None
        }
    }
}

/// Round timer driving the control surface.
///
/// [`trigger`](Self::trigger) toggles between starting and stopping a round,
/// the way an operator's start/stop button does. The timer keeps no state of
/// its own; rounds started or stopped directly on the [`ControlSurface`] are
/// seen here too.
pub struct RoundTimer {
    control: ControlSurface,
}

impl RoundTimer {
    /// Creates a timer over `control`.
    #[must_use]
    pub fn new(control: ControlSurface) -> Self {
        Self { control }
    }

    /// Starts a round if none is running, otherwise stops it.
    ///
    /// Returns true if a round is running afterwards.
    pub fn trigger(&self) -> bool {
        if self.control.round_active() {
            self.control.stop_round();
            false
        } else {
            self.control.start_round();
            true
        }
    }

    /// Returns true while a round is running.
    #[must_use]
    pub fn is_counting(&self) -> bool {
        self.control.round_active()
    }

    /// Returns the time since the current round started.
    #[must_use]
    pub fn elapsed(&self) -> Option<Duration> {
        self.control.round_elapsed()
    }
}

impl RoundControl for RoundTimer {
    /// Sends ROUND_END. Callers gate this to once per round.
    fn signal_stop(&self) {
        tracing::info!("All cars parked, stopping round");
        self.control.stop_round();
    }
}
