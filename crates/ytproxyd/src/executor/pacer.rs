//! Cancellable waits between executor rounds.

use std::time::{Duration, Instant};

use crate::process::ShutdownToken;

const PACE_SLICE: Duration = Duration::from_millis(200);

/// Why a pacing wait ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PaceOutcome {
    Elapsed,
    /// The caller's condition stopped holding before the deadline.
    Interrupted,
    Shutdown,
}

/// Sleeps on the shutdown token so shutdown ends every wait immediately.
#[derive(Debug, Clone)]
pub(crate) struct Pacer {
    shutdown: ShutdownToken,
    slice: Duration,
}

impl Pacer {
    pub(crate) fn new(shutdown: ShutdownToken) -> Self {
        Self {
            shutdown,
            slice: PACE_SLICE,
        }
    }

    pub(crate) fn wait(&self, duration: Duration) -> PaceOutcome {
        self.wait_while(duration, || true)
    }

    /// Waits up to `duration`, re-checking `keep_waiting` at least every
    /// slice.
    pub(crate) fn wait_while(
        &self,
        duration: Duration,
        keep_waiting: impl Fn() -> bool,
    ) -> PaceOutcome {
        let deadline = Instant::now() + duration;
        loop {
            if self.shutdown.is_triggered() {
                return PaceOutcome::Shutdown;
            }
            if !keep_waiting() {
                return PaceOutcome::Interrupted;
            }
            let now = Instant::now();
            if now >= deadline {
                return PaceOutcome::Elapsed;
            }
            if self.shutdown.wait_timeout((deadline - now).min(self.slice)) {
                return PaceOutcome::Shutdown;
            }
        }
    }
}
