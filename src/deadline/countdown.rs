//! Live countdown towards a message deadline.

use std::time::Duration;

use chrono::Utc;

use crate::deadline::Deadline;

/// Remaining time-to-live of the message currently being processed.
///
/// Holds only the absolute deadline. Every query recomputes against the wall
/// clock, so nested code always sees the true remaining budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Countdown {
    deadline: Deadline,
}

impl Countdown {
    pub fn new(deadline: Deadline) -> Self {
        Self { deadline }
    }

    /// The absolute deadline this countdown runs towards.
    pub fn deadline(&self) -> Deadline {
        self.deadline
    }

    /// Seconds left until the deadline. Zero or negative once expired.
    pub fn remaining_secs(&self) -> f64 {
        self.remaining_secs_at(Utc::now())
    }

    /// Seconds left until the deadline as observed at `now`.
    pub fn remaining_secs_at(&self, now: Deadline) -> f64 {
        let delta = self.deadline.signed_duration_since(now);
        match delta.num_microseconds() {
            Some(us) => us as f64 / 1_000_000.0,
            // Out of microsecond range; millisecond precision is plenty there.
            None => delta.num_milliseconds() as f64 / 1_000.0,
        }
    }

    /// Remaining budget as a `Duration`, saturating at zero once the deadline has passed.
    pub fn remaining(&self) -> Duration {
        let secs = self.remaining_secs();
        if secs > 0.0 {
            Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
        } else {
            Duration::ZERO
        }
    }

    pub fn is_expired(&self) -> bool {
        self.remaining_secs() <= 0.0
    }
}
