//! Deadline scheduling primitives.
//!
//! Nothing in the control loop sleeps.  Every "wait N ms, then do X"
//! is expressed as an absolute deadline against the monotonic millisecond
//! clock and checked once per tick:
//!
//! ```text
//!   vent transition ──┐
//!   calibration pause ┤
//!   probe conversion ─┤──▶ Deadline / Interval ──▶ checked every tick
//!   ambient cadence ──┤
//!   tach window ──────┤
//!   cooldown window ──┘
//! ```

/// Monotonic time in milliseconds since boot.
pub type Millis = u64;

/// A one-shot absolute deadline that remembers when it was armed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline {
    started_at: Millis,
    duration_ms: u32,
}

impl Deadline {
    pub fn new(started_at: Millis, duration_ms: u32) -> Self {
        Self {
            started_at,
            duration_ms,
        }
    }

    /// When the deadline was armed.
    pub fn started_at(&self) -> Millis {
        self.started_at
    }

    pub fn duration_ms(&self) -> u32 {
        self.duration_ms
    }

    /// Absolute time at which the deadline passes.
    pub fn due_at(&self) -> Millis {
        self.started_at.saturating_add(u64::from(self.duration_ms))
    }

    pub fn is_due(&self, now: Millis) -> bool {
        now >= self.due_at()
    }

    /// Milliseconds elapsed since the deadline was armed.
    pub fn elapsed(&self, now: Millis) -> u64 {
        now.saturating_sub(self.started_at)
    }
}

/// A fixed-cadence trigger.
///
/// `poll` returns the elapsed time since the previous fire once the period
/// has passed, and re-arms from `now` (not from the nominal due time) so a
/// long stall never produces a burst of catch-up fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interval {
    period_ms: u32,
    last_fire: Option<Millis>,
}

impl Interval {
    /// An interval whose first fire happens one full period after `now`.
    pub fn starting_at(now: Millis, period_ms: u32) -> Self {
        Self {
            period_ms,
            last_fire: Some(now),
        }
    }

    /// An interval that fires on the first poll.
    pub fn immediate(period_ms: u32) -> Self {
        Self {
            period_ms,
            last_fire: None,
        }
    }

    pub fn period_ms(&self) -> u32 {
        self.period_ms
    }

    /// Returns `Some(elapsed_ms)` when the period has passed.  The first
    /// fire of an [`immediate`](Self::immediate) interval reports zero.
    pub fn poll(&mut self, now: Millis) -> Option<u64> {
        let Some(last) = self.last_fire else {
            self.last_fire = Some(now);
            return Some(0);
        };
        let elapsed = now.saturating_sub(last);
        if elapsed >= u64::from(self.period_ms) {
            self.last_fire = Some(now);
            Some(elapsed)
        } else {
            None
        }
    }

    /// Re-arm so the next fire happens one period after `now`.
    pub fn reset(&mut self, now: Millis) {
        self.last_fire = Some(now);
    }
}
