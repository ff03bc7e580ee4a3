use std::fmt;
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Duration, SubsecRound, Utc};

/// Instant type used for every stored timestamp.
pub type Timestamp = DateTime<Utc>;

/// Truncate an instant to microsecond precision.
///
/// Stored timestamps are kept at microsecond precision so that every backend
/// returns the same instant for the same write.
pub fn normalize(ts: Timestamp) -> Timestamp {
    ts.trunc_subsecs(6)
}

/// Source of the current time.
///
/// Stores take a clock at construction instead of reading the wall clock
/// directly, which keeps ordering tests deterministic.
pub trait Clock: Send + Sync + fmt::Debug {
    /// The current instant, already normalized.
    fn now(&self) -> Timestamp;
}

/// Wall-clock time.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        normalize(Utc::now())
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<Timestamp>,
}

impl ManualClock {
    /// Start at the given instant.
    pub fn new(start: Timestamp) -> Self {
        Self {
            now: Mutex::new(normalize(start)),
        }
    }

    /// Start at the UNIX epoch plus one day, a fixed and readable origin.
    pub fn at_origin() -> Self {
        Self::new(DateTime::<Utc>::UNIX_EPOCH + Duration::days(1))
    }

    /// Move the clock forward.
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *now = normalize(*now + by);
    }

    /// Jump to an explicit instant.
    pub fn set(&self, at: Timestamp) {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner) = normalize(at);
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::at_origin()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    #[test]
    fn normalize_drops_nanoseconds() {
        let ts = DateTime::<Utc>::UNIX_EPOCH + Duration::nanoseconds(1_234_567_891);
        let n = normalize(ts);
        assert_eq!(n.nanosecond(), 234_567_000);
        assert_eq!(normalize(n), n);
    }

    #[test]
    fn system_clock_is_normalized() {
        let now = SystemClock.now();
        assert_eq!(now.nanosecond() % 1_000, 0);
    }

    #[test]
    fn manual_clock_only_moves_when_advanced() {
        let clock = ManualClock::at_origin();
        let t0 = clock.now();
        assert_eq!(clock.now(), t0);
        clock.advance(Duration::seconds(5));
        assert_eq!(clock.now(), t0 + Duration::seconds(5));
    }

    #[test]
    fn manual_clock_set() {
        let clock = ManualClock::default();
        let target = DateTime::<Utc>::UNIX_EPOCH + Duration::days(400);
        clock.set(target);
        assert_eq!(clock.now(), target);
    }
}
