use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use jiff::{SignedDuration, Timestamp};

pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Timestamp::now()
    }
}

/// A clock that only moves when told to. Used to drive stale-claim and
/// requeue timing deterministically.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<Timestamp>,
}

impl ManualClock {
    pub fn new(start: Timestamp) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn set(&self, at: Timestamp) {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner) = at;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *now = shift(*now, by, true);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// `at - by`, saturating at the minimum timestamp.
pub fn before(at: Timestamp, by: Duration) -> Timestamp {
    shift(at, by, false)
}

fn shift(at: Timestamp, by: Duration, forward: bool) -> Timestamp {
    let Ok(by) = SignedDuration::try_from(by) else {
        return if forward { Timestamp::MAX } else { Timestamp::MIN };
    };
    let shifted = if forward {
        at.checked_add(by)
    } else {
        at.checked_sub(by)
    };
    shifted.unwrap_or(if forward { Timestamp::MAX } else { Timestamp::MIN })
}
