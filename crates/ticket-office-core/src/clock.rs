//! Time source for the dispatcher

use std::time::{SystemTime, UNIX_EPOCH};

/// Source of the current time in whole seconds
///
/// The dispatcher reads the clock once per received datagram; all expiration
/// decisions for that datagram use the same instant.
pub trait Clock {
    /// Current time in seconds
    fn now(&self) -> u64;
}

/// The real clock, counting seconds since the UNIX epoch
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |elapsed| elapsed.as_secs())
    }
}
