//! Wrapping millisecond clock
//!
//! Sensor timing is measured on a 32-bit millisecond counter that wraps
//! roughly every 49.7 days. All interval math goes through
//! [`Ticks::elapsed_since`] so a wrap between two readings is harmless as long
//! as the interval itself is shorter than the wrap period.

use std::time::{Instant, SystemTime, UNIX_EPOCH};

/// Get current epoch milliseconds (wall clock, for outbound payloads only)
#[inline]
pub fn epoch_ms() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis() as u64
}

/// Monotonic millisecond timestamp (wraps at `u32::MAX`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(transparent)]
pub struct Ticks(pub u32);

impl Ticks {
    /// Build from a millisecond count, truncating into the wrapping range
    #[inline]
    pub fn from_ms(ms: u64) -> Self {
        Ticks(ms as u32)
    }

    /// Milliseconds elapsed from `earlier` to `self`, wraparound-safe
    #[inline]
    pub fn elapsed_since(self, earlier: Ticks) -> u32 {
        self.0.wrapping_sub(earlier.0)
    }
}

impl std::fmt::Display for Ticks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Reads [`Ticks`] relative to the moment the clock was created
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self { origin: Instant::now() }
    }

    #[inline]
    pub fn now(&self) -> Ticks {
        Ticks::from_ms(self.origin.elapsed().as_millis() as u64)
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}
