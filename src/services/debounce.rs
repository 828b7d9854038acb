//! Per-channel sensor debouncing
//!
//! A trip is counted only when the channel is not already held tripped and
//! the cooldown since the last counted trip has strictly elapsed. Untrips are
//! never debounced; they just release the channel.

use crate::domain::clock::Ticks;
use crate::domain::types::{Direction, LevelId};

/// One physical sensor (a level's entry or exit beam)
#[derive(Debug, Clone, PartialEq)]
pub struct SensorChannel {
    pub level: LevelId,
    pub direction: Direction,
    /// Held between an admitted trip and the following untrip
    pub tripped: bool,
    /// When the last counted trip happened
    pub last_counted: Option<Ticks>,
}

impl SensorChannel {
    pub fn new(level: LevelId, direction: Direction) -> Self {
        Self { level, direction, tripped: false, last_counted: None }
    }

    /// Forget all debounce history
    pub fn reset(&mut self) {
        self.tripped = false;
        self.last_counted = None;
    }
}

/// Cooldown filter shared by all channels
#[derive(Debug, Clone, Copy)]
pub struct DebounceGate {
    cooldown_ms: u32,
}

impl DebounceGate {
    pub fn new(cooldown_ms: u32) -> Self {
        Self { cooldown_ms }
    }

    /// Whether `channel` is ready for a new counted trip at `now`
    #[inline]
    pub fn cooldown_ok(&self, channel: &SensorChannel, now: Ticks) -> bool {
        match channel.last_counted {
            None => true,
            Some(last) => now.elapsed_since(last) > self.cooldown_ms,
        }
    }

    /// Admit a trip on `channel`. On success the channel is marked tripped
    /// and `now` becomes its last counted trip.
    pub fn admit(&self, channel: &mut SensorChannel, now: Ticks) -> bool {
        if channel.tripped || !self.cooldown_ok(channel, now) {
            return false;
        }
        channel.tripped = true;
        channel.last_counted = Some(now);
        true
    }

    /// Handle an untrip: clears the held flag, keeps the timestamp
    pub fn release(&self, channel: &mut SensorChannel) {
        channel.tripped = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry_channel() -> SensorChannel {
        SensorChannel::new(LevelId(0), Direction::Entry)
    }

    #[test]
    fn test_first_trip_admitted() {
        let gate = DebounceGate::new(1000);
        let mut ch = entry_channel();
        assert!(gate.admit(&mut ch, Ticks(0)));
        assert!(ch.tripped);
        assert_eq!(ch.last_counted, Some(Ticks(0)));
    }

    #[test]
    fn test_held_channel_not_readmitted() {
        let gate = DebounceGate::new(1000);
        let mut ch = entry_channel();
        assert!(gate.admit(&mut ch, Ticks(0)));
        // Still tripped, cooldown long past
        assert!(!gate.admit(&mut ch, Ticks(10_000)));
        assert_eq!(ch.last_counted, Some(Ticks(0)));
    }

    #[test]
    fn test_cooldown_is_strict() {
        let gate = DebounceGate::new(1000);
        let mut ch = entry_channel();
        assert!(gate.admit(&mut ch, Ticks(0)));
        gate.release(&mut ch);

        assert!(!gate.admit(&mut ch, Ticks(500)));
        assert!(!gate.admit(&mut ch, Ticks(1000)));
        assert!(gate.admit(&mut ch, Ticks(1001)));
        assert_eq!(ch.last_counted, Some(Ticks(1001)));
    }

    #[test]
    fn test_rejected_trip_leaves_channel_untouched() {
        let gate = DebounceGate::new(1000);
        let mut ch = entry_channel();
        gate.admit(&mut ch, Ticks(0));
        gate.release(&mut ch);
        let before = ch.clone();
        assert!(!gate.admit(&mut ch, Ticks(200)));
        assert_eq!(ch, before);
    }

    #[test]
    fn test_cooldown_across_clock_wrap() {
        let gate = DebounceGate::new(1000);
        let mut ch = entry_channel();
        assert!(gate.admit(&mut ch, Ticks(u32::MAX - 200)));
        gate.release(&mut ch);
        assert!(!gate.admit(&mut ch, Ticks(500)));
        assert!(gate.admit(&mut ch, Ticks(900)));
    }

    #[test]
    fn test_reset_clears_history() {
        let gate = DebounceGate::new(1000);
        let mut ch = entry_channel();
        gate.admit(&mut ch, Ticks(0));
        ch.reset();
        assert!(!ch.tripped);
        assert!(gate.admit(&mut ch, Ticks(1)));
    }
}
