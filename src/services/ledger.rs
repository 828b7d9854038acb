//! Occupancy ledger - immediate and validated counts per level
//!
//! Every mutation is clamped to `[0, capacity]`. `immediate` counts raw
//! admitted trips and is only used for diagnostics; `validated` counts
//! confirmed parked cars and drives display and alerting. The two are never
//! reconciled.

use crate::domain::types::{LevelAvailability, LevelId};

/// Counts for a single level
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LevelOccupancy {
    pub name: String,
    capacity: u32,
    immediate: u32,
    validated: u32,
}

impl LevelOccupancy {
    pub fn new(name: impl Into<String>, capacity: u32) -> Self {
        Self { name: name.into(), capacity, immediate: 0, validated: 0 }
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn immediate(&self) -> u32 {
        self.immediate
    }

    pub fn validated(&self) -> u32 {
        self.validated
    }

    pub fn availability(&self) -> u32 {
        self.capacity.saturating_sub(self.validated)
    }

    pub fn is_full(&self) -> bool {
        self.validated >= self.capacity
    }

    /// Returns true if the count changed
    pub fn increment_immediate(&mut self) -> bool {
        if self.immediate < self.capacity {
            self.immediate += 1;
            return true;
        }
        false
    }

    pub fn decrement_immediate(&mut self) -> bool {
        if self.immediate > 0 {
            self.immediate -= 1;
            return true;
        }
        false
    }

    pub fn increment_validated(&mut self) -> bool {
        if self.validated < self.capacity {
            self.validated += 1;
            return true;
        }
        false
    }

    pub fn decrement_validated(&mut self) -> bool {
        if self.validated > 0 {
            self.validated -= 1;
            return true;
        }
        false
    }

    pub fn reset(&mut self) {
        self.immediate = 0;
        self.validated = 0;
    }
}

/// All levels of the garage
#[derive(Debug, Clone, Default)]
pub struct OccupancyLedger {
    levels: Vec<LevelOccupancy>,
}

impl OccupancyLedger {
    pub fn new(levels: Vec<LevelOccupancy>) -> Self {
        Self { levels }
    }

    pub fn level(&self, id: LevelId) -> Option<&LevelOccupancy> {
        self.levels.get(id.0)
    }

    pub fn level_mut(&mut self, id: LevelId) -> Option<&mut LevelOccupancy> {
        self.levels.get_mut(id.0)
    }

    pub fn levels(&self) -> &[LevelOccupancy] {
        &self.levels
    }

    /// `capacity - validated` for one level (0 for an unknown level)
    pub fn availability(&self, id: LevelId) -> u32 {
        self.level(id).map(LevelOccupancy::availability).unwrap_or(0)
    }

    pub fn availabilities(&self) -> Vec<LevelAvailability> {
        self.levels
            .iter()
            .map(|l| LevelAvailability { name: l.name.clone(), available: l.availability() })
            .collect()
    }

    /// Garage is full only when every level is at capacity
    pub fn all_full(&self) -> bool {
        !self.levels.is_empty() && self.levels.iter().all(LevelOccupancy::is_full)
    }

    /// Zero both counts on every level
    pub fn reset(&mut self) {
        for level in &mut self.levels {
            level.reset();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_levels(capacity: u32) -> OccupancyLedger {
        OccupancyLedger::new(vec![
            LevelOccupancy::new("L1", capacity),
            LevelOccupancy::new("L2", capacity),
        ])
    }

    #[test]
    fn test_counts_clamped_to_capacity() {
        let mut level = LevelOccupancy::new("L1", 2);
        assert!(level.increment_validated());
        assert!(level.increment_validated());
        assert!(!level.increment_validated());
        assert_eq!(level.validated(), 2);

        assert!(level.increment_immediate());
        assert!(level.increment_immediate());
        assert!(!level.increment_immediate());
        assert_eq!(level.immediate(), 2);
    }

    #[test]
    fn test_counts_floored_at_zero() {
        let mut level = LevelOccupancy::new("L1", 2);
        assert!(!level.decrement_validated());
        assert!(!level.decrement_immediate());
        assert_eq!(level.validated(), 0);
        assert_eq!(level.immediate(), 0);
    }

    #[test]
    fn test_zero_capacity_level_is_always_full() {
        let mut level = LevelOccupancy::new("roof", 0);
        assert!(level.is_full());
        assert!(!level.increment_validated());
        assert_eq!(level.availability(), 0);
    }

    #[test]
    fn test_availability() {
        let mut ledger = two_levels(10);
        ledger.level_mut(LevelId(0)).unwrap().increment_validated();
        assert_eq!(ledger.availability(LevelId(0)), 9);
        assert_eq!(ledger.availability(LevelId(1)), 10);
        assert_eq!(ledger.availability(LevelId(7)), 0);

        let view = ledger.availabilities();
        assert_eq!(view[0], LevelAvailability { name: "L1".into(), available: 9 });
    }

    #[test]
    fn test_all_full_requires_every_level() {
        let mut ledger = two_levels(1);
        ledger.level_mut(LevelId(0)).unwrap().increment_validated();
        assert!(!ledger.all_full());
        ledger.level_mut(LevelId(1)).unwrap().increment_validated();
        assert!(ledger.all_full());
    }

    #[test]
    fn test_empty_ledger_is_not_full() {
        assert!(!OccupancyLedger::default().all_full());
    }

    #[test]
    fn test_reset_zeroes_all_levels() {
        let mut ledger = two_levels(3);
        for id in [LevelId(0), LevelId(1)] {
            let level = ledger.level_mut(id).unwrap();
            level.increment_validated();
            level.increment_immediate();
        }
        ledger.reset();
        assert!(ledger.levels().iter().all(|l| l.validated() == 0 && l.immediate() == 0));
    }
}
