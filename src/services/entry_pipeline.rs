//! Per-level entry confirmation
//!
//! ```text
//!            entry trip (admitted)          dwell elapsed
//!   Idle ─────────────────────────► Pending ─────────────► Idle (+1 validated)
//!    ▲                                 │
//!    └──────── exit trip (admitted) ───┘  (-1 validated, pending cancelled)
//! ```
//!
//! A car is only counted as parked once it has stayed past the entry sensor
//! for the dwell window without an exit showing up. An admitted exit always
//! frees a validated spot, whether or not an entry was pending.

use crate::domain::clock::Ticks;
use crate::domain::types::{Direction, LevelId, SensorEventKind};
use crate::services::debounce::{DebounceGate, SensorChannel};
use crate::services::ledger::LevelOccupancy;

/// Confirmation state of one level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EntryState {
    #[default]
    Idle,
    Pending {
        since: Ticks,
    },
}

/// Why a trip did not count
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// An entry is already waiting on the dwell window
    AlreadyPending,
    /// Channel still held or inside its cooldown
    Debounced,
}

/// What a sensor event did to the level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorOutcome {
    /// Fresh entry, now pending confirmation
    EntryPending { immediate_changed: bool },
    /// Fresh exit; `cancelled` if it cut a pending entry short
    ExitCounted { cancelled: bool, validated_changed: bool, immediate_changed: bool },
    Ignored(IgnoreReason),
    /// Untrip; channel released
    Released,
}

impl SensorOutcome {
    /// Direction to forward to the backend, if this was an admitted trip
    pub fn relay_direction(&self) -> Option<Direction> {
        match self {
            SensorOutcome::EntryPending { .. } => Some(Direction::Entry),
            SensorOutcome::ExitCounted { .. } => Some(Direction::Exit),
            _ => None,
        }
    }

    pub fn validated_changed(&self) -> bool {
        matches!(self, SensorOutcome::ExitCounted { validated_changed: true, .. })
    }
}

/// Result of a dwell poll that resolved a pending entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Confirmation {
    pub dwell_ms: u32,
    /// False when the level was already at capacity
    pub validated_changed: bool,
}

/// Sensor channels and confirmation state for one level
#[derive(Debug, Clone)]
pub struct EntryPipeline {
    pub level: LevelId,
    pub entry: SensorChannel,
    pub exit: SensorChannel,
    state: EntryState,
}

impl EntryPipeline {
    pub fn new(level: LevelId) -> Self {
        Self {
            level,
            entry: SensorChannel::new(level, Direction::Entry),
            exit: SensorChannel::new(level, Direction::Exit),
            state: EntryState::Idle,
        }
    }

    pub fn state(&self) -> EntryState {
        self.state
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.state, EntryState::Pending { .. })
    }

    /// Route one sensor event for this level
    pub fn on_sensor(
        &mut self,
        direction: Direction,
        kind: SensorEventKind,
        gate: &DebounceGate,
        occupancy: &mut LevelOccupancy,
        now: Ticks,
    ) -> SensorOutcome {
        match (direction, kind) {
            (Direction::Entry, SensorEventKind::Trip) => self.on_entry_trip(gate, occupancy, now),
            (Direction::Exit, SensorEventKind::Trip) => self.on_exit_trip(gate, occupancy, now),
            (Direction::Entry, SensorEventKind::Untrip) => {
                gate.release(&mut self.entry);
                SensorOutcome::Released
            }
            (Direction::Exit, SensorEventKind::Untrip) => {
                gate.release(&mut self.exit);
                SensorOutcome::Released
            }
        }
    }

    fn on_entry_trip(
        &mut self,
        gate: &DebounceGate,
        occupancy: &mut LevelOccupancy,
        now: Ticks,
    ) -> SensorOutcome {
        // Checked before the gate so a blocked trip leaves the channel alone
        if self.is_pending() {
            return SensorOutcome::Ignored(IgnoreReason::AlreadyPending);
        }
        if !gate.admit(&mut self.entry, now) {
            return SensorOutcome::Ignored(IgnoreReason::Debounced);
        }

        self.state = EntryState::Pending { since: now };
        let immediate_changed = occupancy.increment_immediate();
        SensorOutcome::EntryPending { immediate_changed }
    }

    fn on_exit_trip(
        &mut self,
        gate: &DebounceGate,
        occupancy: &mut LevelOccupancy,
        now: Ticks,
    ) -> SensorOutcome {
        if !gate.admit(&mut self.exit, now) {
            return SensorOutcome::Ignored(IgnoreReason::Debounced);
        }

        let immediate_changed = occupancy.decrement_immediate();
        let cancelled = self.is_pending();
        self.state = EntryState::Idle;
        let validated_changed = occupancy.decrement_validated();
        SensorOutcome::ExitCounted { cancelled, validated_changed, immediate_changed }
    }

    /// Confirm the pending entry once it has waited `dwell_ms`
    pub fn poll(
        &mut self,
        dwell_ms: u32,
        occupancy: &mut LevelOccupancy,
        now: Ticks,
    ) -> Option<Confirmation> {
        let EntryState::Pending { since } = self.state else {
            return None;
        };
        let waited = now.elapsed_since(since);
        if waited < dwell_ms {
            return None;
        }

        self.state = EntryState::Idle;
        let validated_changed = occupancy.increment_validated();
        Some(Confirmation { dwell_ms: waited, validated_changed })
    }

    /// Drop any pending entry and forget channel history
    pub fn reset(&mut self) {
        self.state = EntryState::Idle;
        self.entry.reset();
        self.exit.reset();
    }
}
