//! Garage-wide full alert
//!
//! Two states, NORMAL and FULL_ALERT, driven by a closed transition table.
//! The fullness predicate is edge-triggered: the table is only consulted when
//! the predicate value differs from the last evaluation, so sitting at full
//! capacity never re-fires the FULL_ALERT entry actions.

use crate::domain::clock::Ticks;
use crate::domain::types::AlertState;
use tracing::info;

/// Inputs to the alert transition table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertEvent {
    GarageFull,
    GarageNotFull,
}

impl AlertState {
    /// Transition table. `None` means the event has no edge from this state.
    pub fn on(self, event: AlertEvent) -> Option<AlertState> {
        match (self, event) {
            (AlertState::Normal, AlertEvent::GarageFull) => Some(AlertState::FullAlert),
            (AlertState::FullAlert, AlertEvent::GarageNotFull) => Some(AlertState::Normal),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlertTransition {
    pub from: AlertState,
    pub to: AlertState,
}

/// Alert state plus the presentation flash phase
#[derive(Debug, Clone)]
pub struct GarageAlert {
    state: AlertState,
    is_full: bool,
    flash_on: bool,
    last_flash: Ticks,
    flash_period_ms: u32,
}

impl GarageAlert {
    pub fn new(flash_period_ms: u32) -> Self {
        Self {
            state: AlertState::Normal,
            is_full: false,
            flash_on: false,
            last_flash: Ticks::default(),
            flash_period_ms,
        }
    }

    pub fn state(&self) -> AlertState {
        self.state
    }

    pub fn is_full(&self) -> bool {
        self.is_full
    }

    pub fn flash_on(&self) -> bool {
        self.flash_on
    }

    pub fn is_alert(&self) -> bool {
        self.state == AlertState::FullAlert
    }

    /// Feed the current fullness predicate. Returns the transition taken, if any.
    pub fn evaluate(&mut self, full: bool, now: Ticks) -> Option<AlertTransition> {
        if full == self.is_full {
            return None;
        }
        self.is_full = full;

        let event = if full { AlertEvent::GarageFull } else { AlertEvent::GarageNotFull };
        let from = self.state;
        let to = from.on(event)?;
        self.state = to;
        self.enter(to, now);

        if full {
            info!("garage_full");
        } else {
            info!("garage_not_full");
        }
        Some(AlertTransition { from, to })
    }

    fn enter(&mut self, state: AlertState, now: Ticks) {
        match state {
            AlertState::FullAlert => {
                self.flash_on = true;
                self.last_flash = now;
            }
            AlertState::Normal => {
                self.flash_on = false;
            }
        }
    }

    /// Advance the flash cycle. Returns true when the phase toggled.
    pub fn tick_flash(&mut self, now: Ticks) -> bool {
        if self.state != AlertState::FullAlert || !self.is_full {
            return false;
        }
        if now.elapsed_since(self.last_flash) < self.flash_period_ms {
            return false;
        }
        self.last_flash = now;
        self.flash_on = !self.flash_on;
        true
    }

    /// Force NORMAL and forget the fullness snapshot
    pub fn reset(&mut self) -> Option<AlertTransition> {
        let from = self.state;
        self.state = AlertState::Normal;
        self.is_full = false;
        self.flash_on = false;
        (from != AlertState::Normal).then_some(AlertTransition { from, to: AlertState::Normal })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transition_table() {
        assert_eq!(AlertState::Normal.on(AlertEvent::GarageFull), Some(AlertState::FullAlert));
        assert_eq!(AlertState::FullAlert.on(AlertEvent::GarageNotFull), Some(AlertState::Normal));
        assert_eq!(AlertState::Normal.on(AlertEvent::GarageNotFull), None);
        assert_eq!(AlertState::FullAlert.on(AlertEvent::GarageFull), None);
    }

    #[test]
    fn test_full_edge_enters_alert() {
        let mut alert = GarageAlert::new(500);
        let t = alert.evaluate(true, Ticks(100)).unwrap();
        assert_eq!(t, AlertTransition { from: AlertState::Normal, to: AlertState::FullAlert });
        assert!(alert.is_alert());
        assert!(alert.flash_on());
    }

    #[test]
    fn test_repeated_full_does_not_refire() {
        let mut alert = GarageAlert::new(500);
        assert!(alert.evaluate(true, Ticks(0)).is_some());
        for t in 1..20 {
            assert_eq!(alert.evaluate(true, Ticks(t * 100)), None);
        }
        assert!(alert.is_alert());
    }

    #[test]
    fn test_not_full_edge_returns_to_normal() {
        let mut alert = GarageAlert::new(500);
        alert.evaluate(true, Ticks(0));
        let t = alert.evaluate(false, Ticks(300)).unwrap();
        assert_eq!(t.to, AlertState::Normal);
        assert!(!alert.flash_on());
        assert_eq!(alert.evaluate(false, Ticks(400)), None);
    }

    #[test]
    fn test_flash_toggles_each_period() {
        let mut alert = GarageAlert::new(500);
        alert.evaluate(true, Ticks(1000));
        assert!(alert.flash_on());

        assert!(!alert.tick_flash(Ticks(1400)));
        assert!(alert.tick_flash(Ticks(1500)));
        assert!(!alert.flash_on());
        assert!(!alert.tick_flash(Ticks(1900)));
        assert!(alert.tick_flash(Ticks(2000)));
        assert!(alert.flash_on());
    }

    #[test]
    fn test_no_flash_in_normal() {
        let mut alert = GarageAlert::new(500);
        assert!(!alert.tick_flash(Ticks(10_000)));
        assert!(!alert.flash_on());
    }

    #[test]
    fn test_reset_forces_normal() {
        let mut alert = GarageAlert::new(500);
        alert.evaluate(true, Ticks(0));
        let t = alert.reset().unwrap();
        assert_eq!(t.from, AlertState::FullAlert);
        assert_eq!(alert.state(), AlertState::Normal);
        assert!(!alert.is_full());
        assert!(!alert.flash_on());

        assert_eq!(alert.reset(), None);
    }
}
