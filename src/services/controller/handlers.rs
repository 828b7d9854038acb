//! Event handlers for the GarageController
//!
//! Each handler applies one event to the owned state and triggers the side
//! effects (relay enqueue, presentation refresh) it calls for.

use super::GarageController;
use crate::domain::clock::Ticks;
use crate::domain::types::{Direction, LevelId, SensorEvent};
use crate::services::entry_pipeline::SensorOutcome;
use tracing::{debug, info, warn};

impl GarageController {
    /// Route a trip/untrip through the level's pipeline
    pub(crate) fn handle_sensor(&mut self, event: SensorEvent, now: Ticks) {
        let level = event.level;
        let (Some(pipeline), Some(occupancy)) =
            (self.pipelines.get_mut(level.0), self.ledger.level_mut(level))
        else {
            warn!(level = %level, "sensor_level_unknown");
            return;
        };

        let outcome = pipeline.on_sensor(event.direction, event.kind, &self.gate, occupancy, now);

        match outcome {
            SensorOutcome::EntryPending { .. } => {
                self.metrics.record_trip_admitted();
                info!(
                    level = %occupancy.name,
                    immediate = %occupancy.immediate(),
                    "entry_pending"
                );
            }
            SensorOutcome::ExitCounted { cancelled, .. } => {
                self.metrics.record_trip_admitted();
                if cancelled {
                    self.metrics.record_entry_cancelled();
                    info!(level = %occupancy.name, "entry_cancelled");
                }
                info!(
                    level = %occupancy.name,
                    immediate = %occupancy.immediate(),
                    validated = %occupancy.validated(),
                    "exit_counted"
                );
            }
            SensorOutcome::Ignored(reason) => {
                self.metrics.record_trip_ignored();
                debug!(
                    level = %occupancy.name,
                    direction = %event.direction.as_str(),
                    reason = ?reason,
                    "trip_ignored"
                );
            }
            SensorOutcome::Released => {
                debug!(
                    level = %occupancy.name,
                    direction = %event.direction.as_str(),
                    "sensor_released"
                );
            }
        }

        self.metrics.set_level_occupancy(level.0, occupancy.immediate(), occupancy.validated());

        if let Some(direction) = outcome.relay_direction() {
            self.relay_trip(level, direction);
        }

        if outcome.validated_changed() {
            self.evaluate_alert(now);
            self.sync_presentation();
        }
    }

    /// Clear every pending entry, count, channel and the alert in one step
    pub(crate) fn reset(&mut self, now: Ticks) {
        for pipeline in &mut self.pipelines {
            pipeline.reset();
        }
        self.ledger.reset();

        let transition = self.alert.reset();
        self.metrics.set_alert_state(self.alert.state(), transition.is_some());
        self.metrics.record_reset();
        for (i, level) in self.ledger.levels().iter().enumerate() {
            self.metrics.set_level_occupancy(i, level.immediate(), level.validated());
        }

        info!(alert_cleared = %transition.is_some(), "garage_reset");

        // Only a garage whose every level has zero capacity is full again here
        self.evaluate_alert(now);
        self.sync_presentation();
    }

    pub(crate) fn handle_unknown(&self, name: &str) {
        warn!(event = %name, "unknown_event");
    }

    /// Feed the fullness predicate to the alert. Returns true on a transition.
    pub(crate) fn evaluate_alert(&mut self, now: Ticks) -> bool {
        let full = self.ledger.all_full();
        let Some(transition) = self.alert.evaluate(full, now) else {
            return false;
        };
        self.metrics.set_alert_state(transition.to, true);
        info!(
            from = %transition.from.as_str(),
            to = %transition.to.as_str(),
            "alert_transition"
        );
        true
    }

    pub(crate) fn sync_presentation(&mut self) {
        self.presentation.sync(&self.ledger, &self.alert);
    }

    /// Enqueue one admitted trip for the backend. Never blocks, never fails.
    fn relay_trip(&self, level: LevelId, direction: Direction) {
        let Some(relay) = &self.relay else {
            return;
        };
        let Some(&level_id) = self.backend_ids.get(level.0) else {
            return;
        };

        if let Err(e) = relay.submit(level_id, direction) {
            self.metrics.record_relay_dropped();
            warn!(
                level_id = %level_id,
                sensor_type = %direction.as_str(),
                error = %e,
                "relay_dropped"
            );
        }
    }
}
