//! Garage controller - event orchestration and timers
//!
//! The GarageController is the single owner of all occupancy state. It:
//! - Routes sensor events through the debounce gate and entry pipelines
//! - Polls dwell timers and the alert flash cycle on every tick
//! - Hands admitted trips to the relay queue
//! - Re-renders the presentation when anything visible changed

mod handlers;

use crate::domain::clock::{MonotonicClock, Ticks};
use crate::domain::types::{BackendLevelId, ControllerEvent, LevelId};
use crate::infra::config::Config;
use crate::infra::metrics::Metrics;
use crate::services::alert::GarageAlert;
use crate::services::debounce::DebounceGate;
use crate::services::entry_pipeline::EntryPipeline;
use crate::services::ledger::{LevelOccupancy, OccupancyLedger};
use crate::services::presentation::{PresentationSync, Presenter};
use crate::services::relay_worker::RelaySender;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::time::{interval, Duration};
use tracing::{debug, info};

/// Central event processor for garage occupancy
pub struct GarageController {
    /// Channels and confirmation state, indexed by `LevelId`
    pub(crate) pipelines: Vec<EntryPipeline>,
    /// Backend level ids, indexed by `LevelId`
    pub(crate) backend_ids: Vec<BackendLevelId>,
    pub(crate) gate: DebounceGate,
    pub(crate) ledger: OccupancyLedger,
    pub(crate) alert: GarageAlert,
    pub(crate) presentation: PresentationSync,
    /// Relay queue producer (None when relaying is disabled)
    pub(crate) relay: Option<RelaySender>,
    pub(crate) metrics: Arc<Metrics>,
    pub(crate) dwell_ms: u32,
    garage_name: String,
    tick_ms: u64,
}

impl GarageController {
    pub fn new(
        config: &Config,
        presenter: Box<dyn Presenter>,
        relay: Option<RelaySender>,
        metrics: Arc<Metrics>,
    ) -> Self {
        let levels = config.levels();
        let pipelines = (0..levels.len()).map(|i| EntryPipeline::new(LevelId(i))).collect();
        let backend_ids = levels.iter().map(|l| l.backend_id).collect();
        let ledger = OccupancyLedger::new(
            levels.iter().map(|l| LevelOccupancy::new(l.name.clone(), l.capacity)).collect(),
        );

        metrics.set_levels(
            &levels.iter().map(|l| (l.name.clone(), l.capacity)).collect::<Vec<_>>(),
        );

        Self {
            pipelines,
            backend_ids,
            gate: DebounceGate::new(config.sensor_cooldown_ms()),
            ledger,
            alert: GarageAlert::new(config.flash_period_ms()),
            presentation: PresentationSync::new(config.garage_name(), presenter),
            relay,
            metrics,
            dwell_ms: config.entry_confirm_ms(),
            garage_name: config.garage_name().to_string(),
            tick_ms: config.tick_ms(),
        }
    }

    /// Consume events and drive the tick until the channel closes or shutdown
    pub async fn run(
        &mut self,
        mut event_rx: mpsc::Receiver<ControllerEvent>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        let clock = MonotonicClock::new();
        let mut tick_interval = interval(Duration::from_millis(self.tick_ms));

        info!(tick_ms = %self.tick_ms, levels = %self.pipelines.len(), "controller_started");

        loop {
            tokio::select! {
                event = event_rx.recv() => {
                    match event {
                        Some(e) => self.handle_event(e, clock.now()),
                        None => break,
                    }
                }
                _ = tick_interval.tick() => {
                    self.tick(clock.now());
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!("controller_stopped");
    }

    /// Process a single event
    pub fn handle_event(&mut self, event: ControllerEvent, now: Ticks) {
        match event {
            ControllerEvent::Sensor(sensor) => self.handle_sensor(sensor, now),
            ControllerEvent::Reset => self.reset(now),
            ControllerEvent::Unknown(name) => self.handle_unknown(&name),
        }
        self.metrics.record_event_processed();
    }

    /// Poll dwell timers, fullness and the flash cycle. Renders at most once.
    pub fn tick(&mut self, now: Ticks) {
        let mut dirty = false;

        for pipeline in &mut self.pipelines {
            let level = pipeline.level;
            let Some(occupancy) = self.ledger.level_mut(level) else {
                continue;
            };
            let Some(confirmation) = pipeline.poll(self.dwell_ms, occupancy, now) else {
                continue;
            };

            self.metrics.record_entry_confirmed();
            self.metrics.set_level_occupancy(level.0, occupancy.immediate(), occupancy.validated());
            info!(
                level = %occupancy.name,
                dwell_ms = %confirmation.dwell_ms,
                validated = %occupancy.validated(),
                capacity = %occupancy.capacity(),
                "entry_confirmed"
            );
            dirty |= confirmation.validated_changed;
        }

        dirty |= self.evaluate_alert(now);

        if self.alert.tick_flash(now) {
            debug!(flash_on = %self.alert.flash_on(), "alert_flash");
            dirty = true;
        }

        if dirty {
            self.sync_presentation();
        }
    }

    /// Show the startup banners, then the availability view
    ///
    /// Each banner is held for `frame_ms`; 0 skips straight to the view.
    pub async fn startup_sequence(&mut self, frame_ms: u64) {
        if frame_ms > 0 {
            let hold = Duration::from_millis(frame_ms);
            let clock_line = format!("   {}", chrono::Local::now().format("%H:%M"));

            self.presentation.banner(" Hello from", &format!(" {}", self.garage_name));
            tokio::time::sleep(hold).await;
            self.presentation.banner(" Time:", &clock_line);
            tokio::time::sleep(hold).await;
            self.presentation.banner(" Garage is now", "   OPEN!");
            tokio::time::sleep(hold).await;
        }

        self.metrics.set_alert_state(self.alert.state(), false);
        self.sync_presentation();
        info!(garage = %self.garage_name, "garage_open");
    }

    pub fn ledger(&self) -> &OccupancyLedger {
        &self.ledger
    }

    pub fn alert(&self) -> &GarageAlert {
        &self.alert
    }

    pub fn pipeline(&self, level: LevelId) -> Option<&EntryPipeline> {
        self.pipelines.get(level.0)
    }
}
