//! Lock-free metrics collection and periodic reporting
//!
//! Counters are updated from the controller and relay worker without locks.
//! Level names are set once at startup behind a `parking_lot` mutex.
//!
//! NOTE: All atomics use Relaxed ordering intentionally. These are
//! statistical counters only and never feed back into occupancy decisions.

use crate::domain::types::AlertState;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::info;

/// Maximum number of levels with per-level gauges
pub const MAX_LEVELS: usize = 8;

/// Alert state values for the Prometheus gauge
pub const ALERT_STATE_NORMAL: u64 = 0;
pub const ALERT_STATE_FULL: u64 = 1;

/// Per-level occupancy gauges
struct LevelGauges {
    capacity: AtomicU64,
    immediate: AtomicU64,
    validated: AtomicU64,
}

impl LevelGauges {
    fn new() -> Self {
        Self {
            capacity: AtomicU64::new(0),
            immediate: AtomicU64::new(0),
            validated: AtomicU64::new(0),
        }
    }
}

/// Lock-free metrics collector
pub struct Metrics {
    /// Total controller events processed (monotonic)
    events_total: AtomicU64,
    /// Events since last report (reset on report)
    events_since_report: AtomicU64,
    /// Sensor trips admitted by the debounce gate (monotonic)
    trips_admitted: AtomicU64,
    /// Sensor trips suppressed (debounced or already pending) (monotonic)
    trips_ignored: AtomicU64,
    /// Pending entries confirmed by dwell (monotonic)
    entries_confirmed: AtomicU64,
    /// Pending entries cancelled by an exit (monotonic)
    entries_cancelled: AtomicU64,
    /// Relay calls that succeeded (monotonic)
    relays_sent: AtomicU64,
    /// Relay calls that failed at the backend (monotonic)
    relays_failed: AtomicU64,
    /// Relay requests dropped because the queue was full or closed (monotonic)
    relays_dropped: AtomicU64,
    /// Max relay latency in milliseconds (reset on report)
    relay_latency_max_ms: AtomicU64,
    /// Sensor events dropped at ingress because the channel was full (monotonic)
    ingress_dropped: AtomicU64,
    /// Manual resets (monotonic)
    resets_total: AtomicU64,
    /// Alert transitions in either direction (monotonic)
    alert_transitions: AtomicU64,
    /// Current alert state (0=normal, 1=full)
    alert_state: AtomicU64,
    levels: [LevelGauges; MAX_LEVELS],
    /// Level names in config order (set once at init)
    level_names: parking_lot::Mutex<Vec<String>>,
    /// Last report time (only accessed from reporter)
    last_report_time: parking_lot::Mutex<Instant>,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            events_total: AtomicU64::new(0),
            events_since_report: AtomicU64::new(0),
            trips_admitted: AtomicU64::new(0),
            trips_ignored: AtomicU64::new(0),
            entries_confirmed: AtomicU64::new(0),
            entries_cancelled: AtomicU64::new(0),
            relays_sent: AtomicU64::new(0),
            relays_failed: AtomicU64::new(0),
            relays_dropped: AtomicU64::new(0),
            relay_latency_max_ms: AtomicU64::new(0),
            ingress_dropped: AtomicU64::new(0),
            resets_total: AtomicU64::new(0),
            alert_transitions: AtomicU64::new(0),
            alert_state: AtomicU64::new(ALERT_STATE_NORMAL),
            levels: std::array::from_fn(|_| LevelGauges::new()),
            level_names: parking_lot::Mutex::new(Vec::new()),
            last_report_time: parking_lot::Mutex::new(Instant::now()),
        }
    }

    /// Register level names and capacities. `Config::validate` caps levels at `MAX_LEVELS`.
    pub fn set_levels(&self, levels: &[(String, u32)]) {
        let mut names = self.level_names.lock();
        names.clear();
        for (i, (name, capacity)) in levels.iter().take(MAX_LEVELS).enumerate() {
            names.push(name.clone());
            self.levels[i].capacity.store(*capacity as u64, Ordering::Relaxed);
        }
    }

    #[inline]
    pub fn record_event_processed(&self) {
        self.events_total.fetch_add(1, Ordering::Relaxed);
        self.events_since_report.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_trip_admitted(&self) {
        self.trips_admitted.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_trip_ignored(&self) {
        self.trips_ignored.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_entry_confirmed(&self) {
        self.entries_confirmed.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_entry_cancelled(&self) {
        self.entries_cancelled.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_relay_sent(&self, latency_ms: u64) {
        self.relays_sent.fetch_add(1, Ordering::Relaxed);
        self.relay_latency_max_ms.fetch_max(latency_ms, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_relay_failed(&self) {
        self.relays_failed.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_relay_dropped(&self) {
        self.relays_dropped.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_ingress_dropped(&self) {
        self.ingress_dropped.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_reset(&self) {
        self.resets_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn set_alert_state(&self, state: AlertState, transitioned: bool) {
        let value = match state {
            AlertState::Normal => ALERT_STATE_NORMAL,
            AlertState::FullAlert => ALERT_STATE_FULL,
        };
        self.alert_state.store(value, Ordering::Relaxed);
        if transitioned {
            self.alert_transitions.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Mirror one level's counts into its gauges
    pub fn set_level_occupancy(&self, index: usize, immediate: u32, validated: u32) {
        if let Some(gauges) = self.levels.get(index) {
            gauges.immediate.store(immediate as u64, Ordering::Relaxed);
            gauges.validated.store(validated as u64, Ordering::Relaxed);
        }
    }

    pub fn relays_sent(&self) -> u64 {
        self.relays_sent.load(Ordering::Relaxed)
    }

    pub fn relays_failed(&self) -> u64 {
        self.relays_failed.load(Ordering::Relaxed)
    }

    pub fn relays_dropped(&self) -> u64 {
        self.relays_dropped.load(Ordering::Relaxed)
    }

    pub fn trips_admitted(&self) -> u64 {
        self.trips_admitted.load(Ordering::Relaxed)
    }

    pub fn trips_ignored(&self) -> u64 {
        self.trips_ignored.load(Ordering::Relaxed)
    }

    /// Read all values without resetting (for the Prometheus endpoint)
    pub fn snapshot(&self) -> MetricsSummary {
        let events = self.events_since_report.load(Ordering::Relaxed);
        let relay_max = self.relay_latency_max_ms.load(Ordering::Relaxed);
        self.build_summary(events, 0.0, relay_max)
    }

    /// Swap per-interval counters and return a summary
    pub fn report(&self) -> MetricsSummary {
        let events = self.events_since_report.swap(0, Ordering::Relaxed);
        let relay_max = self.relay_latency_max_ms.swap(0, Ordering::Relaxed);

        let elapsed_secs = {
            let mut last = self.last_report_time.lock();
            let secs = last.elapsed().as_secs_f64();
            *last = Instant::now();
            secs
        };
        let events_per_sec = if elapsed_secs > 0.0 { events as f64 / elapsed_secs } else { 0.0 };

        self.build_summary(events, events_per_sec, relay_max)
    }

    fn build_summary(&self, events: u64, events_per_sec: f64, relay_max: u64) -> MetricsSummary {
        let names = self.level_names.lock().clone();
        let levels = names
            .into_iter()
            .enumerate()
            .map(|(i, name)| LevelSnapshot {
                name,
                capacity: self.levels[i].capacity.load(Ordering::Relaxed),
                immediate: self.levels[i].immediate.load(Ordering::Relaxed),
                validated: self.levels[i].validated.load(Ordering::Relaxed),
            })
            .collect();

        MetricsSummary {
            events_total: self.events_total.load(Ordering::Relaxed),
            events_in_interval: events,
            events_per_sec,
            trips_admitted: self.trips_admitted.load(Ordering::Relaxed),
            trips_ignored: self.trips_ignored.load(Ordering::Relaxed),
            entries_confirmed: self.entries_confirmed.load(Ordering::Relaxed),
            entries_cancelled: self.entries_cancelled.load(Ordering::Relaxed),
            relays_sent: self.relays_sent.load(Ordering::Relaxed),
            relays_failed: self.relays_failed.load(Ordering::Relaxed),
            relays_dropped: self.relays_dropped.load(Ordering::Relaxed),
            relay_latency_max_ms: relay_max,
            ingress_dropped: self.ingress_dropped.load(Ordering::Relaxed),
            resets_total: self.resets_total.load(Ordering::Relaxed),
            alert_transitions: self.alert_transitions.load(Ordering::Relaxed),
            alert_state: self.alert_state.load(Ordering::Relaxed),
            levels,
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LevelSnapshot {
    pub name: String,
    pub capacity: u64,
    pub immediate: u64,
    pub validated: u64,
}

/// Point-in-time view of all metrics
#[derive(Debug, Clone)]
pub struct MetricsSummary {
    pub events_total: u64,
    pub events_in_interval: u64,
    pub events_per_sec: f64,
    pub trips_admitted: u64,
    pub trips_ignored: u64,
    pub entries_confirmed: u64,
    pub entries_cancelled: u64,
    pub relays_sent: u64,
    pub relays_failed: u64,
    pub relays_dropped: u64,
    pub relay_latency_max_ms: u64,
    pub ingress_dropped: u64,
    pub resets_total: u64,
    pub alert_transitions: u64,
    pub alert_state: u64,
    pub levels: Vec<LevelSnapshot>,
}

impl MetricsSummary {
    pub fn log(&self) {
        let occupancy = self
            .levels
            .iter()
            .map(|l| format!("{}={}/{}({})", l.name, l.validated, l.capacity, l.immediate))
            .collect::<Vec<_>>()
            .join(" ");

        info!(
            events_total = %self.events_total,
            events_per_sec = %format!("{:.1}", self.events_per_sec),
            trips_admitted = %self.trips_admitted,
            trips_ignored = %self.trips_ignored,
            confirmed = %self.entries_confirmed,
            cancelled = %self.entries_cancelled,
            relays_sent = %self.relays_sent,
            relays_failed = %self.relays_failed,
            relays_dropped = %self.relays_dropped,
            relay_max_ms = %self.relay_latency_max_ms,
            alert_state = %self.alert_state,
            occupancy = %occupancy,
            "metrics"
        );
    }
}
