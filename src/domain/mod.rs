//! Domain models - core types shared by the occupancy pipeline
//!
//! - `types` - level identity, sensor events, alert state
//! - `clock` - wrapping millisecond timestamps

pub mod clock;
pub mod types;

pub use clock::{epoch_ms, MonotonicClock, Ticks};
pub use types::{
    AlertState, BackendLevelId, ControllerEvent, Direction, LevelAvailability, LevelId,
    SensorEvent, SensorEventKind,
};
