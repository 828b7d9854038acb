//! Services - occupancy logic and state management
//!
//! This module contains the core business logic services:
//! - `controller` - Central event orchestrator and tick loop
//! - `debounce` - Per-channel sensor cooldown
//! - `entry_pipeline` - Per-level pending entry confirmation
//! - `ledger` - Immediate and validated occupancy counts
//! - `alert` - Garage-wide full alert state machine
//! - `presentation` - Projects state onto display outputs
//! - `relay_worker` - Async backend relay worker

pub mod alert;
pub mod controller;
pub mod debounce;
pub mod entry_pipeline;
pub mod ledger;
pub mod presentation;
pub mod relay_worker;

// Re-export commonly used types
pub use controller::GarageController;
pub use presentation::{GarageView, Presenter};
pub use relay_worker::{create_relay_worker, RelayRequest, RelaySender, RelayWorker};
