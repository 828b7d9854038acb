//! Presentation sync - projects occupancy and alert state onto outputs
//!
//! The controller decides *when* to render; this module decides *what* the
//! presenter sees and hands it over.

use crate::domain::types::{AlertState, LevelAvailability};
use crate::services::alert::GarageAlert;
use crate::services::ledger::OccupancyLedger;
use tracing::debug;

/// Everything a display or light strip needs for one frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GarageView {
    pub garage: String,
    pub levels: Vec<LevelAvailability>,
    pub alert: AlertState,
    pub flash_on: bool,
}

impl GarageView {
    pub fn alert_active(&self) -> bool {
        self.alert == AlertState::FullAlert
    }
}

/// Output collaborator (LCD, light strip, remote display)
pub trait Presenter: Send {
    fn render(&mut self, view: &GarageView);

    /// Show a free-form two-line banner (startup messages)
    fn banner(&mut self, _top: &str, _bottom: &str) {}
}

/// Owns the presenter and builds each frame's view
pub struct PresentationSync {
    garage: String,
    presenter: Box<dyn Presenter>,
}

impl PresentationSync {
    pub fn new(garage: impl Into<String>, presenter: Box<dyn Presenter>) -> Self {
        Self { garage: garage.into(), presenter }
    }

    pub fn view(&self, ledger: &OccupancyLedger, alert: &GarageAlert) -> GarageView {
        GarageView {
            garage: self.garage.clone(),
            levels: ledger.availabilities(),
            alert: alert.state(),
            flash_on: alert.flash_on(),
        }
    }

    /// Render the current state unconditionally
    pub fn sync(&mut self, ledger: &OccupancyLedger, alert: &GarageAlert) {
        let view = self.view(ledger, alert);
        debug!(alert = %view.alert.as_str(), flash_on = %view.flash_on, "presentation_sync");
        self.presenter.render(&view);
    }

    pub fn banner(&mut self, top: &str, bottom: &str) {
        self.presenter.banner(top, bottom);
    }
}
