//! Display and light strip projection
//!
//! The garage sign is a 16x2 character LCD with one row per level
//! (`"L1: 9 Avail"`) and an LED strip that is steady green while spaces are
//! available and flashes between bright and dim red while the garage is full.

use crate::io::egress_channel::{DisplayPayload, EgressSender};
use crate::services::presentation::{GarageView, Presenter};
use serde::Serialize;
use crate::domain::types::AlertState;
use tracing::{debug, info};

/// LCD width in characters
pub const LCD_COLUMNS: usize = 16;

/// Truncate or space-pad `text` to exactly `LCD_COLUMNS` characters
pub fn fit_line(text: &str) -> String {
    let mut line: String = text.chars().take(LCD_COLUMNS).collect();
    let len = line.chars().count();
    line.extend(std::iter::repeat(' ').take(LCD_COLUMNS - len));
    line
}

/// Rendered LCD rows, one per level
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LcdFrame {
    pub lines: Vec<String>,
}

impl LcdFrame {
    pub fn from_view(view: &GarageView) -> Self {
        let lines = view
            .levels
            .iter()
            .map(|level| fit_line(&format!("{}: {} Avail", level.name, level.available)))
            .collect();
        Self { lines }
    }

    pub fn banner(top: &str, bottom: &str) -> Self {
        Self { lines: vec![fit_line(top), fit_line(bottom)] }
    }
}

/// Light strip colors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LightColor {
    Green,
    Red,
    DimRed,
}

impl LightColor {
    pub fn for_view(view: &GarageView) -> Self {
        match (view.alert_active(), view.flash_on) {
            (false, _) => LightColor::Green,
            (true, true) => LightColor::Red,
            (true, false) => LightColor::DimRed,
        }
    }

    pub fn rgb(&self) -> [u8; 3] {
        match self {
            LightColor::Green => [0, 255, 0],
            LightColor::Red => [255, 0, 0],
            LightColor::DimRed => [80, 0, 0],
        }
    }
}

/// Writes every frame to the log
///
/// Frames that only toggle the flash phase are logged at debug so a full
/// garage does not flood the info log.
#[derive(Debug, Default)]
pub struct LogPresenter {
    last: Option<(Vec<String>, AlertState)>,
}

impl LogPresenter {
    /// Remember `frame` and report whether only the flash phase changed
    fn flash_only(&mut self, frame: &LcdFrame, alert: AlertState) -> bool {
        let same =
            self.last.as_ref().is_some_and(|(lines, last)| *lines == frame.lines && *last == alert);
        self.last = Some((frame.lines.clone(), alert));
        same
    }
}

impl Presenter for LogPresenter {
    fn render(&mut self, view: &GarageView) {
        let frame = LcdFrame::from_view(view);
        let light = LightColor::for_view(view);
        if self.flash_only(&frame, view.alert) {
            debug!(light = ?light, "display_flash");
            return;
        }
        info!(
            lcd = ?frame.lines,
            light = ?light,
            alert = %view.alert.as_str(),
            "display_frame"
        );
    }

    fn banner(&mut self, top: &str, bottom: &str) {
        let frame = LcdFrame::banner(top, bottom);
        self.last = None;
        info!(lcd = ?frame.lines, "display_banner");
    }
}

/// Publishes frames to the remote display topic, and logs them locally
pub struct MqttPresenter {
    sender: EgressSender,
    log: LogPresenter,
}

impl MqttPresenter {
    pub fn new(sender: EgressSender) -> Self {
        Self { sender, log: LogPresenter::default() }
    }
}

impl Presenter for MqttPresenter {
    fn render(&mut self, view: &GarageView) {
        self.log.render(view);
        let frame = LcdFrame::from_view(view);
        let light = LightColor::for_view(view);
        self.sender.send_display(DisplayPayload::frame(view, frame.lines, light));
    }

    fn banner(&mut self, top: &str, bottom: &str) {
        self.log.banner(top, bottom);
        self.sender.send_display(DisplayPayload::banner(LcdFrame::banner(top, bottom).lines));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::LevelAvailability;

    fn view(alert: AlertState, flash_on: bool) -> GarageView {
        GarageView {
            garage: "Garage A".into(),
            levels: vec![
                LevelAvailability { name: "L1".into(), available: 9 },
                LevelAvailability { name: "L2".into(), available: 10 },
            ],
            alert,
            flash_on,
        }
    }

    #[test]
    fn test_fit_line_pads() {
        assert_eq!(fit_line("L1: 9 Avail"), "L1: 9 Avail     ");
        assert_eq!(fit_line("").len(), LCD_COLUMNS);
    }

    #[test]
    fn test_fit_line_truncates() {
        assert_eq!(fit_line("Level-Basement: 120 Avail"), "Level-Basement: ");
    }

    #[test]
    fn test_lcd_frame_rows() {
        let frame = LcdFrame::from_view(&view(AlertState::Normal, false));
        assert_eq!(frame.lines, vec!["L1: 9 Avail     ", "L2: 10 Avail    "]);
    }

    #[test]
    fn test_light_color() {
        assert_eq!(LightColor::for_view(&view(AlertState::Normal, false)), LightColor::Green);
        assert_eq!(LightColor::for_view(&view(AlertState::FullAlert, true)), LightColor::Red);
        assert_eq!(LightColor::for_view(&view(AlertState::FullAlert, false)), LightColor::DimRed);
        assert_eq!(LightColor::DimRed.rgb(), [80, 0, 0]);
    }

    #[tokio::test]
    async fn test_mqtt_presenter_enqueues_frames() {
        let (sender, mut rx) = crate::io::egress_channel::create_egress_channel(4);
        let mut presenter = MqttPresenter::new(sender);
        presenter.banner(" Hello from", " Garage A");
        presenter.render(&view(AlertState::FullAlert, true));

        let banner = rx.recv().await.unwrap();
        assert_eq!(banner.kind, "banner");
        let frame = rx.recv().await.unwrap();
        assert_eq!(frame.kind, "frame");
        assert_eq!(frame.light, Some(LightColor::Red));
        assert_eq!(frame.alert.as_deref(), Some("full_alert"));
    }

    #[test]
    fn test_flash_toggle_is_quiet() {
        let mut log = LogPresenter::default();
        let full_on = view(AlertState::FullAlert, true);
        let full_off = view(AlertState::FullAlert, false);
        let frame = LcdFrame::from_view(&full_on);

        let normal = LcdFrame::from_view(&view(AlertState::Normal, false));
        assert!(!log.flash_only(&normal, AlertState::Normal));
        assert!(!log.flash_only(&frame, full_on.alert));
        assert!(log.flash_only(&LcdFrame::from_view(&full_off), full_off.alert));
        assert!(log.flash_only(&frame, full_on.alert));

        log.banner(" Hello from", " Garage A");
        assert!(!log.flash_only(&frame, full_on.alert));
    }
}
