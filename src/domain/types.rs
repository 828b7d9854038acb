//! Shared types for the garage controller

use serde::{Deserialize, Serialize};

/// Index of a level in the configured level table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(transparent)]
pub struct LevelId(pub usize);

impl std::fmt::Display for LevelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Level identifier known to the backend (distinct from [`LevelId`])
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(transparent)]
pub struct BackendLevelId(pub i64);

impl std::fmt::Display for BackendLevelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which side of a level a sensor watches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Entry,
    Exit,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Entry => "entry",
            Direction::Exit => "exit",
        }
    }
}

impl std::str::FromStr for Direction {
    type Err = UnknownDirection;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "entry" => Ok(Direction::Entry),
            "exit" => Ok(Direction::Exit),
            other => Err(UnknownDirection(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("unknown sensor direction '{0}' (expected 'entry' or 'exit')")]
pub struct UnknownDirection(pub String);

/// Logical sensor transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorEventKind {
    Trip,
    Untrip,
}

impl SensorEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SensorEventKind::Trip => "trip",
            SensorEventKind::Untrip => "untrip",
        }
    }
}

/// A single sensor notification routed to one level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SensorEvent {
    pub level: LevelId,
    pub direction: Direction,
    pub kind: SensorEventKind,
}

impl SensorEvent {
    pub fn trip(level: LevelId, direction: Direction) -> Self {
        Self { level, direction, kind: SensorEventKind::Trip }
    }

    pub fn untrip(level: LevelId, direction: Direction) -> Self {
        Self { level, direction, kind: SensorEventKind::Untrip }
    }
}

/// Events the controller accepts from the dispatch runtime
#[derive(Debug, Clone, PartialEq)]
pub enum ControllerEvent {
    Sensor(SensorEvent),
    Reset,
    Unknown(String),
}

impl ControllerEvent {
    /// Resolve a named event such as `L1_entry_trip` or `reset_press`.
    ///
    /// `level_names` is the configured level table; the prefix before the
    /// first underscore must match one of its entries exactly.
    pub fn parse(name: &str, level_names: &[String]) -> Self {
        let name = name.trim();
        if name == "reset_press" || name == "reset" {
            return ControllerEvent::Reset;
        }

        let mut parts = name.splitn(3, '_');
        let (Some(level), Some(direction), Some(kind)) = (parts.next(), parts.next(), parts.next())
        else {
            return ControllerEvent::Unknown(name.to_string());
        };

        let Some(index) = level_names.iter().position(|n| n == level) else {
            return ControllerEvent::Unknown(name.to_string());
        };
        let Ok(direction) = direction.parse::<Direction>() else {
            return ControllerEvent::Unknown(name.to_string());
        };
        let kind = match kind {
            "trip" => SensorEventKind::Trip,
            "untrip" => SensorEventKind::Untrip,
            _ => return ControllerEvent::Unknown(name.to_string()),
        };

        ControllerEvent::Sensor(SensorEvent { level: LevelId(index), direction, kind })
    }
}

/// Garage-wide alert state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertState {
    #[default]
    Normal,
    FullAlert,
}

impl AlertState {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertState::Normal => "normal",
            AlertState::FullAlert => "full_alert",
        }
    }
}

/// Availability of one level as shown to drivers
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LevelAvailability {
    pub name: String,
    pub available: u32,
}
