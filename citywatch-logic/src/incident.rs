use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::location::Position;

/// Convenience alias for UTC DT
pub type UtcDT = DateTime<Utc>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, specta::Type)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    /// Pin color used on the map
    pub fn color(&self) -> &'static str {
        match self {
            Self::High => "#ef4444",
            Self::Medium => "#f59e0b",
            Self::Low => "#10b981",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, specta::Type)]
#[serde(rename_all = "kebab-case")]
/// What kind of problem an incident is, matches the choices on the reporting form
pub enum Category {
    Traffic,
    RoadDamage,
    Construction,
    Weather,
    Emergency,
    Other,
}

impl Category {
    /// Human readable name, used as the incident type when a report is submitted
    pub fn title(&self) -> &'static str {
        match self {
            Self::Traffic => "Traffic Incident",
            Self::RoadDamage => "Road Damage",
            Self::Construction => "Construction Issue",
            Self::Weather => "Weather Related",
            Self::Emergency => "Emergency",
            Self::Other => "Other",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, specta::Type)]
/// Something happening in the city that should be pinned on the map
pub struct Incident {
    pub id: String,
    pub lat: f64,
    pub lng: f64,
    /// Short title, e.g. "Traffic Accident"
    #[serde(rename = "type")]
    pub kind: String,
    pub description: String,
    pub severity: Severity,
    #[serde(default)]
    pub category: Option<Category>,
    /// Name of the place, shown in the incident feed
    #[serde(default)]
    pub place: Option<String>,
    #[serde(default)]
    pub reported_at: Option<UtcDT>,
}

impl Incident {
    pub fn new(
        id: impl Into<String>,
        at: Position,
        kind: impl Into<String>,
        description: impl Into<String>,
        severity: Severity,
    ) -> Self {
        Self {
            id: id.into(),
            lat: at.lat,
            lng: at.lng,
            kind: kind.into(),
            description: description.into(),
            severity,
            category: None,
            place: None,
            reported_at: None,
        }
    }

    pub fn position(&self) -> Position {
        Position::new(self.lat, self.lng)
    }
}
