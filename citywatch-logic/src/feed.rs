use chrono::{Duration, TimeDelta};
use serde::{Deserialize, Serialize};

use crate::{
    incident::{Category, Incident, Severity, UtcDT},
    location::Position,
};

/// The incidents shown on the dashboard while there's no live feed, reported relative to `now`
pub fn sample_incidents(now: UtcDT) -> Vec<Incident> {
    let mk = |id: &str,
              at: Position,
              kind: &str,
              description: &str,
              severity: Severity,
              category: Category,
              place: &str,
              age: TimeDelta| Incident {
        category: Some(category),
        place: Some(place.to_string()),
        reported_at: Some(now - age),
        ..Incident::new(id, at, kind, description, severity)
    };

    vec![
        mk(
            "1",
            Position::new(12.9716, 77.5946),
            "Traffic Accident",
            "Multi-vehicle collision on MG Road",
            Severity::High,
            Category::Traffic,
            "MG Road, Bengaluru",
            Duration::minutes(2),
        ),
        mk(
            "2",
            Position::new(12.9698, 77.5986),
            "Road Closure",
            "Construction work blocking lane",
            Severity::Medium,
            Category::Construction,
            "Brigade Road, Bengaluru",
            Duration::minutes(15),
        ),
        mk(
            "3",
            Position::new(12.975, 77.59),
            "Water Logging",
            "Heavy rainfall causing waterlogging",
            Severity::Low,
            Category::Weather,
            "Cubbon Park Area",
            Duration::hours(1),
        ),
    ]
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, specta::Type)]
#[serde(rename_all = "lowercase")]
/// Event type filter of the dashboard sidebar
pub enum CategoryFilter {
    #[default]
    All,
    Traffic,
    Construction,
    Weather,
    Emergency,
}

impl CategoryFilter {
    fn matches(&self, category: Option<Category>) -> bool {
        match self {
            Self::All => true,
            Self::Traffic => matches!(category, Some(Category::Traffic | Category::RoadDamage)),
            Self::Construction => category == Some(Category::Construction),
            Self::Weather => category == Some(Category::Weather),
            Self::Emergency => category == Some(Category::Emergency),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, specta::Type)]
#[serde(rename_all = "lowercase")]
pub enum DateRange {
    #[default]
    Today,
    Week,
    Month,
}

impl DateRange {
    fn max_age(&self) -> TimeDelta {
        match self {
            Self::Today => Duration::days(1),
            Self::Week => Duration::weeks(1),
            Self::Month => Duration::days(30),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, specta::Type)]
#[serde(default)]
pub struct FeedFilter {
    pub category: CategoryFilter,
    pub range: DateRange,
    /// Text typed into the location box, matched case-insensitively against the place name
    pub location: Option<String>,
}

impl FeedFilter {
    /// Incidents passing the filter, newest first. Incidents without a report time are
    /// kept and sorted last.
    pub fn apply(&self, incidents: &[Incident], now: UtcDT) -> Vec<Incident> {
        let oldest = now - self.range.max_age();
        let needle = self
            .location
            .as_deref()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_lowercase);
        let mut out = incidents
            .iter()
            .filter(|i| self.category.matches(i.category))
            .filter(|i| match &needle {
                Some(needle) => i
                    .place
                    .as_ref()
                    .is_some_and(|place| place.to_lowercase().contains(needle.as_str())),
                None => true,
            })
            .filter(|i| i.reported_at.is_none_or(|at| at >= oldest))
            .cloned()
            .collect::<Vec<_>>();
        // Stable, so equal times keep their input order
        out.sort_by(|a, b| b.reported_at.cmp(&a.reported_at));
        out
    }
}

fn plural(n: i64, unit: &str) -> String {
    if n == 1 {
        format!("1 {unit} ago")
    } else {
        format!("{n} {unit}s ago")
    }
}

/// Age of a report the way the incident feed shows it, e.g. "15 mins ago"
pub fn relative_age(then: UtcDT, now: UtcDT) -> String {
    let age = now - then;
    if age < Duration::minutes(1) {
        "just now".to_string()
    } else if age < Duration::hours(1) {
        plural(age.num_minutes(), "min")
    } else if age < Duration::days(1) {
        plural(age.num_hours(), "hour")
    } else {
        plural(age.num_days(), "day")
    }
}
