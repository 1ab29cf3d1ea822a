use std::sync::{Arc, Mutex, PoisonError};

use anyhow::bail;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    incident::{Category, Incident, Severity, UtcDT},
    location::Position,
    prelude::*,
    surface::LocationSelect,
};

#[derive(Clone)]
/// Remembers the last spot the user clicked on the map
pub struct LocationPick {
    picked: Arc<Mutex<Option<Position>>>,
    callback: LocationSelect,
}

impl Default for LocationPick {
    fn default() -> Self {
        let picked = Arc::new(Mutex::new(None));
        let callback: LocationSelect = {
            let picked = picked.clone();
            Arc::new(move |lat, lng| {
                *picked.lock().unwrap_or_else(PoisonError::into_inner) =
                    Some(Position::new(lat, lng));
            })
        };
        Self { picked, callback }
    }
}

impl LocationPick {
    /// Callback to hand to the map as `on_location_select`. The same callback is returned
    /// every time so the map doesn't rewire its click handler.
    pub fn callback(&self) -> LocationSelect {
        self.callback.clone()
    }

    pub fn get(&self) -> Option<Position> {
        *self.picked.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, specta::Type)]
/// An issue report being filled out by the user
pub struct ReportDraft {
    pub category: Option<Category>,
    pub description: String,
    /// Picked by clicking on the map
    pub location: Option<Position>,
    /// Defaults to medium when not set
    pub severity: Option<Severity>,
}

impl ReportDraft {
    /// Take the location from a map pick, if one was made
    pub fn with_pick(mut self, pick: &LocationPick) -> Self {
        if let Some(location) = pick.get() {
            self.location = Some(location);
        }
        self
    }

    /// Turn the draft into an incident that can be put on the map
    pub fn submit(self, now: UtcDT) -> Result<Incident> {
        let Some(category) = self.category else {
            bail!("Select an issue type");
        };

        let description = self.description.trim();
        if description.is_empty() {
            bail!("Describe the issue");
        }

        let Some(location) = self.location else {
            bail!("Click on the map to select the issue location");
        };

        let id = Uuid::new_v4().to_string();
        let severity = self.severity.unwrap_or(Severity::Medium);

        Ok(Incident {
            category: Some(category),
            reported_at: Some(now),
            ..Incident::new(id, location, category.title(), description, severity)
        })
    }
}
