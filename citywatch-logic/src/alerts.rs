use anyhow::bail;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::prelude::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, specta::Type)]
/// Kinds of events a subscription can be notified about
pub enum AlertEvent {
    Traffic,
    Emergency,
    Construction,
    Weather,
    #[serde(rename = "Road Closure")]
    RoadClosure,
}

impl AlertEvent {
    pub fn title(&self) -> &'static str {
        match self {
            Self::Traffic => "Traffic",
            Self::Emergency => "Emergency",
            Self::Construction => "Construction",
            Self::Weather => "Weather",
            Self::RoadClosure => "Road Closure",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, specta::Type)]
#[serde(rename_all = "lowercase")]
pub enum AlertFrequency {
    Immediate,
    Hourly,
    Daily,
    Weekly,
}

impl AlertFrequency {
    /// Name shown on the subscription card
    pub fn label(&self) -> &'static str {
        match self {
            Self::Immediate => "Immediate",
            Self::Hourly => "Hourly Digest",
            Self::Daily => "Daily Digest",
            Self::Weekly => "Weekly Summary",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, specta::Type)]
pub enum AlertStatus {
    #[default]
    Active,
    Paused,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, specta::Type)]
/// A request to be told about events around a place
pub struct AlertSubscription {
    pub id: String,
    pub location: String,
    pub event_types: Vec<AlertEvent>,
    pub frequency: AlertFrequency,
    pub status: AlertStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, specta::Type)]
#[serde(default)]
/// The "create subscription" form
pub struct AlertDraft {
    pub location: String,
    /// Checked event types, in the order they were checked
    pub event_types: Vec<AlertEvent>,
    pub frequency: Option<AlertFrequency>,
}

impl AlertDraft {
    /// Check or uncheck an event type
    pub fn toggle_event(&mut self, event: AlertEvent, checked: bool) {
        let present = self.event_types.contains(&event);
        if checked && !present {
            self.event_types.push(event);
        } else if !checked {
            self.event_types.retain(|e| *e != event);
        }
    }

    /// Whether the form has everything needed to create a subscription
    pub fn is_complete(&self) -> bool {
        !self.location.trim().is_empty()
            && !self.event_types.is_empty()
            && self.frequency.is_some()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, specta::Type)]
/// The user's alert subscriptions, in creation order
pub struct AlertBook {
    subscriptions: Vec<AlertSubscription>,
}

impl AlertBook {
    /// Book seeded with the subscriptions shown before any are created
    pub fn with_samples() -> Self {
        let mk = |id: &str, location: &str, event_types: &[AlertEvent], frequency, status| {
            AlertSubscription {
                id: id.to_string(),
                location: location.to_string(),
                event_types: event_types.to_vec(),
                frequency,
                status,
            }
        };

        Self {
            subscriptions: vec![
                mk(
                    "1",
                    "MG Road, Bengaluru",
                    &[AlertEvent::Traffic, AlertEvent::Emergency],
                    AlertFrequency::Immediate,
                    AlertStatus::Active,
                ),
                mk(
                    "2",
                    "Whitefield, Bengaluru",
                    &[AlertEvent::Construction, AlertEvent::RoadClosure],
                    AlertFrequency::Daily,
                    AlertStatus::Active,
                ),
                mk(
                    "3",
                    "Electronic City",
                    &[AlertEvent::Weather, AlertEvent::Traffic],
                    AlertFrequency::Weekly,
                    AlertStatus::Paused,
                ),
            ],
        }
    }

    pub fn subscriptions(&self) -> &[AlertSubscription] {
        &self.subscriptions
    }

    /// Create an active subscription from the draft and clear the form.
    ///
    /// An incomplete draft is left untouched.
    pub fn create(&mut self, draft: &mut AlertDraft) -> Result<&AlertSubscription> {
        let Some(frequency) = draft.frequency else {
            bail!("Select a notification frequency");
        };
        if draft.location.trim().is_empty() {
            bail!("Enter a location for the alert");
        }
        if draft.event_types.is_empty() {
            bail!("Select at least one event type");
        }

        let AlertDraft {
            location,
            event_types,
            ..
        } = std::mem::take(draft);

        let sub = AlertSubscription {
            id: Uuid::new_v4().to_string(),
            location: location.trim().to_string(),
            event_types,
            frequency,
            status: AlertStatus::Active,
        };

        let idx = self.subscriptions.len();
        self.subscriptions.push(sub);
        Ok(&self.subscriptions[idx])
    }

    /// Remove the subscription with `id`, returns whether one was removed
    pub fn delete(&mut self, id: &str) -> bool {
        let before = self.subscriptions.len();
        self.subscriptions.retain(|sub| sub.id != id);
        self.subscriptions.len() != before
    }
}
