use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::{
    incident::Incident,
    location::Position,
    prelude::*,
    settings::{ControlPosition, TileLayer},
};

/// Callback for when the user picks a spot on the map, receives latitude and longitude
pub type LocationSelect = Arc<dyn Fn(f64, f64) + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// The element a map surface draws into
pub struct DrawTarget {
    pub element_id: String,
    /// CSS height of the element
    pub height: String,
}

impl DrawTarget {
    pub fn new(element_id: impl Into<String>, height: impl Into<String>) -> Self {
        Self {
            element_id: element_id.into(),
            height: height.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// An HTML icon for a marker
pub struct MarkerIcon {
    pub class_name: String,
    pub html: String,
    pub size: (u32, u32),
    /// Point of the icon placed on the marker's coordinates
    pub anchor: (u32, u32),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// Popup bound to a marker
pub struct Label {
    pub html: String,
    /// Show the popup as soon as the marker is added
    pub open: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// Everything needed to draw one pin
pub struct MarkerSpec {
    pub position: Position,
    pub icon: MarkerIcon,
    pub label: Label,
    /// Incident this pin belongs to, `None` for the user's own marker
    pub incident_id: Option<String>,
}

const USER_COLOR: &str = "#3b82f6";

fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

impl MarkerSpec {
    /// The blue dot showing where the user is, label is open from the start
    pub fn user(position: Position, label: &str) -> Self {
        Self {
            position,
            icon: MarkerIcon {
                class_name: "user-location-marker".to_string(),
                html: format!(
                    "<div style=\"background: {USER_COLOR}; width: 16px; height: 16px; border-radius: 50%; border: 3px solid white; box-shadow: 0 0 10px rgba(59, 130, 246, 0.5);\"></div>"
                ),
                size: (22, 22),
                anchor: (11, 11),
            },
            label: Label {
                html: format!(
                    "<div style=\"color: black; font-weight: bold;\">{}</div>",
                    escape_html(label)
                ),
                open: true,
            },
            incident_id: None,
        }
    }

    /// A pin colored by the incident's severity
    pub fn incident(incident: &Incident) -> Self {
        let color = incident.severity.color();
        Self {
            position: incident.position(),
            icon: MarkerIcon {
                class_name: "incident-marker".to_string(),
                html: format!(
                    "<div style=\"background: {color}; width: 20px; height: 20px; border-radius: 50%; border: 2px solid white; box-shadow: 0 2px 8px rgba(0,0,0,0.3); display: flex; align-items: center; justify-content: center; font-size: 10px; color: white; font-weight: bold;\">!</div>"
                ),
                size: (24, 24),
                anchor: (12, 12),
            },
            label: Label {
                html: format!(
                    "<div style=\"color: black; min-width: 200px;\"><div style=\"font-weight: bold; margin-bottom: 8px; color: {color};\">{}</div><div style=\"margin-bottom: 8px; font-size: 14px;\">{}</div><div style=\"font-size: 12px; color: #666;\">Severity: <span style=\"color: {color}; font-weight: bold;\">{}</span></div></div>",
                    escape_html(&incident.kind),
                    escape_html(&incident.description),
                    incident.severity.as_str().to_uppercase(),
                ),
                open: false,
            },
            incident_id: Some(incident.id.clone()),
        }
    }
}

/// A library able to create interactive map surfaces
pub trait MapBackend: Send + 'static {
    type Surface: MapSurface;

    /// Create a surface drawing into `target`, viewing `center` at `zoom`. Fails if the
    /// underlying library or element isn't available.
    fn create_surface(
        &mut self,
        target: &DrawTarget,
        center: Position,
        zoom: u8,
    ) -> Result<Self::Surface>;
}

/// A live map, owns its viewport, layers, markers and controls
pub trait MapSurface: Send + 'static {
    type Marker: Send + 'static;

    fn set_view(&mut self, center: Position, zoom: u8);
    /// Current zoom, may have been changed by the user
    fn zoom(&self) -> u8;
    fn add_tile_layer(&mut self, layer: &TileLayer);
    /// Create a marker, bind its label and add it to the surface
    fn add_marker(&mut self, spec: MarkerSpec) -> Self::Marker;
    fn remove_marker(&mut self, marker: Self::Marker);
    /// Replace the click handler, `None` removes it
    fn set_click_handler(&mut self, handler: Option<LocationSelect>);
    fn add_zoom_control(&mut self, position: ControlPosition);
    /// Restyle the drawing element to a new CSS height
    fn resize(&mut self, height: &str);
    /// Tear the surface down, releasing all markers and listeners
    fn destroy(self);
}
