use serde::{Deserialize, Serialize};

use crate::location::{FALLBACK_POSITION, Position};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, specta::Type)]
/// Corner of the map a control is placed in
pub enum ControlPosition {
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, specta::Type)]
/// Base layer of map tiles drawn under all markers
pub struct TileLayer {
    /// URL template with `{s}`, `{z}`, `{x}` and `{y}` placeholders
    pub url_template: String,
    /// HTML credit shown in the corner of the map
    pub attribution: String,
}

impl Default for TileLayer {
    fn default() -> Self {
        Self {
            url_template: "https://{s}.tile.openstreetmap.org/{z}/{x}/{y}.png".to_string(),
            attribution: "&copy; <a href=\"https://www.openstreetmap.org/copyright\">OpenStreetMap</a> contributors".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, specta::Type)]
#[serde(default)]
/// Settings for how the incident map is drawn
pub struct MapSettings {
    /// Zoom level the map opens at, the user's own zoom is kept after that
    pub default_zoom: u8,
    pub tile_layer: TileLayer,
    pub zoom_control: ControlPosition,
    /// Text in the label above the user's own marker
    pub user_label: String,
    /// CSS height of the map element when the view doesn't specify one
    pub default_height: String,
    /// Position used when the platform can't locate the user
    pub fallback_position: Position,
}

impl Default for MapSettings {
    fn default() -> Self {
        Self {
            default_zoom: 13,
            tile_layer: TileLayer::default(),
            zoom_control: ControlPosition::TopRight,
            user_label: "Your Location".to_string(),
            default_height: "400px".to_string(),
            fallback_position: FALLBACK_POSITION,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_settings_fill_defaults() {
        let settings =
            serde_json::from_str::<MapSettings>(r#"{ "default_zoom": 16 }"#).expect("Failed to parse");
        assert_eq!(settings.default_zoom, 16);
        assert_eq!(settings.zoom_control, ControlPosition::TopRight);
        assert_eq!(settings.fallback_position, FALLBACK_POSITION);
        assert_eq!(settings.user_label, "Your Location");
    }
}
