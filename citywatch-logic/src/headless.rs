use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use anyhow::bail;
use serde::{Deserialize, Serialize};

use crate::{
    location::Position,
    prelude::*,
    settings::{ControlPosition, TileLayer},
    surface::{DrawTarget, LocationSelect, MapBackend, MapSurface, MarkerSpec},
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlacedMarker {
    pub id: u64,
    pub spec: MarkerSpec,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// Everything currently visible on a headless surface
pub struct SurfaceSnapshot {
    pub target: DrawTarget,
    pub center: Position,
    pub zoom: u8,
    pub tile_layers: Vec<TileLayer>,
    /// Markers in the order they were added
    pub markers: Vec<PlacedMarker>,
    pub zoom_control: Option<ControlPosition>,
    pub click_enabled: bool,
}

impl SurfaceSnapshot {
    /// IDs of the incidents pinned on the surface, in drawing order
    pub fn incident_ids(&self) -> Vec<String> {
        self.markers
            .iter()
            .filter_map(|m| m.spec.incident_id.clone())
            .collect()
    }
}

#[derive(Default)]
struct ProbeState {
    created: usize,
    destroyed: usize,
    fail_next: bool,
    next_marker: u64,
    live: Option<SurfaceSnapshot>,
    click: Option<LocationSelect>,
}

#[derive(Clone, Default)]
/// Window into a [HeadlessBackend], lets callers inspect the surface and act as the user
pub struct HeadlessProbe(Arc<Mutex<ProbeState>>);

impl HeadlessProbe {
    fn lock(&self) -> MutexGuard<'_, ProbeState> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn with_live(&self, f: impl FnOnce(&mut SurfaceSnapshot)) {
        if let Some(live) = self.lock().live.as_mut() {
            f(live);
        }
    }

    pub fn surfaces_created(&self) -> usize {
        self.lock().created
    }

    pub fn surfaces_destroyed(&self) -> usize {
        self.lock().destroyed
    }

    /// Copy of the live surface, `None` if no surface exists
    pub fn snapshot(&self) -> Option<SurfaceSnapshot> {
        self.lock().live.clone()
    }

    /// Make the next surface creation fail, as if the map library wasn't loaded
    pub fn fail_next_attach(&self) {
        self.lock().fail_next = true;
    }

    /// Zoom the way a user would with the controls or scroll wheel
    pub fn user_zoom(&self, zoom: u8) {
        self.with_live(|live| live.zoom = zoom);
    }

    /// Drag the map somewhere else
    pub fn user_pan(&self, center: Position) {
        self.with_live(|live| live.center = center);
    }

    /// Click the map at `at`, returns whether a handler received the click
    pub fn click(&self, at: Position) -> bool {
        let handler = self.lock().click.clone();
        if let Some(handler) = handler {
            handler(at.lat, at.lng);
            true
        } else {
            false
        }
    }
}

#[derive(Default)]
/// In-memory map library, used to drive the overlay without a browser
pub struct HeadlessBackend {
    probe: HeadlessProbe,
}

impl HeadlessBackend {
    pub fn probe(&self) -> HeadlessProbe {
        self.probe.clone()
    }
}

impl MapBackend for HeadlessBackend {
    type Surface = HeadlessSurface;

    fn create_surface(
        &mut self,
        target: &DrawTarget,
        center: Position,
        zoom: u8,
    ) -> Result<Self::Surface> {
        let mut state = self.probe.lock();

        if std::mem::take(&mut state.fail_next) {
            bail!("Map library is not available");
        }

        if state.live.is_some() {
            bail!("Element {} already has a map", target.element_id);
        }

        state.created += 1;
        state.live = Some(SurfaceSnapshot {
            target: target.clone(),
            center,
            zoom,
            tile_layers: Vec::new(),
            markers: Vec::new(),
            zoom_control: None,
            click_enabled: false,
        });

        Ok(HeadlessSurface {
            probe: self.probe.clone(),
        })
    }
}

pub struct HeadlessSurface {
    probe: HeadlessProbe,
}

#[derive(Debug)]
pub struct HeadlessMarker(u64);

impl MapSurface for HeadlessSurface {
    type Marker = HeadlessMarker;

    fn set_view(&mut self, center: Position, zoom: u8) {
        self.probe.with_live(|live| {
            live.center = center;
            live.zoom = zoom;
        });
    }

    fn zoom(&self) -> u8 {
        self.probe.lock().live.as_ref().map_or(0, |live| live.zoom)
    }

    fn add_tile_layer(&mut self, layer: &TileLayer) {
        self.probe
            .with_live(|live| live.tile_layers.push(layer.clone()));
    }

    fn add_marker(&mut self, spec: MarkerSpec) -> Self::Marker {
        let mut state = self.probe.lock();
        let id = state.next_marker;
        state.next_marker += 1;
        if let Some(live) = state.live.as_mut() {
            live.markers.push(PlacedMarker { id, spec });
        }
        HeadlessMarker(id)
    }

    fn remove_marker(&mut self, marker: Self::Marker) {
        self.probe
            .with_live(|live| live.markers.retain(|m| m.id != marker.0));
    }

    fn set_click_handler(&mut self, handler: Option<LocationSelect>) {
        let mut state = self.probe.lock();
        if let Some(live) = state.live.as_mut() {
            live.click_enabled = handler.is_some();
        }
        state.click = handler;
    }

    fn add_zoom_control(&mut self, position: ControlPosition) {
        self.probe
            .with_live(|live| live.zoom_control = Some(position));
    }

    fn resize(&mut self, height: &str) {
        self.probe
            .with_live(|live| live.target.height = height.to_string());
    }

    fn destroy(self) {
        let mut state = self.probe.lock();
        state.destroyed += 1;
        state.live = None;
        state.click = None;
    }
}
