use std::sync::Arc;

use log::{debug, error};

use crate::{
    incident::Incident,
    location::Position,
    settings::MapSettings,
    surface::{DrawTarget, LocationSelect, MapBackend, MapSurface, MarkerSpec},
};

type MarkerOf<B> = <<B as MapBackend>::Surface as MapSurface>::Marker;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// What a call to [MapOverlay::reconcile] ended up doing
pub enum ReconcileOutcome {
    /// No position yet or no drawing target, nothing was touched
    Skipped,
    /// The surface couldn't be attached, the view stays in its loading state
    AttachFailed,
    /// The surface was created on this call and `markers` incident pins were drawn
    Created { markers: usize },
    /// An existing surface was re-centered and `markers` incident pins were redrawn
    Updated { markers: usize },
}

/// Keeps one map surface in sync with a position and a list of incidents.
///
/// The surface is created lazily on the first reconcile that has a position and a target, and
/// is destroyed by [MapOverlay::close] or when the overlay is dropped.
pub struct MapOverlay<B: MapBackend> {
    backend: B,
    settings: MapSettings,
    target: Option<DrawTarget>,
    surface: Option<B::Surface>,
    markers: Vec<MarkerOf<B>>,
    wired_select: Option<LocationSelect>,
}

fn same_callback(a: Option<&LocationSelect>, b: Option<&LocationSelect>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => Arc::ptr_eq(a, b),
        (None, None) => true,
        _ => false,
    }
}

impl<B: MapBackend> MapOverlay<B> {
    pub fn new(backend: B, settings: MapSettings) -> Self {
        Self {
            backend,
            settings,
            target: None,
            surface: None,
            markers: Vec::new(),
            wired_select: None,
        }
    }

    /// Set the element the surface will draw into
    pub fn attach(&mut self, target: DrawTarget) {
        self.target = Some(target);
    }

    pub fn target(&self) -> Option<&DrawTarget> {
        self.target.as_ref()
    }

    /// Change the height of the drawing element, a live surface is restyled right away
    pub fn resize(&mut self, height: &str) {
        let Some(target) = self.target.as_mut() else {
            return;
        };
        if target.height == height {
            return;
        }

        debug!("Resizing map in {} to {height}", target.element_id);
        target.height = height.to_string();
        if let Some(surface) = self.surface.as_mut() {
            surface.resize(height);
        }
    }

    /// A surface exists and is showing markers
    pub fn is_ready(&self) -> bool {
        self.surface.is_some()
    }

    /// Number of incident pins currently drawn
    pub fn marker_count(&self) -> usize {
        self.markers.len()
    }

    pub fn settings(&self) -> &MapSettings {
        &self.settings
    }

    fn open(
        &mut self,
        position: Position,
        on_select: Option<&LocationSelect>,
    ) -> Option<&mut B::Surface> {
        let target = self.target.as_ref()?;

        let mut surface =
            match self
                .backend
                .create_surface(target, position, self.settings.default_zoom)
            {
                Ok(surface) => surface,
                Err(why) => {
                    error!("Failed to attach map surface to {}: {why:?}", target.element_id);
                    return None;
                }
            };

        surface.add_tile_layer(&self.settings.tile_layer);
        surface.add_marker(MarkerSpec::user(position, &self.settings.user_label));

        if let Some(on_select) = on_select {
            surface.set_click_handler(Some(on_select.clone()));
        }
        self.wired_select = on_select.cloned();

        surface.add_zoom_control(self.settings.zoom_control);

        debug!("Created map surface in {}", target.element_id);

        Some(self.surface.insert(surface))
    }

    /// Make the surface show exactly `incidents`, creating it first if needed.
    ///
    /// An existing surface is re-centered on `position` at its current zoom every call.
    /// Incident pins are always fully redrawn in input order.
    pub fn reconcile(
        &mut self,
        position: Option<Position>,
        incidents: &[Incident],
        on_select: Option<&LocationSelect>,
    ) -> ReconcileOutcome {
        let Some(position) = position.filter(|_| self.target.is_some()) else {
            debug!("Map not initialized: drawing target or location is missing");
            return ReconcileOutcome::Skipped;
        };

        let created = self.surface.is_none();

        if created {
            if self.open(position, on_select).is_none() {
                return ReconcileOutcome::AttachFailed;
            }
        } else if let Some(surface) = self.surface.as_mut() {
            let zoom = surface.zoom();
            surface.set_view(position, zoom);

            if !same_callback(self.wired_select.as_ref(), on_select) {
                surface.set_click_handler(on_select.cloned());
                self.wired_select = on_select.cloned();
            }
        }

        let Some(surface) = self.surface.as_mut() else {
            return ReconcileOutcome::AttachFailed;
        };

        for marker in self.markers.drain(..) {
            surface.remove_marker(marker);
        }

        self.markers.extend(
            incidents
                .iter()
                .map(|incident| surface.add_marker(MarkerSpec::incident(incident))),
        );

        let markers = self.markers.len();
        if created {
            ReconcileOutcome::Created { markers }
        } else {
            ReconcileOutcome::Updated { markers }
        }
    }

    /// Destroy the surface and detach from the drawing target, later reconciles are skipped
    /// until [MapOverlay::attach] is called again.
    pub fn close(&mut self) {
        self.target = None;
        self.markers.clear();
        self.wired_select = None;
        if let Some(surface) = self.surface.take() {
            debug!("Destroying map surface");
            surface.destroy();
        }
    }
}

impl<B: MapBackend> Drop for MapOverlay<B> {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::{
        headless::{HeadlessBackend, HeadlessProbe},
        incident::Severity,
        tests::mk_incidents,
    };

    const CENTER: Position = Position::new(12.9716, 77.5946);

    fn mk_overlay() -> (MapOverlay<HeadlessBackend>, HeadlessProbe) {
        let backend = HeadlessBackend::default();
        let probe = backend.probe();
        let mut overlay = MapOverlay::new(backend, MapSettings::default());
        overlay.attach(DrawTarget::new("map", "400px"));
        (overlay, probe)
    }

    #[test]
    fn test_skips_without_position() {
        let (mut overlay, probe) = mk_overlay();
        let outcome = overlay.reconcile(None, &mk_incidents(3), None);
        assert_eq!(outcome, ReconcileOutcome::Skipped);
        assert_eq!(probe.surfaces_created(), 0);
    }

    #[test]
    fn test_skips_without_target() {
        let backend = HeadlessBackend::default();
        let probe = backend.probe();
        let mut overlay = MapOverlay::new(backend, MapSettings::default());
        let outcome = overlay.reconcile(Some(CENTER), &mk_incidents(3), None);
        assert_eq!(outcome, ReconcileOutcome::Skipped);
        assert!(!overlay.is_ready());
        assert_eq!(probe.surfaces_created(), 0);
    }

    #[test]
    fn test_first_reconcile_builds_surface() {
        let (mut overlay, probe) = mk_overlay();
        let outcome = overlay.reconcile(Some(CENTER), &mk_incidents(2), None);
        assert_eq!(outcome, ReconcileOutcome::Created { markers: 2 });

        let snap = probe.snapshot().expect("Surface should be live");
        assert_eq!(snap.center, CENTER);
        assert_eq!(snap.zoom, 13);
        assert_eq!(snap.tile_layers.len(), 1);
        assert_eq!(snap.zoom_control, Some(crate::ControlPosition::TopRight));
        assert!(!snap.click_enabled);

        // User marker plus the two incidents
        assert_eq!(snap.markers.len(), 3);
        let user = snap
            .markers
            .iter()
            .find(|m| m.spec.incident_id.is_none())
            .expect("No user marker");
        assert!(user.spec.label.open);
        assert_eq!(user.spec.position, CENTER);
    }

    #[test]
    fn test_resize() {
        let (mut overlay, probe) = mk_overlay();
        overlay.resize("300px");
        assert_eq!(overlay.target().map(|t| t.height.as_str()), Some("300px"));

        overlay.reconcile(Some(CENTER), &mk_incidents(1), None);
        assert_eq!(probe.snapshot().unwrap().target.height, "300px");

        overlay.resize("50vh");
        assert_eq!(probe.snapshot().unwrap().target.height, "50vh");
        assert_eq!(probe.surfaces_created(), 1);

        overlay.close();
        overlay.resize("10px");
        assert_eq!(overlay.target(), None);
    }

    #[test]
    fn test_redraw_replaces_markers() {
        let (mut overlay, probe) = mk_overlay();
        overlay.reconcile(Some(CENTER), &mk_incidents(5), None);
        assert_eq!(overlay.marker_count(), 5);

        let outcome = overlay.reconcile(Some(CENTER), &[], None);
        assert_eq!(outcome, ReconcileOutcome::Updated { markers: 0 });
        assert_eq!(overlay.marker_count(), 0);

        let snap = probe.snapshot().unwrap();
        assert_eq!(snap.incident_ids(), Vec::<String>::new());
        assert_eq!(snap.markers.len(), 1, "Only the user marker should remain");
    }

    #[test]
    fn test_redraw_does_not_accumulate() {
        let (mut overlay, probe) = mk_overlay();
        let incidents = mk_incidents(3);

        for _ in 0..2 {
            overlay.reconcile(Some(CENTER), &incidents, None);
            assert_eq!(overlay.marker_count(), 3);
            assert_eq!(probe.snapshot().unwrap().incident_ids().len(), 3);
        }

        assert_eq!(probe.surfaces_created(), 1, "Surface was rebuilt");
    }

    #[test]
    fn test_markers_follow_input_order_and_severity() {
        let (mut overlay, probe) = mk_overlay();
        let mut incidents = mk_incidents(3);
        incidents[0].severity = Severity::High;
        incidents[1].severity = Severity::Medium;
        incidents[2].severity = Severity::Low;
        incidents.reverse();

        overlay.reconcile(Some(CENTER), &incidents, None);
        let snap = probe.snapshot().unwrap();
        assert_eq!(snap.incident_ids(), vec!["2", "1", "0"]);

        let colors = snap
            .markers
            .iter()
            .filter(|m| m.spec.incident_id.is_some())
            .map(|m| m.spec.icon.html.contains(Severity::Low.color()))
            .collect::<Vec<_>>();
        assert_eq!(colors, vec![true, false, false]);
    }

    #[test]
    fn test_recenter_keeps_user_zoom() {
        let (mut overlay, probe) = mk_overlay();
        overlay.reconcile(Some(CENTER), &[], None);

        probe.user_zoom(17);

        let moved = Position::new(12.98, 77.60);
        overlay.reconcile(Some(moved), &[], None);

        let snap = probe.snapshot().unwrap();
        assert_eq!(snap.center, moved);
        assert_eq!(snap.zoom, 17, "Re-centering reset the user's zoom");
    }

    #[test]
    fn test_recenters_even_if_position_unchanged() {
        let (mut overlay, probe) = mk_overlay();
        overlay.reconcile(Some(CENTER), &[], None);
        probe.user_pan(Position::new(0.0, 0.0));
        overlay.reconcile(Some(CENTER), &[], None);
        assert_eq!(probe.snapshot().unwrap().center, CENTER);
    }

    #[test]
    fn test_click_calls_select() {
        let (mut overlay, probe) = mk_overlay();
        let picked = Arc::new(Mutex::new(None));
        let on_select: LocationSelect = {
            let picked = picked.clone();
            Arc::new(move |lat: f64, lng: f64| {
                *picked.lock().unwrap() = Some((lat, lng));
            })
        };

        overlay.reconcile(Some(CENTER), &[], Some(&on_select));
        assert!(probe.snapshot().unwrap().click_enabled);

        assert!(probe.click(Position::new(12.5, 77.5)));
        assert_eq!(*picked.lock().unwrap(), Some((12.5, 77.5)));
    }

    #[test]
    fn test_changed_callback_replaces_handler() {
        let (mut overlay, probe) = mk_overlay();
        let hits = Arc::new(Mutex::new(Vec::new()));
        let mk_select = |tag: &'static str| -> LocationSelect {
            let hits = hits.clone();
            Arc::new(move |_: f64, _: f64| hits.lock().unwrap().push(tag))
        };

        let first = mk_select("first");
        let second = mk_select("second");

        overlay.reconcile(Some(CENTER), &[], Some(&first));
        overlay.reconcile(Some(CENTER), &[], Some(&second));
        probe.click(CENTER);
        assert_eq!(*hits.lock().unwrap(), vec!["second"]);

        overlay.reconcile(Some(CENTER), &[], None);
        assert!(!probe.click(CENTER), "Handler was not removed");
        assert!(!probe.snapshot().unwrap().click_enabled);
    }

    #[test]
    fn test_attach_failure_is_swallowed() {
        let backend = HeadlessBackend::default();
        let probe = backend.probe();
        probe.fail_next_attach();
        let mut overlay = MapOverlay::new(backend, MapSettings::default());
        overlay.attach(DrawTarget::new("map", "400px"));

        let outcome = overlay.reconcile(Some(CENTER), &mk_incidents(2), None);
        assert_eq!(outcome, ReconcileOutcome::AttachFailed);
        assert!(!overlay.is_ready());
        assert_eq!(overlay.marker_count(), 0);

        // Next attempt goes through
        let outcome = overlay.reconcile(Some(CENTER), &mk_incidents(2), None);
        assert_eq!(outcome, ReconcileOutcome::Created { markers: 2 });
    }

    #[test]
    fn test_close_destroys_surface() {
        let (mut overlay, probe) = mk_overlay();
        overlay.reconcile(Some(CENTER), &mk_incidents(4), None);
        overlay.close();

        assert_eq!(probe.surfaces_destroyed(), 1);
        assert!(probe.snapshot().is_none());
        assert_eq!(overlay.marker_count(), 0);

        // Closed overlays are detached, nothing gets redrawn
        let outcome = overlay.reconcile(Some(CENTER), &mk_incidents(4), None);
        assert_eq!(outcome, ReconcileOutcome::Skipped);
        assert_eq!(probe.surfaces_created(), 1);
    }

    #[test]
    fn test_drop_destroys_surface() {
        let (mut overlay, probe) = mk_overlay();
        overlay.reconcile(Some(CENTER), &[], None);
        drop(overlay);
        assert_eq!(probe.surfaces_destroyed(), 1);
    }

    #[test]
    fn test_remount_starts_clean() {
        let (mut overlay, probe) = mk_overlay();
        overlay.reconcile(Some(CENTER), &mk_incidents(2), None);
        probe.user_zoom(5);
        overlay.close();

        overlay.attach(DrawTarget::new("map", "400px"));
        let outcome = overlay.reconcile(Some(CENTER), &mk_incidents(1), None);
        assert_eq!(outcome, ReconcileOutcome::Created { markers: 1 });
        assert_eq!(probe.snapshot().unwrap().zoom, 13);
        assert_eq!(probe.surfaces_created(), 2);
    }
}
