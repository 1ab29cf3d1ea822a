use log::{debug, info};
use serde::{Deserialize, Serialize};
use tokio::{sync::watch, task::JoinHandle};
use tokio_util::sync::{CancellationToken, DropGuard};

use crate::{
    incident::Incident,
    location::LocationHandle,
    overlay::{MapOverlay, ReconcileOutcome},
    prelude::*,
    surface::{DrawTarget, LocationSelect, MapBackend},
};

#[derive(Clone, Default)]
/// What a page hands to its map
pub struct MapProps {
    pub incidents: Vec<Incident>,
    /// CSS height of the map, uses the settings' default if `None`
    pub height: Option<String>,
    pub on_location_select: Option<LocationSelect>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, specta::Type)]
pub enum RenderStatus {
    /// Waiting for a position or for the surface to attach, show the loading placeholder
    #[default]
    Loading,
    /// The surface is up and showing the current incidents
    Ready,
    /// The view was torn down
    Unmounted,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, specta::Type)]
/// Published after every reconcile pass
pub struct RenderReport {
    pub status: RenderStatus,
    /// Incident pins currently drawn
    pub markers: usize,
    /// Number of reconcile passes so far
    pub passes: u64,
}

/// A map on a page, re-reconciles whenever the location state or its props change
pub struct MapView<B: MapBackend> {
    overlay: MapOverlay<B>,
    element_id: String,
    location: LocationHandle,
    props: watch::Receiver<MapProps>,
    report: watch::Sender<RenderReport>,
    cancel: CancellationToken,
}

impl<B: MapBackend> MapView<B> {
    pub fn new(
        overlay: MapOverlay<B>,
        element_id: impl Into<String>,
        location: LocationHandle,
        props: watch::Receiver<MapProps>,
    ) -> Self {
        let (report, _) = watch::channel(RenderReport::default());
        Self {
            overlay,
            element_id: element_id.into(),
            location,
            props,
            report,
            cancel: CancellationToken::new(),
        }
    }

    fn height_of(&self, props: &MapProps) -> String {
        props
            .height
            .clone()
            .unwrap_or_else(|| self.overlay.settings().default_height.clone())
    }

    fn render(&mut self) -> Result {
        let state = self.location.state()?;
        let props = self.props.borrow_and_update().clone();

        let height = self.height_of(&props);
        self.overlay.resize(&height);

        let outcome = self.overlay.reconcile(
            state.position,
            &props.incidents,
            props.on_location_select.as_ref(),
        );

        if outcome == ReconcileOutcome::AttachFailed {
            info!("Map for {} is still loading", self.element_id);
        }

        let status = if self.overlay.is_ready() {
            RenderStatus::Ready
        } else {
            RenderStatus::Loading
        };
        let markers = self.overlay.marker_count();

        self.report.send_modify(|report| {
            report.status = status;
            report.markers = markers;
            report.passes += 1;
        });

        Ok(())
    }

    async fn run(&mut self) -> Result {
        self.render()?;

        loop {
            tokio::select! {
                biased;

                _ = self.cancel.cancelled() => {
                    break Ok(());
                }

                res = self.location.changed() => {
                    if let Err(why) = res {
                        break Err(why).context("Map lost its location provider");
                    }
                    self.render()?;
                }

                res = self.props.changed() => {
                    if res.is_err() {
                        debug!("Props for {} dropped, stopping", self.element_id);
                        break Ok(());
                    }
                    self.render()?;
                }
            }
        }
    }

    /// Attach to the element and keep reconciling until cancelled. The surface is destroyed
    /// however the loop exits.
    pub async fn main_loop(mut self) -> Result {
        let height = self.height_of(&self.props.borrow());
        self.overlay
            .attach(DrawTarget::new(self.element_id.clone(), height));

        let res = self.run().await;

        self.overlay.close();
        self.report
            .send_modify(|report| report.status = RenderStatus::Unmounted);

        res
    }

    /// Spawn the view's loop
    pub fn mount(self) -> MountedView {
        let cancel = self.cancel.clone();
        let report = self.report.subscribe();
        let task = tokio::spawn(self.main_loop());
        MountedView {
            guard: cancel.clone().drop_guard(),
            cancel,
            report,
            task,
        }
    }
}

/// A running [MapView], dropping it unmounts the view
pub struct MountedView {
    cancel: CancellationToken,
    guard: DropGuard,
    report: watch::Receiver<RenderReport>,
    task: JoinHandle<Result>,
}

impl MountedView {
    pub fn report(&self) -> RenderReport {
        *self.report.borrow()
    }

    /// Wait until a published report satisfies `f`
    pub async fn wait_until(
        &mut self,
        mut f: impl FnMut(&RenderReport) -> bool,
    ) -> Result<RenderReport> {
        let report = self
            .report
            .wait_for(|r| f(r))
            .await
            .map(|r| *r)
            .context("Map view stopped")?;
        Ok(report)
    }

    /// Wait for the loop to stop on its own, returns how it ended
    pub async fn join(self) -> Result {
        let Self { task, guard, .. } = self;
        let res = task.await.context("Map view task panicked")?;
        drop(guard);
        res
    }

    /// Stop the loop and destroy the surface, returns how the loop ended
    pub async fn unmount(self) -> Result {
        self.cancel.cancel();
        self.join().await
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::{
        headless::{HeadlessBackend, HeadlessProbe},
        location::{LocationProvider, Position},
        settings::MapSettings,
        tests::{MockLocation, ScriptedLocation, mk_incidents},
    };
    use tokio::{task::yield_now, test};

    const HOME: Position = Position::new(12.9352, 77.6245);

    fn mk_view(
        location: LocationHandle,
        props: MapProps,
    ) -> (MapView<HeadlessBackend>, HeadlessProbe, watch::Sender<MapProps>) {
        let backend = HeadlessBackend::default();
        let probe = backend.probe();
        let overlay = MapOverlay::new(backend, MapSettings::default());
        let (tx, rx) = watch::channel(props);
        (MapView::new(overlay, "live-map", location, rx), probe, tx)
    }

    fn with_incidents(count: usize) -> MapProps {
        MapProps {
            incidents: mk_incidents(count),
            ..Default::default()
        }
    }

    #[test]
    async fn test_loading_until_located() {
        let (service, script) = ScriptedLocation::new();
        let provider = LocationProvider::new(service);
        let (view, probe, _props) = mk_view(provider.handle(), with_incidents(3));

        let mut mounted = view.mount();
        let report = mounted.wait_until(|r| r.passes >= 1).await.unwrap();
        assert_eq!(report.status, RenderStatus::Loading);
        assert_eq!(probe.surfaces_created(), 0);

        script.send(Ok(HOME)).await.unwrap();
        let report = mounted
            .wait_until(|r| r.status == RenderStatus::Ready)
            .await
            .unwrap();
        assert_eq!(report.markers, 3);

        let snap = probe.snapshot().unwrap();
        assert_eq!(snap.center, HOME);
        assert_eq!(snap.target.height, "400px");
        assert_eq!(snap.target.element_id, "live-map");

        mounted.unmount().await.unwrap();
        assert_eq!(probe.surfaces_destroyed(), 1);
    }

    #[test]
    async fn test_props_change_redraws() {
        let provider = LocationProvider::new(MockLocation::Fix(HOME));
        let (view, probe, props) = mk_view(provider.handle(), with_incidents(5));

        let mut mounted = view.mount();
        mounted
            .wait_until(|r| r.status == RenderStatus::Ready && r.markers == 5)
            .await
            .unwrap();

        let passes = mounted.report().passes;
        props.send_replace(with_incidents(0));
        let report = mounted.wait_until(|r| r.passes > passes).await.unwrap();
        assert_eq!(report.markers, 0);
        assert_eq!(probe.snapshot().unwrap().incident_ids().len(), 0);

        let passes = mounted.report().passes;
        props.send_replace(with_incidents(3));
        mounted.wait_until(|r| r.passes > passes).await.unwrap();

        // Same list again, still exactly three pins
        let passes = mounted.report().passes;
        props.send_replace(with_incidents(3));
        let report = mounted.wait_until(|r| r.passes > passes).await.unwrap();
        assert_eq!(report.markers, 3);
        assert_eq!(probe.snapshot().unwrap().incident_ids().len(), 3);
        assert_eq!(probe.surfaces_created(), 1);

        mounted.unmount().await.unwrap();
    }

    #[test]
    async fn test_custom_height() {
        let provider = LocationProvider::new(MockLocation::Fix(HOME));
        let props = MapProps {
            height: Some("calc(100vh - 240px)".to_string()),
            ..Default::default()
        };
        let (view, probe, _props) = mk_view(provider.handle(), props);
        let mut mounted = view.mount();
        mounted
            .wait_until(|r| r.status == RenderStatus::Ready)
            .await
            .unwrap();
        assert_eq!(probe.snapshot().unwrap().target.height, "calc(100vh - 240px)");
        mounted.unmount().await.unwrap();
    }

    #[test]
    async fn test_height_follows_props() {
        let provider = LocationProvider::new(MockLocation::Fix(HOME));
        let props = MapProps {
            height: Some("400px".to_string()),
            ..with_incidents(1)
        };
        let (view, probe, props) = mk_view(provider.handle(), props);
        let mut mounted = view.mount();
        let report = mounted
            .wait_until(|r| r.status == RenderStatus::Ready)
            .await
            .unwrap();

        props.send_modify(|p| p.height = Some("600px".to_string()));
        let report = mounted
            .wait_until(|r| r.passes > report.passes)
            .await
            .unwrap();
        let snap = probe.snapshot().unwrap();
        assert_eq!(snap.target.height, "600px");
        assert_eq!(snap.incident_ids().len(), 1);
        assert_eq!(probe.surfaces_created(), 1);

        props.send_modify(|p| p.height = None);
        mounted
            .wait_until(|r| r.passes > report.passes)
            .await
            .unwrap();
        assert_eq!(probe.snapshot().unwrap().target.height, "400px");
        mounted.unmount().await.unwrap();
    }

    #[test]
    async fn test_unmount_mid_request() {
        let (service, script) = ScriptedLocation::new();
        let provider = LocationProvider::new(service);
        let (view, probe, _props) = mk_view(provider.handle(), with_incidents(2));

        let mut mounted = view.mount();
        mounted.wait_until(|r| r.passes >= 1).await.unwrap();
        mounted.unmount().await.unwrap();

        // Location resolves after the view is gone
        script.send(Ok(HOME)).await.unwrap();
        for _ in 0..5 {
            yield_now().await;
        }

        assert_eq!(provider.state().position, Some(HOME));
        assert_eq!(probe.surfaces_created(), 0);
        assert!(probe.snapshot().is_none());
    }

    #[test]
    async fn test_provider_dropped() {
        let provider = LocationProvider::new(MockLocation::Fix(HOME));
        let (view, probe, _props) = mk_view(provider.handle(), with_incidents(1));

        let mut mounted = view.mount();
        mounted
            .wait_until(|r| r.status == RenderStatus::Ready)
            .await
            .unwrap();

        drop(provider);

        let res = tokio::time::timeout(Duration::from_secs(5), mounted.join())
            .await
            .expect("View didn't stop");
        assert!(res.is_err(), "View kept running without a provider");
        assert_eq!(probe.surfaces_destroyed(), 1);
    }

    #[test]
    async fn test_props_dropped_stops_view() {
        let provider = LocationProvider::new(MockLocation::Fix(HOME));
        let (view, probe, props) = mk_view(provider.handle(), with_incidents(1));
        let mut mounted = view.mount();
        mounted
            .wait_until(|r| r.status == RenderStatus::Ready)
            .await
            .unwrap();

        drop(props);
        mounted
            .wait_until(|r| r.status == RenderStatus::Unmounted)
            .await
            .unwrap();
        assert!(mounted.unmount().await.is_ok());
        assert_eq!(probe.surfaces_destroyed(), 1);
    }

    #[test]
    async fn test_attach_failure_retries_on_next_change() {
        let (service, script) = ScriptedLocation::new();
        let provider = LocationProvider::new(service);
        let (view, probe, props) = mk_view(provider.handle(), with_incidents(2));
        probe.fail_next_attach();

        let mut mounted = view.mount();
        mounted.wait_until(|r| r.passes >= 1).await.unwrap();

        script.send(Ok(HOME)).await.unwrap();
        let report = mounted.wait_until(|r| r.passes >= 2).await.unwrap();
        assert_eq!(report.status, RenderStatus::Loading);
        assert_eq!(report.markers, 0);
        assert_eq!(probe.surfaces_created(), 0);

        props.send_modify(|_| {});
        let report = mounted
            .wait_until(|r| r.status == RenderStatus::Ready)
            .await
            .unwrap();
        assert_eq!(report.markers, 2);

        mounted.unmount().await.unwrap();
    }

    #[test]
    async fn test_rerequest_recenters_keeping_zoom() {
        let (service, script) = ScriptedLocation::new();
        let provider = LocationProvider::new(service);
        let (view, probe, _props) = mk_view(provider.handle(), with_incidents(1));

        let mut mounted = view.mount();
        script.send(Err("User denied Geolocation".to_string())).await.unwrap();
        mounted
            .wait_until(|r| r.status == RenderStatus::Ready)
            .await
            .unwrap();
        assert_eq!(
            probe.snapshot().unwrap().center,
            crate::location::FALLBACK_POSITION
        );

        probe.user_zoom(16);
        provider.request_location();
        script.send(Ok(HOME)).await.unwrap();

        loop {
            if probe.snapshot().is_some_and(|s| s.center == HOME) {
                break;
            }
            let passes = mounted.report().passes;
            mounted.wait_until(|r| r.passes > passes).await.unwrap();
        }

        let snap = probe.snapshot().unwrap();
        assert_eq!(snap.zoom, 16);
        assert_eq!(snap.incident_ids().len(), 1);

        mounted.unmount().await.unwrap();
    }
}
