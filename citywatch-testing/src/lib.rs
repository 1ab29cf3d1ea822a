use std::{path::Path, time::Duration};

use citywatch_logic::{
    FeedFilter, HeadlessBackend, Incident, LocationPick, LocationProvider, LocationService,
    LocationState, MapOverlay, MapProps, MapSettings, MapView, Position, RenderReport,
    RenderStatus, ReportDraft, SurfaceSnapshot, UtcDT, sample_incidents,
};
use log::info;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

pub mod prelude {
    pub use anyhow::{Context, anyhow, bail};
    pub type Result<T = (), E = anyhow::Error> = std::result::Result<T, E>;
}

pub use prelude::*;

/// How long to wait for the map to come up before giving up
const READY_TIMEOUT: Duration = Duration::from_secs(30);

const MAP_ELEMENT: &str = "live-map";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// What the simulated platform answers when asked for a position
pub enum LocationOutcome {
    Fix(Position),
    Denied(String),
    Unsupported,
}

impl Default for LocationOutcome {
    fn default() -> Self {
        Self::Fix(Position::new(12.9352, 77.6245))
    }
}

/// Location service answering with a canned outcome after a delay
pub struct SimulatedLocation {
    outcome: LocationOutcome,
    delay: Duration,
}

impl SimulatedLocation {
    pub fn new(outcome: LocationOutcome, delay: Duration) -> Self {
        Self { outcome, delay }
    }
}

impl LocationService for SimulatedLocation {
    fn is_supported(&self) -> bool {
        self.outcome != LocationOutcome::Unsupported
    }

    async fn current_position(&self) -> Result<Position, String> {
        tokio::time::sleep(self.delay).await;
        match &self.outcome {
            LocationOutcome::Fix(pos) => Ok(*pos),
            LocationOutcome::Denied(why) => Err(why.clone()),
            LocationOutcome::Unsupported => Err("Geolocation is not supported".to_string()),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
/// A scenario for the driver, every field is optional in the file
pub struct Scenario {
    pub settings: MapSettings,
    pub location: LocationOutcome,
    /// How long the simulated platform takes to answer
    pub delay_ms: u64,
    /// Incidents to show, the dashboard samples are used if missing
    pub incidents: Option<Vec<Incident>>,
    pub filter: FeedFilter,
    pub height: Option<String>,
}

impl Scenario {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read scenario {}", path.display()))?;
        serde_json::from_str(&raw).context("Failed to parse scenario")
    }

    pub fn location_service(&self) -> SimulatedLocation {
        SimulatedLocation::new(self.location.clone(), Duration::from_millis(self.delay_ms))
    }

    /// Incidents that pass the scenario's filter
    pub fn incidents(&self, now: UtcDT) -> Vec<Incident> {
        match &self.incidents {
            Some(incidents) => self.filter.apply(incidents, now),
            None => self.filter.apply(&sample_incidents(now), now),
        }
    }
}

/// A report to file by clicking the map
pub struct ReportRequest {
    pub draft: ReportDraft,
    pub click: Position,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriveOutput {
    pub location: LocationState,
    pub report: RenderReport,
    pub surface: Option<SurfaceSnapshot>,
    /// Incident created from the report, if one was filed
    pub created: Option<Incident>,
}

/// Mount a map for the scenario, optionally file a report through it, and capture what ended
/// up on the surface. The map is unmounted before returning.
pub async fn drive(
    scenario: &Scenario,
    now: UtcDT,
    request: Option<ReportRequest>,
) -> Result<DriveOutput> {
    let provider = LocationProvider::with_fallback(
        scenario.location_service(),
        scenario.settings.fallback_position,
    );

    let backend = HeadlessBackend::default();
    let probe = backend.probe();
    let overlay = MapOverlay::new(backend, scenario.settings.clone());
    let pick = LocationPick::default();

    let incidents = scenario.incidents(now);
    info!("Showing {} incidents", incidents.len());

    let (props, props_rx) = watch::channel(MapProps {
        incidents,
        height: scenario.height.clone(),
        on_location_select: Some(pick.callback()),
    });

    let mut mounted = MapView::new(overlay, MAP_ELEMENT, provider.handle(), props_rx).mount();

    tokio::time::timeout(
        READY_TIMEOUT,
        mounted.wait_until(|r| r.status == RenderStatus::Ready),
    )
    .await
    .context("Timed out waiting for the map")??;

    let created = match request {
        Some(request) => {
            if !probe.click(request.click) {
                bail!("Map isn't accepting clicks");
            }

            let incident = request.draft.with_pick(&pick).submit(now)?;
            info!("Filed report {}", incident.id);

            let passes = mounted.report().passes;
            props.send_modify(|props| props.incidents.push(incident.clone()));
            mounted.wait_until(|r| r.passes > passes).await?;

            Some(incident)
        }
        None => None,
    };

    let output = DriveOutput {
        location: provider.state(),
        report: mounted.report(),
        surface: probe.snapshot(),
        created,
    };

    mounted.unmount().await?;

    Ok(output)
}
