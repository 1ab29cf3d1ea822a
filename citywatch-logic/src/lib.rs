mod alerts;
mod feed;
mod headless;
mod incident;
mod location;
mod overlay;
mod report;
mod settings;
mod surface;
mod view;

pub use alerts::{
    AlertBook, AlertDraft, AlertEvent, AlertFrequency, AlertStatus, AlertSubscription,
};
pub use feed::{CategoryFilter, DateRange, FeedFilter, relative_age, sample_incidents};
pub use headless::{
    HeadlessBackend, HeadlessMarker, HeadlessProbe, HeadlessSurface, PlacedMarker, SurfaceSnapshot,
};
pub use incident::{Category, Incident, Severity, UtcDT};
pub use location::{
    FALLBACK_POSITION, LocationError, LocationHandle, LocationProvider, LocationService,
    LocationState, Position,
};
pub use overlay::{MapOverlay, ReconcileOutcome};
pub use report::{LocationPick, ReportDraft};
pub use settings::{ControlPosition, MapSettings, TileLayer};
pub use surface::{
    DrawTarget, Label, LocationSelect, MapBackend, MapSurface, MarkerIcon, MarkerSpec,
};
pub use view::{MapProps, MapView, MountedView, RenderReport, RenderStatus};

pub mod prelude {
    use anyhow::Error as AnyhowError;
    use std::result::Result as StdResult;
    pub type Result<T = (), E = AnyhowError> = StdResult<T, E>;
    pub use anyhow::Context;
}
