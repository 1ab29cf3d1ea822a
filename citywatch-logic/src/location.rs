use std::sync::Arc;

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::{sync::watch, task::JoinHandle};
use tokio_util::sync::CancellationToken;

/// Where the map centers when the platform can't give us a real fix (central Bengaluru)
pub const FALLBACK_POSITION: Position = Position {
    lat: 12.9716,
    lng: 77.5946,
};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, specta::Type)]
/// A point on the map as gotten from a Geolocation API
pub struct Position {
    /// Latitude
    pub lat: f64,
    /// Longitude
    pub lng: f64,
}

impl Position {
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, specta::Type)]
/// The best known position of the user along with the status of the last request
pub struct LocationState {
    /// Last resolved position, this will be the fallback position if the last request failed
    pub position: Option<Position>,
    /// Message describing why the last request failed
    pub error: Option<String>,
    /// A request is currently in flight
    pub loading: bool,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LocationError {
    #[error("Geolocation is not supported by this platform.")]
    Unavailable,
    #[error("{0}")]
    Resolution(String),
    #[error("Location state must be used within an active LocationProvider")]
    OutsideProvider,
}

/// One-shot "get current position" capability of the platform
pub trait LocationService: Send + Sync + 'static {
    /// Whether the platform exposes a location capability at all
    fn is_supported(&self) -> bool {
        true
    }

    /// Request the current position, the error is a human readable reason
    fn current_position(&self) -> impl Future<Output = Result<Position, String>> + Send;
}

struct Shared<L: LocationService> {
    service: L,
    fallback: Position,
    state: watch::Sender<LocationState>,
    scope: CancellationToken,
}

impl<L: LocationService> Shared<L> {
    fn fail(&self, why: LocationError) {
        warn!("Failed to get location, using fallback: {why}");
        let fallback = self.fallback;
        self.state.send_modify(|state| {
            state.error = Some(why.to_string());
            state.loading = false;
            state.position = Some(fallback);
        });
    }

    fn resolve(&self, res: Result<Position, String>) {
        match res {
            Ok(position) => {
                debug!("Location resolved to {position:?}");
                self.state.send_modify(|state| {
                    state.position = Some(position);
                    state.error = None;
                    state.loading = false;
                });
            }
            Err(why) => self.fail(LocationError::Resolution(why)),
        }
    }

    fn issue(self: &Arc<Self>) -> Option<JoinHandle<()>> {
        if self.scope.is_cancelled() {
            return None;
        }

        if !self.service.is_supported() {
            self.fail(LocationError::Unavailable);
            return None;
        }

        self.state.send_modify(|state| {
            state.loading = true;
            state.error = None;
        });

        let shared = self.clone();
        Some(tokio::spawn(async move {
            tokio::select! {
                biased;

                _ = shared.scope.cancelled() => {
                    debug!("Provider dropped before location resolved, discarding result");
                }

                res = shared.service.current_position() => {
                    // The provider may have gone away while we were waiting on the platform
                    if !shared.scope.is_cancelled() {
                        shared.resolve(res);
                    }
                }
            }
        }))
    }
}

/// Owns the single [LocationState] for a session. Views get a [LocationHandle] from
/// [LocationProvider::handle] and all observe the same state.
///
/// Dropping the provider ends its scope, handles will then fail with
/// [LocationError::OutsideProvider] and in-flight requests are discarded.
pub struct LocationProvider<L: LocationService> {
    shared: Arc<Shared<L>>,
}

impl<L: LocationService> LocationProvider<L> {
    /// Create the provider and immediately issue the first location request.
    /// Must be called from within a tokio runtime.
    pub fn new(service: L) -> Self {
        Self::with_fallback(service, FALLBACK_POSITION)
    }

    pub fn with_fallback(service: L, fallback: Position) -> Self {
        let (state, _) = watch::channel(LocationState::default());
        let provider = Self {
            shared: Arc::new(Shared {
                service,
                fallback,
                state,
                scope: CancellationToken::new(),
            }),
        };
        provider.request_location();
        provider
    }

    /// Issue a new location request. Returns the task resolving it, or `None` if the request
    /// failed immediately.
    ///
    /// Overlapping requests aren't de-duplicated, whichever resolves last wins. The first one
    /// to resolve already sets `loading` to false, even while a later request is in flight.
    pub fn request_location(&self) -> Option<JoinHandle<()>> {
        self.shared.issue()
    }

    pub fn state(&self) -> LocationState {
        self.shared.state.borrow().clone()
    }

    pub fn handle(&self) -> LocationHandle {
        let requester: Arc<dyn Requester> = self.shared.clone();
        LocationHandle {
            rx: self.shared.state.subscribe(),
            requester: Arc::downgrade(&requester),
            scope: self.shared.scope.clone(),
        }
    }
}

impl<L: LocationService> Drop for LocationProvider<L> {
    fn drop(&mut self) {
        self.shared.scope.cancel();
    }
}

trait Requester: Send + Sync {
    fn request(self: Arc<Self>) -> Option<JoinHandle<()>>;
}

impl<L: LocationService> Requester for Shared<L> {
    fn request(self: Arc<Self>) -> Option<JoinHandle<()>> {
        self.issue()
    }
}

/// A consumer's view of a [LocationProvider]
#[derive(Clone)]
pub struct LocationHandle {
    rx: watch::Receiver<LocationState>,
    requester: std::sync::Weak<dyn Requester>,
    scope: CancellationToken,
}

impl LocationHandle {
    fn check_scope(&self) -> Result<(), LocationError> {
        if self.scope.is_cancelled() {
            Err(LocationError::OutsideProvider)
        } else {
            Ok(())
        }
    }

    /// Current state, marking it as seen for [LocationHandle::changed]
    pub fn state(&mut self) -> Result<LocationState, LocationError> {
        self.check_scope()?;
        Ok(self.rx.borrow_and_update().clone())
    }

    /// Current state without marking it as seen
    pub fn peek(&self) -> Result<LocationState, LocationError> {
        self.check_scope()?;
        Ok(self.rx.borrow().clone())
    }

    /// Same as [LocationProvider::request_location], including its handling of overlapping
    /// requests
    pub fn request_location(&self) -> Result<Option<JoinHandle<()>>, LocationError> {
        self.check_scope()?;
        let requester = self
            .requester
            .upgrade()
            .ok_or(LocationError::OutsideProvider)?;
        Ok(requester.request())
    }

    /// Wait for the state to change from the last one seen by this handle
    pub async fn changed(&mut self) -> Result<LocationState, LocationError> {
        self.check_scope()?;
        tokio::select! {
            _ = self.scope.cancelled() => Err(LocationError::OutsideProvider),
            res = self.rx.changed() => {
                res.map_err(|_| LocationError::OutsideProvider)?;
                self.state()
            }
        }
    }
}
