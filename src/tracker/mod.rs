//! Turn-by-turn walking navigation.
//!
//! [`NavigationTracker`] follows a walker along a route: every fix is measured
//! against the current maneuver point and the route polyline, steps advance
//! as maneuver points are reached, and confirmed wrong turns trigger a
//! recalculation from the current position to the original destination.
//!
//! Fixes are processed synchronously in arrival order. Only route requests
//! suspend; a recalculation runs as a spawned task and the fixes that arrive
//! meanwhile are recorded in the history without being evaluated.

mod callbacks;
mod session;
#[cfg(test)]
mod tests;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{Instant, timeout};
use tracing::{debug, error, info, warn};

use crate::compass;
use crate::config::TrackerConfig;
use crate::directions::{DirectionsClient, RouteOptions, RoutingError};
use crate::error::NavigationError;
use crate::position::GeoPoint;
use crate::route::{ManeuverStep, Route};

pub use callbacks::{LocationUpdate, NavigationCallbacks, StepTransition, WrongTurn};
pub use session::{LocationHistory, Measurement, RouteAssessment, TrackingSession};

use callbacks::NavigationEvent;

/// Drives one walking-navigation session at a time.
///
/// Cloning is cheap and yields another handle to the same session.
#[derive(Clone)]
pub struct NavigationTracker {
    inner: Arc<Inner>,
}

struct Inner {
    client: Arc<dyn DirectionsClient>,
    config: TrackerConfig,
    state: Mutex<TrackerState>,
}

struct TrackerState {
    session: Option<TrackingSession>,
    callbacks: Arc<NavigationCallbacks>,
    /// Bumped on every start and stop; late responses carrying an older
    /// generation are dropped.
    generation: u64,
}

/// Where a recalculation starts from, captured when it is triggered.
struct RecalculationRequest {
    generation: u64,
    from: GeoPoint,
    destination: GeoPoint,
}

impl NavigationTracker {
    pub fn new(client: Arc<dyn DirectionsClient>) -> Self {
        Self::with_config(client, TrackerConfig::default())
    }

    pub fn with_config(client: Arc<dyn DirectionsClient>, config: TrackerConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                client,
                config,
                state: Mutex::new(TrackerState {
                    session: None,
                    callbacks: Arc::new(NavigationCallbacks::default()),
                    generation: 0,
                }),
            }),
        }
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.inner.config
    }

    /// Begin a session and fetch the initial route.
    ///
    /// Replaces any session already running. Fails with
    /// [`NavigationError::RoutingUnavailable`] (also reported to `on_error`)
    /// when no route can be obtained, or [`NavigationError::Cancelled`] when
    /// the session is stopped before the route arrives.
    pub async fn start(
        &self,
        origin: GeoPoint,
        destination: GeoPoint,
        callbacks: NavigationCallbacks,
    ) -> Result<Route, NavigationError> {
        let config = &self.inner.config;
        let callbacks = Arc::new(callbacks);
        let generation = {
            let mut state = self.inner.lock();
            state.generation += 1;
            state.session = Some(TrackingSession::new(
                origin,
                destination,
                config.location_history_capacity,
            ));
            state.callbacks = Arc::clone(&callbacks);
            state.generation
        };

        info!("Starting navigation {} -> {}", origin, destination);
        let result = self
            .inner
            .request_route(&origin, &destination, config.initial_options)
            .await;

        let mut state = self.inner.lock();
        let current = state.generation == generation
            && state.session.as_ref().is_some_and(|s| s.is_active);
        if !current {
            debug!("Discarding initial route for a stopped session");
            return Err(NavigationError::Cancelled);
        }

        match result {
            Ok(route) => {
                if let Some(session) = state.session.as_mut() {
                    session.set_route(route.clone());
                }
                drop(state);

                info!(
                    "Route calculated: {} steps, {:.0} m, {:.0} s",
                    route.step_count(),
                    route.total_distance_meters,
                    route.total_duration_seconds
                );
                callbacks.dispatch(&NavigationEvent::RouteCalculated(route.clone()));
                Ok(route)
            }
            Err(err) => {
                state.session = None;
                drop(state);

                error!("Initial route request failed: {}", err);
                let err = NavigationError::RoutingUnavailable(err);
                callbacks.dispatch(&NavigationEvent::Error(err.clone()));
                Err(err)
            }
        }
    }

    /// Feed one location fix.
    ///
    /// Never blocks. Returns the handle of a recalculation task if this fix
    /// confirmed a wrong turn; awaiting it is optional.
    pub fn update_location(&self, sample: GeoPoint) -> Option<JoinHandle<()>> {
        let config = &self.inner.config;
        let mut state = self.inner.lock();
        let generation = state.generation;
        let callbacks = Arc::clone(&state.callbacks);
        let session = state.session.as_mut().filter(|s| s.is_active)?;

        session.history.push(sample);
        if session.is_recalculating {
            debug!("Recalculation in flight, recording {} only", sample);
            return None;
        }

        let index = session.current_step_index;
        let (step, last_index) = {
            let route = session.route.as_ref()?;
            match route.step_at(index) {
                Ok(step) => (step.clone(), route.last_step_index()),
                Err(err) => {
                    error!("Session step out of sync: {}", err);
                    return None;
                }
            }
        };

        let distance_to_next = sample.distance_to(&step.maneuver_location);
        let distance_to_route = session.distance_to_route(&sample, config);
        let user_heading = session.history.observed_heading();
        let expected_heading = step.bearing_after;
        let heading_deviation = match (user_heading, expected_heading) {
            (Some(user), Some(expected)) => compass::heading_deviation(user, expected),
            _ => 0.0,
        };

        let now = Instant::now();
        let assessment = session.assess(
            Measurement {
                distance_to_maneuver: distance_to_next,
                distance_to_route,
                heading_deviation,
            },
            now,
            config,
        );

        let mut events = Vec::new();
        if assessment == RouteAssessment::OffRoute {
            warn!(
                "Wrong turn at {}: {:.1} m from route, heading off by {:.0}°",
                sample, distance_to_route, heading_deviation
            );
            session.is_recalculating = true;
            session.last_recalculation = Some(now);
            let request = RecalculationRequest {
                generation,
                from: sample,
                destination: session.destination,
            };
            drop(state);

            callbacks.dispatch_all(&[
                NavigationEvent::WrongTurn(WrongTurn {
                    location: sample,
                    distance_from_route: distance_to_route,
                    heading_deviation,
                }),
                NavigationEvent::OffRoute,
            ]);
            return self.spawn_recalculation(request);
        }

        if assessment == RouteAssessment::OnRoute
            && distance_to_next < config.step_advance_threshold_m
        {
            let next = session
                .route
                .as_ref()
                .and_then(|route| route.step_at(index + 1).ok())
                .cloned();
            if let Some(next) = next {
                session.current_step_index = index + 1;
                info!(
                    "Advanced to step {}/{}: {}",
                    index + 2,
                    last_index + 1,
                    next.instruction
                );
                events.push(NavigationEvent::StepAdvanced(next.clone()));
                events.push(NavigationEvent::StepTransition(Box::new(StepTransition {
                    previous_step: step.clone(),
                    current_step: next,
                    steps_remaining: last_index - (index + 1),
                })));
            } else {
                session.is_active = false;
                session.is_completed = true;
            }
        }

        let progress = if session.is_completed {
            1.0
        } else {
            session
                .route
                .as_ref()
                .map_or(0.0, |route| route.progress_fraction(session.current_step_index))
        };
        events.push(NavigationEvent::LocationUpdate(Box::new(LocationUpdate {
            location: sample,
            current_step: step,
            progress,
            distance_to_next,
            distance_to_destination: sample.distance_to(&session.destination),
            distance_to_route,
            heading_deviation,
            user_heading,
            expected_heading,
        })));
        if session.is_completed {
            info!("Navigation completed");
            events.push(NavigationEvent::NavigationCompleted);
        }
        drop(state);

        callbacks.dispatch_all(&events);
        None
    }

    /// End the session. Late route responses are discarded. Repeated calls
    /// are no-ops.
    pub fn stop(&self) {
        let (callbacks, session) = {
            let mut state = self.inner.lock();
            let Some(session) = state.session.take() else {
                return;
            };
            state.generation += 1;
            (Arc::clone(&state.callbacks), session)
        };
        info!(
            "Navigation from {} to {} stopped",
            session.origin, session.destination
        );
        callbacks.dispatch(&NavigationEvent::NavigationStopped);
    }

    pub fn is_active(&self) -> bool {
        self.inner.lock().session.as_ref().is_some_and(|s| s.is_active)
    }

    pub fn is_completed(&self) -> bool {
        self.inner
            .lock()
            .session
            .as_ref()
            .is_some_and(|s| s.is_completed)
    }

    pub fn is_recalculating(&self) -> bool {
        self.inner
            .lock()
            .session
            .as_ref()
            .is_some_and(|s| s.is_recalculating)
    }

    pub fn current_route(&self) -> Option<Route> {
        self.inner.lock().session.as_ref()?.route.clone()
    }

    /// `None` when there is no route.
    pub fn current_step_index(&self) -> Option<usize> {
        let state = self.inner.lock();
        let session = state.session.as_ref()?;
        session.route.as_ref().map(|_| session.current_step_index)
    }

    pub fn current_step(&self) -> Option<ManeuverStep> {
        let state = self.inner.lock();
        let session = state.session.as_ref()?;
        session
            .route
            .as_ref()?
            .step_at(session.current_step_index)
            .ok()
            .cloned()
    }

    /// Fraction of steps passed, 1.0 once completed.
    pub fn progress(&self) -> f64 {
        let state = self.inner.lock();
        match state.session.as_ref() {
            Some(session) if session.is_completed => 1.0,
            Some(TrackingSession {
                route: Some(route),
                current_step_index,
                ..
            }) => route.progress_fraction(*current_step_index),
            _ => 0.0,
        }
    }

    pub fn consecutive_off_route_count(&self) -> u32 {
        self.inner
            .lock()
            .session
            .as_ref()
            .map_or(0, |s| s.consecutive_off_route_count)
    }

    /// Most recent fix, including ones recorded during a recalculation.
    pub fn last_location(&self) -> Option<GeoPoint> {
        self.inner
            .lock()
            .session
            .as_ref()
            .and_then(|s| s.history.latest().copied())
    }

    /// Oldest first.
    pub fn location_history(&self) -> Vec<GeoPoint> {
        self.inner
            .lock()
            .session
            .as_ref()
            .map(|s| s.history.iter().copied().collect())
            .unwrap_or_default()
    }

    fn spawn_recalculation(&self, request: RecalculationRequest) -> Option<JoinHandle<()>> {
        match Handle::try_current() {
            Ok(handle) => {
                let inner = Arc::clone(&self.inner);
                Some(handle.spawn(async move { inner.recalculate(request).await }))
            }
            Err(err) => {
                error!("Cannot recalculate outside a Tokio runtime: {}", err);
                self.inner.finish_recalculation(
                    request.generation,
                    Err(NavigationError::RecalculationExhausted {
                        attempts: 0,
                        last_error: RoutingError::Http(err.to_string()),
                    }),
                );
                None
            }
        }
    }
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, TrackerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn request_route(
        &self,
        origin: &GeoPoint,
        destination: &GeoPoint,
        options: RouteOptions,
    ) -> Result<Route, RoutingError> {
        let limit = self.config.request_timeout();
        let route = timeout(limit, self.client.compute_route(origin, destination, options))
            .await
            .map_err(|_| RoutingError::Timeout(limit))??;
        if route.steps.is_empty() {
            return Err(RoutingError::NoRoute);
        }
        Ok(route)
    }

    /// Try each strategy once, in order, and apply the first route found.
    async fn recalculate(&self, request: RecalculationRequest) {
        let strategies = &self.config.recalculation_strategies;
        let mut last_error = RoutingError::NoRoute;
        let mut outcome = None;

        for (attempt, options) in strategies.iter().enumerate() {
            info!(
                "Trying recalculation strategy {}/{}: {}",
                attempt + 1,
                strategies.len(),
                options
            );
            match self
                .request_route(&request.from, &request.destination, *options)
                .await
            {
                Ok(route) => {
                    outcome = Some(route);
                    break;
                }
                Err(err) => {
                    warn!("Strategy {} failed: {}", attempt + 1, err);
                    last_error = err;
                }
            }
        }

        let result = outcome.ok_or(NavigationError::RecalculationExhausted {
            attempts: strategies.len(),
            last_error,
        });
        self.finish_recalculation(request.generation, result);
    }

    fn finish_recalculation(&self, generation: u64, result: Result<Route, NavigationError>) {
        let mut state = self.lock();
        let callbacks = Arc::clone(&state.callbacks);
        let current_generation = state.generation;
        let session = match state.session.as_mut() {
            Some(session) if current_generation == generation && session.is_active => session,
            _ => {
                debug!("Discarding recalculation result for a stopped session");
                return;
            }
        };
        session.is_recalculating = false;

        let event = match result {
            Ok(route) => {
                info!(
                    "Route recalculated: {} steps, {:.0} m",
                    route.step_count(),
                    route.total_distance_meters
                );
                session.set_route(route.clone());
                NavigationEvent::RouteRecalculated(route)
            }
            Err(err) => {
                error!("{}", err);
                NavigationEvent::RecalculationFailed(err)
            }
        };
        drop(state);

        callbacks.dispatch(&event);
    }
}
