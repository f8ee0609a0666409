use serde::Serialize;

use crate::error::NavigationError;
use crate::position::GeoPoint;
use crate::route::{ManeuverStep, Route};

/// Telemetry emitted for every fix that is evaluated against the route.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LocationUpdate {
    pub location: GeoPoint,
    /// The step `distance_to_next` was measured against.
    pub current_step: ManeuverStep,
    pub progress: f64,
    pub distance_to_next: f64,
    pub distance_to_destination: f64,
    pub distance_to_route: f64,
    pub heading_deviation: f64,
    pub user_heading: Option<f64>,
    pub expected_heading: Option<f64>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct StepTransition {
    pub previous_step: ManeuverStep,
    pub current_step: ManeuverStep,
    pub steps_remaining: usize,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct WrongTurn {
    pub location: GeoPoint,
    pub distance_from_route: f64,
    pub heading_deviation: f64,
}

/// Everything the tracker reports, buffered while the session lock is held
/// and dispatched after it is released.
#[derive(Clone, Debug)]
pub(crate) enum NavigationEvent {
    RouteCalculated(Route),
    LocationUpdate(Box<LocationUpdate>),
    StepAdvanced(ManeuverStep),
    StepTransition(Box<StepTransition>),
    WrongTurn(WrongTurn),
    OffRoute,
    RouteRecalculated(Route),
    RecalculationFailed(NavigationError),
    NavigationCompleted,
    Error(NavigationError),
    NavigationStopped,
}

type Handler<T> = Box<dyn Fn(&T) + Send + Sync>;
type Signal = Box<dyn Fn() + Send + Sync>;

/// Optional handler slots. Unset slots are skipped.
///
/// ```
/// use walknav::NavigationCallbacks;
///
/// let callbacks = NavigationCallbacks::new()
///     .on_step_advanced(|step| println!("next: {}", step.instruction))
///     .on_navigation_completed(|| println!("arrived"));
/// ```
#[derive(Default)]
pub struct NavigationCallbacks {
    route_calculated: Option<Handler<Route>>,
    location_update: Option<Handler<LocationUpdate>>,
    step_advanced: Option<Handler<ManeuverStep>>,
    step_transition: Option<Handler<StepTransition>>,
    wrong_turn: Option<Handler<WrongTurn>>,
    off_route: Option<Signal>,
    route_recalculated: Option<Handler<Route>>,
    recalculation_failed: Option<Handler<NavigationError>>,
    navigation_completed: Option<Signal>,
    error: Option<Handler<NavigationError>>,
    navigation_stopped: Option<Signal>,
}

impl NavigationCallbacks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_route_calculated(mut self, f: impl Fn(&Route) + Send + Sync + 'static) -> Self {
        self.route_calculated = Some(Box::new(f));
        self
    }

    pub fn on_location_update(
        mut self,
        f: impl Fn(&LocationUpdate) + Send + Sync + 'static,
    ) -> Self {
        self.location_update = Some(Box::new(f));
        self
    }

    pub fn on_step_advanced(mut self, f: impl Fn(&ManeuverStep) + Send + Sync + 'static) -> Self {
        self.step_advanced = Some(Box::new(f));
        self
    }

    pub fn on_step_transition(
        mut self,
        f: impl Fn(&StepTransition) + Send + Sync + 'static,
    ) -> Self {
        self.step_transition = Some(Box::new(f));
        self
    }

    pub fn on_wrong_turn(mut self, f: impl Fn(&WrongTurn) + Send + Sync + 'static) -> Self {
        self.wrong_turn = Some(Box::new(f));
        self
    }

    pub fn on_off_route(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.off_route = Some(Box::new(f));
        self
    }

    pub fn on_route_recalculated(mut self, f: impl Fn(&Route) + Send + Sync + 'static) -> Self {
        self.route_recalculated = Some(Box::new(f));
        self
    }

    pub fn on_recalculation_failed(
        mut self,
        f: impl Fn(&NavigationError) + Send + Sync + 'static,
    ) -> Self {
        self.recalculation_failed = Some(Box::new(f));
        self
    }

    pub fn on_navigation_completed(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.navigation_completed = Some(Box::new(f));
        self
    }

    pub fn on_error(mut self, f: impl Fn(&NavigationError) + Send + Sync + 'static) -> Self {
        self.error = Some(Box::new(f));
        self
    }

    pub fn on_navigation_stopped(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.navigation_stopped = Some(Box::new(f));
        self
    }

    pub(crate) fn dispatch(&self, event: &NavigationEvent) {
        fn call<T>(slot: &Option<Handler<T>>, value: &T) {
            if let Some(handler) = slot {
                handler(value);
            }
        }
        fn signal(slot: &Option<Signal>) {
            if let Some(handler) = slot {
                handler();
            }
        }

        match event {
            NavigationEvent::RouteCalculated(route) => call(&self.route_calculated, route),
            NavigationEvent::LocationUpdate(update) => call(&self.location_update, update.as_ref()),
            NavigationEvent::StepAdvanced(step) => call(&self.step_advanced, step),
            NavigationEvent::StepTransition(transition) => {
                call(&self.step_transition, transition.as_ref())
            }
            NavigationEvent::WrongTurn(wrong_turn) => call(&self.wrong_turn, wrong_turn),
            NavigationEvent::OffRoute => signal(&self.off_route),
            NavigationEvent::RouteRecalculated(route) => call(&self.route_recalculated, route),
            NavigationEvent::RecalculationFailed(err) => call(&self.recalculation_failed, err),
            NavigationEvent::NavigationCompleted => signal(&self.navigation_completed),
            NavigationEvent::Error(err) => call(&self.error, err),
            NavigationEvent::NavigationStopped => signal(&self.navigation_stopped),
        }
    }

    pub(crate) fn dispatch_all(&self, events: &[NavigationEvent]) {
        for event in events {
            self.dispatch(event);
        }
    }
}

impl std::fmt::Debug for NavigationCallbacks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NavigationCallbacks")
            .field("route_calculated", &self.route_calculated.is_some())
            .field("location_update", &self.location_update.is_some())
            .field("step_advanced", &self.step_advanced.is_some())
            .field("off_route", &self.off_route.is_some())
            .field("route_recalculated", &self.route_recalculated.is_some())
            .field("navigation_completed", &self.navigation_completed.is_some())
            .finish_non_exhaustive()
    }
}
