use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;

use super::*;
use crate::directions::Profile;
use crate::route::fixtures::eastbound_route;

/// Replays queued results in order; an empty queue answers `NoRoute`.
/// Calls from `hold_from` onwards wait on `gate` first.
#[derive(Default)]
struct ScriptedDirections {
    responses: Mutex<VecDeque<Result<Route, RoutingError>>>,
    requests: Mutex<Vec<(GeoPoint, RouteOptions)>>,
    gate: Option<Arc<Notify>>,
    hold_from: usize,
}

impl ScriptedDirections {
    fn new(responses: Vec<Result<Route, RoutingError>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            ..Default::default()
        }
    }

    fn gated(mut self, gate: Arc<Notify>, hold_from: usize) -> Self {
        self.gate = Some(gate);
        self.hold_from = hold_from;
        self
    }

    fn requests(&self) -> Vec<(GeoPoint, RouteOptions)> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl DirectionsClient for ScriptedDirections {
    async fn compute_route(
        &self,
        origin: &GeoPoint,
        _destination: &GeoPoint,
        options: RouteOptions,
    ) -> Result<Route, RoutingError> {
        let call = {
            let mut requests = self.requests.lock().unwrap();
            requests.push((*origin, options));
            requests.len() - 1
        };
        if let Some(gate) = &self.gate
            && call >= self.hold_from
        {
            gate.notified().await;
        }
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(RoutingError::NoRoute))
    }
}

#[derive(Clone, Debug, PartialEq)]
enum Recorded {
    RouteCalculated(usize),
    LocationUpdate(Box<LocationUpdate>),
    StepAdvanced(usize),
    StepTransition(usize),
    WrongTurn,
    OffRoute,
    RouteRecalculated(Route),
    RecalculationFailed(NavigationError),
    Completed,
    Error(NavigationError),
    Stopped,
}

type Log = Arc<Mutex<Vec<Recorded>>>;

fn sink(log: &Log) -> impl Fn(Recorded) + Send + Sync + 'static {
    let log = Arc::clone(log);
    move |event| log.lock().unwrap().push(event)
}

fn recording() -> (NavigationCallbacks, Log) {
    let log: Log = Arc::default();
    let (a, b, c, d) = (sink(&log), sink(&log), sink(&log), sink(&log));
    let (e, f, g, h) = (sink(&log), sink(&log), sink(&log), sink(&log));
    let (i, j, k) = (sink(&log), sink(&log), sink(&log));

    let callbacks = NavigationCallbacks::new()
        .on_route_calculated(move |route| a(Recorded::RouteCalculated(route.step_count())))
        .on_location_update(move |update| b(Recorded::LocationUpdate(Box::new(update.clone()))))
        .on_step_advanced(move |step| c(Recorded::StepAdvanced(step.index)))
        .on_step_transition(move |t| d(Recorded::StepTransition(t.steps_remaining)))
        .on_wrong_turn(move |_| e(Recorded::WrongTurn))
        .on_off_route(move || f(Recorded::OffRoute))
        .on_route_recalculated(move |route| g(Recorded::RouteRecalculated(route.clone())))
        .on_recalculation_failed(move |err| h(Recorded::RecalculationFailed(err.clone())))
        .on_navigation_completed(move || i(Recorded::Completed))
        .on_error(move |err| j(Recorded::Error(err.clone())))
        .on_navigation_stopped(move || k(Recorded::Stopped));
    (callbacks, log)
}

fn take(log: &Log) -> Vec<Recorded> {
    std::mem::take(&mut *log.lock().unwrap())
}

fn origin() -> GeoPoint {
    GeoPoint::new(52.3676, 4.9041)
}

fn destination() -> GeoPoint {
    GeoPoint::new(52.3584, 4.8811)
}

/// Three 600 m legs heading east from the origin.
fn three_step_route() -> Route {
    eastbound_route(origin(), 3, 600.0)
}

/// `along` meters east of the origin, `off` meters north of the route.
fn at(along: f64, off: f64) -> GeoPoint {
    let on_route = origin().project(90.0, along);
    if off == 0.0 {
        on_route
    } else {
        on_route.project(0.0, off)
    }
}

async fn started(client: Arc<ScriptedDirections>) -> (NavigationTracker, Log) {
    let tracker = NavigationTracker::new(client);
    let (callbacks, log) = recording();
    tracker
        .start(origin(), destination(), callbacks)
        .await
        .unwrap();
    take(&log);
    (tracker, log)
}

fn location_updates(events: &[Recorded]) -> Vec<&LocationUpdate> {
    events
        .iter()
        .filter_map(|e| match e {
            Recorded::LocationUpdate(update) => Some(update.as_ref()),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn test_start_reports_route() {
    let client = Arc::new(ScriptedDirections::new(vec![Ok(three_step_route())]));
    let tracker = NavigationTracker::new(client.clone());
    let (callbacks, log) = recording();

    let route = tracker
        .start(origin(), destination(), callbacks)
        .await
        .unwrap();

    assert_eq!(route.step_count(), 3);
    assert_eq!(take(&log), vec![Recorded::RouteCalculated(3)]);
    assert!(tracker.is_active());
    assert_eq!(tracker.current_step_index(), Some(0));
    assert_eq!(tracker.current_route(), Some(route));
    assert_eq!(tracker.location_history().len(), 1);

    let requests = client.requests();
    assert_eq!(requests.len(), 1);
    assert!(requests[0].0.same_location(&origin()));
    assert_eq!(requests[0].1, RouteOptions::new(Profile::Walking, true));
}

#[tokio::test]
async fn test_start_failure_is_fatal() {
    let client = Arc::new(ScriptedDirections::new(vec![Err(RoutingError::Api {
        status: 401,
        message: "Not Authorized - Invalid Token".into(),
    })]));
    let tracker = NavigationTracker::new(client.clone());
    let (callbacks, log) = recording();

    let err = tracker
        .start(origin(), destination(), callbacks)
        .await
        .unwrap_err();

    let expected = NavigationError::RoutingUnavailable(RoutingError::Api {
        status: 401,
        message: "Not Authorized - Invalid Token".into(),
    });
    assert_eq!(err, expected);
    assert_eq!(take(&log), vec![Recorded::Error(expected)]);
    assert!(!tracker.is_active());
    assert_eq!(tracker.current_step_index(), None);
    // no retry on start
    assert_eq!(client.requests().len(), 1);
    assert!(tracker.update_location(at(100.0, 0.0)).is_none());
}

#[tokio::test]
async fn test_start_rejects_route_without_steps() {
    let mut empty = three_step_route();
    empty.steps.clear();
    let client = Arc::new(ScriptedDirections::new(vec![Ok(empty)]));
    let tracker = NavigationTracker::new(client);
    let (callbacks, _log) = recording();

    let err = tracker
        .start(origin(), destination(), callbacks)
        .await
        .unwrap_err();
    assert_eq!(err, NavigationError::RoutingUnavailable(RoutingError::NoRoute));
}

#[tokio::test(start_paused = true)]
async fn test_start_times_out() {
    let gate = Arc::new(Notify::new());
    let client = Arc::new(ScriptedDirections::new(vec![Ok(three_step_route())]).gated(gate, 0));
    let config = TrackerConfig {
        request_timeout_ms: 500,
        ..TrackerConfig::default()
    };
    let tracker = NavigationTracker::with_config(client, config);
    let (callbacks, _log) = recording();

    let err = tracker
        .start(origin(), destination(), callbacks)
        .await
        .unwrap_err();
    assert_eq!(
        err,
        NavigationError::RoutingUnavailable(RoutingError::Timeout(Duration::from_millis(500)))
    );
}

#[tokio::test]
async fn test_far_from_maneuver_reports_progress() {
    let client = Arc::new(ScriptedDirections::new(vec![Ok(three_step_route())]));
    let (tracker, log) = started(client).await;

    assert!(tracker.update_location(at(100.0, 0.0)).is_none());

    let events = take(&log);
    assert_eq!(events.len(), 1);
    let update = location_updates(&events)[0];
    assert!((update.distance_to_next - 500.0).abs() < 1.0, "got {}", update.distance_to_next);
    assert!(update.distance_to_route < 1.0);
    assert_eq!(update.current_step.index, 0);
    assert_eq!(update.progress, 0.0);
    assert_eq!(update.expected_heading, Some(90.0));
    assert!((update.user_heading.unwrap() - 90.0).abs() < 0.1);
    assert!(update.heading_deviation < 0.1);
    assert_eq!(tracker.current_step_index(), Some(0));
}

#[tokio::test]
async fn test_near_maneuver_advances_step() {
    let client = Arc::new(ScriptedDirections::new(vec![Ok(three_step_route())]));
    let (tracker, log) = started(client).await;

    tracker.update_location(at(585.0, 0.0));

    let events = take(&log);
    assert_eq!(events[0], Recorded::StepAdvanced(1));
    assert_eq!(events[1], Recorded::StepTransition(1));
    let update = location_updates(&events)[0];
    assert!((update.distance_to_next - 15.0).abs() < 1.0);
    assert_eq!(update.current_step.index, 0);
    assert_eq!(update.progress, 0.5);
    assert_eq!(events.len(), 3);

    assert_eq!(tracker.current_step_index(), Some(1));
    assert_eq!(tracker.current_step().unwrap().index, 1);
    assert_eq!(tracker.progress(), 0.5);
}

#[tokio::test]
async fn test_confirmed_wrong_turn_recalculates() {
    let recalculated = eastbound_route(at(300.0, 40.0), 2, 450.0);
    let client = Arc::new(ScriptedDirections::new(vec![
        Ok(three_step_route()),
        Ok(recalculated.clone()),
    ]));
    let (tracker, log) = started(client.clone()).await;

    // First candidate is only debounced.
    assert!(tracker.update_location(at(250.0, 35.0)).is_none());
    assert_eq!(tracker.consecutive_off_route_count(), 1);
    let events = take(&log);
    assert_eq!(events.len(), 1);
    assert!(matches!(events[0], Recorded::LocationUpdate(_)));

    let handle = tracker
        .update_location(at(300.0, 40.0))
        .expect("second candidate confirms the wrong turn");
    assert_eq!(take(&log), vec![Recorded::WrongTurn, Recorded::OffRoute]);
    assert!(tracker.is_recalculating());

    // Arrives while the request is in flight: recorded, not evaluated.
    assert!(tracker.update_location(at(350.0, 50.0)).is_none());
    assert!(take(&log).is_empty());
    assert!(
        tracker
            .last_location()
            .unwrap()
            .same_location(&at(350.0, 50.0))
    );

    handle.await.unwrap();

    assert_eq!(take(&log), vec![Recorded::RouteRecalculated(recalculated.clone())]);
    assert!(!tracker.is_recalculating());
    assert_eq!(tracker.current_route(), Some(recalculated));
    assert_eq!(tracker.current_step_index(), Some(0));
    assert_eq!(tracker.consecutive_off_route_count(), 0);

    let requests = client.requests();
    assert_eq!(requests.len(), 2);
    assert!(requests[1].0.same_location(&at(300.0, 40.0)));
    assert_eq!(requests[1].1, RouteOptions::new(Profile::Walking, true));
}

#[tokio::test]
async fn test_heading_away_from_route_recalculates() {
    let recalculated = eastbound_route(at(100.0, 19.0), 2, 400.0);
    let client = Arc::new(ScriptedDirections::new(vec![
        Ok(three_step_route()),
        Ok(recalculated.clone()),
    ]));
    let (tracker, log) = started(client.clone()).await;

    // Walking north off an eastbound route, never farther than 30 m from it.
    assert!(tracker.update_location(at(100.0, 5.0)).is_none());
    assert!(tracker.update_location(at(100.0, 12.0)).is_none());
    assert_eq!(tracker.consecutive_off_route_count(), 1);

    let events = take(&log);
    let updates = location_updates(&events);
    assert_eq!(updates.len(), 2);
    let candidate = updates[1];
    assert!((candidate.distance_to_route - 12.0).abs() < 0.5);
    assert!(candidate.heading_deviation > 60.0);
    assert!(candidate.user_heading.unwrap().abs() < 1.0);

    let handle = tracker
        .update_location(at(100.0, 19.0))
        .expect("drifting the wrong way confirms the wrong turn");
    assert_eq!(take(&log), vec![Recorded::WrongTurn, Recorded::OffRoute]);

    handle.await.unwrap();
    assert_eq!(take(&log), vec![Recorded::RouteRecalculated(recalculated)]);
    assert_eq!(tracker.current_step_index(), Some(0));
    assert!(client.requests()[1].0.same_location(&at(100.0, 19.0)));
}

#[tokio::test]
async fn test_single_candidate_then_on_route_does_not_recalculate() {
    let client = Arc::new(ScriptedDirections::new(vec![Ok(three_step_route())]));
    let (tracker, log) = started(client.clone()).await;

    assert!(tracker.update_location(at(200.0, 35.0)).is_none());
    assert!(tracker.update_location(at(250.0, 2.0)).is_none());
    assert_eq!(tracker.consecutive_off_route_count(), 0);
    assert!(tracker.update_location(at(300.0, 35.0)).is_none());

    let events = take(&log);
    assert_eq!(location_updates(&events).len(), 3);
    assert!(!events.contains(&Recorded::OffRoute));
    assert_eq!(client.requests().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_cooldown_suppresses_second_recalculation() {
    let client = Arc::new(ScriptedDirections::new(vec![
        Ok(three_step_route()),
        Ok(three_step_route()),
    ]));
    let (tracker, log) = started(client.clone()).await;

    tracker.update_location(at(200.0, 35.0));
    let handle = tracker.update_location(at(220.0, 40.0)).unwrap();
    handle.await.unwrap();
    assert_eq!(client.requests().len(), 2);
    take(&log);

    // Still drifting one second later: confirmed again, but cooling down.
    tokio::time::advance(Duration::from_secs(1)).await;
    assert!(tracker.update_location(at(240.0, 45.0)).is_none());
    assert!(tracker.update_location(at(260.0, 50.0)).is_none());
    assert_eq!(tracker.consecutive_off_route_count(), 2);
    assert_eq!(client.requests().len(), 2);
    let events = take(&log);
    assert!(!events.contains(&Recorded::OffRoute));
    assert_eq!(location_updates(&events).len(), 2);

    // Once the window has passed the next candidate acts immediately.
    tokio::time::advance(Duration::from_millis(2500)).await;
    let handle = tracker.update_location(at(280.0, 55.0));
    assert!(handle.is_some());
    assert_eq!(take(&log), vec![Recorded::WrongTurn, Recorded::OffRoute]);
}

#[tokio::test]
async fn test_exhausted_recalculation_keeps_stale_route() {
    let client = Arc::new(ScriptedDirections::new(vec![
        Ok(three_step_route()),
        Err(RoutingError::Http("connection reset".into())),
        Err(RoutingError::Api {
            status: 422,
            message: "InvalidInput".into(),
        }),
    ]));
    let (tracker, log) = started(client.clone()).await;
    tracker.update_location(at(585.0, 0.0));
    let route_before = tracker.current_route();
    take(&log);

    assert!(tracker.update_location(at(700.0, 35.0)).is_none());
    let candidate = take(&log);
    assert_eq!(location_updates(&candidate).len(), 1);
    assert_eq!(candidate.len(), 1);

    let handle = tracker.update_location(at(720.0, 40.0)).unwrap();
    handle.await.unwrap();

    let events = take(&log);
    assert_eq!(
        events,
        vec![
            Recorded::WrongTurn,
            Recorded::OffRoute,
            Recorded::RecalculationFailed(NavigationError::RecalculationExhausted {
                attempts: 3,
                last_error: RoutingError::NoRoute,
            }),
        ]
    );
    assert!(!tracker.is_recalculating());
    assert!(tracker.is_active());
    assert_eq!(tracker.current_route(), route_before);
    assert_eq!(tracker.current_step_index(), Some(1));

    let strategies: Vec<RouteOptions> = client.requests()[1..].iter().map(|r| r.1).collect();
    assert_eq!(
        strategies,
        vec![
            RouteOptions::new(Profile::Walking, true),
            RouteOptions::new(Profile::WalkingConservative, true),
            RouteOptions::new(Profile::Walking, false),
        ]
    );
}

#[tokio::test]
async fn test_fallback_strategy_wins() {
    let recalculated = eastbound_route(at(220.0, 40.0), 1, 300.0);
    let client = Arc::new(ScriptedDirections::new(vec![
        Ok(three_step_route()),
        Err(RoutingError::NoRoute),
        Ok(recalculated.clone()),
    ]));
    let (tracker, log) = started(client.clone()).await;

    tracker.update_location(at(200.0, 35.0));
    tracker.update_location(at(220.0, 40.0)).unwrap().await.unwrap();

    let events = take(&log);
    assert_eq!(events.last(), Some(&Recorded::RouteRecalculated(recalculated)));
    // third strategy never tried
    assert_eq!(client.requests().len(), 3);
}

#[tokio::test]
async fn test_stop_discards_in_flight_recalculation() {
    let gate = Arc::new(Notify::new());
    let client = Arc::new(
        ScriptedDirections::new(vec![Ok(three_step_route()), Ok(three_step_route())])
            .gated(Arc::clone(&gate), 1),
    );
    let (tracker, log) = started(client.clone()).await;

    tracker.update_location(at(200.0, 35.0));
    let handle = tracker.update_location(at(220.0, 40.0)).unwrap();
    take(&log);

    tracker.stop();
    gate.notify_one();
    handle.await.unwrap();

    assert_eq!(take(&log), vec![Recorded::Stopped]);
    assert!(!tracker.is_active());
    assert_eq!(tracker.current_route(), None);
    assert!(tracker.location_history().is_empty());
    assert_eq!(tracker.last_location(), None);
    assert_eq!(client.requests().len(), 2);
}

#[tokio::test]
async fn test_stop_during_start_cancels() {
    let gate = Arc::new(Notify::new());
    let client =
        Arc::new(ScriptedDirections::new(vec![Ok(three_step_route())]).gated(Arc::clone(&gate), 0));
    let tracker = NavigationTracker::new(client);
    let (callbacks, log) = recording();

    let starting = {
        let tracker = tracker.clone();
        tokio::spawn(async move { tracker.start(origin(), destination(), callbacks).await })
    };
    tokio::task::yield_now().await;

    tracker.stop();
    gate.notify_one();

    assert_eq!(starting.await.unwrap(), Err(NavigationError::Cancelled));
    assert_eq!(take(&log), vec![Recorded::Stopped]);
    assert!(!tracker.is_active());
}

#[tokio::test]
async fn test_stop_is_idempotent() {
    let client = Arc::new(ScriptedDirections::new(vec![Ok(three_step_route())]));
    let (tracker, log) = started(client).await;

    tracker.stop();
    tracker.stop();

    assert_eq!(take(&log), vec![Recorded::Stopped]);
    assert!(tracker.update_location(at(100.0, 0.0)).is_none());
    assert!(take(&log).is_empty());
}

#[tokio::test]
async fn test_stop_without_session_is_silent() {
    let tracker = NavigationTracker::new(Arc::new(ScriptedDirections::default()));
    tracker.stop();
    assert!(!tracker.is_active());
    assert_eq!(tracker.progress(), 0.0);
}

#[tokio::test]
async fn test_completion_fires_once() {
    let client = Arc::new(ScriptedDirections::new(vec![Ok(eastbound_route(origin(), 2, 400.0))]));
    let (tracker, log) = started(client).await;

    tracker.update_location(at(390.0, 0.0));
    assert_eq!(tracker.current_step_index(), Some(1));
    take(&log);

    tracker.update_location(at(795.0, 0.0));
    let events = take(&log);
    assert_eq!(events.len(), 2);
    assert_eq!(location_updates(&events)[0].progress, 1.0);
    assert_eq!(events[1], Recorded::Completed);

    assert!(tracker.is_completed());
    assert!(!tracker.is_active());
    assert_eq!(tracker.progress(), 1.0);

    tracker.update_location(at(800.0, 0.0));
    tracker.update_location(at(100.0, 80.0));
    assert!(take(&log).is_empty());

    // The finished session can still be torn down.
    tracker.stop();
    assert_eq!(take(&log), vec![Recorded::Stopped]);
}

#[tokio::test]
async fn test_single_step_progress() {
    let client = Arc::new(ScriptedDirections::new(vec![Ok(eastbound_route(origin(), 1, 300.0))]));
    let (tracker, log) = started(client).await;

    tracker.update_location(at(150.0, 0.0));
    assert_eq!(tracker.progress(), 0.0);

    tracker.update_location(at(295.0, 0.0));
    let events = take(&log);
    assert_eq!(location_updates(&events)[0].progress, 0.0);
    assert_eq!(location_updates(&events)[1].progress, 1.0);
    assert_eq!(events.last(), Some(&Recorded::Completed));
    assert_eq!(tracker.progress(), 1.0);
}

#[tokio::test]
async fn test_history_is_bounded() {
    let client = Arc::new(ScriptedDirections::new(vec![Ok(three_step_route())]));
    let (tracker, _log) = started(client).await;

    for i in 0..15 {
        tracker.update_location(at(10.0 + i as f64 * 10.0, 0.0));
    }
    let history = tracker.location_history();
    assert_eq!(history.len(), 10);
    assert!(history[0].same_location(&at(60.0, 0.0)));
    assert!(history[9].same_location(&at(150.0, 0.0)));
}

#[tokio::test]
async fn test_restart_replaces_session() {
    let client = Arc::new(ScriptedDirections::new(vec![
        Ok(three_step_route()),
        Ok(eastbound_route(origin(), 2, 300.0)),
    ]));
    let (tracker, _log) = started(client).await;
    tracker.update_location(at(585.0, 0.0));
    assert_eq!(tracker.current_step_index(), Some(1));

    let (callbacks, log) = recording();
    let route = tracker
        .start(origin(), destination(), callbacks)
        .await
        .unwrap();
    assert_eq!(route.step_count(), 2);
    assert_eq!(tracker.current_step_index(), Some(0));
    assert_eq!(take(&log), vec![Recorded::RouteCalculated(2)]);
}

#[test]
fn test_wrong_turn_outside_runtime_reports_failure() {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();
    let client = Arc::new(ScriptedDirections::new(vec![Ok(three_step_route())]));
    let (tracker, log) = runtime.block_on(started(client));
    drop(runtime);

    tracker.update_location(at(200.0, 35.0));
    assert!(tracker.update_location(at(220.0, 40.0)).is_none());

    let events = take(&log);
    assert!(matches!(
        events.last(),
        Some(Recorded::RecalculationFailed(NavigationError::RecalculationExhausted {
            attempts: 0,
            ..
        }))
    ));
    assert!(!tracker.is_recalculating());
}
