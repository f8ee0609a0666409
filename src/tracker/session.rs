use std::collections::VecDeque;

use tokio::time::Instant;

use crate::config::TrackerConfig;
use crate::position::GeoPoint;
use crate::route::{Route, SegmentIndex};

/// Most recent fixes, oldest evicted first.
#[derive(Clone, Debug)]
pub struct LocationHistory {
    samples: VecDeque<GeoPoint>,
    capacity: usize,
}

impl LocationHistory {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, sample: GeoPoint) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }

    pub fn latest(&self) -> Option<&GeoPoint> {
        self.samples.back()
    }

    /// The last `n` samples, oldest first. `None` if fewer are held.
    pub fn last_n(&self, n: usize) -> Option<impl Iterator<Item = &GeoPoint>> {
        let len = self.samples.len();
        (len >= n).then(|| self.samples.iter().skip(len - n))
    }

    pub fn iter(&self) -> impl Iterator<Item = &GeoPoint> {
        self.samples.iter()
    }

    /// Direction of travel over the last two samples, on a flat lon/lat plane.
    /// `None` until two distinct samples exist.
    pub fn observed_heading(&self) -> Option<f64> {
        let mut recent = self.last_n(2)?;
        let prev = recent.next()?;
        let curr = recent.next()?;
        if prev.same_location(curr) {
            return None;
        }

        let delta_lon = curr.longitude - prev.longitude;
        let delta_lat = curr.latitude - prev.latitude;
        let heading = delta_lon.atan2(delta_lat).to_degrees();
        Some(if heading < 0.0 { heading + 360.0 } else { heading })
    }
}

/// Outcome of evaluating one fix against the current route.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RouteAssessment {
    OnRoute,
    /// Looks like a wrong turn, but not yet for enough consecutive fixes.
    Candidate,
    /// Confirmed, but a recalculation happened too recently.
    CoolingDown,
    /// Confirmed wrong turn; recalculate.
    OffRoute,
}

/// Per-measurement inputs to [`TrackingSession::assess`].
#[derive(Clone, Copy, Debug)]
pub struct Measurement {
    pub distance_to_maneuver: f64,
    pub distance_to_route: f64,
    pub heading_deviation: f64,
}

/// State of one navigation session, owned by the tracker.
#[derive(Debug)]
pub struct TrackingSession {
    pub origin: GeoPoint,
    pub destination: GeoPoint,
    pub route: Option<Route>,
    pub segments: SegmentIndex,
    pub current_step_index: usize,
    pub history: LocationHistory,
    pub is_active: bool,
    pub is_completed: bool,
    pub is_recalculating: bool,
    pub consecutive_off_route_count: u32,
    pub last_recalculation: Option<Instant>,
}

impl TrackingSession {
    pub fn new(origin: GeoPoint, destination: GeoPoint, history_capacity: usize) -> Self {
        let mut history = LocationHistory::new(history_capacity);
        history.push(origin);
        Self {
            origin,
            destination,
            route: None,
            segments: SegmentIndex::default(),
            current_step_index: 0,
            history,
            is_active: true,
            is_completed: false,
            is_recalculating: false,
            consecutive_off_route_count: 0,
            last_recalculation: None,
        }
    }

    /// Install a route and start again from its first step.
    pub fn set_route(&mut self, route: Route) {
        self.segments = route.build_segment_index();
        self.route = Some(route);
        self.current_step_index = 0;
        self.consecutive_off_route_count = 0;
    }

    pub fn distance_to_route(&self, point: &GeoPoint, config: &TrackerConfig) -> f64 {
        self.segments
            .distance_to_route(point, config.off_route_threshold_m / 2.0)
    }

    /// True when the last three fixes get strictly farther from the route.
    pub fn is_moving_away_from_route(&self, config: &TrackerConfig) -> bool {
        let Some(recent) = self.history.last_n(3) else {
            return false;
        };
        let distances: Vec<f64> = recent
            .map(|sample| self.distance_to_route(sample, config))
            .collect();
        distances[2] > distances[1] && distances[1] > distances[0]
    }

    pub fn is_cooling_down(&self, now: Instant, config: &TrackerConfig) -> bool {
        self.last_recalculation
            .is_some_and(|last| now.duration_since(last) < config.recalculation_cooldown())
    }

    /// Classify a fix and update the consecutive off-route counter.
    ///
    /// Near the maneuver point the user is plausibly mid-turn, so detection is
    /// skipped entirely. Otherwise a fix is a candidate when it is too far
    /// from the route, or heading the wrong way while drifting away from it.
    pub fn assess(
        &mut self,
        measurement: Measurement,
        now: Instant,
        config: &TrackerConfig,
    ) -> RouteAssessment {
        if measurement.distance_to_maneuver < config.maneuver_suppression_radius_m {
            self.consecutive_off_route_count = 0;
            return RouteAssessment::OnRoute;
        }

        let too_far = measurement.distance_to_route > config.off_route_threshold_m;
        let wrong_heading = measurement.heading_deviation > config.wrong_turn_heading_deg
            && self.is_moving_away_from_route(config);

        if !(too_far || wrong_heading) {
            self.consecutive_off_route_count = 0;
            return RouteAssessment::OnRoute;
        }

        self.consecutive_off_route_count += 1;
        if self.consecutive_off_route_count < config.off_route_debounce {
            RouteAssessment::Candidate
        } else if self.is_cooling_down(now, config) {
            RouteAssessment::CoolingDown
        } else {
            RouteAssessment::OffRoute
        }
    }
}
