//! Routes and their maneuver steps.
//!
//! A [`Route`] is a plain value produced by a directions request and
//! replaced wholesale on recalculation. The queries here never perform I/O.

use serde::{Deserialize, Serialize};

use crate::distance;
use crate::error::NavigationError;
use crate::position::GeoPoint;

/// What the walker has to do at a step's maneuver point.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Maneuver {
    /// Provider maneuver type, e.g. `turn`, `depart`, `arrive`.
    pub kind: String,
    /// e.g. `left`, `slight right`.
    pub modifier: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ManeuverStep {
    pub index: usize,
    pub instruction: String,
    pub voice_instruction: String,
    pub distance_meters: f64,
    pub duration_seconds: f64,
    pub maneuver: Maneuver,
    pub maneuver_location: GeoPoint,
    pub bearing_before: Option<f64>,
    pub bearing_after: Option<f64>,
    pub street_name: String,
    pub geometry: Vec<GeoPoint>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Route {
    /// Full polyline of the route.
    pub geometry: Vec<GeoPoint>,
    pub total_duration_seconds: f64,
    pub total_distance_meters: f64,
    /// Never empty; `steps[i].index == i`.
    pub steps: Vec<ManeuverStep>,
    /// Provider alternatives. Kept for display, never followed.
    #[serde(default)]
    pub alternatives: Vec<Route>,
}

impl Route {
    pub fn step_count(&self) -> usize {
        self.steps.len()
    }

    pub fn step_at(&self, index: usize) -> Result<&ManeuverStep, NavigationError> {
        self.steps.get(index).ok_or(NavigationError::IndexOutOfRange {
            index,
            len: self.steps.len(),
        })
    }

    pub fn last_step_index(&self) -> usize {
        self.steps.len().saturating_sub(1)
    }

    /// `index / max(1, steps - 1)`, clamped to [0, 1].
    ///
    /// A single-step route reports 0 here; callers report 1 once the
    /// session has completed.
    pub fn progress_fraction(&self, current_step_index: usize) -> f64 {
        let denominator = self.last_step_index().max(1) as f64;
        (current_step_index as f64 / denominator).clamp(0.0, 1.0)
    }

    pub fn build_segment_index(&self) -> SegmentIndex {
        SegmentIndex::new(&self.geometry)
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Segment {
    pub start: GeoPoint,
    pub end: GeoPoint,
}

impl Segment {
    pub fn distance_to(&self, point: &GeoPoint) -> f64 {
        distance::distance_point_to_segment_meters(point, &self.start, &self.end)
    }
}

/// Consecutive geometry pairs of a route, built once per route and scanned
/// on every location update.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SegmentIndex {
    segments: Vec<Segment>,
    /// Set when the geometry is a single point.
    lone_point: Option<GeoPoint>,
}

impl SegmentIndex {
    pub fn new(geometry: &[GeoPoint]) -> Self {
        let segments = geometry
            .windows(2)
            .map(|pair| Segment {
                start: pair[0],
                end: pair[1],
            })
            .collect();
        let lone_point = match geometry {
            [only] => Some(*only),
            _ => None,
        };
        Self {
            segments,
            lone_point,
        }
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Minimum distance from `point` to the route, in meters.
    ///
    /// The scan stops at the first segment closer than `good_enough_m`, so the
    /// result is only the true minimum when it is at least that large. With
    /// no geometry at all the point is considered on the route.
    pub fn distance_to_route(&self, point: &GeoPoint, good_enough_m: f64) -> f64 {
        if self.segments.is_empty() {
            return self
                .lone_point
                .map_or(0.0, |only| distance::haversine_distance_meters(point, &only));
        }

        let mut min_distance = f64::INFINITY;
        for segment in &self.segments {
            min_distance = min_distance.min(segment.distance_to(point));
            if min_distance < good_enough_m {
                break;
            }
        }
        min_distance
    }
}
