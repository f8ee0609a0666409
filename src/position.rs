use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::distance;

/// A single location fix. Immutable once captured.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
    /// Horizontal accuracy estimate in meters.
    pub accuracy: Option<f64>,
    /// Course over ground, degrees (0-360, where 0 is North).
    pub heading: Option<f64>,
    /// Meters per second.
    pub speed: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

impl fmt::Display for GeoPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.6}°, {:.6}°)", self.latitude, self.longitude)
    }
}

impl GeoPoint {
    /// A bare fix stamped with the current time.
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self::at(latitude, longitude, Utc::now())
    }

    pub fn at(latitude: f64, longitude: f64, timestamp: DateTime<Utc>) -> Self {
        Self {
            latitude,
            longitude,
            accuracy: None,
            heading: None,
            speed: None,
            timestamp,
        }
    }

    /// GeoJSON order: `[longitude, latitude]`.
    pub fn from_lon_lat(coords: [f64; 2], timestamp: DateTime<Utc>) -> Self {
        Self::at(coords[1], coords[0], timestamp)
    }

    pub fn with_heading(mut self, heading: f64) -> Self {
        self.heading = Some(heading);
        self
    }

    pub fn with_speed(mut self, speed: f64) -> Self {
        self.speed = Some(speed);
        self
    }

    pub fn with_accuracy(mut self, accuracy: f64) -> Self {
        self.accuracy = Some(accuracy);
        self
    }

    /// Same place, ignoring everything but latitude and longitude.
    pub fn same_location(&self, other: &GeoPoint) -> bool {
        self.latitude == other.latitude && self.longitude == other.longitude
    }

    /// Initial bearing from this point to another, degrees (0-360, where 0 is North).
    pub fn heading_to(&self, other: &GeoPoint) -> f64 {
        distance::bearing_degrees(self, other)
    }

    /// Great-circle distance in meters.
    pub fn distance_to(&self, other: &GeoPoint) -> f64 {
        distance::haversine_distance_meters(self, other)
    }

    /// Project this point forward by `distance` meters along `heading`.
    /// The result carries this point's timestamp.
    pub fn project(&self, heading: f64, distance: f64) -> GeoPoint {
        let (latitude, longitude) = distance::destination(self, heading, distance);
        GeoPoint::at(latitude, longitude, self.timestamp)
    }
}
