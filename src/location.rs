//! Location fixes from NMEA 0183 sentences.

use std::io::BufRead;

use chrono::{DateTime, NaiveTime, Utc};
use nmea::{Nmea, SentenceType};
use tracing::{debug, warn};

use crate::position::GeoPoint;

const METERS_PER_SECOND_PER_KNOT: f64 = 0.514444;
/// Rough user-equivalent range error per unit of HDOP.
const METERS_PER_HDOP: f64 = 5.0;

/// Accumulates NMEA sentences and turns position-bearing ones into
/// [`GeoPoint`] samples.
#[derive(Default)]
pub struct NmeaLocationSource {
    nmea: Nmea,
    last_fix: Option<(f64, f64, Option<NaiveTime>)>,
}

impl NmeaLocationSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse one sentence. Returns a sample when it carried a position that
    /// differs from the last one emitted.
    pub fn feed(&mut self, line: &str) -> Option<GeoPoint> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }

        match self.nmea.parse(line) {
            Ok(SentenceType::GGA | SentenceType::RMC) => self.fix(),
            Ok(other) => {
                debug!("Ignoring {:?} sentence", other);
                None
            }
            Err(e) => {
                warn!("Unparsable NMEA sentence {:?}: {}", line, e);
                None
            }
        }
    }

    fn fix(&mut self) -> Option<GeoPoint> {
        let latitude = self.nmea.latitude?;
        let longitude = self.nmea.longitude?;
        let key = (latitude, longitude, self.nmea.fix_time);
        if self.last_fix == Some(key) {
            return None;
        }
        self.last_fix = Some(key);

        let mut point = GeoPoint::at(latitude, longitude, self.timestamp());
        if let Some(course) = self.nmea.true_course {
            point = point.with_heading(f64::from(course));
        }
        if let Some(knots) = self.nmea.speed_over_ground {
            point = point.with_speed(f64::from(knots) * METERS_PER_SECOND_PER_KNOT);
        }
        if let Some(hdop) = self.nmea.hdop {
            point = point.with_accuracy(f64::from(hdop) * METERS_PER_HDOP);
        }
        Some(point)
    }

    fn timestamp(&self) -> DateTime<Utc> {
        match (self.nmea.fix_date, self.nmea.fix_time) {
            (Some(date), Some(time)) => date.and_time(time).and_utc(),
            _ => Utc::now(),
        }
    }

    /// Drain a reader line by line, keeping every emitted sample.
    pub fn read_samples(&mut self, reader: impl BufRead) -> std::io::Result<Vec<GeoPoint>> {
        let mut samples = Vec::new();
        for line in reader.lines() {
            if let Some(sample) = self.feed(&line?) {
                samples.push(sample);
            }
        }
        Ok(samples)
    }
}
