// ** NAVIGATION CONFIGURATION ** //

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::directions::{Profile, RouteOptions};

/// Distance from the nearest route segment beyond which a fix is a wrong-turn candidate.
pub const OFF_ROUTE_THRESHOLD_M: f64 = 30.0;
/// Advance to the next step once this close to the current maneuver point.
pub const STEP_ADVANCE_THRESHOLD_M: f64 = 20.0;
/// Heading deviation (degrees) that, combined with drifting away, marks a wrong turn.
pub const WRONG_TURN_HEADING_DEG: f64 = 45.0;
/// Within this radius of the maneuver point the user is plausibly mid-turn.
pub const MANEUVER_SUPPRESSION_RADIUS_M: f64 = 10.0;
pub const RECALCULATION_COOLDOWN_MS: u64 = 3000;
/// Consecutive candidates needed before a wrong turn is acted upon.
pub const OFF_ROUTE_DEBOUNCE: u32 = 2;
pub const LOCATION_HISTORY_CAPACITY: usize = 10;
pub const REQUEST_TIMEOUT_MS: u64 = 10_000;

/// Tried in order on recalculation, first non-empty route wins.
pub const DEFAULT_RECALCULATION_STRATEGIES: [RouteOptions; 3] = [
    RouteOptions::new(Profile::Walking, true),
    RouteOptions::new(Profile::WalkingConservative, true),
    RouteOptions::new(Profile::Walking, false),
];

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Tunables for a [`NavigationTracker`](crate::tracker::NavigationTracker).
///
/// Every field has a default, so a TOML file only needs the overrides:
///
/// ```toml
/// off_route_threshold_m = 40.0
///
/// [[recalculation_strategies]]
/// profile = "walking-conservative"
/// alternatives = false
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    pub off_route_threshold_m: f64,
    pub step_advance_threshold_m: f64,
    pub wrong_turn_heading_deg: f64,
    pub maneuver_suppression_radius_m: f64,
    pub recalculation_cooldown_ms: u64,
    pub off_route_debounce: u32,
    pub location_history_capacity: usize,
    pub request_timeout_ms: u64,
    pub initial_options: RouteOptions,
    pub recalculation_strategies: Vec<RouteOptions>,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            off_route_threshold_m: OFF_ROUTE_THRESHOLD_M,
            step_advance_threshold_m: STEP_ADVANCE_THRESHOLD_M,
            wrong_turn_heading_deg: WRONG_TURN_HEADING_DEG,
            maneuver_suppression_radius_m: MANEUVER_SUPPRESSION_RADIUS_M,
            recalculation_cooldown_ms: RECALCULATION_COOLDOWN_MS,
            off_route_debounce: OFF_ROUTE_DEBOUNCE,
            location_history_capacity: LOCATION_HISTORY_CAPACITY,
            request_timeout_ms: REQUEST_TIMEOUT_MS,
            initial_options: RouteOptions::default(),
            recalculation_strategies: DEFAULT_RECALCULATION_STRATEGIES.to_vec(),
        }
    }
}

impl TrackerConfig {
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(source)?)
    }

    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let source = std::fs::read_to_string(path)?;
        Self::from_toml_str(&source)
    }

    pub fn recalculation_cooldown(&self) -> Duration {
        Duration::from_millis(self.recalculation_cooldown_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}
