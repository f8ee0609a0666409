//! Walking-directions collaborator.
//!
//! The tracker only depends on [`DirectionsClient`]; [`mapbox`] provides the
//! HTTP implementation used by the CLI.

pub mod mapbox;

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::position::GeoPoint;
use crate::route::Route;

pub use mapbox::MapboxDirectionsClient;

/// Routing profile requested from the provider.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Profile {
    #[default]
    Walking,
    /// Walking, biased towards main walkways and away from alleys.
    WalkingConservative,
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Profile::Walking => write!(f, "walking"),
            Profile::WalkingConservative => write!(f, "walking-conservative"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteOptions {
    #[serde(default)]
    pub profile: Profile,
    #[serde(default)]
    pub alternatives: bool,
}

impl RouteOptions {
    pub const fn new(profile: Profile, alternatives: bool) -> Self {
        Self {
            profile,
            alternatives,
        }
    }
}

impl Default for RouteOptions {
    fn default() -> Self {
        Self::new(Profile::Walking, true)
    }
}

impl fmt::Display for RouteOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (alternatives: {})", self.profile, self.alternatives)
    }
}

/// Failures reported by a [`DirectionsClient`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RoutingError {
    #[error("directions request failed: {0}")]
    Http(String),

    #[error("directions API returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("directions response could not be decoded: {0}")]
    Decode(String),

    #[error("no route found")]
    NoRoute,

    #[error("directions request timed out after {0:?}")]
    Timeout(Duration),
}

/// Computes walking routes between two points.
///
/// Implementations return the primary route with any alternatives attached
/// to it. A primary route must have at least one step; an empty result is
/// `RoutingError::NoRoute`.
#[async_trait]
pub trait DirectionsClient: Send + Sync {
    async fn compute_route(
        &self,
        origin: &GeoPoint,
        destination: &GeoPoint,
        options: RouteOptions,
    ) -> Result<Route, RoutingError>;
}
