pub mod compass;
pub mod config;
pub mod directions;
pub mod distance;
pub mod error;
pub mod format;
pub mod location;
pub mod position;
pub mod route;
pub mod tracker;

// Re-export commonly used types
pub use config::TrackerConfig;
pub use directions::{
    DirectionsClient, MapboxDirectionsClient, Profile, RouteOptions, RoutingError,
};
pub use error::NavigationError;
pub use location::NmeaLocationSource;
pub use position::GeoPoint;
pub use route::{Maneuver, ManeuverStep, Route};
pub use tracker::{
    LocationUpdate, NavigationCallbacks, NavigationTracker, StepTransition, WrongTurn,
};
