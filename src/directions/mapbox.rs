//! Mapbox Directions v5 client.
//!
//! Read more here: https://docs.mapbox.com/api/navigation/directions/

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use super::{DirectionsClient, Profile, RouteOptions, RoutingError};
use crate::position::GeoPoint;
use crate::route::{Maneuver, ManeuverStep, Route};

pub const DEFAULT_BASE_URL: &str = "https://api.mapbox.com";
const HTTP_TIMEOUT_SECS: u64 = 15;
/// Longest slice of an error body kept in `RoutingError::Api`.
const MAX_ERROR_BODY: usize = 200;

pub struct MapboxDirectionsClient {
    http: Client,
    access_token: String,
    base_url: String,
}

impl MapboxDirectionsClient {
    pub fn new(access_token: impl Into<String>) -> Result<Self, RoutingError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
            .user_agent(concat!("walknav/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| RoutingError::Http(e.to_string()))?;

        Ok(Self {
            http,
            access_token: access_token.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
        })
    }

    /// Point the client at another host, e.g. a proxy.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn request_url(&self, origin: &GeoPoint, destination: &GeoPoint) -> String {
        format!(
            "{}/directions/v5/mapbox/walking/{},{};{},{}",
            self.base_url,
            origin.longitude,
            origin.latitude,
            destination.longitude,
            destination.latitude
        )
    }

    fn query(&self, options: RouteOptions) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("geometries", "geojson".to_string()),
            ("steps", "true".to_string()),
            ("voice_instructions", "true".to_string()),
            ("banner_instructions", "true".to_string()),
            ("overview", "full".to_string()),
            ("alternatives", options.alternatives.to_string()),
            // allow U-turns when necessary
            ("continue_straight", "false".to_string()),
        ];
        if options.profile == Profile::WalkingConservative {
            params.push(("walkway_bias", "1".to_string()));
            params.push(("alley_bias", "-1".to_string()));
        }
        params.push(("access_token", self.access_token.clone()));
        params
    }
}

#[async_trait]
impl DirectionsClient for MapboxDirectionsClient {
    async fn compute_route(
        &self,
        origin: &GeoPoint,
        destination: &GeoPoint,
        options: RouteOptions,
    ) -> Result<Route, RoutingError> {
        debug!("Requesting {} route {} -> {}", options, origin, destination);

        let response = self
            .http
            .get(self.request_url(origin, destination))
            .query(&self.query(options))
            .send()
            .await
            .map_err(|e| RoutingError::Http(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| RoutingError::Http(e.to_string()))?;

        if !status.is_success() {
            return Err(RoutingError::Api {
                status: status.as_u16(),
                message: error_message(&body),
            });
        }

        parse_directions(&body, Utc::now())
    }
}

/// Decode a Directions response body into the primary route, with the other
/// routes attached as alternatives.
pub fn parse_directions(body: &str, received_at: DateTime<Utc>) -> Result<Route, RoutingError> {
    let response: DirectionsResponse =
        serde_json::from_str(body).map_err(|e| RoutingError::Decode(e.to_string()))?;

    let mut routes = response
        .routes
        .into_iter()
        .map(|route| convert_route(route, received_at));

    let mut primary = routes.next().ok_or(RoutingError::NoRoute)?;
    if primary.steps.is_empty() {
        return Err(RoutingError::NoRoute);
    }
    primary.alternatives = routes.collect();
    Ok(primary)
}

fn error_message(body: &str) -> String {
    match serde_json::from_str::<ApiError>(body) {
        Ok(ApiError {
            message: Some(message),
        }) => message,
        _ => body.chars().take(MAX_ERROR_BODY).collect(),
    }
}

fn convert_route(route: ApiRoute, received_at: DateTime<Utc>) -> Route {
    let steps = route
        .legs
        .into_iter()
        .flat_map(|leg| leg.steps)
        .enumerate()
        .map(|(index, step)| convert_step(index, step, received_at))
        .collect();

    Route {
        geometry: to_points(&route.geometry.coordinates, received_at),
        total_duration_seconds: route.duration,
        total_distance_meters: route.distance,
        steps,
        alternatives: Vec::new(),
    }
}

fn convert_step(index: usize, step: ApiStep, received_at: DateTime<Utc>) -> ManeuverStep {
    let geometry = to_points(&step.geometry.coordinates, received_at);
    let bearing_after = step_exit_bearing(&geometry).or(step.maneuver.bearing_after);
    let voice_instruction = step
        .voice_instructions
        .into_iter()
        .next()
        .map(|v| v.announcement)
        .unwrap_or_else(|| step.maneuver.instruction.clone());
    let street_name = if step.name.is_empty() {
        "Continue".to_string()
    } else {
        step.name
    };

    ManeuverStep {
        index,
        instruction: step.maneuver.instruction,
        voice_instruction,
        distance_meters: step.distance,
        duration_seconds: step.duration,
        maneuver: Maneuver {
            kind: step.maneuver.kind,
            modifier: step.maneuver.modifier,
        },
        maneuver_location: GeoPoint::from_lon_lat(step.maneuver.location, received_at),
        bearing_before: step.maneuver.bearing_before,
        bearing_after,
        street_name,
        geometry,
    }
}

/// Bearing along the step, from its second vertex to its last. `None` when
/// those coincide (two-point steps) so the provider's value is used instead.
fn step_exit_bearing(geometry: &[GeoPoint]) -> Option<f64> {
    if geometry.len() < 2 {
        return None;
    }
    let from = &geometry[1];
    let to = &geometry[geometry.len() - 1];
    if from.same_location(to) {
        None
    } else {
        Some(from.heading_to(to))
    }
}

fn to_points(coordinates: &[[f64; 2]], received_at: DateTime<Utc>) -> Vec<GeoPoint> {
    coordinates
        .iter()
        .map(|c| GeoPoint::from_lon_lat(*c, received_at))
        .collect()
}

#[derive(Deserialize)]
struct ApiError {
    message: Option<String>,
}

#[derive(Deserialize)]
struct DirectionsResponse {
    #[serde(default)]
    routes: Vec<ApiRoute>,
}

#[derive(Deserialize)]
struct ApiRoute {
    geometry: LineString,
    duration: f64,
    distance: f64,
    #[serde(default)]
    legs: Vec<ApiLeg>,
}

#[derive(Deserialize)]
struct LineString {
    coordinates: Vec<[f64; 2]>,
}

#[derive(Deserialize)]
struct ApiLeg {
    #[serde(default)]
    steps: Vec<ApiStep>,
}

#[derive(Deserialize)]
struct ApiStep {
    distance: f64,
    duration: f64,
    #[serde(default)]
    name: String,
    geometry: LineString,
    maneuver: ApiManeuver,
    #[serde(default, rename = "voiceInstructions")]
    voice_instructions: Vec<VoiceInstruction>,
}

#[derive(Deserialize)]
struct ApiManeuver {
    #[serde(rename = "type")]
    kind: String,
    modifier: Option<String>,
    #[serde(default)]
    instruction: String,
    location: [f64; 2],
    bearing_before: Option<f64>,
    bearing_after: Option<f64>,
}

#[derive(Deserialize)]
struct VoiceInstruction {
    announcement: String,
}
