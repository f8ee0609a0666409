use crate::directions::RoutingError;

/// Errors surfaced by the navigation tracker.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum NavigationError {
    /// The directions provider produced no route for the initial request.
    #[error("routing unavailable: {0}")]
    RoutingUnavailable(#[source] RoutingError),

    /// Every recalculation strategy failed. The session keeps its last route.
    #[error("route recalculation failed after {attempts} attempt(s): {last_error}")]
    RecalculationExhausted {
        attempts: usize,
        #[source]
        last_error: RoutingError,
    },

    #[error("step index {index} out of range for route with {len} step(s)")]
    IndexOutOfRange { index: usize, len: usize },

    /// The session was stopped or restarted while a request was in flight.
    #[error("navigation session was stopped")]
    Cancelled,
}
