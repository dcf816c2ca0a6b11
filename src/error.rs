use thiserror::Error;

use crate::domain::ZoneId;

/// Failure of a single zone layer. Always recoverable by toggling the zone on again.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ZoneError {
    /// Transport failure, non-2xx response, missing file or unreadable GeoJSON.
    #[error("Failed to load zone {zone}: {reason}")]
    FetchFailed { zone: ZoneId, reason: String },
    /// Geometry was retrieved but the rendering surface rejected it.
    #[error("Error adding zone {zone} to map: {reason}")]
    RenderFailed { zone: ZoneId, reason: String },
}

impl ZoneError {
    pub fn fetch(zone: ZoneId, reason: impl Into<String>) -> Self {
        ZoneError::FetchFailed {
            zone,
            reason: reason.into(),
        }
    }

    pub fn zone(&self) -> ZoneId {
        match self {
            ZoneError::FetchFailed { zone, .. } | ZoneError::RenderFailed { zone, .. } => *zone,
        }
    }
}

/// Errors surfaced to the user of a lookup session.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ZoneMapError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Geocoding service unavailable: {0}")]
    GeocodeUnavailable(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error(transparent)]
    ZoneFetchFailed(ZoneError),
    #[error(transparent)]
    RenderFailed(ZoneError),
}

impl ZoneMapError {
    /// Whether re-submitting the same request may succeed.
    ///
    /// `InvalidInput` and `NotFound` need new input from the user.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ZoneMapError::GeocodeUnavailable(_)
                | ZoneMapError::ZoneFetchFailed(_)
                | ZoneMapError::RenderFailed(_)
        )
    }
}

impl From<ZoneError> for ZoneMapError {
    fn from(err: ZoneError) -> Self {
        match err {
            ZoneError::FetchFailed { .. } => ZoneMapError::ZoneFetchFailed(err),
            ZoneError::RenderFailed { .. } => ZoneMapError::RenderFailed(err),
        }
    }
}
