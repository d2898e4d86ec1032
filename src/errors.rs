use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use utoipa::ToSchema;

/// Standard error response body.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Human-readable error message
    pub error: String,
}

/// Errors surfaced by the HTTP layer.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::DatabaseError(err) => {
                tracing::error!("Database error: {:?}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal database error".to_string(),
                )
            }
        };

        (status, axum::Json(ErrorResponse { error: message })).into_response()
    }
}

/// Persistence failures.
///
/// A natural-key conflict on upsert is not represented here: it is the
/// expected path and is resolved inside the query.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Connection or storage failure. Not retried within a run.
    #[error("persistence unavailable: {0}")]
    Unavailable(#[from] sqlx::Error),
}

/// A location that cannot be dispatched for forecasting.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum InvalidLocation {
    #[error("location {location_id} has no coordinates")]
    MissingCoordinates { location_id: i32 },

    #[error(
        "location {location_id} has partial coordinates (latitude={latitude:?}, longitude={longitude:?})"
    )]
    PartialCoordinates {
        location_id: i32,
        latitude: Option<f64>,
        longitude: Option<f64>,
    },

    #[error(
        "location {location_id} has out-of-range coordinates (latitude={latitude}, longitude={longitude})"
    )]
    OutOfRange {
        location_id: i32,
        latitude: f64,
        longitude: f64,
    },

    #[error("location {location_id} does not exist or is deleted")]
    Unknown { location_id: i32 },
}

impl InvalidLocation {
    pub fn location_id(&self) -> i32 {
        match self {
            InvalidLocation::MissingCoordinates { location_id }
            | InvalidLocation::PartialCoordinates { location_id, .. }
            | InvalidLocation::OutOfRange { location_id, .. }
            | InvalidLocation::Unknown { location_id } => *location_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_location_messages() {
        let err = InvalidLocation::MissingCoordinates { location_id: 3 };
        assert_eq!(err.to_string(), "location 3 has no coordinates");
        assert_eq!(err.location_id(), 3);

        let err = InvalidLocation::PartialCoordinates {
            location_id: 4,
            latitude: Some(43.5),
            longitude: None,
        };
        assert_eq!(
            err.to_string(),
            "location 4 has partial coordinates (latitude=Some(43.5), longitude=None)"
        );
        assert_eq!(err.location_id(), 4);
    }

    #[test]
    fn test_out_of_range_message() {
        let err = InvalidLocation::OutOfRange {
            location_id: 2,
            latitude: 139.6,
            longitude: -9.0,
        };
        assert_eq!(
            err.to_string(),
            "location 2 has out-of-range coordinates (latitude=139.6, longitude=-9)"
        );
        assert_eq!(err.location_id(), 2);
    }
}
