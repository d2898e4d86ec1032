use axum::extract::State;
use axum::Json;
use serde::Serialize;
use sqlx::PgPool;
use utoipa::ToSchema;

use crate::db::queries;
use crate::domain::{Coordinates, Location};
use crate::errors::{AppError, ErrorResponse};

/// Response type for GET /api/v1/locations.
#[derive(Debug, Serialize, ToSchema)]
pub struct LocationResponse {
    /// Location identifier
    pub id: i32,
    /// Display name (e.g. "Nazaré")
    pub name: String,
    pub coordinates: Coordinates,
    /// When the location was registered, RFC 3339
    pub created_at: String,
}

impl LocationResponse {
    /// `None` for locations that would be excluded from forecasting.
    fn from_location(location: Location) -> Option<Self> {
        let coordinates = location.coordinates().ok()?;
        Some(Self {
            id: location.id,
            name: location.name,
            coordinates,
            created_at: location.created_at.to_rfc3339(),
        })
    }
}

/// List forecastable locations.
///
/// Only active locations with both latitude and longitude are returned.
#[utoipa::path(
    get,
    path = "/api/v1/locations",
    tag = "Locations",
    responses(
        (status = 200, description = "Locations with complete coordinates", body = Vec<LocationResponse>),
        (status = 500, description = "Internal server error", body = ErrorResponse),
    )
)]
pub async fn list_locations(
    State(pool): State<PgPool>,
) -> Result<Json<Vec<LocationResponse>>, AppError> {
    let rows = queries::list_locations(&pool).await?;
    Ok(Json(
        rows.into_iter()
            .map(Location::from)
            .filter_map(LocationResponse::from_location)
            .collect(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn location(latitude: Option<f64>, longitude: Option<f64>) -> Location {
        Location {
            id: 5,
            name: "Nazaré".to_string(),
            latitude,
            longitude,
            created_at: Utc::now(),
            deleted_at: None,
        }
    }

    #[test]
    fn test_complete_location_is_listed() {
        let resp = LocationResponse::from_location(location(Some(39.6), Some(-9.07))).unwrap();
        assert_eq!(resp.id, 5);
        assert_eq!(resp.coordinates.latitude, 39.6);
        assert_eq!(resp.coordinates.longitude, -9.07);
    }

    #[test]
    fn test_incomplete_locations_are_hidden() {
        assert!(LocationResponse::from_location(location(None, None)).is_none());
        assert!(LocationResponse::from_location(location(Some(39.6), None)).is_none());
    }

    #[test]
    fn test_out_of_range_location_is_skipped_not_fatal() {
        let listed: Vec<LocationResponse> = [
            location(Some(39.6), Some(-9.07)),
            location(Some(139.6), Some(-9.07)),
            location(Some(43.0), Some(-1.5)),
        ]
        .into_iter()
        .filter_map(LocationResponse::from_location)
        .collect();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[1].coordinates.latitude, 43.0);
    }
}
