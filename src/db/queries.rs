use chrono::NaiveDate;
use sqlx::PgExecutor;

use super::models::{ConditionRow, LocationRow, UpsertComputedParams};

// Non-numeric coordinate values read as NULL instead of failing the cast.
const LOCATION_COLUMNS: &str = "location_id, location_name,
        CASE WHEN jsonb_typeof(coordinates->'latitude') = 'number'
             THEN (coordinates->>'latitude')::numeric END AS latitude,
        CASE WHEN jsonb_typeof(coordinates->'longitude') = 'number'
             THEN (coordinates->>'longitude')::numeric END AS longitude,
        created_at, deleted_at";

const CONDITION_COLUMNS: &str = "date, time_of_day, location_id,
        wave_height, wind_wave_height, swell_wave_height,
        wave_direction, wind_wave_direction, swell_wave_direction,
        wave_period, wind_wave_period, swell_wave_period,
        wind_wave_peak_period, swell_wave_peak_period,
        wind_speed, wind_direction, weather";

// A conflict overwrites every non-key column and revives soft-deleted rows.
const UPSERT_PREDICTION_SQL: &str = "INSERT INTO predicted_sea_conditions (
    date, time_of_day, location_id,
    wave_height, wind_wave_height, swell_wave_height,
    wave_direction, wind_wave_direction, swell_wave_direction,
    wave_period, wind_wave_period, swell_wave_period,
    wind_wave_peak_period, swell_wave_peak_period,
    wind_speed, wind_direction, weather, created_at
) VALUES (
    $1, $2, $3, $4, $5, $6, $7, $8, $9,
    $10, $11, $12, $13, $14, $15, $16, $17, NOW()
)
ON CONFLICT (date, time_of_day, location_id) DO UPDATE SET
    wave_height = EXCLUDED.wave_height,
    wind_wave_height = EXCLUDED.wind_wave_height,
    swell_wave_height = EXCLUDED.swell_wave_height,
    wave_direction = EXCLUDED.wave_direction,
    wind_wave_direction = EXCLUDED.wind_wave_direction,
    swell_wave_direction = EXCLUDED.swell_wave_direction,
    wave_period = EXCLUDED.wave_period,
    wind_wave_period = EXCLUDED.wind_wave_period,
    swell_wave_period = EXCLUDED.swell_wave_period,
    wind_wave_peak_period = EXCLUDED.wind_wave_peak_period,
    swell_wave_peak_period = EXCLUDED.swell_wave_peak_period,
    wind_speed = EXCLUDED.wind_speed,
    wind_direction = EXCLUDED.wind_direction,
    weather = EXCLUDED.weather,
    deleted_at = NULL,
    created_at = NOW()";

const UPSERT_COMPUTED_SQL: &str = "INSERT INTO computed_sea_conditions (
    location_id, time_of_day, surf_difficulty, wave_quality,
    wind_impact, recommendation, computed_at, created_at
) VALUES ($1, $2, $3, $4, $5, $6, $7, NOW())
ON CONFLICT (location_id, time_of_day) DO UPDATE SET
    surf_difficulty = EXCLUDED.surf_difficulty,
    wave_quality = EXCLUDED.wave_quality,
    wind_impact = EXCLUDED.wind_impact,
    recommendation = EXCLUDED.recommendation,
    computed_at = EXCLUDED.computed_at,
    deleted_at = NULL,
    created_at = NOW()";

/// List all non-deleted locations, ordered by id.
pub async fn list_locations<'e, E>(executor: E) -> Result<Vec<LocationRow>, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    sqlx::query_as::<_, LocationRow>(&format!(
        "SELECT {LOCATION_COLUMNS}
         FROM locations
         WHERE deleted_at IS NULL
         ORDER BY location_id"
    ))
    .fetch_all(executor)
    .await
}

/// Load the non-deleted locations among `ids`. Unknown ids are simply absent.
pub async fn get_locations<'e, E>(executor: E, ids: &[i32]) -> Result<Vec<LocationRow>, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    sqlx::query_as::<_, LocationRow>(&format!(
        "SELECT {LOCATION_COLUMNS}
         FROM locations
         WHERE deleted_at IS NULL AND location_id = ANY($1)
         ORDER BY location_id"
    ))
    .bind(ids)
    .fetch_all(executor)
    .await
}

/// Full observed history for a location, oldest first.
pub async fn get_observations<'e, E>(
    executor: E,
    location_id: i32,
) -> Result<Vec<ConditionRow>, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    sqlx::query_as::<_, ConditionRow>(&format!(
        "SELECT {CONDITION_COLUMNS}
         FROM sea_conditions
         WHERE location_id = $1 AND deleted_at IS NULL
         ORDER BY date, time_of_day"
    ))
    .bind(location_id)
    .fetch_all(executor)
    .await
}

/// Predicted rows for one location and date, ordered by time of day.
pub async fn get_predictions_for_date<'e, E>(
    executor: E,
    location_id: i32,
    date: NaiveDate,
) -> Result<Vec<ConditionRow>, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    sqlx::query_as::<_, ConditionRow>(&format!(
        "SELECT {CONDITION_COLUMNS}
         FROM predicted_sea_conditions
         WHERE location_id = $1 AND date = $2 AND deleted_at IS NULL
         ORDER BY time_of_day"
    ))
    .bind(location_id)
    .bind(date)
    .fetch_all(executor)
    .await
}

/// Insert a predicted row, or overwrite every field of the existing row with
/// the same (date, time_of_day, location_id).
pub async fn upsert_prediction<'e, E>(executor: E, row: &ConditionRow) -> Result<(), sqlx::Error>
where
    E: PgExecutor<'e>,
{
    sqlx::query(UPSERT_PREDICTION_SQL)
        .bind(row.date)
        .bind(row.time_of_day)
        .bind(row.location_id)
        .bind(row.wave_height)
        .bind(row.wind_wave_height)
        .bind(row.swell_wave_height)
        .bind(row.wave_direction)
        .bind(row.wind_wave_direction)
        .bind(row.swell_wave_direction)
        .bind(row.wave_period)
        .bind(row.wind_wave_period)
        .bind(row.swell_wave_period)
        .bind(row.wind_wave_peak_period)
        .bind(row.swell_wave_peak_period)
        .bind(row.wind_speed)
        .bind(&row.wind_direction)
        .bind(&row.weather)
        .execute(executor)
        .await?;
    Ok(())
}

/// Insert a computed row, or overwrite the existing row for (location_id, time_of_day).
pub async fn upsert_computed<'e, E>(
    executor: E,
    params: &UpsertComputedParams,
) -> Result<(), sqlx::Error>
where
    E: PgExecutor<'e>,
{
    sqlx::query(UPSERT_COMPUTED_SQL)
        .bind(params.location_id)
        .bind(params.time_of_day)
        .bind(params.surf_difficulty)
        .bind(params.wave_quality)
        .bind(params.wind_impact)
        .bind(params.recommendation)
        .bind(params.computed_at)
        .execute(executor)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const MIGRATION: &str = include_str!("../../migrations/20240601000000_surf_conditions.sql");

    fn squash(sql: &str) -> String {
        sql.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    #[test]
    fn test_conflict_targets_match_unique_constraints() {
        let migration = squash(MIGRATION);
        assert!(migration.contains("UNIQUE (date, time_of_day, location_id)"));
        assert!(migration.contains("UNIQUE (location_id, time_of_day)"));

        assert!(squash(UPSERT_PREDICTION_SQL)
            .contains("ON CONFLICT (date, time_of_day, location_id) DO UPDATE SET"));
        assert!(squash(UPSERT_COMPUTED_SQL).contains("ON CONFLICT (location_id, time_of_day) DO UPDATE SET"));
    }

    #[test]
    fn test_prediction_upsert_overwrites_every_non_key_column() {
        let sql = squash(UPSERT_PREDICTION_SQL);
        let keys = ["date", "time_of_day", "location_id"];
        for column in CONDITION_COLUMNS.split(',').map(str::trim) {
            if keys.contains(&column) {
                continue;
            }
            assert!(
                sql.contains(&format!("{column} = EXCLUDED.{column}")),
                "{column} is not overwritten on conflict"
            );
        }
        assert!(sql.contains("deleted_at = NULL"));
    }

    #[test]
    fn test_computed_upsert_overwrites_every_non_key_column() {
        let sql = squash(UPSERT_COMPUTED_SQL);
        for column in [
            "surf_difficulty",
            "wave_quality",
            "wind_impact",
            "recommendation",
            "computed_at",
        ] {
            assert!(
                sql.contains(&format!("{column} = EXCLUDED.{column}")),
                "{column} is not overwritten on conflict"
            );
        }
        assert!(sql.contains("deleted_at = NULL"));
    }

    #[test]
    fn test_coordinates_only_cast_when_numeric() {
        let columns = squash(LOCATION_COLUMNS);
        assert!(columns.contains("jsonb_typeof(coordinates->'latitude') = 'number'"));
        assert!(columns.contains("jsonb_typeof(coordinates->'longitude') = 'number'"));
    }
}
