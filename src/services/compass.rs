//! Compass-point resolution for wind directions.
//!
//! Observed wind directions arrive as 16-point compass labels and are turned
//! into angles before modelling; predicted angles are mapped back to a label
//! with [`nearest_compass_point`].
//!
//! Distance is plain `|a - b|` over the canonical angles in `[0, 360)`, not
//! circular distance: 350° resolves to "NNW" (12.5° away) rather than "N"
//! (10° away around the wrap). Ties go to the first entry in table order.

/// The 16-point compass, 22.5° apart, in table order.
pub const COMPASS_POINTS: [(f64, &str); 16] = [
    (0.0, "N"),
    (22.5, "NNE"),
    (45.0, "NE"),
    (67.5, "ENE"),
    (90.0, "E"),
    (112.5, "ESE"),
    (135.0, "SE"),
    (157.5, "SSE"),
    (180.0, "S"),
    (202.5, "SSW"),
    (225.0, "SW"),
    (247.5, "WSW"),
    (270.0, "W"),
    (292.5, "WNW"),
    (315.0, "NW"),
    (337.5, "NNW"),
];

/// Label whose angle has the smallest absolute difference from `angle`.
///
/// Returns `None` only when `directions` is empty. On exact ties the entry
/// that comes first in `directions` wins.
pub fn nearest_compass_point<'a>(angle: f64, directions: &[(f64, &'a str)]) -> Option<&'a str> {
    let mut best: Option<(f64, &'a str)> = None;
    for &(point, label) in directions {
        let distance = (point - angle).abs();
        match best {
            Some((best_distance, _)) if distance >= best_distance => {}
            _ => best = Some((distance, label)),
        }
    }
    best.map(|(_, label)| label)
}

/// Angle of a compass label, or `None` for labels outside the 16-point set.
pub fn direction_to_angle(label: &str) -> Option<f64> {
    let label = label.trim();
    COMPASS_POINTS
        .iter()
        .find(|(_, l)| l.eq_ignore_ascii_case(label))
        .map(|(angle, _)| *angle)
}

/// Map a raw predicted angle to a compass label.
///
/// The prediction is rounded to whole degrees (ties to even) and wrapped into
/// `[0, 360)` before the linear nearest-point lookup.
pub fn angle_to_compass_label(predicted: f64) -> &'static str {
    if !predicted.is_finite() {
        return COMPASS_POINTS[0].1;
    }
    let normalised = predicted.round_ties_even().rem_euclid(360.0);
    nearest_compass_point(normalised, &COMPASS_POINTS).unwrap_or(COMPASS_POINTS[0].1)
}
