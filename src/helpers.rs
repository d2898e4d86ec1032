//! Shared helpers for Decimal ↔ f64 conversions and hour alignment.
//!
//! Condition values are stored as unscaled NUMERIC, so f64→Decimal keeps full
//! precision. Values Decimal cannot hold (non-finite, or beyond its range)
//! never reach the store: the optional conversion maps them to NULL.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Timelike, Utc};
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;

/// Convert an f64 to Decimal preserving full precision. Only used for
/// NOT NULL columns, so an unrepresentable value falls back to zero.
pub(crate) fn f64_to_decimal(v: f64) -> Decimal {
    Decimal::from_f64(v).unwrap_or_else(|| {
        tracing::warn!(
            "f64_to_decimal received unrepresentable value {}, defaulting to 0",
            v
        );
        Decimal::ZERO
    })
}

/// Convert an optional f64 to Decimal. Non-finite or out-of-range inputs become `None`.
pub(crate) fn opt_f64_to_decimal(v: Option<f64>) -> Option<Decimal> {
    v.filter(|x| x.is_finite()).and_then(Decimal::from_f64)
}

/// Convert an Option<Decimal> to Option<f64>.
pub(crate) fn opt_dec_to_f64(d: Option<Decimal>) -> Option<f64> {
    d.and_then(|v| v.to_f64())
}

/// Midnight at the start of `date`.
pub(crate) fn midnight(date: NaiveDate) -> NaiveDateTime {
    date.and_hms_opt(0, 0, 0)
        .unwrap_or_else(|| NaiveDateTime::new(date, chrono::NaiveTime::MIN))
}

/// The first midnight strictly after `now` (UTC).
pub(crate) fn next_midnight(now: DateTime<Utc>) -> NaiveDateTime {
    let today = now.date_naive();
    let tomorrow = today.succ_opt().unwrap_or(today);
    midnight(tomorrow)
}

/// Today's midnight (UTC).
pub(crate) fn today_midnight(now: DateTime<Utc>) -> NaiveDateTime {
    midnight(now.date_naive())
}

/// Floor a timestamp to the start of its hour.
pub(crate) fn floor_to_hour(dt: NaiveDateTime) -> NaiveDateTime {
    dt.date()
        .and_hms_opt(dt.time().hour(), 0, 0)
        .unwrap_or(dt)
}

/// `count` consecutive hourly timestamps starting at `start` (floored to the hour).
pub(crate) fn hourly_steps(start: NaiveDateTime, count: usize) -> Vec<NaiveDateTime> {
    let first = floor_to_hour(start);
    (0..count)
        .map(|i| first + Duration::hours(i as i64))
        .collect()
}
