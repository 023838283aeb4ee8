pub mod filter;
pub mod gpxxml;
pub mod record;
mod session;

pub use filter::{FilterConfig, FilterOutcome, FilterStats, Threshold, TimeRange, filter_points};
pub use gpxxml::{encode_gpx, write_gpx};
pub use record::{ParsedLog, parse_records};
pub use session::{Conversion, Session, convert, read_log};

use serde_json::Value;
use std::path::PathBuf;
use thiserror::Error;
use time::macros::{format_description, time};
use time::{Date, OffsetDateTime, PrimitiveDateTime, Time, UtcOffset};

#[derive(Error, Debug)]
pub enum ConvertError {
    #[error("cannot read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no recorder log has been loaded")]
    NoInput,

    #[error("no GPX content to export, convert a log first")]
    NothingToExport,

    #[error("invalid time '{0}': expected YYYY-MM-DD or YYYY-MM-DD HH:MM")]
    InvalidTime(String),

    #[error("invalid UTC offset '{0}': expected +HH:MM, -HH:MM or Z")]
    InvalidOffset(String),

    #[error("invalid filter config: {0}")]
    InvalidFilterConfig(#[from] serde_json::Error),

    #[error("failed to write GPX: {0}")]
    Encode(#[from] std::io::Error),
}

/// A single position taken from a `_type: location` record.
#[derive(Debug, Clone, PartialEq)]
pub struct LocationPoint {
    pub lat: f64,
    pub lon: f64,
    /// Meters, 0 when the record carries no altitude.
    pub elevation: f64,
    pub timestamp_ms: i64,
    pub iso_time: String,
    /// Horizontal error radius in meters, `None` when absent or zero.
    pub accuracy: Option<f64>,
    pub extras: Extras,
}

/// Auxiliary recorder fields passed through to the GPX extensions block.
///
/// Values are kept as the raw JSON they arrived as. A field that was absent
/// from the record is `None` and is never written out.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Extras {
    pub accuracy: Option<Value>,
    pub battery: Option<Value>,
    pub velocity: Option<Value>,
    pub connection: Option<Value>,
}

impl Extras {
    /// Defined fields in output order.
    pub fn fields(&self) -> impl Iterator<Item = (&'static str, &Value)> {
        [
            ("accuracy", self.accuracy.as_ref()),
            ("battery", self.battery.as_ref()),
            ("velocity", self.velocity.as_ref()),
            ("connection", self.connection.as_ref()),
        ]
        .into_iter()
        .filter_map(|(name, value)| value.map(|v| (name, v)))
    }

    pub fn is_empty(&self) -> bool {
        self.fields().next().is_none()
    }
}

/// Which end of a time range a user-supplied bound describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundKind {
    Start,
    End,
}

/// Calculates the great circle distance in meters between two GPS coordinates
/// using the haversine formula.
///
/// References:
/// - R.W. Sinnott, "Virtues of the Haversine", Sky and Telescope, vol. 68, no. 2, 1984, p. 159
/// - https://en.wikipedia.org/wiki/Haversine_formula
pub fn haversine_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    const EARTH_RADIUS: f64 = 6371000.0; // Mean Earth radius in meters

    let lat1_rad = lat1.to_radians();
    let lat2_rad = lat2.to_radians();
    let delta_lat = (lat2 - lat1).to_radians();
    let delta_lon = (lon2 - lon1).to_radians();

    // a = sin²(Δφ/2) + cos φ1 ⋅ cos φ2 ⋅ sin²(Δλ/2)
    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (delta_lon / 2.0).sin().powi(2);

    // c = 2 ⋅ atan2(√a, √(1−a))
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS * c
}

/// Speed in meters per second over `distance` meters between two epoch
/// millisecond timestamps. A non-positive time delta yields 0.
pub fn calculate_speed(distance: f64, from_ms: i64, to_ms: i64) -> f64 {
    let time_diff = (to_ms - from_ms) as f64 / 1000.0;

    if time_diff > 0.0 {
        distance / time_diff
    } else {
        0.0
    }
}

fn datetime_from_millis(timestamp_ms: i64) -> Option<OffsetDateTime> {
    OffsetDateTime::from_unix_timestamp_nanos(i128::from(timestamp_ms) * 1_000_000).ok()
}

fn unix_millis(datetime: OffsetDateTime) -> i64 {
    (datetime.unix_timestamp_nanos() / 1_000_000) as i64
}

/// Formats epoch milliseconds as `YYYY-MM-DDTHH:MM:SS.mmmZ`.
///
/// Returns `None` when the timestamp is outside the representable range.
pub fn iso_time(timestamp_ms: i64) -> Option<String> {
    datetime_from_millis(timestamp_ms)?
        .format(format_description!(
            "[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:3]Z"
        ))
        .ok()
}

/// Formats epoch milliseconds as a UTC time truncated to the minute,
/// `YYYY-MM-DDTHH:MM`.
pub fn minute_time(timestamp_ms: i64) -> Option<String> {
    datetime_from_millis(timestamp_ms)?
        .format(format_description!("[year]-[month]-[day]T[hour]:[minute]"))
        .ok()
}

/// Resolves a local date or date-time to epoch milliseconds.
///
/// Accepts `YYYY-MM-DD HH:MM`, `YYYY-MM-DDTHH:MM` and a bare `YYYY-MM-DD`. A
/// bare date starts at 00:00 for [`BoundKind::Start`] and at 23:59 for
/// [`BoundKind::End`].
pub fn parse_bound(input: &str, kind: BoundKind, offset: UtcOffset) -> Result<i64, ConvertError> {
    let s = input.trim();

    let datetime = if let Ok(date) = Date::parse(s, format_description!("[year]-[month]-[day]")) {
        PrimitiveDateTime::new(date, default_time(kind))
    } else {
        PrimitiveDateTime::parse(s, format_description!("[year]-[month]-[day] [hour]:[minute]"))
            .or_else(|_| {
                PrimitiveDateTime::parse(
                    s,
                    format_description!("[year]-[month]-[day]T[hour]:[minute]"),
                )
            })
            .map_err(|_| ConvertError::InvalidTime(s.to_string()))?
    };

    Ok(unix_millis(datetime.assume_offset(offset)))
}

fn default_time(kind: BoundKind) -> Time {
    match kind {
        BoundKind::Start => Time::MIDNIGHT,
        BoundKind::End => time!(23:59),
    }
}

/// Parses `+HH:MM`, `-HH:MM`, `Z` or `UTC`.
pub fn parse_offset(input: &str) -> Result<UtcOffset, ConvertError> {
    let s = input.trim();
    if s.eq_ignore_ascii_case("z") || s.eq_ignore_ascii_case("utc") {
        return Ok(UtcOffset::UTC);
    }

    UtcOffset::parse(
        s,
        format_description!("[offset_hour sign:mandatory]:[offset_minute]"),
    )
    .map_err(|_| ConvertError::InvalidOffset(s.to_string()))
}

/// Range covering `days` whole local days ending today: 00:00 of the first
/// day through 23:59 of `now`'s date. `days == 1` is today only.
pub fn last_days_range(now: OffsetDateTime, days: u32) -> TimeRange {
    let today = now.date();
    let first = today
        .checked_sub(time::Duration::days(i64::from(days.saturating_sub(1))))
        .unwrap_or(Date::MIN);
    let offset = now.offset();

    TimeRange {
        start_ms: Some(unix_millis(
            PrimitiveDateTime::new(first, default_time(BoundKind::Start)).assume_offset(offset),
        )),
        end_ms: Some(unix_millis(
            PrimitiveDateTime::new(today, default_time(BoundKind::End)).assume_offset(offset),
        )),
    }
}
