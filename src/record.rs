//! Recorder log parsing.
//!
//! A recorder log holds one JSON object per line, optionally preceded by a
//! prefix such as a timestamp and a record marker. Lines that cannot be
//! decoded are counted and skipped so a single corrupt line never loses the
//! rest of the track.

use crate::{Extras, LocationPoint, iso_time};
use serde_json::{Map, Value};
use tracing::{debug, warn};

/// Points recovered from a recorder log, sorted by time.
#[derive(Debug, Clone, Default)]
pub struct ParsedLog {
    pub points: Vec<LocationPoint>,
    /// Lines containing `{` that failed to decode.
    pub parse_error_count: usize,
}

pub fn parse_records(text: &str) -> ParsedLog {
    let mut points = Vec::new();
    let mut parse_error_count = 0;

    for (index, line) in text.split('\n').enumerate() {
        if line.trim().is_empty() {
            continue;
        }

        // Anything before the first brace is a prefix, a line without one is not data
        let Some(json_start) = line.find('{') else {
            continue;
        };

        let record: Value = match serde_json::from_str(&line[json_start..]) {
            Ok(value) => value,
            Err(e) => {
                parse_error_count += 1;
                warn!(line = index + 1, error = %e, "failed to parse record");
                continue;
            }
        };

        let Some(fields) = record.as_object() else {
            continue;
        };

        match location_point(fields) {
            Ok(Some(point)) => points.push(point),
            Ok(None) => debug!(line = index + 1, "skipping non-location record"),
            Err(reason) => {
                parse_error_count += 1;
                warn!(line = index + 1, reason, "failed to read location record");
            }
        }
    }

    // Stable, so records sharing a timestamp stay in file order
    points.sort_by_key(|p| p.timestamp_ms);

    debug!(
        points = points.len(),
        parse_errors = parse_error_count,
        "parsed recorder log"
    );

    ParsedLog {
        points,
        parse_error_count,
    }
}

/// `Ok(None)` for records that are not usable locations, `Err` for location
/// records whose time cannot be resolved.
fn location_point(fields: &Map<String, Value>) -> Result<Option<LocationPoint>, &'static str> {
    if fields.get("_type").and_then(Value::as_str) != Some("location") {
        return Ok(None);
    }

    // Coordinates must be truthy, so a numeric 0 counts as missing
    let (Some(lat), Some(lon)) = (truthy_number(fields.get("lat")), truthy_number(fields.get("lon")))
    else {
        return Ok(None);
    };

    let tst = fields
        .get("tst")
        .and_then(loose_number)
        .ok_or("missing or non-numeric tst")?;

    let timestamp_ms = (tst * 1000.0) as i64;
    let iso_time = iso_time(timestamp_ms).ok_or("tst out of range")?;

    Ok(Some(LocationPoint {
        lat,
        lon,
        elevation: truthy_number(fields.get("alt")).unwrap_or(0.0),
        timestamp_ms,
        iso_time,
        accuracy: truthy_number(fields.get("acc")),
        extras: Extras {
            accuracy: fields.get("acc").cloned(),
            battery: fields.get("batt").cloned(),
            velocity: fields.get("vel").cloned(),
            connection: fields.get("conn").cloned(),
        },
    }))
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Numeric reading of a JSON value with loose coercion: numeric strings
/// convert, `null` and blank strings read as 0, booleans as 1 or 0.
fn loose_number(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Null => 0.0,
        Value::Bool(b) => f64::from(u8::from(*b)),
        Value::Number(n) => n.as_f64()?,
        Value::String(s) if s.trim().is_empty() => 0.0,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        Value::Array(_) | Value::Object(_) => return None,
    };
    n.is_finite().then_some(n)
}

fn truthy_number(value: Option<&Value>) -> Option<f64> {
    value.filter(|v| is_truthy(v)).and_then(loose_number)
}
