pub mod convert;
pub mod inspect;

use rec2gpx::{ConvertError, parse_offset};
use time::UtcOffset;
use tracing::warn;

/// Explicit offset if given, otherwise the system's local offset, falling
/// back to UTC when it cannot be determined.
pub fn resolve_offset(explicit: Option<&str>) -> Result<UtcOffset, ConvertError> {
    match explicit {
        Some(s) => parse_offset(s),
        None => Ok(UtcOffset::current_local_offset().unwrap_or_else(|e| {
            warn!(error = %e, "cannot determine local UTC offset, using UTC");
            UtcOffset::UTC
        })),
    }
}
