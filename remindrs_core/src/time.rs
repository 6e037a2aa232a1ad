//! Timezone resolution and wall-clock conversion.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;

/// Resolve a timezone name, falling back to `fallback`, then to UTC.
#[must_use]
pub fn resolve_tz(name: &str, fallback: &str) -> Tz {
    name.parse()
        .or_else(|_| fallback.parse())
        .unwrap_or(chrono_tz::UTC)
}

/// Convert a wall-clock time in `tz` to the UTC instant.
///
/// Ambiguous local times (DST fall-back) resolve to the earlier instant;
/// nonexistent local times (DST gap) are read as UTC.
#[must_use]
pub fn local_to_utc(naive: NaiveDateTime, tz: Tz) -> DateTime<Utc> {
    tz.from_local_datetime(&naive).earliest().map_or_else(
        || Utc.from_utc_datetime(&naive),
        |dt| dt.with_timezone(&Utc),
    )
}
