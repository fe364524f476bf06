//! Historical offsets from the IANA tz database.

use chrono::{LocalResult, NaiveDateTime, Offset, TimeZone};
use chrono_tz::Tz;

use super::OffsetLookup;
use crate::types::TimePrecision;

/// Offset in effect in `zone_id` at a local wall-clock time.
///
/// Honours DST and historical rule changes. A time in a DST fold takes the
/// earlier instant; a time in a DST gap is moved forward by the gap. Both
/// are flagged [`TimePrecision::Approximate`]. Returns `None` for zone ids
/// the database does not know.
pub fn offset_in_zone(zone_id: &str, local: NaiveDateTime) -> Option<OffsetLookup> {
    let tz: Tz = zone_id.trim().parse().ok()?;

    let (offset_minutes, precision) = match tz.from_local_datetime(&local) {
        LocalResult::Single(dt) => (dt.offset().fix().local_minus_utc() / 60, TimePrecision::Exact),
        LocalResult::Ambiguous(earliest, _) => {
            (earliest.offset().fix().local_minus_utc() / 60, TimePrecision::Approximate)
        }
        LocalResult::None => {
            let shifted = tz
                .from_local_datetime(&(local + chrono::Duration::hours(1)))
                .earliest()?;
            // Offset that maps the original wall time onto the shifted instant.
            let minutes = (local - shifted.naive_utc()).num_minutes() as i32;
            (minutes, TimePrecision::Approximate)
        }
    };

    Some(OffsetLookup {
        utc_offset_minutes: offset_minutes,
        zone_id: Some(tz.name().to_string()),
        precision,
    })
}
