use chrono::{DateTime, Duration, Local, Offset, TimeZone, Utc};
use chrono_tz::Tz;

/// Re-anchor a wall-clock instant into a named IANA timezone.
///
/// `instant` is assumed to have been built by interpreting a wall-clock
/// date/time in the host's local zone. The result is the instant at which
/// that same wall-clock reading occurs in `timezone`: both offsets are
/// taken at `instant` itself, so DST transitions in either zone are
/// respected at that moment.
///
/// `None` for the timezone is a no-op; an unknown zone name yields `None`
/// (configuration error, not a panic).
pub fn adjust_to_timezone(
    instant: DateTime<Utc>,
    timezone: Option<&str>,
) -> Option<DateTime<Utc>> {
    let Some(name) = timezone else {
        return Some(instant);
    };
    let tz: Tz = name.parse().ok()?;

    let naive_utc = instant.naive_utc();
    let host_offset = Local.offset_from_utc_datetime(&naive_utc).local_minus_utc();
    let target_offset = tz
        .offset_from_utc_datetime(&naive_utc)
        .fix()
        .local_minus_utc();

    Some(instant + Duration::seconds((host_offset - target_offset) as i64))
}
