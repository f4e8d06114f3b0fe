use chrono::{DateTime, Days, Duration, LocalResult, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;

/// Compute the next UTC instant after `from` at which a daily trigger for
/// `hour:minute` local time in `tz` should fire.
///
/// Wall-clock rules on transition days:
/// - ambiguous local time (clocks go back): the earlier instant only, so the
///   trigger fires once;
/// - non-existent local time (clocks go forward): the same wall-clock time
///   shifted past the gap, so the day is not skipped.
///
/// Returns `None` only for an invalid `hour`/`minute`.
pub fn next_fire(hour: u8, minute: u8, tz: &Tz, from: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let local_today = from.with_timezone(tz).date_naive();

    // Today's slot may already have passed; tomorrow's cannot have.
    for offset in 0..3 {
        let date = local_today.checked_add_days(Days::new(offset))?;
        let candidate = resolve_local(date, hour, minute, tz)?;
        if candidate > from {
            return Some(candidate);
        }
    }
    None
}

/// Map a local date + wall-clock time in `tz` to a single UTC instant.
fn resolve_local(date: NaiveDate, hour: u8, minute: u8, tz: &Tz) -> Option<DateTime<Utc>> {
    let naive = date.and_hms_opt(u32::from(hour), u32::from(minute), 0)?;
    let local = match tz.from_local_datetime(&naive) {
        LocalResult::Single(t) => t,
        LocalResult::Ambiguous(earliest, _) => earliest,
        // Gaps are at most a couple of hours in practice; step forward until
        // the wall-clock time exists again.
        LocalResult::None => (1..=3)
            .find_map(|h| tz.from_local_datetime(&(naive + Duration::hours(h))).earliest())?,
    };
    Some(local.with_timezone(&Utc))
}
