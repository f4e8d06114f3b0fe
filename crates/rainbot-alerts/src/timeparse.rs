use chrono::{NaiveTime, Timelike};

use crate::error::{AlertError, Result};

/// 24-hour forms, tried after 12-hour ones.
const FORMATS_24H: &[&str] = &["%H:%M", "%H:%M:%S", "%H.%M", "%Hh%M"];

/// 12-hour forms. The input is normalised so the marker is `am`/`pm` with at
/// most one space before it.
const FORMATS_12H: &[&str] = &[
    "%I:%M %p",
    "%I:%M%p",
    "%I:%M:%S %p",
    "%I:%M:%S%p",
    "%I.%M %p",
    "%I.%M%p",
];

/// Parse a free-form local time of day such as `7:30pm`, `19:30` or `noon`.
///
/// Only unambiguous input is accepted: a bare number like `7` could be
/// morning or evening and is rejected. Seconds are dropped; there is no date
/// component.
pub fn parse_time_of_day(input: &str) -> Result<NaiveTime> {
    let fail = || AlertError::TimeParse {
        input: input.to_string(),
    };
    let text = normalize(input);

    match text.as_str() {
        "" => return Err(fail()),
        "noon" | "midday" => return NaiveTime::from_hms_opt(12, 0, 0).ok_or_else(fail),
        "midnight" => return NaiveTime::from_hms_opt(0, 0, 0).ok_or_else(fail),
        _ => {}
    }

    // "7pm" / "7 pm": chrono needs minutes.
    let text = match split_meridiem(&text) {
        Some((hour, marker)) if hour.chars().all(|c| c.is_ascii_digit()) => {
            format!("{hour}:00 {marker}")
        }
        _ => text,
    };

    // "1930": exactly four digits is an unambiguous 24-hour clock reading.
    if text.len() == 4 && text.chars().all(|c| c.is_ascii_digit()) {
        return NaiveTime::parse_from_str(&text, "%H%M")
            .ok()
            .and_then(drop_seconds)
            .ok_or_else(fail);
    }

    FORMATS_12H
        .iter()
        .chain(FORMATS_24H)
        .find_map(|fmt| NaiveTime::parse_from_str(&text, fmt).ok())
        .and_then(drop_seconds)
        .ok_or_else(fail)
}

fn drop_seconds(t: NaiveTime) -> Option<NaiveTime> {
    NaiveTime::from_hms_opt(t.hour(), t.minute(), 0)
}

/// Lowercase, collapse whitespace, spell `a.m.`/`p.m.` as `am`/`pm`.
fn normalize(input: &str) -> String {
    let lower = input.trim().to_lowercase();
    let lower = lower
        .replace("a.m.", "am")
        .replace("p.m.", "pm")
        .replace("a.m", "am")
        .replace("p.m", "pm");
    lower.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Split `"7 pm"` / `"7pm"` into `("7", "pm")`.
fn split_meridiem(text: &str) -> Option<(&str, &str)> {
    ["am", "pm"].iter().find_map(|marker| {
        text.strip_suffix(marker)
            .map(|rest| (rest.trim_end(), *marker))
            .filter(|(rest, _)| !rest.is_empty())
    })
}
