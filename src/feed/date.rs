use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone, Utc, Weekday};
use thiserror::Error;

/// RFC 1123 with a numeric offset, weekday already removed,
/// e.g. `02 Jan 2006 15:04:05 -0700`.
const RFC1123_NUMERIC: &str = "%d %b %Y %H:%M:%S %z";

/// RFC 1123 without the zone; the trailing abbreviation is resolved separately.
const RFC1123_LOCAL: &str = "%d %b %Y %H:%M:%S";

/// Errors returned when a publication date cannot be normalized.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DateParseError {
    /// The raw string was empty or whitespace only
    #[error("Empty publication date")]
    Empty,
    /// No accepted layout matched
    #[error("Unrecognized publication date: {0}")]
    Unrecognized(String),
}

/// Fallback layouts, tried in order after the numeric-offset layout fails.
#[derive(Debug, Clone, Copy)]
enum Fallback {
    /// `Mon, 02 Jan 2006 15:04:05 MST`
    NamedZone,
    /// Anything chrono accepts as RFC 2822 (obsolete zones, odd spacing)
    Rfc2822,
    /// `2006-01-02T15:04:05Z`, seen in feeds that copy Atom timestamps
    Rfc3339,
}

const FALLBACKS: [Fallback; 3] = [Fallback::NamedZone, Fallback::Rfc2822, Fallback::Rfc3339];

impl Fallback {
    fn parse(self, raw: &str) -> Option<DateTime<Utc>> {
        match self {
            Fallback::NamedZone => parse_named_zone(raw),
            Fallback::Rfc2822 => DateTime::parse_from_rfc2822(raw)
                .ok()
                .map(|dt| dt.with_timezone(&Utc)),
            Fallback::Rfc3339 => DateTime::parse_from_rfc3339(raw)
                .ok()
                .map(|dt| dt.with_timezone(&Utc)),
        }
    }
}

/// Normalize a feed item's `pubDate` into a UTC instant.
///
/// The numeric-offset RFC 1123 layout is tried first, then each fallback in
/// order. Surrounding whitespace is ignored. A leading weekday must be a day
/// name but is not checked against the date: hand-edited feeds often get it
/// wrong. An empty string is a failure, never a sentinel timestamp, so
/// callers skip the item instead of storing it.
///
/// # Examples
///
/// ```
/// use rss_aggregator::feed::normalize_pub_date;
///
/// let dt = normalize_pub_date("Mon, 02 Jan 2006 15:04:05 -0700").unwrap();
/// assert_eq!(dt.to_rfc3339(), "2006-01-02T22:04:05+00:00");
///
/// assert!(normalize_pub_date("not-a-date").is_err());
/// ```
pub fn normalize_pub_date(raw: &str) -> Result<DateTime<Utc>, DateParseError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(DateParseError::Empty);
    }

    let body = strip_weekday(trimmed);
    if let Ok(dt) = DateTime::parse_from_str(body, RFC1123_NUMERIC) {
        return Ok(dt.with_timezone(&Utc));
    }

    FALLBACKS
        .iter()
        .find_map(|layout| layout.parse(body))
        .ok_or_else(|| DateParseError::Unrecognized(trimmed.to_string()))
}

/// Drop a leading `Day, ` token. Anything that isn't a day name is left alone
/// so the layouts reject it.
fn strip_weekday(raw: &str) -> &str {
    match raw.split_once(',') {
        Some((day, rest)) if day.trim().parse::<Weekday>().is_ok() => rest.trim_start(),
        _ => raw,
    }
}

fn parse_named_zone(raw: &str) -> Option<DateTime<Utc>> {
    let (local, zone) = raw.rsplit_once(' ')?;
    if zone.is_empty() || !zone.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }

    let naive = NaiveDateTime::parse_from_str(local, RFC1123_LOCAL).ok()?;
    let offset = FixedOffset::east_opt(zone_offset_secs(zone))?;
    offset
        .from_local_datetime(&naive)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Offset for a zone abbreviation. Unknown abbreviations are read as UTC.
fn zone_offset_secs(zone: &str) -> i32 {
    const HOUR: i32 = 3600;
    match zone.to_ascii_uppercase().as_str() {
        "UT" | "UTC" | "GMT" | "Z" => 0,
        "EDT" => -4 * HOUR,
        "EST" | "CDT" => -5 * HOUR,
        "CST" | "MDT" => -6 * HOUR,
        "MST" | "PDT" => -7 * HOUR,
        "PST" => -8 * HOUR,
        "BST" | "CET" => HOUR,
        "CEST" | "EET" => 2 * HOUR,
        "EEST" => 3 * HOUR,
        "JST" => 9 * HOUR,
        _ => {
            tracing::debug!(zone = %zone, "Unknown zone abbreviation, assuming UTC");
            0
        }
    }
}
