//! Wall-clock helpers: "HH:MM" parsing and timezone resolution.
use chrono::{DateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use once_cell::sync::Lazy;
use regex::Regex;

/// Zone used whenever a user's timezone is missing or unknown.
pub const FALLBACK_TZ: Tz = chrono_tz::Europe::Minsk;

static TIME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([01]\d|2[0-3]):([0-5]\d)$").expect("valid time regex"));

/// A validated `HH:MM` wall-clock time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DailyTime {
    pub hour: u32,
    pub minute: u32,
}

impl DailyTime {
    pub fn as_naive(&self) -> NaiveTime {
        NaiveTime::from_hms_opt(self.hour, self.minute, 0).unwrap_or(NaiveTime::MIN)
    }
}

impl std::fmt::Display for DailyTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

/// Parse a strict `HH:MM` string. Surrounding whitespace is ignored; anything
/// else (single-digit hours, other separators, out-of-range values) is `None`.
pub fn parse_time(raw: &str) -> Option<DailyTime> {
    let caps = TIME_RE.captures(raw.trim())?;
    let hour = caps[1].parse().ok()?;
    let minute = caps[2].parse().ok()?;
    Some(DailyTime { hour, minute })
}

/// Resolve a zone name, substituting `default` when it is absent or unknown.
pub fn resolve_zone(name: Option<&str>, default: Tz) -> Tz {
    name.map(str::trim)
        .filter(|n| !n.is_empty())
        .and_then(|n| n.parse::<Tz>().ok())
        .unwrap_or(default)
}

/// `now` expressed in the named zone. Never fails: an unknown zone falls back
/// to `default`.
pub fn now_in_zone(name: Option<&str>, default: Tz, now: DateTime<Utc>) -> DateTime<Tz> {
    resolve_zone(name, default).from_utc_datetime(&now.naive_utc())
}

/// Same calendar date, each instant read in its own zone.
pub fn same_local_day<A: TimeZone, B: TimeZone>(a: &DateTime<A>, b: &DateTime<B>) -> bool {
    a.date_naive() == b.date_naive()
}

/// Minute-granularity `HH:MM` of a local timestamp.
pub fn local_hhmm<Z: TimeZone>(t: &DateTime<Z>) -> String
where
    Z::Offset: std::fmt::Display,
{
    t.format("%H:%M").to_string()
}
