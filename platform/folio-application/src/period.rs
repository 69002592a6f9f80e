use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

pub const DEFAULT_LOOKBACK_DAYS: i64 = 30;
pub const MAX_LOOKBACK_DAYS: i64 = 36_500;

/// Inclusive reporting window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportPeriod {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

/// Period as rendered in responses (ISO-8601, millisecond precision, `Z` suffix).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodLabel {
    pub from: String,
    pub to: String,
}

impl ReportPeriod {
    /// `from` falls back to `lookback_days` before `now`, `to` falls back to `now`.
    pub fn resolve(
        from: Option<&str>,
        to: Option<&str>,
        lookback_days: i64,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            from: parse_date_param(from, lookback_days, now),
            to: parse_date_param(to, 0, now),
        }
    }

    pub fn from_ms(&self) -> i64 {
        self.from.timestamp_millis()
    }

    pub fn to_ms(&self) -> i64 {
        self.to.timestamp_millis()
    }

    pub fn contains_ms(&self, timestamp_ms: i64) -> bool {
        timestamp_ms >= self.from_ms() && timestamp_ms <= self.to_ms()
    }

    pub fn label(&self) -> PeriodLabel {
        PeriodLabel {
            from: iso_timestamp(self.from),
            to: iso_timestamp(self.to),
        }
    }
}

/// Parses an ISO-8601 date parameter. Absent, blank or unparseable values fall back to
/// `fallback_days` before `now`.
pub fn parse_date_param(
    value: Option<&str>,
    fallback_days: i64,
    now: DateTime<Utc>,
) -> DateTime<Utc> {
    value
        .map(str::trim)
        .filter(|raw| !raw.is_empty())
        .and_then(parse_iso8601)
        .unwrap_or_else(|| days_before(now, fallback_days))
}

/// Saturates at the earliest representable instant instead of overflowing.
fn days_before(now: DateTime<Utc>, days: i64) -> DateTime<Utc> {
    Duration::try_days(days)
        .and_then(|delta| now.checked_sub_signed(delta))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

fn parse_iso8601(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

pub fn iso_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}
