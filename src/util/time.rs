use chrono::{DateTime, Duration, NaiveDate, Utc};

// Parse an age window like "5d", "12h", "YYYY-MM-DD", or RFC3339 into a UTC cutoff.
// Relative windows are measured back from `now`. None if unparseable.
pub fn parse_cutoff_str(s: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Some(days) = s.strip_suffix('d').and_then(|n| n.parse::<i64>().ok()) {
        if days >= 0 { return Some(now - Duration::days(days)); }
    }
    if let Some(hours) = s.strip_suffix('h').and_then(|n| n.parse::<i64>().ok()) {
        if hours >= 0 { return Some(now - Duration::hours(hours)); }
    }
    if let Ok(nd) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        if let Some(dt) = nd.and_hms_opt(0, 0, 0) {
            return Some(DateTime::<Utc>::from_naive_utc_and_offset(dt, Utc));
        }
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    None
}
