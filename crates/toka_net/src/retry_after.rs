//! `Retry-After` header parsing.

use std::time::{Duration, SystemTime};

/// Longest delay a server can impose between attempts.
pub const MAX_SERVER_DELAY: Duration = Duration::from_secs(300);

/// Parses a `Retry-After` value relative to `now`.
///
/// Accepts delta-seconds (`"120"`) or an HTTP date. Results are capped at
/// [`MAX_SERVER_DELAY`]. A zero delay, a date in the past and anything
/// unparsable are `None` and the caller falls back to its own backoff.
pub fn parse_retry_after(value: &str, now: SystemTime) -> Option<Duration> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    let delay = match value.parse::<u64>() {
        Ok(secs) => Duration::from_secs(secs),
        Err(_) => {
            let at = httpdate::parse_http_date(value).ok()?;
            at.duration_since(now).unwrap_or(Duration::ZERO)
        }
    };
    if delay.is_zero() {
        return None;
    }
    Some(delay.min(MAX_SERVER_DELAY))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_seconds() {
        let now = SystemTime::now();
        assert_eq!(parse_retry_after("3", now), Some(Duration::from_secs(3)));
        assert_eq!(parse_retry_after(" 120 ", now), Some(Duration::from_secs(120)));
    }

    #[test]
    fn capped_at_five_minutes() {
        let now = SystemTime::now();
        assert_eq!(parse_retry_after("3600", now), Some(MAX_SERVER_DELAY));
        assert_eq!(parse_retry_after("300", now), Some(MAX_SERVER_DELAY));
        assert_eq!(parse_retry_after("299", now), Some(Duration::from_secs(299)));
    }

    #[test]
    fn http_date_in_future() {
        let now = SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000);
        let at = httpdate::fmt_http_date(now + Duration::from_secs(42));
        assert_eq!(parse_retry_after(&at, now), Some(Duration::from_secs(42)));
    }

    #[test]
    fn http_date_far_future_capped() {
        let now = SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000);
        let at = httpdate::fmt_http_date(now + Duration::from_secs(7_200));
        assert_eq!(parse_retry_after(&at, now), Some(MAX_SERVER_DELAY));
    }

    #[test]
    fn zero_or_past_is_no_hint() {
        let now = SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000);
        let past = httpdate::fmt_http_date(now - Duration::from_secs(60));
        assert_eq!(parse_retry_after(&past, now), None);
        let exact = httpdate::fmt_http_date(now);
        assert_eq!(parse_retry_after(&exact, now), None);
        assert_eq!(parse_retry_after("0", now), None);
    }

    #[test]
    fn garbage_is_none() {
        let now = SystemTime::now();
        assert_eq!(parse_retry_after("soon", now), None);
        assert_eq!(parse_retry_after("-5", now), None);
        assert_eq!(parse_retry_after("", now), None);
    }
}
