//! Classify failed page requests for retry decisions.

use crate::error::{ResponseMeta, SourceError};
use chrono::{DateTime, NaiveDateTime, Utc};
use reqwest::header::RETRY_AFTER;
use reqwest::StatusCode;
use std::time::Duration;

/// Obsolete HTTP-date layouts still accepted from servers: RFC 850 and asctime.
const LEGACY_HTTP_DATES: [&str; 2] = ["%A, %d-%b-%y %H:%M:%S GMT", "%a %b %e %H:%M:%S %Y"];

/// Wait used for a 429 that carries no `Retry-After` header.
pub const RATE_LIMIT_WAIT: Duration = Duration::from_secs(60);

/// Retry verdict for one failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub retryable: bool,
    /// Server-imposed floor on the next wait, if any.
    pub min_delay: Option<Duration>,
}

impl Classification {
    pub fn retryable() -> Self {
        Self {
            retryable: true,
            min_delay: None,
        }
    }

    pub fn fatal() -> Self {
        Self {
            retryable: false,
            min_delay: None,
        }
    }
}

/// Classify a failed request, using `rate_limit_wait` for a 429 without `Retry-After`.
pub fn classify(err: &SourceError, rate_limit_wait: Duration) -> Classification {
    let response = match &err.response {
        Some(response) => response,
        // Transport failure, nothing came back.
        None => return Classification::retryable(),
    };

    match response.status {
        StatusCode::TOO_MANY_REQUESTS => Classification {
            retryable: true,
            min_delay: rate_limit_delay(response, Utc::now(), rate_limit_wait),
        },
        StatusCode::INTERNAL_SERVER_ERROR
        | StatusCode::BAD_GATEWAY
        | StatusCode::SERVICE_UNAVAILABLE
        | StatusCode::GATEWAY_TIMEOUT => Classification::retryable(),
        StatusCode::BAD_REQUEST
        | StatusCode::UNAUTHORIZED
        | StatusCode::FORBIDDEN
        | StatusCode::NOT_FOUND => Classification::fatal(),
        status if status.is_server_error() => Classification::retryable(),
        _ => Classification::fatal(),
    }
}

fn rate_limit_delay(
    response: &ResponseMeta,
    now: DateTime<Utc>,
    fallback: Duration,
) -> Option<Duration> {
    match response.headers.get(RETRY_AFTER) {
        None => Some(fallback),
        Some(value) => value
            .to_str()
            .ok()
            .and_then(|raw| parse_retry_after(raw, now)),
    }
}

/// Parse a `Retry-After` value given as delta seconds or as an HTTP date
/// in any of its three forms.
///
/// Dates in the past yield a zero delay.
pub fn parse_retry_after(raw: &str, now: DateTime<Utc>) -> Option<Duration> {
    let raw = raw.trim();

    if let Ok(seconds) = raw.parse::<u64>() {
        return Some(Duration::from_secs(seconds));
    }

    let at = parse_http_date(raw)?;
    Some(
        at.signed_duration_since(now)
            .to_std()
            .unwrap_or(Duration::ZERO),
    )
}

fn parse_http_date(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(at) = DateTime::parse_from_rfc2822(raw) {
        return Some(at.with_timezone(&Utc));
    }

    LEGACY_HTTP_DATES
        .iter()
        .find_map(|layout| NaiveDateTime::parse_from_str(raw, layout).ok())
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use reqwest::header::{HeaderMap, HeaderValue};

    fn http_failure(status: u16) -> SourceError {
        SourceError::with_response(
            format!("HTTP {status}"),
            ResponseMeta::new(StatusCode::from_u16(status).unwrap()),
        )
    }

    fn rate_limited(retry_after: &str) -> SourceError {
        let mut headers = HeaderMap::new();
        headers.insert(RETRY_AFTER, HeaderValue::from_str(retry_after).unwrap());
        SourceError::with_response(
            "slow down",
            ResponseMeta::new(StatusCode::TOO_MANY_REQUESTS).with_headers(headers),
        )
    }

    #[test]
    fn transport_failure_is_retryable() {
        let err = SourceError::transport("dns lookup failed");
        assert_eq!(classify(&err, RATE_LIMIT_WAIT), Classification::retryable());
    }

    #[test]
    fn listed_server_errors_are_retryable() {
        for status in [500, 502, 503, 504] {
            let c = classify(&http_failure(status), RATE_LIMIT_WAIT);
            assert!(c.retryable, "status {status}");
            assert_eq!(c.min_delay, None);
        }
    }

    #[test]
    fn listed_client_errors_are_fatal() {
        for status in [400, 401, 403, 404] {
            let c = classify(&http_failure(status), RATE_LIMIT_WAIT);
            assert!(!c.retryable, "status {status}");
        }
    }

    #[test]
    fn unlisted_statuses_split_at_500() {
        assert!(classify(&http_failure(507), RATE_LIMIT_WAIT).retryable);
        assert!(!classify(&http_failure(409), RATE_LIMIT_WAIT).retryable);
        assert!(!classify(&http_failure(200), RATE_LIMIT_WAIT).retryable);
    }

    #[test]
    fn rate_limit_honours_retry_after_seconds() {
        let c = classify(&rate_limited("60"), RATE_LIMIT_WAIT);
        assert_eq!(
            c,
            Classification {
                retryable: true,
                min_delay: Some(Duration::from_secs(60)),
            }
        );
    }

    #[test]
    fn rate_limit_without_header_uses_fallback() {
        let c = classify(&http_failure(429), RATE_LIMIT_WAIT);
        assert!(c.retryable);
        assert_eq!(c.min_delay, Some(RATE_LIMIT_WAIT));
    }

    #[test]
    fn rate_limit_with_garbage_header_has_no_floor() {
        let c = classify(&rate_limited("soon-ish"), RATE_LIMIT_WAIT);
        assert!(c.retryable);
        assert_eq!(c.min_delay, None);
    }

    #[test]
    fn retry_after_http_date_is_relative_to_now() {
        let now = DateTime::parse_from_rfc3339("2015-10-21T07:27:30Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(
            parse_retry_after("Wed, 21 Oct 2015 07:28:00 GMT", now),
            Some(Duration::from_secs(30))
        );
        let later = now + chrono::Duration::minutes(5);
        assert_eq!(
            parse_retry_after("Wed, 21 Oct 2015 07:28:00 GMT", later),
            Some(Duration::ZERO)
        );
    }

    #[test]
    fn retry_after_accepts_every_http_date_form() {
        let now = DateTime::parse_from_rfc3339("1994-11-06T08:49:00Z")
            .unwrap()
            .with_timezone(&Utc);

        for raw in [
            "Sun, 06 Nov 1994 08:49:37 GMT",
            "Sunday, 06-Nov-94 08:49:37 GMT",
            "Sun Nov  6 08:49:37 1994",
        ] {
            assert_eq!(
                parse_retry_after(raw, now),
                Some(Duration::from_secs(37)),
                "{raw}"
            );
        }
    }

    #[test]
    fn rate_limit_honours_asctime_retry_after() {
        let c = classify(&rate_limited("Sun Nov  6 08:49:37 1994"), RATE_LIMIT_WAIT);
        assert!(c.retryable);
        assert_eq!(c.min_delay, Some(Duration::ZERO));
    }

    proptest! {
        #[test]
        fn numeric_retry_after_round_trips(secs in 0u64..1_000_000) {
            prop_assert_eq!(
                parse_retry_after(&secs.to_string(), Utc::now()),
                Some(Duration::from_secs(secs))
            );
        }
    }
}
