use reqwest::header::HeaderMap;
use reqwest::StatusCode;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("failed to open output {}: {source}", .path.display())]
    Output {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("network error: {0}")]
    Network(SourceError),

    #[error("authentication failed: check DD_API_KEY and DD_APP_KEY")]
    Authentication(SourceError),

    #[error("permission denied: check your API key has logs_read_data permission")]
    PermissionDenied(SourceError),

    #[error("rate limit exceeded: {0}")]
    RateLimit(SourceError),

    #[error("API error (status {status}): {source}")]
    Api { status: u16, source: SourceError },

    #[error("giving up after {attempts} retries: {source}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        source: Box<Error>,
    },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Turns a failed remote call into the diagnostic shown to the operator.
    pub fn from_source(err: SourceError) -> Self {
        let status = match err.status() {
            Some(status) => status,
            None => return Error::Network(err),
        };

        match status {
            StatusCode::UNAUTHORIZED => Error::Authentication(err),
            StatusCode::FORBIDDEN => Error::PermissionDenied(err),
            StatusCode::TOO_MANY_REQUESTS => Error::RateLimit(err),
            other => Error::Api {
                status: other.as_u16(),
                source: err,
            },
        }
    }
}

/// Status line and headers of a remote response that came back with an error.
#[derive(Debug, Clone)]
pub struct ResponseMeta {
    pub status: StatusCode,
    pub headers: HeaderMap,
}

impl ResponseMeta {
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
        }
    }

    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }
}

/// A failed page request. `response` is absent for pure transport failures.
#[derive(Debug, Clone)]
pub struct SourceError {
    pub message: String,
    pub response: Option<ResponseMeta>,
}

impl SourceError {
    pub fn transport(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            response: None,
        }
    }

    pub fn with_response(message: impl Into<String>, response: ResponseMeta) -> Self {
        Self {
            message: message.into(),
            response: Some(response),
        }
    }

    pub fn status(&self) -> Option<StatusCode> {
        self.response.as_ref().map(|r| r.status)
    }
}

impl fmt::Display for SourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for SourceError {}

#[cfg(test)]
mod tests {
    use super::*;

    fn failed(status: u16) -> SourceError {
        SourceError::with_response(
            "boom",
            ResponseMeta::new(StatusCode::from_u16(status).unwrap()),
        )
    }

    #[test]
    fn auth_failures_name_the_remediation() {
        let msg = Error::from_source(failed(401)).to_string();
        assert!(msg.contains("check DD_API_KEY and DD_APP_KEY"), "{msg}");

        let msg = Error::from_source(failed(403)).to_string();
        assert!(msg.contains("logs_read_data"), "{msg}");
    }

    #[test]
    fn transport_failure_is_network_error() {
        let err = Error::from_source(SourceError::transport("connection reset"));
        assert!(matches!(err, Error::Network(_)));
        assert_eq!(err.to_string(), "network error: connection reset");
    }

    #[test]
    fn other_statuses_keep_code_and_message() {
        let err = Error::from_source(failed(503));
        assert_eq!(err.to_string(), "API error (status 503): boom");

        let err = Error::from_source(failed(429));
        assert_eq!(err.to_string(), "rate limit exceeded: boom");
    }

    #[test]
    fn exhausted_retries_wrap_the_underlying_error() {
        let err = Error::RetriesExhausted {
            attempts: 3,
            source: Box::new(Error::from_source(failed(500))),
        };
        assert_eq!(
            err.to_string(),
            "giving up after 3 retries: API error (status 500): boom"
        );
    }
}
