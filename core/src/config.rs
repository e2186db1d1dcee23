use chrono::{DateTime, Duration, TimeZone, Utc};
use config::{ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::Error;

pub const MAX_PAGE_SIZE: u32 = 5000;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub api: ApiConfig,
    pub retry: RetryConfig,
    pub telemetry: TelemetryConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiConfig {
    pub site: String,
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub rate_limit_wait_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TelemetryConfig {
    pub log_level: String,
    pub log_format: LogFormat,
    pub metrics_enabled: bool,
    pub metrics_port: u16,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Pretty,
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder();

        // Load default configuration
        builder = builder.add_source(config::Config::try_from(&Config::default())?);

        // Layer on config file if it exists
        if Path::new("logpull.toml").exists() {
            builder = builder.add_source(File::with_name("logpull"));
        }

        // Layer on environment variables (LOGPULL_ prefix)
        builder = builder.add_source(
            Environment::with_prefix("LOGPULL")
                .separator("__")
                .try_parsing(true),
        );

        let settings: Config = builder.build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api.site.is_empty() {
            return Err(ConfigError::Message("api.site is required".into()));
        }

        if self.api.request_timeout_secs == 0 {
            return Err(ConfigError::Message(
                "api.request_timeout_secs must be greater than 0".into(),
            ));
        }

        if self.retry.base_delay_ms == 0 {
            return Err(ConfigError::Message(
                "retry.base_delay_ms must be greater than 0".into(),
            ));
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api: ApiConfig {
                site: "datadoghq.com".to_string(),
                request_timeout_secs: 60,
            },
            retry: RetryConfig {
                max_retries: 3,
                base_delay_ms: 1000,
                rate_limit_wait_secs: 60,
            },
            telemetry: TelemetryConfig {
                log_level: "warn".to_string(),
                log_format: LogFormat::Pretty,
                metrics_enabled: false,
                metrics_port: 9090,
            },
        }
    }
}

/// How fetched records are laid out at the destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// One JSON document per record, written as each page arrives.
    Ndjson,
    /// A single JSON document with every record and a summary, written at the end.
    Json,
}

impl OutputFormat {
    pub fn is_streaming(self) -> bool {
        matches!(self, OutputFormat::Ndjson)
    }
}

impl FromStr for OutputFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ndjson" | "streaming" => Ok(OutputFormat::Ndjson),
            "json" | "buffered" => Ok(OutputFormat::Json),
            other => Err(Error::UnsupportedFormat(other.to_string())),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Ndjson => write!(f, "ndjson"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

/// One export run, as requested on the command line.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub query: String,
    pub index: Option<String>,
    pub from: DateTime<Utc>,
    /// `None` means "now" and is never sent as an upper bound.
    pub to: Option<DateTime<Utc>>,
    pub page_size: u32,
    /// Resume point; `None` starts from the beginning.
    pub cursor: Option<String>,
    pub format: OutputFormat,
    pub append: bool,
    /// `None` writes to standard output.
    pub output: Option<PathBuf>,
}

impl FetchConfig {
    pub fn validate(&self) -> Result<(), Error> {
        if self.query.is_empty() {
            return Err(Error::Config("query is required".into()));
        }

        if !(1..=MAX_PAGE_SIZE).contains(&self.page_size) {
            return Err(Error::Config(format!(
                "page size must be between 1 and {}, got {}",
                MAX_PAGE_SIZE, self.page_size
            )));
        }

        if self.append && !self.format.is_streaming() {
            return Err(Error::Config("--append only works with --format ndjson".into()));
        }

        if self.cursor.is_some() && !self.format.is_streaming() {
            return Err(Error::Config("--cursor only works with --format ndjson".into()));
        }

        if let Some(to) = self.to {
            if self.from > to {
                return Err(Error::Config(format!(
                    "--from ({}) must be before --to ({})",
                    self.from.to_rfc3339(),
                    to.to_rfc3339()
                )));
            }
        }

        Ok(())
    }
}

/// Default lower bound of the time window: 24 hours before now.
pub fn default_from() -> DateTime<Utc> {
    Utc::now() - Duration::hours(24)
}

/// Parse an RFC3339 timestamp or integer Unix seconds.
pub fn parse_time(s: &str) -> Result<DateTime<Utc>, Error> {
    if let Ok(t) = DateTime::parse_from_rfc3339(s) {
        return Ok(t.with_timezone(&Utc));
    }

    s.parse::<i64>()
        .ok()
        .and_then(|ts| Utc.timestamp_opt(ts, 0).single())
        .ok_or_else(|| {
            Error::Config(format!(
                "unable to parse time '{s}': expected RFC3339 or Unix timestamp"
            ))
        })
}
