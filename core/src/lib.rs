pub mod backoff;
pub mod classify;
pub mod config;
pub mod error;
pub mod shutdown;
pub mod telemetry;

pub use config::{Config, FetchConfig, OutputFormat};
pub use error::{Error, Result, SourceError};
