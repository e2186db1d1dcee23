pub mod datadog;

use crate::model::{Page, PageRequest};
use async_trait::async_trait;
use logpull_core::SourceError;

#[async_trait]
pub trait IngestSource: Send + Sync {
    /// Fetch one page of log records starting at `request.cursor`
    async fn fetch_page(&self, request: &PageRequest) -> Result<Page, SourceError>;

    /// Get the source identifier
    fn source_id(&self) -> &str;
}

pub use datadog::DatadogSource;
