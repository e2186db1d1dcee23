use crate::ingest::IngestSource;
use crate::model::{FetchOutcome, FetchState, PageRequest};
use crate::progress::Progress;
use crate::sink::OutputSink;
use logpull_core::backoff::{retry_with_backoff, Attempt, BackoffPolicy};
use logpull_core::shutdown::Shutdown;
use logpull_core::{FetchConfig, Result};
use metrics::{counter, histogram};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, instrument};

/// Drives sequential cursor pagination from a source into a sink.
pub struct Pipeline {
    source: Arc<dyn IngestSource>,
    sink: Box<dyn OutputSink>,
    config: FetchConfig,
    policy: BackoffPolicy,
    progress: Progress,
}

impl Pipeline {
    pub fn new(
        source: Arc<dyn IngestSource>,
        sink: Box<dyn OutputSink>,
        config: FetchConfig,
        policy: BackoffPolicy,
        progress: Progress,
    ) -> Self {
        Self {
            source,
            sink,
            config,
            policy,
            progress,
        }
    }

    /// Fetch pages until the source is exhausted, a page fails for good, or shutdown is requested.
    ///
    /// The sink is finalized on completion and on cancellation, never after a failure.
    #[instrument(skip(self, shutdown), fields(source = self.source.source_id()))]
    pub async fn run(&mut self, shutdown: &mut Shutdown) -> Result<FetchOutcome> {
        let mut request = PageRequest::first(&self.config);
        let mut state = FetchState::new(request.cursor.clone());

        info!(
            query = %self.config.query,
            page_size = self.config.page_size,
            resuming = state.cursor.is_some(),
            "Starting fetch"
        );
        self.progress.started(&self.config);

        loop {
            let source = &*self.source;
            let req = &request;
            let progress = &mut self.progress;
            let fetch_started = Instant::now();

            let attempt = retry_with_backoff(
                move || source.fetch_page(req),
                &self.policy,
                shutdown,
                "fetch_page",
                |notice| {
                    counter!("logpull_fetch_retries").increment(1);
                    progress.retry(&notice);
                },
            )
            .await;

            let page = match attempt {
                Attempt::Success(page) => page,
                Attempt::Cancelled => return self.cancel(&state),
                Attempt::Failed(e) => {
                    error!(
                        error = %e,
                        cursor = ?state.cursor,
                        pages = state.pages,
                        "Failed to fetch page"
                    );
                    return Err(e);
                }
            };

            histogram!("logpull_fetch_duration_ms")
                .record(fetch_started.elapsed().as_millis() as f64);

            self.sink.write_page(&page.records)?;
            state.record_page(&page);

            counter!("logpull_pages_fetched").increment(1);
            counter!("logpull_records_fetched").increment(page.records.len() as u64);
            debug!(
                records = page.records.len(),
                total = state.records,
                pages = state.pages,
                cursor = ?state.cursor,
                "Wrote page"
            );
            self.progress.page(&state);

            if page.is_last() {
                break;
            }
            request.cursor = state.cursor.clone();
        }

        self.sink.finalize()?;
        self.progress.completed(&state);
        info!(
            records = state.records,
            pages = state.pages,
            elapsed_ms = state.started_at.elapsed().as_millis() as u64,
            "Fetch completed"
        );

        Ok(FetchOutcome::Completed {
            records: state.records,
            pages: state.pages,
        })
    }

    fn cancel(&mut self, state: &FetchState) -> Result<FetchOutcome> {
        info!(cursor = ?state.cursor, records = state.records, "Fetch cancelled");
        self.progress.cancelled(state.cursor.as_deref());
        self.sink.finalize()?;

        Ok(FetchOutcome::Cancelled {
            cursor: state.cursor.clone(),
            records: state.records,
            pages: state.pages,
        })
    }

    /// Release the sink. Safe to call whatever `run` returned.
    pub fn close(&mut self) -> Result<()> {
        self.sink.close()
    }
}
