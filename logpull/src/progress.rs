use crate::model::FetchState;
use chrono::SecondsFormat;
use logpull_core::backoff::RetryNotice;
use logpull_core::FetchConfig;
use std::fmt;
use std::io::{self, Write};

/// Human-readable status lines, kept apart from the exported data.
///
/// Write failures are ignored: losing a status line must not abort an export.
pub struct Progress {
    out: Box<dyn Write + Send>,
}

impl Progress {
    pub fn new(out: impl Write + Send + 'static) -> Self {
        Self { out: Box::new(out) }
    }

    pub fn stderr() -> Self {
        Self::new(io::stderr())
    }

    fn line(&mut self, args: fmt::Arguments<'_>) {
        let _ = self.out.write_fmt(args);
        let _ = self.out.write_all(b"\n");
        let _ = self.out.flush();
    }

    pub fn started(&mut self, config: &FetchConfig) {
        let to = config
            .to
            .map(|t| t.to_rfc3339_opts(SecondsFormat::Secs, true))
            .unwrap_or_else(|| "now".to_string());

        self.line(format_args!("Starting fetch with query: {}", config.query));
        self.line(format_args!(
            "Time range: {} to {}",
            config.from.to_rfc3339_opts(SecondsFormat::Secs, true),
            to
        ));
        self.line(format_args!("Page size: {}", config.page_size));
        if let Some(cursor) = &config.cursor {
            self.line(format_args!("Resuming from cursor: {}", cursor));
        }
        self.line(format_args!(""));
    }

    pub fn page(&mut self, state: &FetchState) {
        match &state.cursor {
            Some(cursor) => self.line(format_args!(
                "Fetched {} logs ({} pages, {:.1} logs/sec) - cursor: {}",
                state.records,
                state.pages,
                state.rate(),
                cursor
            )),
            None => self.line(format_args!(
                "Fetched {} logs ({} pages, {:.1} logs/sec)",
                state.records,
                state.pages,
                state.rate()
            )),
        }
    }

    pub fn retry(&mut self, notice: &RetryNotice<'_>) {
        self.line(format_args!(
            "Error (attempt {}/{}): {} - retrying in {:?}...",
            notice.attempt, notice.max_retries, notice.error, notice.delay
        ));
    }

    pub fn cancelled(&mut self, cursor: Option<&str>) {
        self.line(format_args!(
            "\nOperation cancelled. Resume with --cursor '{}'",
            cursor.unwrap_or_default()
        ));
    }

    pub fn completed(&mut self, state: &FetchState) {
        self.line(format_args!(
            "\nCompleted! Fetched {} logs in {} pages ({:.1}s)",
            state.records,
            state.pages,
            state.started_at.elapsed().as_secs_f64()
        ));
    }
}
