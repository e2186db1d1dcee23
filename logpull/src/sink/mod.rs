//! Destinations for fetched records.
//!
//! Both sinks share one contract: `write_page` for every fetched page, `finalize`
//! exactly once when the fetch loop stops (completed or cancelled), and `close`
//! on the way out, which is safe to call repeatedly.

pub mod json;
pub mod ndjson;

use crate::model::Record;
use logpull_core::{Error, OutputFormat, Result};
use std::fs::{File, OpenOptions};
use std::io;
use std::path::Path;

pub use json::JsonSink;
pub use ndjson::NdjsonSink;

pub trait OutputSink: Send {
    fn write_page(&mut self, records: &[Record]) -> Result<()>;

    fn finalize(&mut self) -> Result<()>;

    fn close(&mut self) -> Result<()>;
}

/// Build the sink for `format`. File destinations are opened here so an
/// unwritable path fails before any request is made.
pub fn create_sink(
    format: OutputFormat,
    output: Option<&Path>,
    append: bool,
) -> Result<Box<dyn OutputSink>> {
    let sink: Box<dyn OutputSink> = match (format, output) {
        (OutputFormat::Ndjson, Some(path)) => Box::new(NdjsonSink::new(io::BufWriter::new(
            open_file(path, append)?,
        ))),
        (OutputFormat::Ndjson, None) => Box::new(NdjsonSink::new(io::stdout())),
        (OutputFormat::Json, Some(path)) => Box::new(JsonSink::new(open_existing(path)?)),
        (OutputFormat::Json, None) => Box::new(JsonSink::new(io::stdout())),
    };

    Ok(sink)
}

fn open_file(path: &Path, append: bool) -> Result<File> {
    let mut options = OpenOptions::new();
    options.create(true);
    if append {
        options.append(true);
    } else {
        options.write(true).truncate(true);
    }
    open_with(&options, path)
}

/// Open for writing without touching current content; the buffering sink
/// truncates on `finalize`.
fn open_existing(path: &Path) -> Result<File> {
    let mut options = OpenOptions::new();
    options.create(true).write(true);
    open_with(&options, path)
}

fn open_with(options: &OpenOptions, path: &Path) -> Result<File> {
    options.open(path).map_err(|source| Error::Output {
        path: path.to_path_buf(),
        source,
    })
}
