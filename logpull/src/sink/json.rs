use super::OutputSink;
use crate::model::Record;
use logpull_core::Result;
use serde::Serialize;
use std::fs::File;
use std::io::{self, Seek, SeekFrom, Write};
use tracing::debug;

/// A writer the buffering sink can clear before laying down the final document.
pub trait Destination: Write {
    fn reset(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Destination for File {
    fn reset(&mut self) -> io::Result<()> {
        self.set_len(0)?;
        self.seek(SeekFrom::Start(0))?;
        Ok(())
    }
}

impl Destination for io::Stdout {}

impl Destination for Vec<u8> {
    fn reset(&mut self) -> io::Result<()> {
        self.clear();
        Ok(())
    }
}

#[derive(Serialize)]
struct Envelope<'a> {
    logs: &'a [Record],
    meta: Summary,
}

#[derive(Serialize)]
struct Summary {
    total_fetched: usize,
    pages: u64,
}

/// Holds every record in memory and writes one document with a summary on `finalize`.
///
/// Nothing reaches the destination if the run fails before `finalize`; an
/// existing file keeps its previous content until then.
pub struct JsonSink<W: Destination> {
    out: W,
    records: Vec<Record>,
    pages: u64,
}

impl<W: Destination> JsonSink<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            records: Vec::new(),
            pages: 0,
        }
    }

    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Destination + Send> OutputSink for JsonSink<W> {
    fn write_page(&mut self, records: &[Record]) -> Result<()> {
        self.records.extend_from_slice(records);
        self.pages += 1;
        Ok(())
    }

    fn finalize(&mut self) -> Result<()> {
        let envelope = Envelope {
            logs: &self.records,
            meta: Summary {
                total_fetched: self.records.len(),
                pages: self.pages,
            },
        };

        self.out.reset()?;
        let mut out = io::BufWriter::new(&mut self.out);
        serde_json::to_writer_pretty(&mut out, &envelope)?;
        out.write_all(b"\n")?;
        out.flush()?;

        debug!(
            records = self.records.len(),
            pages = self.pages,
            "Wrote buffered export"
        );
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}
