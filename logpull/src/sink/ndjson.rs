use super::OutputSink;
use crate::model::Record;
use logpull_core::{Error, Result};
use std::io::Write;

/// Writes one JSON document per line as pages arrive. Memory use does not grow with the export.
pub struct NdjsonSink<W: Write> {
    out: Option<W>,
}

impl<W: Write> NdjsonSink<W> {
    pub fn new(out: W) -> Self {
        Self { out: Some(out) }
    }

    /// Take back the writer; `None` once the sink has been closed.
    #[cfg(test)]
    pub fn into_inner(self) -> Option<W> {
        self.out
    }
}

impl<W: Write + Send> OutputSink for NdjsonSink<W> {
    fn write_page(&mut self, records: &[Record]) -> Result<()> {
        let out = self
            .out
            .as_mut()
            .ok_or_else(|| Error::Internal("write to closed ndjson sink".into()))?;

        for record in records {
            serde_json::to_writer(&mut *out, record)?;
            out.write_all(b"\n")?;
        }

        // Each page is durable on its own.
        out.flush()?;
        Ok(())
    }

    fn finalize(&mut self) -> Result<()> {
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if let Some(mut out) = self.out.take() {
            out.flush()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::{json, Value};

    fn lines(buf: &[u8]) -> Vec<Value> {
        std::str::from_utf8(buf)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    #[test]
    fn one_line_per_record_without_finalize() {
        let mut sink = NdjsonSink::new(Vec::new());
        sink.write_page(&[json!({"id": 1}), json!({"id": 2})]).unwrap();
        sink.write_page(&[json!({"id": 3})]).unwrap();
        sink.write_page(&[]).unwrap();

        let buf = sink.into_inner().unwrap();
        assert_eq!(
            lines(&buf),
            vec![json!({"id": 1}), json!({"id": 2}), json!({"id": 3})]
        );
        assert!(!std::str::from_utf8(&buf).unwrap().contains('['));
    }

    #[test]
    fn close_is_idempotent_and_blocks_writes() {
        let mut sink = NdjsonSink::new(Vec::new());
        sink.close().unwrap();
        sink.close().unwrap();
        assert!(sink.write_page(&[json!(1)]).is_err());
        assert!(sink.into_inner().is_none());
    }

    fn arb_record() -> impl Strategy<Value = Value> {
        let leaf = prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::from),
            any::<i64>().prop_map(Value::from),
            ".*".prop_map(Value::from),
        ];
        leaf.prop_recursive(3, 24, 4, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..4).prop_map(Value::from),
                prop::collection::btree_map("[a-z_]{1,8}", inner, 0..4)
                    .prop_map(|m| Value::Object(m.into_iter().collect())),
            ]
        })
    }

    proptest! {
        #[test]
        fn records_survive_the_trip(records in prop::collection::vec(arb_record(), 0..8)) {
            let mut sink = NdjsonSink::new(Vec::new());
            sink.write_page(&records).unwrap();
            prop_assert_eq!(lines(&sink.into_inner().unwrap()), records);
        }
    }
}
