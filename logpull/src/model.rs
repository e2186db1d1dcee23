use chrono::{DateTime, Utc};
use logpull_core::FetchConfig;
use std::time::Instant;

/// A single log event. Its schema belongs to the remote API and is carried through untouched.
pub type Record = serde_json::Value;

/// One batch of records plus the cursor of the next batch, if any.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    pub records: Vec<Record>,
    pub cursor: Option<String>,
}

impl Page {
    pub fn new(records: Vec<Record>, cursor: Option<String>) -> Self {
        Self { records, cursor }
    }

    /// The continuation cursor, with an empty string treated as exhausted.
    pub fn next_cursor(&self) -> Option<&str> {
        self.cursor.as_deref().filter(|c| !c.is_empty())
    }

    /// A page ends the export when it has no continuation or no records.
    pub fn is_last(&self) -> bool {
        self.next_cursor().is_none() || self.records.is_empty()
    }
}

/// Parameters of a single page request.
#[derive(Debug, Clone, PartialEq)]
pub struct PageRequest {
    pub query: String,
    pub index: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub page_size: u32,
    pub cursor: Option<String>,
}

impl PageRequest {
    pub fn first(config: &FetchConfig) -> Self {
        Self {
            query: config.query.clone(),
            index: config.index.clone().filter(|i| !i.is_empty()),
            from: Some(config.from),
            to: config.to,
            page_size: config.page_size,
            cursor: config.cursor.clone().filter(|c| !c.is_empty()),
        }
    }
}

/// Progress of one invocation. The retry counter lives with the retry loop, per page.
#[derive(Debug, Clone)]
pub struct FetchState {
    pub cursor: Option<String>,
    pub records: u64,
    pub pages: u64,
    pub started_at: Instant,
}

impl FetchState {
    pub fn new(cursor: Option<String>) -> Self {
        Self {
            cursor,
            records: 0,
            pages: 0,
            started_at: Instant::now(),
        }
    }

    pub fn record_page(&mut self, page: &Page) {
        self.records += page.records.len() as u64;
        self.pages += 1;
        self.cursor = page.next_cursor().map(str::to_owned);
    }

    /// Records per second since the session started.
    pub fn rate(&self) -> f64 {
        let secs = self.started_at.elapsed().as_secs_f64();
        if secs > 0.0 {
            self.records as f64 / secs
        } else {
            0.0
        }
    }
}

/// How an export run ended when it did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Completed { records: u64, pages: u64 },
    /// Stopped on request. `cursor` is where the next invocation should resume.
    Cancelled {
        cursor: Option<String>,
        records: u64,
        pages: u64,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_cursor_means_exhausted() {
        let page = Page::new(vec![json!({"id": 1})], Some(String::new()));
        assert_eq!(page.next_cursor(), None);
        assert!(page.is_last());
    }

    #[test]
    fn empty_page_is_last_even_with_cursor() {
        let page = Page::new(vec![], Some("C2".into()));
        assert!(page.is_last());
    }

    #[test]
    fn state_tracks_counts_and_cursor() {
        let mut state = FetchState::new(Some("start".into()));
        state.record_page(&Page::new(vec![json!(1), json!(2)], Some("C2".into())));
        state.record_page(&Page::new(vec![json!(3)], None));

        assert_eq!(state.records, 3);
        assert_eq!(state.pages, 2);
        assert_eq!(state.cursor, None);
    }
}
