//! Cursor state for one sweep
//!
//! The walker never pages by offset. Its only progress marker is the
//! watermark `(modified_at, uuid)` of the last delivered collection plus the
//! `filter_time` boundary the current filter set was built from. After each
//! page, [`CursorState::transition`] rewrites the filters:
//!
//! ```text
//!                 page empty
//!   Scanning ──────────────────────────────▶ Finished
//!      │  ▲
//!      │  │ page empty:  modified_at > filter_time
//!      │  │
//!      │  └──────────────────────┐
//!      │ last.t == filter_time   │
//!      ▼                         │
//!   ExactTimestamp ──────────────┘
//!      │  ▲   modified_at = filter_time AND uuid > last.uuid
//!      └──┘   (while pages keep coming back non-empty)
//!
//!   otherwise: filter_time = last.t
//!              modified_at >= filter_time AND uuid != last.uuid
//! ```

use crate::api::{Collection, Filter, FilterOp};
use crate::error::{Result, SweepError};
use chrono::{DateTime, Utc};

/// Walker mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// Paging forward through increasing timestamps
    #[default]
    Scanning,

    /// Draining collections that share `filter_time`, in UUID order
    ExactTimestamp,
}

/// Position of the last delivered collection
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Watermark {
    pub modified_at: Option<DateTime<Utc>>,
    pub uuid: String,
}

impl Watermark {
    /// True if `c` sorts at or before this watermark within the same timestamp
    pub fn covers(&self, c: &Collection) -> bool {
        c.modified_at == self.modified_at && c.uuid <= self.uuid
    }
}

/// What the walker should do after a page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Source exhausted
    Finished,

    /// Request another page with [`CursorState::filters`]
    Fetch,
}

/// Mutable state of one enumeration
#[derive(Debug, Clone, Default)]
pub struct CursorState {
    last: Watermark,
    filter_time: Option<DateTime<Utc>>,
    visited: u64,
    mode: Mode,
    filters: Vec<Filter>,
}

impl CursorState {
    /// Fresh state: no filters, nothing visited
    pub fn new() -> Self {
        Self::default()
    }

    /// Filters for the next page request
    pub fn filters(&self) -> &[Filter] {
        &self.filters
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Last delivered collection
    pub fn last(&self) -> &Watermark {
        &self.last
    }

    /// Timestamp boundary of the current filter set
    pub fn filter_time(&self) -> Option<DateTime<Utc>> {
        self.filter_time
    }

    /// Collections delivered so far
    pub fn visited(&self) -> u64 {
        self.visited
    }

    /// False for a collection already delivered at this watermark
    pub fn is_new(&self, c: &Collection) -> bool {
        !self.last.covers(c)
    }

    /// Record that `c` was delivered
    pub fn record(&mut self, c: &Collection) {
        self.visited += 1;
        self.last.modified_at = c.modified_at;
        self.last.uuid.clone_from(&c.uuid);
    }

    /// Pick the next filter set and mode after a page of `page_len` items
    pub fn transition(&mut self, page_len: usize) -> Result<Transition> {
        if page_len == 0 && self.mode == Mode::Scanning {
            return Ok(Transition::Finished);
        }

        let Some(last_time) = self.last.modified_at else {
            return Err(SweepError::InvariantViolation {
                uuid: self.last.uuid.clone(),
            });
        };

        if page_len > 0 && self.filter_time == Some(last_time) {
            // We asked for time >= T and never got past T, so there may be
            // more collections at exactly T. Page through them by UUID until
            // an empty page comes back.
            self.mode = Mode::ExactTimestamp;
            self.filters = vec![
                Filter::modified_at(FilterOp::Eq, last_time),
                Filter::uuid(FilterOp::Gt, self.last.uuid.clone()),
            ];
        } else if self.mode == Mode::ExactTimestamp {
            // Empty page: every collection at T has been seen.
            self.mode = Mode::Scanning;
            self.filters = vec![Filter::modified_at(FilterOp::Gt, last_time)];
        } else {
            // Everything before T has been seen, but not necessarily all of
            // T itself. Re-include T and skip only the last item; the
            // occasional re-delivery is cheaper than exact dedup here.
            self.filter_time = Some(last_time);
            self.filters = vec![
                Filter::modified_at(FilterOp::Ge, last_time),
                Filter::uuid(FilterOp::Ne, self.last.uuid.clone()),
            ];
        }

        Ok(Transition::Fetch)
    }
}
