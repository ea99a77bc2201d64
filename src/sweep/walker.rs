//! Collection walker
//!
//! Visits every collection the source holds, including trashed collections
//! and past versions, while other clients keep writing.
//!
//! Paging by UUID would be simpler but loses data: if a client moves files
//! from collection "zzz" into collection "aaa" while the walker is fetching
//! the "mmm" page, neither page ever shows those blocks, even when the
//! client saves "aaa" before "zzz". Paging in `modified_at` order instead
//! means anything modified during the sweep shows up again on a later page.

use super::count::count_collections;
use super::state::{CursorState, Transition};
use super::verify::verify_complete;
use crate::api::{attrs, Collection, CollectionSource, CountMode, ListParams, SortKey, SWEEP_SELECT};
use crate::error::{BoxError, Result, SweepError};
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Page limit sent when no page size is configured; the server caps it
pub const MAX_PAGE_LIMIT: u64 = i32::MAX as u64;

/// Result of a verified sweep
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SweepStats {
    /// Collections delivered to the callback
    pub visited: u64,

    /// Count reported before the sweep started
    pub expected: u64,

    /// Count at the final boundary, as rechecked after the sweep
    pub verified: u64,

    /// Final `modified_at` boundary
    pub boundary: Option<DateTime<Utc>>,

    /// List requests issued (not counting the two count probes)
    pub pages: u64,

    pub duration: Duration,
}

/// Sequential walker over a [`CollectionSource`]
pub struct CollectionWalker<S> {
    source: S,
    page_size: u64,
    select: Vec<String>,
    shutdown: Arc<AtomicBool>,
}

impl<S: CollectionSource> CollectionWalker<S> {
    /// Create a walker requesting the largest pages the server allows
    pub fn new(source: S) -> Self {
        Self {
            source,
            page_size: 0,
            select: SWEEP_SELECT.iter().map(|s| s.to_string()).collect(),
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Maximum collections per page; 0 asks for the server maximum
    pub fn with_page_size(mut self, page_size: u64) -> Self {
        self.page_size = page_size;
        self
    }

    /// Attributes to fetch for each collection
    pub fn with_select(mut self, select: Vec<String>) -> Self {
        self.select = select;
        self
    }

    /// Share an existing cancellation flag
    pub fn with_shutdown_flag(mut self, shutdown: Arc<AtomicBool>) -> Self {
        self.shutdown = shutdown;
        self
    }

    /// Flag that cancels the sweep at the next page boundary when set
    pub fn shutdown_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Call `on_item` once for every collection, then verify completeness
    pub fn each_collection<F>(&self, on_item: F) -> Result<SweepStats>
    where
        F: FnMut(&Collection) -> std::result::Result<(), BoxError>,
    {
        self.each_collection_with_progress(on_item, |_, _| {})
    }

    /// Like [`each_collection`](Self::each_collection), also reporting
    /// `(visited, expected)` before every page request and once at the end
    pub fn each_collection_with_progress<F, P>(
        &self,
        mut on_item: F,
        mut on_progress: P,
    ) -> Result<SweepStats>
    where
        F: FnMut(&Collection) -> std::result::Result<(), BoxError>,
        P: FnMut(u64, u64),
    {
        let start = Instant::now();

        let expected = count_collections(&self.source, &[])?;
        info!(expected, page_size = self.page_size, "Starting collection sweep");

        let mut state = CursorState::new();
        let mut pages = 0u64;

        loop {
            self.check_cancelled()?;
            on_progress(state.visited(), expected);

            let page = self.source.list(&self.page_params(&state))?;
            pages += 1;

            let before = state.visited();
            for c in &page.items {
                if !state.is_new(c) {
                    continue;
                }
                on_item(c).map_err(SweepError::Consumer)?;
                state.record(c);
            }

            let transition = state.transition(page.items.len())?;
            debug!(
                page = pages,
                items = page.items.len(),
                delivered = state.visited() - before,
                mode = ?state.mode(),
                filters = ?state.filters().iter().map(ToString::to_string).collect::<Vec<_>>(),
                "Fetched page"
            );

            if transition == Transition::Finished {
                break;
            }
        }

        on_progress(state.visited(), expected);
        self.check_cancelled()?;

        let verified = verify_complete(&self.source, state.filter_time(), state.visited())?;

        let stats = SweepStats {
            visited: state.visited(),
            expected,
            verified,
            boundary: state.filter_time(),
            pages,
            duration: start.elapsed(),
        };

        info!(
            visited = stats.visited,
            pages = stats.pages,
            duration_secs = stats.duration.as_secs_f64(),
            "Collection sweep finished"
        );

        Ok(stats)
    }

    fn page_params(&self, state: &CursorState) -> ListParams {
        let limit = if self.page_size == 0 {
            MAX_PAGE_LIMIT
        } else {
            self.page_size
        };

        ListParams {
            filters: state.filters().to_vec(),
            order: vec![SortKey::asc(attrs::MODIFIED_AT), SortKey::asc(attrs::UUID)],
            limit: Some(limit),
            count: CountMode::None,
            select: self.select.clone(),
            include_trash: true,
            include_old_versions: true,
        }
    }

    fn check_cancelled(&self) -> Result<()> {
        if self.shutdown.load(Ordering::SeqCst) {
            info!("Sweep cancelled");
            return Err(SweepError::Cancelled);
        }
        Ok(())
    }
}
