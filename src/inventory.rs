//! Sweep into a SQLite inventory
//!
//! Runs a [`CollectionWalker`] with a callback that feeds the batched
//! writer, then stamps the inventory with the outcome:
//!
//! ```text
//! remove old file → BatchedWriter::new (status = running)
//!        │
//!        ▼
//! each_collection_with_progress ── row ──▶ writer thread
//!        │
//!        ├─ Ok          → finish(verified)
//!        ├─ Cancelled   → finish(interrupted)
//!        └─ other error → finish(failed)
//! ```

use crate::api::{format_time, CollectionSource};
use crate::db::{self, keys, status, BatchedWriter, InventoryRow, InventoryTotals};
use crate::error::{BoxError, DbError, DbResult, Result, SweepError};
use crate::sweep::{CollectionWalker, SweepStats};
use chrono::Utc;
use rusqlite::Connection;
use std::path::Path;
use tracing::{info, warn};

/// Rows queued per batch before the walker blocks
const CHANNEL_BATCHES: usize = 4;

/// Outcome of a verified sweep
#[derive(Debug, Clone)]
pub struct InventoryReport {
    pub stats: SweepStats,
    pub totals: InventoryTotals,
}

/// Inventory output options
#[derive(Debug, Clone)]
pub struct InventoryOptions<'a> {
    /// Rows per transaction
    pub batch_size: usize,

    /// Recorded as `source_url`
    pub source_url: &'a str,

    /// Recorded as `page_size`
    pub page_size: u64,
}

/// Sweep every collection into a fresh inventory at `db_path`
///
/// Any existing inventory at that path is replaced. The inventory is
/// finalized whatever the outcome, with `status` set to `verified`,
/// `interrupted` or `failed`.
pub fn sweep_to_inventory<S, P>(
    walker: &CollectionWalker<S>,
    db_path: &Path,
    options: &InventoryOptions<'_>,
    on_progress: P,
) -> Result<InventoryReport>
where
    S: CollectionSource,
    P: FnMut(u64, u64),
{
    remove_existing(db_path)?;

    info!("Opening inventory: {}", db_path.display());
    let writer = BatchedWriter::new(
        db_path,
        options.batch_size,
        options.batch_size.saturating_mul(CHANNEL_BATCHES),
        &[
            (keys::SOURCE_URL, options.source_url.to_string()),
            (keys::START_TIME, Utc::now().to_rfc3339()),
            (keys::PAGE_SIZE, options.page_size.to_string()),
        ],
    )?;
    let handle = writer.handle();

    let result = walker.each_collection_with_progress(
        |c| {
            handle
                .send_row(InventoryRow::from_collection(c))
                .map_err(BoxError::from)
        },
        on_progress,
    );

    let end_time = (keys::END_TIME, Utc::now().to_rfc3339());

    match result {
        Ok(stats) => {
            let info = [
                end_time,
                (keys::DURATION_SECS, format!("{:.3}", stats.duration.as_secs_f64())),
                (keys::EXPECTED_COUNT, stats.expected.to_string()),
                (keys::VISITED_COUNT, stats.visited.to_string()),
                (keys::VERIFIED_COUNT, stats.verified.to_string()),
                (
                    keys::BOUNDARY,
                    stats.boundary.as_ref().map(format_time).unwrap_or_default(),
                ),
            ];
            writer.finish(status::VERIFIED, &info)?;

            let conn = Connection::open(db_path).map_err(DbError::from)?;
            let totals = db::inventory_totals(&conn)?;

            info!(
                collections = totals.collections,
                blocks = totals.blocks,
                "Inventory verified"
            );
            Ok(InventoryReport { stats, totals })
        }
        Err(e) => {
            let outcome = if e.is_cancelled() {
                status::INTERRUPTED
            } else {
                status::FAILED
            };
            let info = [end_time, (keys::ERROR, e.to_string())];

            match writer.finish(outcome, &info) {
                Ok(()) => Err(e),
                // A dead writer surfaces in the walker as a closed channel;
                // the writer's own error is the one worth reporting.
                Err(db_err) if matches!(e, SweepError::Consumer(_)) => Err(db_err.into()),
                Err(db_err) => {
                    warn!(error = %db_err, "Failed to finalize inventory");
                    Err(e)
                }
            }
        }
    }
}

/// Delete an inventory and its WAL side files if present
fn remove_existing(db_path: &Path) -> Result<()> {
    if db_path.exists() {
        std::fs::remove_file(db_path)?;
    }

    for suffix in ["-wal", "-shm"] {
        let mut side = db_path.as_os_str().to_owned();
        side.push(suffix);
        let side = Path::new(&side);
        if side.exists() {
            std::fs::remove_file(side)?;
        }
    }

    Ok(())
}

/// Read the recorded status of an inventory
pub fn inventory_status(db_path: &Path) -> DbResult<Option<String>> {
    let conn = Connection::open(db_path)?;
    db::get_sweep_info(&conn, keys::STATUS)
}
