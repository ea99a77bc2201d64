//! Batched inventory writer
//!
//! Runs in a dedicated thread and receives rows via a bounded channel, so
//! the sweep pulls pages only as fast as rows are committed.
//!
//! Collections can be delivered more than once during a sweep (anything
//! modified while the sweep runs comes around again). Every write is an
//! upsert, and a re-delivered collection's block list replaces the old one.

use crate::api::{format_time, Collection};
use crate::db::schema::{self, keys, status};
use crate::error::{DbError, DbResult};
use crate::manifest::{self, BlockLocator};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TryRecvError};
use rusqlite::{params, Connection};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::debug;

/// One collection as stored in the inventory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InventoryRow {
    pub uuid: String,
    pub portable_data_hash: String,
    pub modified_at: Option<String>,
    pub replication_desired: Option<i64>,
    pub is_trashed: bool,
    pub is_current: bool,
    pub blocks: Vec<BlockLocator>,
}

impl InventoryRow {
    /// Build a row, extracting block locators from the manifest
    pub fn from_collection(c: &Collection) -> Self {
        Self {
            uuid: c.uuid.clone(),
            portable_data_hash: c.portable_data_hash.clone(),
            modified_at: c.modified_at.as_ref().map(format_time),
            replication_desired: c.replication_desired,
            is_trashed: c.is_trashed,
            is_current: !c.is_old_version(),
            blocks: manifest::block_locators(&c.unsigned_manifest_text),
        }
    }

    pub fn referenced_bytes(&self) -> u64 {
        manifest::referenced_bytes(&self.blocks)
    }
}

/// Message types sent to the writer thread
#[derive(Debug)]
pub enum WriterMessage {
    /// Upsert a collection
    Row(InventoryRow),

    /// Flush pending writes
    Flush,

    /// Shutdown the writer
    Shutdown,
}

/// Statistics about write operations
#[derive(Debug, Default)]
pub struct WriterStats {
    /// Rows written, counting re-deliveries
    pub rows_written: AtomicU64,

    /// Block rows written
    pub blocks_written: AtomicU64,

    /// Total batches committed
    pub batches_committed: AtomicU64,
}

impl WriterStats {
    pub fn rows_written(&self) -> u64 {
        self.rows_written.load(Ordering::Relaxed)
    }

    pub fn blocks_written(&self) -> u64 {
        self.blocks_written.load(Ordering::Relaxed)
    }

    pub fn batches_committed(&self) -> u64 {
        self.batches_committed.load(Ordering::Relaxed)
    }
}

/// Handle for sending messages to the writer
#[derive(Clone)]
pub struct WriterHandle {
    sender: Sender<WriterMessage>,
    stats: Arc<WriterStats>,
}

impl WriterHandle {
    /// Queue a row; blocks while the channel is full
    pub fn send_row(&self, row: InventoryRow) -> DbResult<()> {
        self.sender
            .send(WriterMessage::Row(row))
            .map_err(|_| DbError::ChannelClosed)
    }

    /// Request a flush of pending writes
    pub fn flush(&self) -> DbResult<()> {
        self.sender
            .send(WriterMessage::Flush)
            .map_err(|_| DbError::ChannelClosed)
    }

    fn shutdown(&self) -> DbResult<()> {
        self.sender
            .send(WriterMessage::Shutdown)
            .map_err(|_| DbError::ChannelClosed)
    }

    /// Get writer statistics
    pub fn stats(&self) -> &WriterStats {
        &self.stats
    }
}

/// Batched inventory writer that runs in its own thread
pub struct BatchedWriter {
    handle: Option<JoinHandle<DbResult<()>>>,
    writer_handle: WriterHandle,
    db_path: PathBuf,
}

impl BatchedWriter {
    /// Open (or create) the inventory at `db_path` and spawn the writer thread
    ///
    /// `info` is stored in `sweep_info` before any rows are written, and
    /// the status is set to `running`.
    pub fn new(
        db_path: &Path,
        batch_size: usize,
        channel_size: usize,
        info: &[(&str, String)],
    ) -> DbResult<Self> {
        let (sender, receiver) = bounded(channel_size.max(1));
        let stats = Arc::new(WriterStats::default());

        let writer_handle = WriterHandle {
            sender,
            stats: Arc::clone(&stats),
        };

        let conn = Connection::open(db_path).map_err(|e| DbError::CreateFailed {
            path: db_path.to_path_buf(),
            reason: e.to_string(),
        })?;
        schema::create_database(&conn)?;

        schema::set_sweep_info(&conn, keys::SCHEMA_VERSION, &schema::SCHEMA_VERSION.to_string())?;
        schema::set_sweep_info(&conn, keys::SWEEPER_VERSION, env!("CARGO_PKG_VERSION"))?;
        for (key, value) in info {
            schema::set_sweep_info(&conn, key, value)?;
        }
        schema::set_sweep_info(&conn, keys::STATUS, status::RUNNING)?;

        let stats_clone = Arc::clone(&stats);
        let batch_size = batch_size.max(1);

        let handle = thread::Builder::new()
            .name("db-writer".into())
            .spawn(move || writer_thread(conn, receiver, stats_clone, batch_size))
            .map_err(|e| DbError::CreateFailed {
                path: db_path.to_path_buf(),
                reason: format!("Failed to spawn writer thread: {}", e),
            })?;

        Ok(Self {
            handle: Some(handle),
            writer_handle,
            db_path: db_path.to_path_buf(),
        })
    }

    /// Get a handle for sending messages to the writer
    pub fn handle(&self) -> WriterHandle {
        self.writer_handle.clone()
    }

    /// Drain the writer, record the outcome, and finalize the database
    ///
    /// Indexes are built and statistics gathered regardless of `status`, so
    /// a failed sweep can still be inspected.
    pub fn finish(mut self, status: &str, info: &[(&str, String)]) -> DbResult<()> {
        // The thread may already have exited on a write error; join reports it.
        let _ = self.writer_handle.shutdown();

        if let Some(handle) = self.handle.take() {
            match handle.join() {
                Ok(result) => result?,
                Err(_) => return Err(DbError::WriterPanicked),
            }
        }

        let conn = Connection::open(&self.db_path)?;
        schema::create_indexes(&conn)?;

        for (key, value) in info {
            schema::set_sweep_info(&conn, key, value)?;
        }
        schema::set_sweep_info(&conn, keys::STATUS, status)?;

        schema::optimize_for_reads(&conn)?;

        Ok(())
    }

    /// Get the database path
    pub fn db_path(&self) -> &Path {
        &self.db_path
    }
}

/// Internal writer thread function
fn writer_thread(
    conn: Connection,
    receiver: Receiver<WriterMessage>,
    stats: Arc<WriterStats>,
    batch_size: usize,
) -> DbResult<()> {
    let mut buffer: Vec<InventoryRow> = Vec::with_capacity(batch_size);

    loop {
        let msg = match receiver.try_recv() {
            Ok(msg) => msg,
            Err(TryRecvError::Empty) => {
                // Commit a partial batch before waiting
                if !buffer.is_empty() && buffer.len() >= batch_size / 4 {
                    flush_rows(&conn, &mut buffer, &stats)?;
                }

                match receiver.recv_timeout(Duration::from_millis(100)) {
                    Ok(msg) => msg,
                    Err(RecvTimeoutError::Timeout) => continue,
                    Err(RecvTimeoutError::Disconnected) => break,
                }
            }
            Err(TryRecvError::Disconnected) => break,
        };

        match msg {
            WriterMessage::Row(row) => {
                buffer.push(row);
                if buffer.len() >= batch_size {
                    flush_rows(&conn, &mut buffer, &stats)?;
                }
            }
            WriterMessage::Flush => flush_rows(&conn, &mut buffer, &stats)?,
            WriterMessage::Shutdown => break,
        }
    }

    flush_rows(&conn, &mut buffer, &stats)?;
    debug!(
        rows = stats.rows_written(),
        batches = stats.batches_committed(),
        "Inventory writer finished"
    );

    Ok(())
}

/// Upsert buffered rows in one transaction
fn flush_rows(
    conn: &Connection,
    buffer: &mut Vec<InventoryRow>,
    stats: &WriterStats,
) -> DbResult<()> {
    if buffer.is_empty() {
        return Ok(());
    }

    let tx = conn.unchecked_transaction()?;

    {
        let mut upsert = tx.prepare_cached(
            "INSERT OR REPLACE INTO collections (uuid, portable_data_hash, modified_at, replication_desired, is_trashed, is_current, block_count, referenced_bytes)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        )?;
        let mut clear_blocks =
            tx.prepare_cached("DELETE FROM collection_blocks WHERE collection_uuid = ?1")?;
        let mut insert_block = tx.prepare_cached(
            "INSERT OR REPLACE INTO collection_blocks (collection_uuid, block_hash, size) VALUES (?1, ?2, ?3)",
        )?;

        for row in buffer.drain(..) {
            upsert.execute(params![
                row.uuid,
                row.portable_data_hash,
                row.modified_at,
                row.replication_desired,
                row.is_trashed,
                row.is_current,
                row.blocks.len() as i64,
                row.referenced_bytes() as i64,
            ])?;

            clear_blocks.execute(params![row.uuid])?;
            for block in &row.blocks {
                insert_block.execute(params![row.uuid, block.hash, block.size as i64])?;
            }

            stats.rows_written.fetch_add(1, Ordering::Relaxed);
            stats
                .blocks_written
                .fetch_add(row.blocks.len() as u64, Ordering::Relaxed);
        }
    }

    tx.commit()?;
    stats.batches_committed.fetch_add(1, Ordering::Relaxed);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;
    use tempfile::tempdir;

    const H1: &str = "acbd18db4cc2f85cedef654fccc4a4d8";
    const H2: &str = "37b51d194a7513e45b56f6524f2d51f2";

    fn collection(uuid: &str, secs: i64, manifest: String) -> Collection {
        Collection::new(uuid, DateTime::from_timestamp(secs, 0)).with_manifest(manifest)
    }

    fn block_count(conn: &Connection, uuid: &str) -> i64 {
        conn.query_row(
            "SELECT COUNT(*) FROM collection_blocks WHERE collection_uuid = ?1",
            [uuid],
            |row| row.get(0),
        )
        .unwrap()
    }

    #[test]
    fn test_row_from_collection() {
        let c = collection("zzzzz-4zz18-000000000000001", 5, format!(". {}+3 {}+4 0:7:f\n", H1, H2))
            .old_version_of("zzzzz-4zz18-000000000000000");
        let row = InventoryRow::from_collection(&c);

        assert_eq!(row.blocks.len(), 2);
        assert_eq!(row.referenced_bytes(), 7);
        assert!(!row.is_current);
        assert_eq!(row.modified_at.as_deref(), Some("1970-01-01T00:00:05.000000000Z"));
    }

    #[test]
    fn test_writer_basic() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("inventory.db");

        let writer = BatchedWriter::new(&db_path, 3, 16, &[(keys::PAGE_SIZE, "0".into())]).unwrap();
        let handle = writer.handle();

        for i in 0..10 {
            let c = collection(&format!("c{}", i), i, format!(". {}+3 0:3:f\n", H1));
            handle.send_row(InventoryRow::from_collection(&c)).unwrap();
        }

        writer
            .finish(status::VERIFIED, &[(keys::VISITED_COUNT, "10".into())])
            .unwrap();

        let conn = Connection::open(&db_path).unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM collections", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 10);

        let totals = schema::inventory_totals(&conn).unwrap();
        assert_eq!(totals.blocks, 1);
        assert_eq!(totals.referenced_bytes, 3);

        assert_eq!(
            schema::get_sweep_info(&conn, keys::STATUS).unwrap().as_deref(),
            Some("verified")
        );
        assert_eq!(
            schema::get_sweep_info(&conn, keys::PAGE_SIZE).unwrap().as_deref(),
            Some("0")
        );
        assert_eq!(
            schema::get_sweep_info(&conn, keys::VISITED_COUNT).unwrap().as_deref(),
            Some("10")
        );
    }

    #[test]
    fn test_redelivery_replaces_blocks() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("inventory.db");

        let writer = BatchedWriter::new(&db_path, 100, 16, &[]).unwrap();
        let handle = writer.handle();

        let first = collection("a", 1, format!(". {}+3 {}+3 0:6:f\n", H1, H2));
        let second = collection("a", 9, format!(". {}+3 0:3:f\n", H2));
        handle.send_row(InventoryRow::from_collection(&first)).unwrap();
        handle.flush().unwrap();
        handle.send_row(InventoryRow::from_collection(&second)).unwrap();

        writer.finish(status::VERIFIED, &[]).unwrap();

        let conn = Connection::open(&db_path).unwrap();
        assert_eq!(block_count(&conn, "a"), 1);

        let (hash, modified): (String, String) = conn
            .query_row(
                "SELECT b.block_hash, c.modified_at FROM collection_blocks b \
                 JOIN collections c ON c.uuid = b.collection_uuid",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .unwrap();
        assert_eq!(hash, H2);
        assert!(modified.starts_with("1970-01-01T00:00:09"));
    }

    #[test]
    fn test_writer_stats() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("inventory.db");

        let writer = BatchedWriter::new(&db_path, 100, 16, &[]).unwrap();
        let handle = writer.handle();

        for i in 0..5 {
            let c = collection(&format!("c{}", i), 1, format!(". {}+3 0:3:f\n", H1));
            handle.send_row(InventoryRow::from_collection(&c)).unwrap();
        }

        handle.flush().unwrap();
        writer.finish(status::FAILED, &[]).unwrap();

        assert_eq!(handle.stats().rows_written(), 5);
        assert_eq!(handle.stats().blocks_written(), 5);
        assert!(handle.stats().batches_committed() >= 1);
    }

    #[test]
    fn test_send_after_finish_fails() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("inventory.db");

        let writer = BatchedWriter::new(&db_path, 100, 1, &[]).unwrap();
        let handle = writer.handle();
        writer.finish(status::INTERRUPTED, &[]).unwrap();

        let row = InventoryRow::from_collection(&collection("late", 1, String::new()));
        assert!(matches!(handle.send_row(row), Err(DbError::ChannelClosed)));
    }
}
