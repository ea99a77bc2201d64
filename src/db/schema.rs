//! Inventory schema definitions and creation
//!
//! This module defines the SQLite schema for the collection inventory
//! and provides functions to create and configure the database.

use crate::error::DbResult;
use rusqlite::{Connection, OptionalExtension};

/// Current schema version for migrations
pub const SCHEMA_VERSION: u32 = 1;

/// One row per collection (current, trashed, or past version)
const CREATE_COLLECTIONS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS collections (
    uuid TEXT PRIMARY KEY,
    portable_data_hash TEXT NOT NULL,
    modified_at TEXT,                 -- RFC 3339, nanosecond precision
    replication_desired INTEGER,      -- NULL = cluster default
    is_trashed INTEGER NOT NULL,
    is_current INTEGER NOT NULL,      -- 0 for past versions
    block_count INTEGER NOT NULL,
    referenced_bytes INTEGER NOT NULL
)
"#;

/// Blocks referenced by each collection
const CREATE_BLOCKS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS collection_blocks (
    collection_uuid TEXT NOT NULL,
    block_hash TEXT NOT NULL,
    size INTEGER NOT NULL,
    PRIMARY KEY (collection_uuid, block_hash)
) WITHOUT ROWID
"#;

/// SQL to create sweep metadata table
const CREATE_SWEEP_INFO_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS sweep_info (
    key TEXT PRIMARY KEY,
    value TEXT
)
"#;

/// SQL to create indexes for common queries
const CREATE_INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_blocks_hash ON collection_blocks(block_hash)",
    "CREATE INDEX IF NOT EXISTS idx_collections_modified ON collections(modified_at)",
    "CREATE INDEX IF NOT EXISTS idx_collections_pdh ON collections(portable_data_hash)",
];

/// SQLite pragmas for optimal write performance
const WRITE_PRAGMAS: &str = r#"
PRAGMA journal_mode = WAL;
PRAGMA synchronous = OFF;
PRAGMA cache_size = -64000;      -- 64MB cache
PRAGMA temp_store = MEMORY;
PRAGMA locking_mode = EXCLUSIVE;
PRAGMA wal_autocheckpoint = 10000;
"#;

/// SQLite pragmas for read-optimized queries (applied after sweep completes)
const READ_PRAGMAS: &str = r#"
PRAGMA synchronous = FULL;
PRAGMA locking_mode = NORMAL;
"#;

/// Create and configure a new inventory for writing
pub fn create_database(conn: &Connection) -> DbResult<()> {
    conn.execute_batch(WRITE_PRAGMAS)?;

    conn.execute(CREATE_COLLECTIONS_TABLE, [])?;
    conn.execute(CREATE_BLOCKS_TABLE, [])?;
    conn.execute(CREATE_SWEEP_INFO_TABLE, [])?;

    Ok(())
}

/// Create indexes (called after the sweep for better insert performance)
pub fn create_indexes(conn: &Connection) -> DbResult<()> {
    for sql in CREATE_INDEXES {
        conn.execute(sql, [])?;
    }
    Ok(())
}

/// Apply read-optimized settings
pub fn optimize_for_reads(conn: &Connection) -> DbResult<()> {
    conn.execute_batch(READ_PRAGMAS)?;
    conn.execute("ANALYZE", [])?;
    Ok(())
}

/// Store sweep metadata
pub fn set_sweep_info(conn: &Connection, key: &str, value: &str) -> DbResult<()> {
    conn.execute(
        "INSERT OR REPLACE INTO sweep_info (key, value) VALUES (?1, ?2)",
        [key, value],
    )?;
    Ok(())
}

/// Get sweep metadata
pub fn get_sweep_info(conn: &Connection, key: &str) -> DbResult<Option<String>> {
    let value = conn
        .query_row("SELECT value FROM sweep_info WHERE key = ?1", [key], |row| {
            row.get(0)
        })
        .optional()?;
    Ok(value)
}

/// Aggregate view of an inventory
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InventoryTotals {
    /// Distinct collections recorded
    pub collections: u64,

    /// Distinct blocks referenced by any collection
    pub blocks: u64,

    /// Total size of distinct blocks
    pub referenced_bytes: u64,
}

/// Count collections and distinct blocks
pub fn inventory_totals(conn: &Connection) -> DbResult<InventoryTotals> {
    let collections: i64 =
        conn.query_row("SELECT COUNT(*) FROM collections", [], |row| row.get(0))?;

    let (blocks, bytes): (i64, i64) = conn.query_row(
        "SELECT COUNT(*), COALESCE(SUM(size), 0) FROM \
         (SELECT block_hash, MAX(size) AS size FROM collection_blocks GROUP BY block_hash)",
        [],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;

    Ok(InventoryTotals {
        collections: collections as u64,
        blocks: blocks as u64,
        referenced_bytes: bytes as u64,
    })
}

/// Metadata keys used by the sweep
pub mod keys {
    /// API base URL that was swept
    pub const SOURCE_URL: &str = "source_url";

    /// Timestamp when the sweep started (RFC 3339)
    pub const START_TIME: &str = "start_time";

    /// Timestamp when the sweep ended (RFC 3339)
    pub const END_TIME: &str = "end_time";

    /// Total duration in seconds
    pub const DURATION_SECS: &str = "duration_secs";

    /// Requested page size (0 = server maximum)
    pub const PAGE_SIZE: &str = "page_size";

    /// Count reported before the sweep
    pub const EXPECTED_COUNT: &str = "expected_count";

    /// Collections delivered, including re-deliveries
    pub const VISITED_COUNT: &str = "visited_count";

    /// Count at the final boundary after the sweep
    pub const VERIFIED_COUNT: &str = "verified_count";

    /// Final modified_at boundary (RFC 3339)
    pub const BOUNDARY: &str = "boundary";

    /// Error message when the sweep did not verify
    pub const ERROR: &str = "error";

    /// Schema version
    pub const SCHEMA_VERSION: &str = "schema_version";

    /// Sweeper version
    pub const SWEEPER_VERSION: &str = "sweeper_version";

    /// Sweep status, one of [`super::status`]
    pub const STATUS: &str = "status";
}

/// Values stored under [`keys::STATUS`]
pub mod status {
    pub const RUNNING: &str = "running";

    /// Every collection was seen; safe to act on
    pub const VERIFIED: &str = "verified";

    pub const FAILED: &str = "failed";
    pub const INTERRUPTED: &str = "interrupted";
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn test_create_database() {
        let conn = Connection::open_in_memory().unwrap();
        create_database(&conn).unwrap();

        let count: i32 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table' \
                 AND name IN ('collections', 'collection_blocks', 'sweep_info')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 3);
    }

    #[test]
    fn test_sweep_info() {
        let conn = Connection::open_in_memory().unwrap();
        create_database(&conn).unwrap();

        set_sweep_info(&conn, keys::STATUS, status::RUNNING).unwrap();
        set_sweep_info(&conn, keys::STATUS, status::VERIFIED).unwrap();

        let value = get_sweep_info(&conn, keys::STATUS).unwrap();
        assert_eq!(value, Some("verified".to_string()));

        let missing = get_sweep_info(&conn, "nonexistent").unwrap();
        assert_eq!(missing, None);
    }

    #[test]
    fn test_create_indexes() {
        let conn = Connection::open_in_memory().unwrap();
        create_database(&conn).unwrap();
        create_indexes(&conn).unwrap();
        optimize_for_reads(&conn).unwrap();

        let count: i32 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='index' AND name LIKE 'idx_%'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 3);
    }

    #[test]
    fn test_totals_count_shared_blocks_once() {
        let conn = Connection::open_in_memory().unwrap();
        create_database(&conn).unwrap();

        conn.execute_batch(
            "INSERT INTO collections VALUES ('a', 'pdh1', NULL, NULL, 0, 1, 2, 30);
             INSERT INTO collections VALUES ('b', 'pdh2', NULL, 2, 0, 1, 1, 10);
             INSERT INTO collection_blocks VALUES ('a', 'h1', 10);
             INSERT INTO collection_blocks VALUES ('a', 'h2', 20);
             INSERT INTO collection_blocks VALUES ('b', 'h1', 10);",
        )
        .unwrap();

        let totals = inventory_totals(&conn).unwrap();
        assert_eq!(
            totals,
            InventoryTotals {
                collections: 2,
                blocks: 2,
                referenced_bytes: 30,
            }
        );

        let empty = Connection::open_in_memory().unwrap();
        create_database(&empty).unwrap();
        assert_eq!(inventory_totals(&empty).unwrap(), InventoryTotals::default());
    }
}
