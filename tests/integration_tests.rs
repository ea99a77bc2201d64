//! Integration tests for keep-sweep
//!
//! These run full sweeps against an in-memory source and check the SQLite
//! inventory they produce.

use chrono::DateTime;
use clap::Parser;
use keep_sweep::api::{Collection, MemorySource};
use keep_sweep::config::{CliArgs, SweepConfig};
use keep_sweep::db::{self, keys};
use keep_sweep::inventory::{inventory_status, sweep_to_inventory, InventoryOptions};
use keep_sweep::sweep::CollectionWalker;
use rusqlite::Connection;
use tempfile::tempdir;

const H1: &str = "acbd18db4cc2f85cedef654fccc4a4d8";
const H2: &str = "37b51d194a7513e45b56f6524f2d51f2";
const H3: &str = "73feffa4b7f6bb68e44cf984c85f6e88";

fn collection(uuid: &str, secs: i64, manifest: &str) -> Collection {
    Collection::new(uuid, DateTime::from_timestamp(secs, 0)).with_manifest(manifest)
}

fn options(page_size: u64) -> InventoryOptions<'static> {
    InventoryOptions {
        batch_size: 3,
        source_url: "https://zzzzz.example.com/",
        page_size,
    }
}

fn blocks_of(conn: &Connection, uuid: &str) -> Vec<String> {
    conn.prepare("SELECT block_hash FROM collection_blocks WHERE collection_uuid = ?1 ORDER BY block_hash")
        .unwrap()
        .query_map([uuid], |row| row.get(0))
        .unwrap()
        .collect::<Result<Vec<_>, _>>()
        .unwrap()
}

#[test]
fn test_inventory_records_collections_and_blocks() {
    let dir = tempdir().unwrap();
    let db_path = dir.path().join("sweep.db");

    let source = MemorySource::new(vec![
        collection("c1", 1, &format!(". {}+3 {}+3 0:6:a.txt\n", H1, H2)),
        collection("c2", 2, &format!(". {}+3 0:3:b.txt\n", H2)).trashed(),
        collection("c3", 2, &format!("./dir {}+5+Afff@1 0:5:c.txt\n", H3)).old_version_of("c1"),
        collection("c4", 3, ""),
    ]);
    let walker = CollectionWalker::new(&source).with_page_size(2);

    let report = sweep_to_inventory(&walker, &db_path, &options(2), |_, _| {}).unwrap();
    assert_eq!(report.stats.visited, 4);
    assert_eq!(report.totals.collections, 4);
    assert_eq!(report.totals.blocks, 3);
    assert_eq!(report.totals.referenced_bytes, 11);

    let conn = Connection::open(&db_path).unwrap();
    assert_eq!(blocks_of(&conn, "c1"), {
        let mut v = vec![H1.to_string(), H2.to_string()];
        v.sort();
        v
    });
    assert!(blocks_of(&conn, "c4").is_empty());

    let (trashed, current): (bool, bool) = conn
        .query_row(
            "SELECT is_trashed, is_current FROM collections WHERE uuid = 'c2'",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .unwrap();
    assert!(trashed);
    assert!(current);

    let current: bool = conn
        .query_row(
            "SELECT is_current FROM collections WHERE uuid = 'c3'",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert!(!current);

    let info = |key| db::get_sweep_info(&conn, key).unwrap();
    assert_eq!(info(keys::STATUS).as_deref(), Some("verified"));
    assert_eq!(info(keys::EXPECTED_COUNT).as_deref(), Some("4"));
    assert_eq!(info(keys::VERIFIED_COUNT).as_deref(), Some("4"));
    assert_eq!(info(keys::PAGE_SIZE).as_deref(), Some("2"));
    assert_eq!(
        info(keys::BOUNDARY).as_deref(),
        Some("1970-01-01T00:00:03.000000000Z")
    );
    assert_eq!(
        info(keys::SOURCE_URL).as_deref(),
        Some("https://zzzzz.example.com/")
    );
}

#[test]
fn test_modified_collection_ends_with_latest_blocks() {
    let dir = tempdir().unwrap();
    let db_path = dir.path().join("sweep.db");

    // After the first page, "a" moves its data into a new block and is
    // saved with a newer timestamp.
    let updated = format!(". {}+5 0:5:f\n", H3);
    let source = MemorySource::new(vec![
        collection("a", 1, &format!(". {}+3 0:3:f\n", H1)),
        collection("b", 2, &format!(". {}+3 0:3:g\n", H2)),
    ])
    .with_before_list(move |index, collections| {
        if index == 2 {
            if let Some(a) = collections.iter_mut().find(|c| c.uuid == "a") {
                a.modified_at = DateTime::from_timestamp(10, 0);
                a.unsigned_manifest_text = updated.clone();
            }
        }
    });
    let walker = CollectionWalker::new(&source).with_page_size(1);

    let report = sweep_to_inventory(&walker, &db_path, &options(1), |_, _| {}).unwrap();
    assert_eq!(report.stats.visited, 3);
    assert_eq!(report.totals.collections, 2);

    let conn = Connection::open(&db_path).unwrap();
    assert_eq!(blocks_of(&conn, "a"), vec![H3.to_string()]);
    assert_eq!(blocks_of(&conn, "b"), vec![H2.to_string()]);
}

#[test]
fn test_progress_reports_visited_and_expected() {
    let dir = tempdir().unwrap();
    let db_path = dir.path().join("sweep.db");

    let source = MemorySource::new((0..7).map(|i| collection(&format!("c{}", i), i, "")).collect());
    let walker = CollectionWalker::new(&source).with_page_size(3);

    let mut updates = Vec::new();
    sweep_to_inventory(&walker, &db_path, &options(3), |visited, expected| {
        updates.push((visited, expected))
    })
    .unwrap();

    assert_eq!(updates.first(), Some(&(0, 7)));
    assert_eq!(updates.last(), Some(&(7, 7)));
    assert!(updates.windows(2).all(|w| w[0].0 <= w[1].0));
}

#[test]
fn test_invariant_violation_marks_inventory_failed() {
    let dir = tempdir().unwrap();
    let db_path = dir.path().join("sweep.db");

    let source = MemorySource::new(vec![
        collection("a", 1, ""),
        Collection::new("broken", None),
    ]);
    // A NULL timestamp sorts first, so it lands on the first page
    let walker = CollectionWalker::new(&source).with_page_size(1);

    let err = sweep_to_inventory(&walker, &db_path, &options(1), |_, _| {}).unwrap_err();
    assert!(err.is_data_integrity_failure());
    assert!(err.to_string().starts_with("BUG:"));
    assert_eq!(inventory_status(&db_path).unwrap().as_deref(), Some("failed"));
}

#[test]
fn test_config_from_command_line() {
    let dir = tempdir().unwrap();
    let output = dir.path().join("inventory.db");

    let args = CliArgs::parse_from([
        "keep-sweep",
        "--api-host",
        "https://zzzzz.example.com:8443",
        "--api-token",
        "tok",
        "--page-size",
        "500",
        "--timeout",
        "30",
        "-b",
        "250",
        "-q",
        "-o",
        output.to_str().unwrap(),
    ]);
    let config = SweepConfig::from_args(args).unwrap();

    assert_eq!(config.api_host.base_url(), "https://zzzzz.example.com:8443/");
    assert_eq!(config.page_size, 500);
    assert_eq!(config.timeout.as_secs(), 30);
    assert_eq!(config.batch_size, 250);
    assert!(!config.show_progress);
    assert_eq!(config.output_path, output);
}
