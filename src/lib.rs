//! keep-sweep - Consistent Enumeration of Arvados Collections
//!
//! Visits every collection on a cluster, including trashed collections and
//! past versions, while other clients keep creating and modifying them, and
//! proves afterwards that nothing was missed. The result feeds block garbage
//! collection, so an unverified sweep is reported as a hard failure.
//!
//! # Features
//!
//! - **Keyset Paging**: Pages in `(modified_at, uuid)` order, so anything
//!   modified mid-sweep is delivered again on a later page instead of lost.
//!
//! - **Timestamp Disambiguation**: When a whole page shares one timestamp,
//!   pages through that timestamp by UUID until it is drained.
//!
//! - **Completeness Check**: Recounts everything up to the final boundary
//!   and fails if the server reports more than were visited.
//!
//! - **SQLite Inventory**: Collections and their block locators are stored
//!   for later analysis.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      Arvados API Server                          │
//! │                GET arvados/v1/collections                        │
//! └─────────────────────────────┬───────────────────────────────────┘
//!                               │ filters / order / limit / count
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      CollectionWalker                            │
//! │  ┌──────────────┐   ┌──────────────┐   ┌──────────────────┐     │
//! │  │ Count Probe  │──▶│ Cursor State │──▶│ Completeness     │     │
//! │  │ (exact, 0)   │   │ Scanning /   │   │ Verifier         │     │
//! │  └──────────────┘   │ ExactTime    │   └──────────────────┘     │
//! │                     └──────┬───────┘                            │
//! └────────────────────────────┼────────────────────────────────────┘
//!                              │ on_item(&Collection)
//!                              ▼
//!                 ┌──────────────────────────┐
//!                 │    Batched DB Writer     │
//!                 │  (crossbeam bounded)     │
//!                 └────────────┬─────────────┘
//!                              ▼
//!                    ┌──────────────────┐
//!                    │   SQLite DB      │
//!                    │   (sweep.db)     │
//!                    └──────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use keep_sweep::api::ArvadosClient;
//! use keep_sweep::sweep::CollectionWalker;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let client = ArvadosClient::builder("https://zzzzz.arvadosapi.com/", "token").build()?;
//! let walker = CollectionWalker::new(client).with_page_size(1000);
//!
//! let stats = walker.each_collection(|c| {
//!     println!("{} {}", c.uuid, c.portable_data_hash);
//!     Ok(())
//! })?;
//! println!("visited {} collections", stats.visited);
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod inventory;
pub mod manifest;
pub mod progress;
pub mod sweep;

pub use api::{ArvadosClient, Collection, CollectionSource, MemorySource};
pub use config::{ApiHost, CliArgs, SweepConfig};
pub use error::{ApiError, BoxError, Result, SweepError};
pub use inventory::{sweep_to_inventory, InventoryOptions, InventoryReport};
pub use sweep::{CollectionWalker, SweepStats};
