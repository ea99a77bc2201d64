//! Collection inventory storage
//!
//! Each delivered collection becomes one `collections` row plus one
//! `collection_blocks` row per distinct block its manifest references.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │              CollectionWalker callback               │
//! │  - InventoryRow::from_collection                    │
//! └─────────────────────┬───────────────────────────────┘
//!                       │ WriterMessage (bounded channel)
//!                       ▼
//! ┌─────────────────────────────────────────────────────┐
//! │              BatchedWriter Thread                    │
//! │  - Buffers rows in memory                           │
//! │  - Upserts one batch per transaction                │
//! └─────────────────────┬───────────────────────────────┘
//!                       │
//!                       ▼
//! ┌─────────────────────────────────────────────────────┐
//! │                 SQLite (sweep.db)                    │
//! └─────────────────────────────────────────────────────┘
//! ```

pub mod schema;
pub mod writer;

pub use schema::{
    create_database, create_indexes, get_sweep_info, inventory_totals, keys, optimize_for_reads,
    set_sweep_info, status, InventoryTotals,
};
pub use writer::{BatchedWriter, InventoryRow, WriterHandle, WriterMessage, WriterStats};
