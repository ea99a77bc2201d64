//! Consistent full enumeration
//!
//! Walks every collection in `(modified_at, uuid)` order while the source
//! is being modified, delivering each collection at least once, and then
//! proves it missed nothing by recounting everything up to the final
//! timestamp boundary.
//!
//! # Flow
//!
//! ```text
//!   count (exact, limit 0)
//!        │
//!        ▼
//!   ┌──────────────┐   items    ┌────────────┐
//!   │  list page   │──────────▶│  dedup +    │──▶ on_item
//!   │  (filters)   │            │  watermark  │
//!   └──────▲───────┘            └─────┬──────┘
//!          │       CursorState        │
//!          └──────── transition ◀─────┘
//!                       │ Finished
//!                       ▼
//!        count (modified_at <= boundary) >= visited ?
//! ```

mod count;
mod state;
mod verify;
mod walker;

pub use count::count_collections;
pub use state::{CursorState, Mode, Transition, Watermark};
pub use verify::verify_complete;
pub use walker::{CollectionWalker, SweepStats, MAX_PAGE_LIMIT};
