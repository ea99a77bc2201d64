//! Collection source access
//!
//! The sweep talks to its data source through one operation: a filtered,
//! ordered, limited list request that may also return an exact match count.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                 CollectionSource                     │
//! │  list(ListParams) -> CollectionList                 │
//! └───────────────┬─────────────────────┬───────────────┘
//!                 │                     │
//!                 ▼                     ▼
//! ┌───────────────────────────┐ ┌───────────────────────┐
//! │       ArvadosClient        │ │     MemorySource      │
//! │  - blocking HTTP (reqwest) │ │  - in-process store   │
//! │  - bearer token auth       │ │  - mutation hook      │
//! │  - no retries              │ │  - request log        │
//! └───────────────────────────┘ └───────────────────────┘
//! ```

mod client;
pub mod memory;
pub mod types;

pub use client::{ArvadosClient, ArvadosClientBuilder, COLLECTIONS_PATH};
pub use memory::MemorySource;
pub use types::{
    attrs, format_time, zero_time, Collection, CollectionList, CountMode, Direction, Filter,
    FilterOp, ListParams, Operand, SortKey, SWEEP_SELECT,
};

use crate::error::ApiResult;

/// A paginated, filterable collection store
///
/// Implementations must honour every field of [`ListParams`]: conjunctive
/// filters over `modified_at` and `uuid`, a stable `(modified_at, uuid)`
/// ordering, the page limit, the count mode, and the flags that expose
/// trashed collections and past versions.
pub trait CollectionSource {
    /// Fetch one page
    fn list(&self, params: &ListParams) -> ApiResult<CollectionList>;
}

impl<T: CollectionSource + ?Sized> CollectionSource for &T {
    fn list(&self, params: &ListParams) -> ApiResult<CollectionList> {
        (**self).list(params)
    }
}
