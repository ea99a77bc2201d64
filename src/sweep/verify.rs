//! Post-sweep completeness check
//!
//! Once the walker runs out of pages, everything with `modified_at` at or
//! before the final boundary should have been delivered. Recount that set;
//! if the server now reports more than were visited, some collection was
//! missed and the sweep must not be acted on. Visiting more than the count
//! is fine (re-delivered collections).

use super::count::count_collections;
use crate::api::{zero_time, CollectionSource, Filter, FilterOp};
use crate::error::{Result, SweepError};
use chrono::{DateTime, Utc};
use tracing::{info, warn};

/// Compare `visited` against the server's count at `boundary`; returns the count
///
/// A `None` boundary (nothing was ever delivered) is checked at the zero time.
pub fn verify_complete<S>(source: &S, boundary: Option<DateTime<Utc>>, visited: u64) -> Result<u64>
where
    S: CollectionSource + ?Sized,
{
    let boundary = boundary.unwrap_or_else(zero_time);
    let expected = count_collections(source, &[Filter::modified_at(FilterOp::Le, boundary)])?;

    if visited < expected {
        warn!(visited, expected, %boundary, "Sweep missed collections");
        return Err(SweepError::Incomplete {
            visited,
            expected,
            boundary,
        });
    }

    info!(visited, expected, %boundary, "Sweep verified complete");
    Ok(expected)
}
