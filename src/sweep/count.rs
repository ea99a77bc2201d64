//! Exact-count probe

use crate::api::{CollectionSource, CountMode, Filter, ListParams};
use crate::error::{ApiError, ApiResult};

/// Count every collection (including trashed and past versions) matching
/// `filters`, using a zero-item page with an exact count
pub fn count_collections<S>(source: &S, filters: &[Filter]) -> ApiResult<u64>
where
    S: CollectionSource + ?Sized,
{
    let params = ListParams {
        filters: filters.to_vec(),
        limit: Some(0),
        count: CountMode::Exact,
        include_trash: true,
        include_old_versions: true,
        ..Default::default()
    };

    source
        .list(&params)?
        .items_available
        .ok_or(ApiError::MissingCount)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{Collection, CollectionList, FilterOp, MemorySource};
    use chrono::DateTime;

    #[test]
    fn test_count_probe_request_shape() {
        let source = MemorySource::new(vec![
            Collection::new("a", DateTime::from_timestamp(1, 0)),
            Collection::new("b", DateTime::from_timestamp(2, 0)).trashed(),
        ]);

        assert_eq!(count_collections(&source, &[]).unwrap(), 2);

        let request = &source.requests()[0];
        assert_eq!(request.limit, Some(0));
        assert_eq!(request.count, CountMode::Exact);
        assert!(request.include_trash);
        assert!(request.include_old_versions);
    }

    #[test]
    fn test_count_with_filter() {
        let t = DateTime::from_timestamp(1, 0).unwrap();
        let source = MemorySource::new(vec![
            Collection::new("a", Some(t)),
            Collection::new("b", DateTime::from_timestamp(2, 0)),
        ]);
        let n = count_collections(&source, &[Filter::modified_at(FilterOp::Le, t)]).unwrap();
        assert_eq!(n, 1);
    }

    struct NoCount;

    impl CollectionSource for NoCount {
        fn list(&self, _params: &ListParams) -> ApiResult<CollectionList> {
            Ok(CollectionList::default())
        }
    }

    #[test]
    fn test_missing_count() {
        assert!(matches!(
            count_collections(&NoCount, &[]),
            Err(ApiError::MissingCount)
        ));
    }
}
