//! In-process collection source
//!
//! Evaluates [`ListParams`] against a vector of collections the same way
//! the API server does: filters are conjunctive, a missing timestamp never
//! satisfies a time comparison, results are sorted by the requested keys,
//! and the page limit is capped at a server maximum. A `before_list` hook
//! runs ahead of every request so tests can play the part of concurrent
//! writers.

use super::types::{attrs, Collection, CollectionList, CountMode, Direction, Filter, ListParams, Operand};
use super::CollectionSource;
use crate::error::{ApiError, ApiResult};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::cmp::Ordering;

/// Hook run before each list request with the request index and the store
pub type BeforeList = Box<dyn FnMut(usize, &mut Vec<Collection>) + Send>;

/// In-memory collection store
pub struct MemorySource {
    collections: Mutex<Vec<Collection>>,
    requests: Mutex<Vec<ListParams>>,
    before_list: Mutex<Option<BeforeList>>,
    max_page_size: u64,
}

impl MemorySource {
    /// Server page cap used unless overridden
    pub const DEFAULT_MAX_PAGE_SIZE: u64 = 1000;

    /// Create a store holding `collections`
    pub fn new(collections: Vec<Collection>) -> Self {
        Self {
            collections: Mutex::new(collections),
            requests: Mutex::new(Vec::new()),
            before_list: Mutex::new(None),
            max_page_size: Self::DEFAULT_MAX_PAGE_SIZE,
        }
    }

    /// Override the server page cap
    pub fn with_max_page_size(mut self, max: u64) -> Self {
        self.max_page_size = max.max(1);
        self
    }

    /// Install a hook run before each list request
    pub fn with_before_list<F>(self, hook: F) -> Self
    where
        F: FnMut(usize, &mut Vec<Collection>) + Send + 'static,
    {
        *self.before_list.lock() = Some(Box::new(hook));
        self
    }

    /// Insert a collection, replacing any with the same UUID
    pub fn insert(&self, collection: Collection) {
        let mut collections = self.collections.lock();
        match collections.iter_mut().find(|c| c.uuid == collection.uuid) {
            Some(existing) => *existing = collection,
            None => collections.push(collection),
        }
    }

    /// Remove a collection by UUID
    pub fn remove(&self, uuid: &str) -> Option<Collection> {
        let mut collections = self.collections.lock();
        let idx = collections.iter().position(|c| c.uuid == uuid)?;
        Some(collections.remove(idx))
    }

    /// Set a collection's modification time; false if it does not exist
    pub fn touch(&self, uuid: &str, modified_at: DateTime<Utc>) -> bool {
        let mut collections = self.collections.lock();
        match collections.iter_mut().find(|c| c.uuid == uuid) {
            Some(c) => {
                c.modified_at = Some(modified_at);
                true
            }
            None => false,
        }
    }

    /// Number of stored collections
    pub fn len(&self) -> usize {
        self.collections.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of the current contents
    pub fn snapshot(&self) -> Vec<Collection> {
        self.collections.lock().clone()
    }

    /// Every request received so far, in order
    pub fn requests(&self) -> Vec<ListParams> {
        self.requests.lock().clone()
    }

    /// Number of requests received so far
    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }
}

impl CollectionSource for MemorySource {
    fn list(&self, params: &ListParams) -> ApiResult<CollectionList> {
        let index = {
            let mut requests = self.requests.lock();
            requests.push(params.clone());
            requests.len() - 1
        };

        let mut collections = self.collections.lock();
        if let Some(hook) = self.before_list.lock().as_mut() {
            hook(index, &mut *collections);
        }

        for key in &params.order {
            if key.attr != attrs::MODIFIED_AT && key.attr != attrs::UUID {
                return Err(ApiError::InvalidRequest(format!(
                    "cannot order by '{}'",
                    key.attr
                )));
            }
        }

        let mut matched = Vec::new();
        for c in collections.iter() {
            if !is_visible(c, params) {
                continue;
            }
            if matches_all(c, &params.filters)? {
                matched.push(c);
            }
        }

        matched.sort_by(|a, b| {
            params
                .order
                .iter()
                .map(|key| {
                    let ord = compare_attr(a, b, &key.attr);
                    match key.direction {
                        Direction::Asc => ord,
                        Direction::Desc => ord.reverse(),
                    }
                })
                .find(|ord| *ord != Ordering::Equal)
                .unwrap_or_else(|| a.uuid.cmp(&b.uuid))
        });

        let items_available = match params.count {
            CountMode::Exact => Some(matched.len() as u64),
            CountMode::None => None,
        };

        let limit = params
            .limit
            .unwrap_or(self.max_page_size)
            .min(self.max_page_size);
        let limit = usize::try_from(limit).unwrap_or(usize::MAX);

        Ok(CollectionList {
            items: matched.into_iter().take(limit).cloned().collect(),
            items_available,
        })
    }
}

fn is_visible(c: &Collection, params: &ListParams) -> bool {
    (params.include_trash || !c.is_trashed) && (params.include_old_versions || !c.is_old_version())
}

fn matches_all(c: &Collection, filters: &[Filter]) -> ApiResult<bool> {
    for filter in filters {
        if !matches(c, filter)? {
            return Ok(false);
        }
    }
    Ok(true)
}

fn matches(c: &Collection, filter: &Filter) -> ApiResult<bool> {
    match (filter.attr.as_str(), &filter.operand) {
        (attrs::MODIFIED_AT, Operand::Time(t)) => Ok(c
            .modified_at
            .is_some_and(|m| filter.op.matches(m.cmp(t)))),
        (attrs::UUID, Operand::Text(s)) => Ok(filter.op.matches(c.uuid.as_str().cmp(s.as_str()))),
        _ => Err(ApiError::InvalidRequest(format!(
            "unsupported filter: {}",
            filter
        ))),
    }
}

fn compare_attr(a: &Collection, b: &Collection, attr: &str) -> Ordering {
    match attr {
        attrs::MODIFIED_AT => a.modified_at.cmp(&b.modified_at),
        _ => a.uuid.cmp(&b.uuid),
    }
}
