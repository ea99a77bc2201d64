//! Collection records and query descriptors
//!
//! These types mirror the collections list endpoint: a filter conjunction,
//! a compound sort order, a page limit, a count mode, a projection and the
//! visibility flags for trashed collections and old versions.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::de::Deserializer;
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{ApiError, ApiResult};

/// Attribute names used by the sweep
pub mod attrs {
    /// Collection identifier
    pub const UUID: &str = "uuid";

    /// Last modification time
    pub const MODIFIED_AT: &str = "modified_at";
}

/// Attributes requested for every swept collection
pub const SWEEP_SELECT: &[&str] = &[
    "uuid",
    "unsigned_manifest_text",
    "modified_at",
    "portable_data_hash",
    "replication_desired",
    "is_trashed",
    "current_version_uuid",
];

/// A collection record as returned by the API server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Collection {
    /// Collection UUID (unique, stable, totally ordered)
    pub uuid: String,

    /// Last modification time; `None` when the server sent none
    #[serde(default)]
    pub modified_at: Option<DateTime<Utc>>,

    /// Content address of the manifest
    #[serde(default, deserialize_with = "null_as_default")]
    pub portable_data_hash: String,

    /// Desired replication level (server default when unset)
    #[serde(default)]
    pub replication_desired: Option<i64>,

    /// Manifest text with unsigned block locators
    #[serde(default, deserialize_with = "null_as_default")]
    pub unsigned_manifest_text: String,

    /// Whether the collection is in the trash
    #[serde(default, deserialize_with = "null_as_default")]
    pub is_trashed: bool,

    /// UUID of the current version when this record is a past version
    #[serde(default)]
    pub current_version_uuid: Option<String>,
}

impl Collection {
    /// Create a bare collection record
    pub fn new(uuid: impl Into<String>, modified_at: Option<DateTime<Utc>>) -> Self {
        Self {
            uuid: uuid.into(),
            modified_at,
            portable_data_hash: String::new(),
            replication_desired: None,
            unsigned_manifest_text: String::new(),
            is_trashed: false,
            current_version_uuid: None,
        }
    }

    /// Set the manifest text
    pub fn with_manifest(mut self, manifest: impl Into<String>) -> Self {
        self.unsigned_manifest_text = manifest.into();
        self
    }

    /// Mark the collection as trashed
    pub fn trashed(mut self) -> Self {
        self.is_trashed = true;
        self
    }

    /// Mark the collection as a past version of `current`
    pub fn old_version_of(mut self, current: impl Into<String>) -> Self {
        self.current_version_uuid = Some(current.into());
        self
    }

    /// True when this record is a past version of another collection
    pub fn is_old_version(&self) -> bool {
        self.current_version_uuid
            .as_deref()
            .is_some_and(|current| current != self.uuid)
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Format a timestamp the way filters carry it on the wire
pub fn format_time(t: &DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

/// The zero timestamp (0001-01-01T00:00:00Z)
pub fn zero_time() -> DateTime<Utc> {
    DateTime::from_timestamp(-62_135_596_800, 0).unwrap_or_default()
}

/// Filter comparison operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl FilterOp {
    /// Wire representation
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterOp::Eq => "=",
            FilterOp::Ne => "!=",
            FilterOp::Lt => "<",
            FilterOp::Le => "<=",
            FilterOp::Gt => ">",
            FilterOp::Ge => ">=",
        }
    }

    /// Apply the operator to an ordering of `value` relative to the operand
    pub fn matches(&self, ordering: std::cmp::Ordering) -> bool {
        use std::cmp::Ordering::*;
        match self {
            FilterOp::Eq => ordering == Equal,
            FilterOp::Ne => ordering != Equal,
            FilterOp::Lt => ordering == Less,
            FilterOp::Le => ordering != Greater,
            FilterOp::Gt => ordering == Greater,
            FilterOp::Ge => ordering != Less,
        }
    }
}

/// Right-hand side of a filter
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
    Time(DateTime<Utc>),
    Text(String),
}

impl Serialize for Operand {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Operand::Time(t) => serializer.serialize_str(&format_time(t)),
            Operand::Text(s) => serializer.serialize_str(s),
        }
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Time(t) => f.write_str(&format_time(t)),
            Operand::Text(s) => f.write_str(s),
        }
    }
}

/// One `(attribute, operator, operand)` condition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    pub attr: String,
    pub op: FilterOp,
    pub operand: Operand,
}

impl Filter {
    /// Condition on `modified_at`
    pub fn modified_at(op: FilterOp, t: DateTime<Utc>) -> Self {
        Self {
            attr: attrs::MODIFIED_AT.to_string(),
            op,
            operand: Operand::Time(t),
        }
    }

    /// Condition on `uuid`
    pub fn uuid(op: FilterOp, uuid: impl Into<String>) -> Self {
        Self {
            attr: attrs::UUID.to_string(),
            op,
            operand: Operand::Text(uuid.into()),
        }
    }
}

// Filters travel as `[attr, op, operand]` triples.
impl Serialize for Filter {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        (&self.attr, self.op.as_str(), &self.operand).serialize(serializer)
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.attr, self.op.as_str(), self.operand)
    }
}

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

/// One sort key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
    pub attr: String,
    pub direction: Direction,
}

impl SortKey {
    /// Ascending sort on `attr`
    pub fn asc(attr: &str) -> Self {
        Self {
            attr: attr.to_string(),
            direction: Direction::Asc,
        }
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dir = match self.direction {
            Direction::Asc => "asc",
            Direction::Desc => "desc",
        };
        write!(f, "{} {}", self.attr, dir)
    }
}

/// Whether the server should count all matches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CountMode {
    /// Compute `items_available`, ignoring the limit
    #[default]
    Exact,
    /// Skip counting
    None,
}

impl CountMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            CountMode::Exact => "exact",
            CountMode::None => "none",
        }
    }
}

/// Parameters of one list request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListParams {
    /// Conjunctive filters
    pub filters: Vec<Filter>,

    /// Sort keys, most significant first
    pub order: Vec<SortKey>,

    /// Maximum items per page (the server may cap it)
    pub limit: Option<u64>,

    /// Count mode
    pub count: CountMode,

    /// Attributes to return (all when empty)
    pub select: Vec<String>,

    /// Include trashed collections
    pub include_trash: bool,

    /// Include past versions
    pub include_old_versions: bool,
}

impl ListParams {
    /// Encode as URL query parameters
    pub fn query_pairs(&self) -> ApiResult<Vec<(&'static str, String)>> {
        let mut pairs = Vec::with_capacity(7);

        if !self.filters.is_empty() {
            let filters = serde_json::to_string(&self.filters)
                .map_err(|e| ApiError::InvalidRequest(format!("filters: {}", e)))?;
            pairs.push(("filters", filters));
        }

        if !self.order.is_empty() {
            let order = self
                .order
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(",");
            pairs.push(("order", order));
        }

        if let Some(limit) = self.limit {
            pairs.push(("limit", limit.to_string()));
        }

        pairs.push(("count", self.count.as_str().to_string()));

        if !self.select.is_empty() {
            let select = serde_json::to_string(&self.select)
                .map_err(|e| ApiError::InvalidRequest(format!("select: {}", e)))?;
            pairs.push(("select", select));
        }

        pairs.push(("include_trash", self.include_trash.to_string()));
        pairs.push(("include_old_versions", self.include_old_versions.to_string()));

        Ok(pairs)
    }
}

/// One page of results
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CollectionList {
    /// Items in server sort order
    #[serde(default)]
    pub items: Vec<Collection>,

    /// Total matches ignoring pagination (only for exact counts)
    #[serde(default)]
    pub items_available: Option<u64>,
}
