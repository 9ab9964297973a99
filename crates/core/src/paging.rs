//! Criteria and page types for cursor-paginated listings.
//!
//! These are storage-agnostic. Sealing tokens and walking cursors is done by
//! the pagination engine in `bookings-infra`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Page size used when a request does not specify one.
pub const DEFAULT_PAGE_SIZE: u32 = 50;

/// Upper bound applied to every requested page size.
pub const MAX_PAGE_SIZE: u32 = 1000;

/// Value compared by a filter.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum FilterValue {
    Text(String),
    Bool(bool),
}

impl From<&str> for FilterValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for FilterValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<bool> for FilterValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOp {
    Equal,
    In,
}

/// Single field predicate. All filters of a request are AND-ed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Filter {
    field: String,
    op: FilterOp,
    values: Vec<FilterValue>,
}

impl Filter {
    pub fn equal(field: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        Self {
            field: field.into(),
            op: FilterOp::Equal,
            values: vec![value.into()],
        }
    }

    /// Set membership. Values are de-duplicated and kept in canonical order.
    pub fn one_of<V: Into<FilterValue>>(
        field: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        let mut values: Vec<FilterValue> = values.into_iter().map(Into::into).collect();
        values.sort();
        values.dedup();
        Self {
            field: field.into(),
            op: FilterOp::In,
            values,
        }
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn op(&self) -> FilterOp {
        self.op
    }

    pub fn values(&self) -> &[FilterValue] {
        &self.values
    }

    /// Evaluate against a field value; a missing field never matches.
    pub fn matches(&self, actual: Option<&FilterValue>) -> bool {
        let Some(actual) = actual else {
            return false;
        };
        match self.op {
            FilterOp::Equal => self.values.first() == Some(actual),
            FilterOp::In => self.values.contains(actual),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    Ascending,
    Descending,
}

/// Sort key of a listing. The row id is always the implicit tie-breaker.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Sort {
    field: String,
    direction: SortDirection,
}

impl Sort {
    pub fn ascending(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Ascending,
        }
    }

    pub fn descending(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Descending,
        }
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn direction(&self) -> SortDirection {
        self.direction
    }
}

/// Traversal direction relative to the declared sort order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CursorDirection {
    Forward,
    Backward,
}

/// Position of a row in a listing: its sort key plus id as tie-breaker.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Cursor {
    pub sort_key: DateTime<Utc>,
    pub id: String,
}

impl Cursor {
    pub fn new(sort_key: DateTime<Utc>, id: impl Into<String>) -> Self {
        Self {
            sort_key,
            id: id.into(),
        }
    }
}

/// Opaque page token handed to clients.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PageToken(String);

impl PageToken {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for PageToken {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A listing request: filters, sort, page size and an optional token.
///
/// When a token is present it carries the cursor, direction and page size;
/// the filters and sort must still be supplied and must match the ones the
/// token was minted for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    filters: Vec<Filter>,
    sort: Sort,
    page_size: u32,
    page_token: Option<PageToken>,
}

impl PageRequest {
    pub fn new(sort: Sort) -> Self {
        Self {
            filters: Vec::new(),
            sort,
            page_size: DEFAULT_PAGE_SIZE,
            page_token: None,
        }
    }

    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    /// `0` selects the default size; larger values are capped.
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = normalize_page_size(page_size);
        self
    }

    pub fn with_page_token(mut self, token: Option<PageToken>) -> Self {
        self.page_token = token;
        self
    }

    pub fn filters(&self) -> &[Filter] {
        &self.filters
    }

    pub fn sort(&self) -> &Sort {
        &self.sort
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub fn page_token(&self) -> Option<&PageToken> {
        self.page_token.as_ref()
    }
}

pub fn normalize_page_size(page_size: u32) -> u32 {
    match page_size {
        0 => DEFAULT_PAGE_SIZE,
        n => n.min(MAX_PAGE_SIZE),
    }
}

/// One page of results, items in the declared sort order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    items: Vec<T>,
    previous_page_token: Option<PageToken>,
    next_page_token: Option<PageToken>,
}

impl<T> Page<T> {
    pub fn new(
        items: Vec<T>,
        previous_page_token: Option<PageToken>,
        next_page_token: Option<PageToken>,
    ) -> Self {
        Self {
            items,
            previous_page_token,
            next_page_token,
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new(), None, None)
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn into_items(self) -> Vec<T> {
        self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn previous_page_token(&self) -> Option<&PageToken> {
        self.previous_page_token.as_ref()
    }

    pub fn next_page_token(&self) -> Option<&PageToken> {
        self.next_page_token.as_ref()
    }

    pub fn has_previous(&self) -> bool {
        self.previous_page_token.is_some()
    }

    pub fn has_next(&self) -> bool {
        self.next_page_token.is_some()
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            previous_page_token: self.previous_page_token,
            next_page_token: self.next_page_token,
        }
    }

    /// Swap the items while keeping the tokens (used after enrichment).
    pub fn with_items<U>(self, items: Vec<U>) -> Page<U> {
        Page {
            items,
            previous_page_token: self.previous_page_token,
            next_page_token: self.next_page_token,
        }
    }
}

impl<T> Default for Page<T> {
    fn default() -> Self {
        Self::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_size_defaults_and_caps() {
        let req = PageRequest::new(Sort::ascending("create_time"));
        assert_eq!(req.page_size(), DEFAULT_PAGE_SIZE);
        assert_eq!(req.clone().with_page_size(0).page_size(), DEFAULT_PAGE_SIZE);
        assert_eq!(req.with_page_size(5000).page_size(), MAX_PAGE_SIZE);
    }

    #[test]
    fn equal_filter_matches_exact_value() {
        let filter = Filter::equal("place_id", "p-1");
        assert!(filter.matches(Some(&FilterValue::from("p-1"))));
        assert!(!filter.matches(Some(&FilterValue::from("p-2"))));
        assert!(!filter.matches(None));
    }

    #[test]
    fn in_filter_is_canonical_set() {
        let a = Filter::one_of("status", ["SCHEDULED", "CANCELLED", "SCHEDULED"]);
        let b = Filter::one_of("status", ["CANCELLED", "SCHEDULED"]);

        assert_eq!(a, b);
        assert!(a.matches(Some(&FilterValue::from("CANCELLED"))));
        assert!(!a.matches(Some(&FilterValue::from("COMPLETED"))));
    }

    #[test]
    fn page_map_keeps_tokens() {
        let page = Page::new(vec![1, 2], None, Some(PageToken::new("next")));
        let mapped = page.map(|n| n * 10);

        assert_eq!(mapped.items(), &[10, 20]);
        assert!(mapped.has_next());
        assert!(!mapped.has_previous());
    }
}
