//! Cursor pagination over any ordered row source.
//!
//! A page request is answered with two store calls at most: one slice fetch
//! and one boundary check. Sources only need to know how to filter, order and
//! compare rows against a `(sort_key, id)` cursor.

use std::cmp::Ordering;
use std::sync::Arc;

use async_trait::async_trait;

use bookings_core::paging::normalize_page_size;
use bookings_core::{
    Cursor, CursorDirection, Filter, Page, PageRequest, RepositoryError, Sort, SortDirection,
};

use super::token::{PageTokenCipher, TokenPayload, fingerprint};

/// One slice to fetch.
///
/// Rows must come back in traversal order: the declared sort order when
/// `direction` is forward, the reverse otherwise. With a cursor, only rows
/// strictly beyond it in traversal order qualify.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SliceQuery {
    pub filters: Vec<Filter>,
    pub sort: Sort,
    pub after: Option<Cursor>,
    pub direction: CursorDirection,
    pub limit: u32,
}

impl SliceQuery {
    /// Order the source has to scan in.
    pub fn traversal_order(&self) -> SortDirection {
        traversal_order(self.sort.direction(), self.direction)
    }
}

pub fn traversal_order(sort: SortDirection, direction: CursorDirection) -> SortDirection {
    match (sort, direction) {
        (s, CursorDirection::Forward) => s,
        (SortDirection::Ascending, CursorDirection::Backward) => SortDirection::Descending,
        (SortDirection::Descending, CursorDirection::Backward) => SortDirection::Ascending,
    }
}

/// Compare two cursors in the given order (id breaks ties).
pub fn compare(order: SortDirection, a: &Cursor, b: &Cursor) -> Ordering {
    match order {
        SortDirection::Ascending => a.cmp(b),
        SortDirection::Descending => b.cmp(a),
    }
}

/// Row store a `Paginator` can walk.
#[async_trait]
pub trait CursorSource: Send + Sync {
    type Row: Send;

    /// Position of `row` under the sort field `sort_field`.
    fn cursor_of(&self, row: &Self::Row, sort_field: &str) -> Result<Cursor, RepositoryError>;

    async fn fetch(&self, query: &SliceQuery) -> Result<Vec<Self::Row>, RepositoryError>;

    /// `(has_previous, has_next)`: whether a matching row exists strictly
    /// before `first`, and strictly after `last`, in the declared order.
    async fn boundaries(
        &self,
        filters: &[Filter],
        sort: &Sort,
        first: &Cursor,
        last: &Cursor,
    ) -> Result<(bool, bool), RepositoryError>;
}

/// Resolves page requests against a `CursorSource` and mints tokens.
#[derive(Debug, Clone)]
pub struct Paginator {
    cipher: Arc<PageTokenCipher>,
}

impl Paginator {
    pub fn new(cipher: Arc<PageTokenCipher>) -> Self {
        Self { cipher }
    }

    pub fn cipher(&self) -> &PageTokenCipher {
        &self.cipher
    }

    /// `Ok(None)` for an empty first page; an empty page when a token was
    /// given but nothing lies beyond it.
    pub async fn paginate<S>(
        &self,
        source: &S,
        request: &PageRequest,
    ) -> Result<Option<Page<S::Row>>, RepositoryError>
    where
        S: CursorSource + ?Sized,
    {
        let expected_fingerprint = fingerprint(request.filters(), request.sort());

        let query = match request.page_token() {
            None => SliceQuery {
                filters: request.filters().to_vec(),
                sort: request.sort().clone(),
                after: None,
                direction: CursorDirection::Forward,
                limit: request.page_size(),
            },
            Some(token) => {
                let payload = self.cipher.open(token)?;
                if payload.filter_fingerprint != expected_fingerprint {
                    return Err(RepositoryError::malformed_token(
                        "token was issued for different filters or sort",
                    ));
                }
                SliceQuery {
                    filters: request.filters().to_vec(),
                    sort: request.sort().clone(),
                    after: Some(payload.cursor),
                    direction: payload.direction,
                    limit: normalize_page_size(payload.page_size),
                }
            }
        };

        let mut rows = source.fetch(&query).await?;
        rows.truncate(query.limit as usize);
        if query.direction == CursorDirection::Backward {
            rows.reverse();
        }

        let (Some(first_row), Some(last_row)) = (rows.first(), rows.last()) else {
            tracing::debug!(with_token = query.after.is_some(), "empty page");
            return Ok(query.after.is_some().then(Page::empty));
        };

        let sort_field = query.sort.field();
        let first = source.cursor_of(first_row, sort_field)?;
        let last = source.cursor_of(last_row, sort_field)?;
        let (has_previous, has_next) = source
            .boundaries(&query.filters, &query.sort, &first, &last)
            .await?;

        let mint = |cursor: Cursor, direction: CursorDirection| {
            self.cipher.seal(&TokenPayload {
                cursor,
                direction,
                filter_fingerprint: expected_fingerprint.clone(),
                page_size: query.limit,
            })
        };
        let previous = has_previous
            .then(|| mint(first, CursorDirection::Backward))
            .transpose()?;
        let next = has_next
            .then(|| mint(last, CursorDirection::Forward))
            .transpose()?;

        Ok(Some(Page::new(rows, previous, next)))
    }
}
