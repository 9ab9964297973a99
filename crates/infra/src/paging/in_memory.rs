//! `CursorSource` over an in-memory snapshot of rows.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use bookings_core::{Cursor, Filter, FilterValue, RepositoryError, Sort};

use super::engine::{CursorSource, SliceQuery, compare};

/// Row that can be filtered and ordered by field name.
pub trait Queryable: Clone + Send + Sync {
    fn row_id(&self) -> String;

    /// Value of a filterable field; `None` for unknown fields.
    fn field(&self, name: &str) -> Option<FilterValue>;

    /// Value of a sortable timestamp field; `None` for unknown fields.
    fn sort_key(&self, name: &str) -> Option<DateTime<Utc>>;
}

fn matches_all<T: Queryable>(row: &T, filters: &[Filter]) -> bool {
    filters
        .iter()
        .all(|f| f.matches(row.field(f.field()).as_ref()))
}

fn cursor<T: Queryable>(row: &T, sort_field: &str) -> Result<Cursor, RepositoryError> {
    row.sort_key(sort_field)
        .map(|key| Cursor::new(key, row.row_id()))
        .ok_or_else(|| RepositoryError::storage(format!("unsupported sort field {sort_field}")))
}

/// Snapshot of rows taken under the repository lock.
pub struct InMemorySource<T> {
    rows: Vec<T>,
}

impl<T: Queryable> InMemorySource<T> {
    pub fn new(rows: Vec<T>) -> Self {
        Self { rows }
    }

    fn positioned<'a>(
        &'a self,
        filters: &'a [Filter],
        sort_field: &'a str,
    ) -> impl Iterator<Item = Result<(Cursor, &'a T), RepositoryError>> + 'a {
        self.rows
            .iter()
            .filter(move |row| matches_all(*row, filters))
            .map(move |row| cursor(row, sort_field).map(|c| (c, row)))
    }
}

#[async_trait]
impl<T: Queryable> CursorSource for InMemorySource<T> {
    type Row = T;

    fn cursor_of(&self, row: &T, sort_field: &str) -> Result<Cursor, RepositoryError> {
        cursor(row, sort_field)
    }

    async fn fetch(&self, query: &SliceQuery) -> Result<Vec<T>, RepositoryError> {
        let order = query.traversal_order();
        let mut candidates = self
            .positioned(&query.filters, query.sort.field())
            .collect::<Result<Vec<_>, _>>()?;
        if let Some(after) = &query.after {
            candidates.retain(|(c, _)| compare(order, c, after).is_gt());
        }
        candidates.sort_by(|(a, _), (b, _)| compare(order, a, b));

        Ok(candidates
            .into_iter()
            .take(query.limit as usize)
            .map(|(_, row)| row.clone())
            .collect())
    }

    async fn boundaries(
        &self,
        filters: &[Filter],
        sort: &Sort,
        first: &Cursor,
        last: &Cursor,
    ) -> Result<(bool, bool), RepositoryError> {
        let order = sort.direction();
        let mut has_previous = false;
        let mut has_next = false;
        for positioned in self.positioned(filters, sort.field()) {
            let (c, _) = positioned?;
            has_previous |= compare(order, &c, first).is_lt();
            has_next |= compare(order, &c, last).is_gt();
        }
        Ok((has_previous, has_next))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use chrono::{Duration, TimeZone};

    use bookings_core::{CursorDirection, PageRequest, PageToken};

    use crate::paging::{PageTokenCipher, Paginator, TokenPayload};

    #[derive(Debug, Clone, PartialEq)]
    struct Row {
        id: &'static str,
        at: DateTime<Utc>,
        group: &'static str,
    }

    impl Queryable for Row {
        fn row_id(&self) -> String {
            self.id.to_string()
        }

        fn field(&self, name: &str) -> Option<FilterValue> {
            match name {
                "group" => Some(self.group.into()),
                _ => None,
            }
        }

        fn sort_key(&self, name: &str) -> Option<DateTime<Utc>> {
            (name == "at").then_some(self.at)
        }
    }

    fn base() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()
    }

    fn rows() -> Vec<Row> {
        vec![
            Row { id: "c", at: base() + Duration::hours(2), group: "x" },
            Row { id: "a", at: base(), group: "x" },
            Row { id: "d", at: base() + Duration::hours(2), group: "x" },
            Row { id: "b", at: base() + Duration::hours(1), group: "y" },
            Row { id: "e", at: base() + Duration::hours(3), group: "x" },
        ]
    }

    fn paginator() -> Paginator {
        Paginator::new(Arc::new(PageTokenCipher::generate()))
    }

    fn ids(page: &bookings_core::Page<Row>) -> Vec<&'static str> {
        page.items().iter().map(|r| r.id).collect()
    }

    #[tokio::test]
    async fn walks_forward_and_back_with_ties() {
        let source = InMemorySource::new(rows());
        let paginator = paginator();
        let request = PageRequest::new(Sort::ascending("at"))
            .with_filter(Filter::equal("group", "x"))
            .with_page_size(2);

        let first = paginator.paginate(&source, &request).await.unwrap().unwrap();
        assert_eq!(ids(&first), vec!["a", "c"]);
        assert!(!first.has_previous());

        let second = paginator
            .paginate(&source, &request.clone().with_page_token(first.next_page_token().cloned()))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(ids(&second), vec!["d", "e"]);
        assert!(second.has_previous());
        assert!(!second.has_next());

        let back = paginator
            .paginate(&source, &request.clone().with_page_token(second.previous_page_token().cloned()))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(ids(&back), vec!["a", "c"]);
        assert!(back.has_next());
        assert!(!back.has_previous());
    }

    #[tokio::test]
    async fn descending_sort_is_respected() {
        let source = InMemorySource::new(rows());
        let request = PageRequest::new(Sort::descending("at")).with_page_size(3);

        let page = paginator().paginate(&source, &request).await.unwrap().unwrap();

        assert_eq!(ids(&page), vec!["e", "d", "c"]);
        assert!(page.has_next());
    }

    #[tokio::test]
    async fn empty_first_page_is_none() {
        let source = InMemorySource::new(rows());
        let request = PageRequest::new(Sort::ascending("at")).with_filter(Filter::equal("group", "z"));

        assert!(paginator().paginate(&source, &request).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn nothing_beyond_token_is_empty_page() {
        let source = InMemorySource::new(rows());
        let paginator = paginator();
        let request = PageRequest::new(Sort::ascending("at"));
        let token = paginator
            .cipher()
            .seal(&TokenPayload {
                cursor: Cursor::new(base() + Duration::days(1), "z"),
                direction: CursorDirection::Forward,
                filter_fingerprint: crate::paging::fingerprint(&[], request.sort()),
                page_size: 2,
            })
            .unwrap();

        let page = paginator
            .paginate(&source, &request.with_page_token(Some(token)))
            .await
            .unwrap()
            .unwrap();

        assert!(page.is_empty());
        assert!(!page.has_next());
    }

    #[tokio::test]
    async fn token_for_other_filters_is_rejected() {
        let source = InMemorySource::new(rows());
        let paginator = paginator();
        let request = PageRequest::new(Sort::ascending("at")).with_page_size(1);
        let first = paginator.paginate(&source, &request).await.unwrap().unwrap();

        let tampered = request
            .with_filter(Filter::equal("group", "x"))
            .with_page_token(first.next_page_token().cloned());
        let err = paginator.paginate(&source, &tampered).await.unwrap_err();

        assert!(matches!(err, RepositoryError::MalformedToken(_)));
    }

    #[tokio::test]
    async fn forged_token_is_rejected() {
        let source = InMemorySource::new(rows());
        let request = PageRequest::new(Sort::ascending("at"))
            .with_page_token(Some(PageToken::new("bm90LWEtcmVhbC10b2tlbi1hdC1hbGwtbm9wZQ")));

        let err = paginator().paginate(&source, &request).await.unwrap_err();

        assert!(matches!(err, RepositoryError::MalformedToken(_)));
    }
}
