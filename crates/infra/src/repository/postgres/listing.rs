//! Keyset pagination over a Postgres table.
//!
//! Filters and sorts are resolved through a per-table whitelist so request
//! field names never reach the SQL text. Cursor conditions use row
//! comparison `(sort_column, id_column) > ($1, $2)`, which an index on
//! `(sort_column, id_column)` serves directly.

use std::marker::PhantomData;

use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, QueryBuilder, Row};

use bookings_core::{
    Cursor, CursorDirection, Filter, FilterOp, FilterValue, RepositoryError, Sort, SortDirection,
};

use super::map_sqlx_error;
use crate::paging::{CursorSource, SliceQuery, traversal_order};

/// Table description for keyset listings.
pub(crate) trait Listing: Send + Sync + 'static {
    type Row: Send;

    const TABLE: &'static str;
    const ID_COLUMN: &'static str;
    /// Comma-separated select list.
    const COLUMNS: &'static str;

    /// Column for a filterable field.
    fn filter_column(field: &str) -> Option<&'static str>;

    /// Timestamp column for a sortable field.
    fn sort_column(field: &str) -> Option<&'static str>;

    fn decode(row: &PgRow) -> Result<Self::Row, sqlx::Error>;

    fn cursor(row: &Self::Row, sort_field: &str) -> Option<Cursor>;
}

pub(crate) struct PgListing<'a, L> {
    pool: &'a PgPool,
    _listing: PhantomData<fn() -> L>,
}

impl<'a, L: Listing> PgListing<'a, L> {
    pub(crate) fn new(pool: &'a PgPool) -> Self {
        Self {
            pool,
            _listing: PhantomData,
        }
    }
}

fn unsupported(kind: &str, field: &str) -> RepositoryError {
    RepositoryError::storage(format!("unsupported {kind} field {field}"))
}

fn sort_column<L: Listing>(sort: &Sort) -> Result<&'static str, RepositoryError> {
    L::sort_column(sort.field()).ok_or_else(|| unsupported("sort", sort.field()))
}

fn push_value(qb: &mut QueryBuilder<'_, Postgres>, value: &FilterValue) {
    match value {
        FilterValue::Text(s) => {
            qb.push_bind(s.clone());
        }
        FilterValue::Bool(b) => {
            qb.push_bind(*b);
        }
    }
}

fn push_filters<L: Listing>(
    qb: &mut QueryBuilder<'_, Postgres>,
    filters: &[Filter],
) -> Result<(), RepositoryError> {
    qb.push(" WHERE TRUE");
    for filter in filters {
        let column = L::filter_column(filter.field()).ok_or_else(|| unsupported("filter", filter.field()))?;
        match (filter.op(), filter.values()) {
            (_, []) => {
                qb.push(" AND FALSE");
            }
            (FilterOp::Equal, [value, ..]) => {
                qb.push(" AND ").push(column).push(" = ");
                push_value(qb, value);
            }
            (FilterOp::In, values) => {
                qb.push(" AND ").push(column).push(" IN (");
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        qb.push(", ");
                    }
                    push_value(qb, value);
                }
                qb.push(")");
            }
        }
    }
    Ok(())
}

/// `AND (sort, id) <op> (key, id)` where `<op>` selects rows strictly after
/// `cursor` when scanning in `order`.
fn push_beyond(
    qb: &mut QueryBuilder<'_, Postgres>,
    sort_column: &str,
    id_column: &str,
    order: SortDirection,
    cursor: &Cursor,
) {
    let op = match order {
        SortDirection::Ascending => " > ",
        SortDirection::Descending => " < ",
    };
    qb.push(" AND (")
        .push(sort_column)
        .push(", ")
        .push(id_column)
        .push(")")
        .push(op)
        .push("(");
    qb.push_bind(cursor.sort_key);
    qb.push(", ");
    qb.push_bind(cursor.id.clone());
    qb.push(")");
}

fn sql_order(order: SortDirection) -> &'static str {
    match order {
        SortDirection::Ascending => "ASC",
        SortDirection::Descending => "DESC",
    }
}

fn reverse(order: SortDirection) -> SortDirection {
    traversal_order(order, CursorDirection::Backward)
}

#[async_trait]
impl<'a, L: Listing> CursorSource for PgListing<'a, L> {
    type Row = L::Row;

    fn cursor_of(&self, row: &L::Row, sort_field: &str) -> Result<Cursor, RepositoryError> {
        L::cursor(row, sort_field).ok_or_else(|| unsupported("sort", sort_field))
    }

    async fn fetch(&self, query: &SliceQuery) -> Result<Vec<L::Row>, RepositoryError> {
        let sort_col = sort_column::<L>(&query.sort)?;
        let order = query.traversal_order();

        let mut qb = QueryBuilder::<Postgres>::new("SELECT ");
        qb.push(L::COLUMNS).push(" FROM ").push(L::TABLE);
        push_filters::<L>(&mut qb, &query.filters)?;
        if let Some(after) = &query.after {
            push_beyond(&mut qb, sort_col, L::ID_COLUMN, order, after);
        }
        qb.push(" ORDER BY ")
            .push(sort_col)
            .push(" ")
            .push(sql_order(order))
            .push(", ")
            .push(L::ID_COLUMN)
            .push(" ")
            .push(sql_order(order))
            .push(" LIMIT ");
        qb.push_bind(i64::from(query.limit));

        let rows = qb
            .build()
            .fetch_all(self.pool)
            .await
            .map_err(|e| map_sqlx_error("list", e))?;

        rows.iter()
            .map(L::decode)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| map_sqlx_error("decode listing row", e))
    }

    async fn boundaries(
        &self,
        filters: &[Filter],
        sort: &Sort,
        first: &Cursor,
        last: &Cursor,
    ) -> Result<(bool, bool), RepositoryError> {
        let sort_col = sort_column::<L>(sort)?;
        let order = sort.direction();

        let mut qb = QueryBuilder::<Postgres>::new("SELECT EXISTS (SELECT 1 FROM ");
        qb.push(L::TABLE);
        push_filters::<L>(&mut qb, filters)?;
        push_beyond(&mut qb, sort_col, L::ID_COLUMN, reverse(order), first);
        qb.push(") AS has_previous, EXISTS (SELECT 1 FROM ").push(L::TABLE);
        push_filters::<L>(&mut qb, filters)?;
        push_beyond(&mut qb, sort_col, L::ID_COLUMN, order, last);
        qb.push(") AS has_next");

        let row = qb
            .build()
            .fetch_one(self.pool)
            .await
            .map_err(|e| map_sqlx_error("page boundaries", e))?;

        let has_previous: bool = row
            .try_get("has_previous")
            .map_err(|e| map_sqlx_error("page boundaries", e))?;
        let has_next: bool = row
            .try_get("has_next")
            .map_err(|e| map_sqlx_error("page boundaries", e))?;
        Ok((has_previous, has_next))
    }
}
