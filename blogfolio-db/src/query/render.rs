//! SQL rendering for page and cursor lookup queries
//!
//! Page query shape:
//!
//! ```text
//! SELECT * FROM (
//!     SELECT <select list>, <key 0> AS sort_k0, ..., <key n> AS sort_kn
//!     FROM <resource> WHERE TRUE AND (<filter>) ...
//! ) AS candidates
//! WHERE <boundary>
//! ORDER BY sort_k0 <dir> NULLS LAST, ...
//! LIMIT $n
//! ```
//!
//! Key expressions are computed once in the inner select, and the boundary
//! and `ORDER BY` both reference them by alias. Text keys are pinned to
//! `COLLATE "C"` so database order matches the bytewise comparison used in
//! process.

use sqlx::{Postgres, QueryBuilder};

use super::cursor::Boundary;
use super::resource::{FilterSpec, Resource};
use super::sort::{key_alias, KeyColumn, OrderPlan};
use super::value::{SortValue, ValueKind};
use crate::config::PageConfig;
use crate::models::{PageLimit, PublicId};

/// Bind one sort key value with its natural SQL type.
pub(crate) fn push_value(qb: &mut QueryBuilder<'_, Postgres>, value: &SortValue) {
    match value {
        SortValue::Int(v) => {
            qb.push_bind(*v);
        }
        SortValue::Float(v) => {
            qb.push_bind(*v);
        }
        SortValue::Time(v) => {
            qb.push_bind(*v);
        }
        SortValue::Text(v) => {
            qb.push_bind(v.clone());
        }
        SortValue::Null => {
            qb.push("NULL");
        }
    }
}

fn push_key(qb: &mut QueryBuilder<'_, Postgres>, column: &KeyColumn) {
    if column.kind == ValueKind::Text {
        qb.push("(");
        column.expr.push_to(qb);
        qb.push(") COLLATE \"C\"");
    } else {
        column.expr.push_to(qb);
    }
}

/// Render the single statement that fetches one page.
pub fn page_query<R: Resource>(
    filter: &R::Filter,
    plan: &OrderPlan,
    boundary: Option<&Boundary>,
    limit: PageLimit,
    config: &PageConfig,
) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new("SELECT * FROM (SELECT ");
    qb.push(R::select_list(filter));

    for (i, column) in plan.columns().iter().enumerate() {
        qb.push(", ");
        push_key(&mut qb, column);
        qb.push(" AS ").push(key_alias(i));
    }

    qb.push(" FROM ").push(R::FROM).push(" WHERE TRUE");
    for predicate in filter.predicates(config) {
        qb.push(" AND (");
        predicate.push_to(&mut qb);
        qb.push(")");
    }
    qb.push(") AS candidates");

    if let Some(boundary) = boundary {
        qb.push(" WHERE ");
        boundary.push_to(&mut qb);
    }

    qb.push(" ORDER BY ").push(plan.order_by());
    qb.push(" LIMIT ").push_bind(i64::from(limit.get()));
    qb
}

/// Render the point lookup of a cursor row's sort key.
///
/// Filters are not applied; the row only has to exist.
pub fn resolve_query<R: Resource>(id: &PublicId, plan: &OrderPlan) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new("SELECT ");
    for (i, column) in plan.columns().iter().enumerate() {
        if i > 0 {
            qb.push(", ");
        }
        push_key(&mut qb, column);
        qb.push(" AS ").push(key_alias(i));
    }
    qb.push(" FROM ").push(R::FROM);
    qb.push(" WHERE ").push(R::PUBLIC_ID).push(" = ");
    qb.push_bind(id.as_str().to_owned());
    qb.push(" LIMIT 1");
    qb
}
