//! The seam between the generic engine and a concrete resource table

use std::borrow::Cow;

use sqlx::postgres::PgRow;
use sqlx::FromRow;

use super::fragment::Fragment;
use super::sort::{SortField, SortStrategy};
use crate::config::PageConfig;
use crate::models::SearchTerm;

/// A normalized set of filters for one resource.
///
/// Absent filters must contribute no predicate at all.
pub trait FilterSpec: Send + Sync {
    /// `WHERE` predicates, ANDed together by the page query.
    fn predicates(&self, config: &PageConfig) -> Vec<Fragment>;

    /// Search term driving the relevance score, if any.
    fn search(&self) -> Option<&SearchTerm>;
}

/// Row types expose their public identifier so the next cursor can be derived.
pub trait Identified {
    fn public_id(&self) -> &str;
}

/// A paginated resource table.
///
/// SQL text here comes from fixed tables in each resource module.
pub trait Resource {
    /// Singular name used in errors and logs
    const NAME: &'static str;

    /// `FROM` clause including joins
    const FROM: &'static str;

    /// Expression for the public identifier (the final tie-break)
    const PUBLIC_ID: &'static str;

    /// Recency timestamp expression; `None` when the resource has none
    const RECENCY: Option<&'static str>;

    /// Engagement count expression, `int8`
    const POPULARITY: &'static str;

    type Row: for<'r> FromRow<'r, PgRow> + Identified + Send + Unpin;
    type Filter: FilterSpec + Default;
    type Field: SortField;

    /// Output columns of the page select list.
    fn select_list(filter: &Self::Filter) -> Cow<'static, str>;

    /// Match score expression (`float8`) for the filter's search term.
    fn relevance(filter: &Self::Filter) -> Option<Fragment>;

    /// Ordering used when the caller doesn't pick one.
    fn default_sort() -> SortStrategy<Self::Field>;
}
