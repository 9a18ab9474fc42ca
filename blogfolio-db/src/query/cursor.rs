//! Cursors and the "strictly after" boundary they resolve to
//!
//! A cursor names the last row of the previous page by public id. Sort key
//! values aren't unique, so the id is resolved to that row's full key with a
//! point lookup, and the page query keeps only rows whose key compares
//! strictly after it under the active [`OrderPlan`].

use std::fmt;
use std::str::FromStr;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use serde::Deserialize;
use sqlx::{PgPool, Postgres, QueryBuilder};

use super::render;
use super::resource::Resource;
use super::sort::{key_alias, Direction, OrderPlan};
use super::value::SortValue;
use crate::error::{PageError, QueryError};
use crate::models::PublicId;

/// Opaque resume token: the last row's public id plus the ordering it was
/// issued under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cursor {
    id: PublicId,
    sort: String,
}

#[derive(Deserialize)]
struct CursorToken {
    id: String,
    sort: String,
}

impl Cursor {
    pub fn new(id: PublicId, fingerprint: impl Into<String>) -> Self {
        Self {
            id,
            sort: fingerprint.into(),
        }
    }

    pub fn id(&self) -> &PublicId {
        &self.id
    }

    /// Ordering fingerprint the cursor was issued under.
    pub fn fingerprint(&self) -> &str {
        &self.sort
    }

    /// URL-safe base64 of `{"id": .., "sort": ..}`.
    pub fn encode(&self) -> String {
        let json = serde_json::json!({ "id": self.id.as_str(), "sort": self.sort });
        URL_SAFE_NO_PAD.encode(json.to_string())
    }

    /// Decode a token produced by [`Cursor::encode`].
    ///
    /// ```
    /// use blogfolio_db::models::PublicId;
    /// use blogfolio_db::query::Cursor;
    ///
    /// let cursor = Cursor::new(PublicId::new("abc").unwrap(), "popularity");
    /// assert_eq!(Cursor::decode(&cursor.encode()).unwrap(), cursor);
    /// assert!(Cursor::decode("not a cursor").is_err());
    /// ```
    pub fn decode(token: &str) -> Result<Self, QueryError> {
        let bytes = URL_SAFE_NO_PAD
            .decode(token.trim())
            .map_err(|e| QueryError::MalformedCursor {
                reason: e.to_string(),
            })?;
        let raw: CursorToken =
            serde_json::from_slice(&bytes).map_err(|e| QueryError::MalformedCursor {
                reason: e.to_string(),
            })?;
        let id = PublicId::new(&raw.id).map_err(|e| QueryError::MalformedCursor {
            reason: e.to_string(),
        })?;
        Ok(Self::new(id, raw.sort))
    }

    /// Reject a cursor issued under a different ordering.
    pub fn check(&self, expected: &str) -> Result<(), QueryError> {
        if self.sort == expected {
            Ok(())
        } else {
            Err(QueryError::CursorMismatch {
                expected: expected.to_owned(),
                found: self.sort.clone(),
            })
        }
    }
}

impl FromStr for Cursor {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::decode(s)
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

/// One conjunct of a boundary clause
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// Key column equals the cursor's NULL
    IsNull { column: usize },
    /// Key column equals the cursor's value
    Equals { column: usize, value: SortValue },
    /// Key column sorts strictly after the cursor's (non-NULL) value
    After {
        column: usize,
        value: SortValue,
        direction: Direction,
        nullable: bool,
    },
}

impl Condition {
    fn matches(&self, key: &[SortValue]) -> bool {
        match self {
            Self::IsNull { column } => key[*column].is_null(),
            Self::Equals { column, value } => {
                !key[*column].is_null() && key[*column].compare(value, Direction::Asc).is_eq()
            }
            Self::After {
                column,
                value,
                direction,
                nullable,
            } => {
                if key[*column].is_null() {
                    *nullable
                } else {
                    key[*column].compare(value, *direction).is_gt()
                }
            }
        }
    }

    fn push_to(&self, qb: &mut QueryBuilder<'_, Postgres>) {
        match self {
            Self::IsNull { column } => {
                qb.push(key_alias(*column)).push(" IS NULL");
            }
            Self::Equals { column, value } => {
                qb.push(key_alias(*column)).push(" = ");
                render::push_value(qb, value);
            }
            Self::After {
                column,
                value,
                direction,
                nullable,
            } => {
                let op = match direction {
                    Direction::Asc => " > ",
                    Direction::Desc => " < ",
                };
                let alias = key_alias(*column);
                if *nullable {
                    qb.push("(");
                }
                qb.push(&alias).push(op);
                render::push_value(qb, value);
                if *nullable {
                    qb.push(" OR ").push(&alias).push(" IS NULL)");
                }
            }
        }
    }
}

/// Lexicographic "strictly after this key" predicate.
///
/// An OR of clauses; clause `i` requires key columns `0..i` to equal the
/// cursor and column `i` to sort after it. Clauses that can never hold (a
/// column after a NULL, with NULLs last) are dropped at build time.
#[derive(Debug, Clone, PartialEq)]
pub struct Boundary {
    key: Vec<SortValue>,
    clauses: Vec<Vec<Condition>>,
}

impl Boundary {
    /// Build the boundary for a resolved cursor key under `plan`.
    pub fn after(plan: &OrderPlan, key: Vec<SortValue>) -> Self {
        let mut clauses = Vec::new();
        let mut prefix: Vec<Condition> = Vec::new();

        for (column, (col, value)) in plan.columns().iter().zip(&key).enumerate() {
            if !value.is_null() {
                let mut clause = prefix.clone();
                clause.push(Condition::After {
                    column,
                    value: value.clone(),
                    direction: col.direction,
                    nullable: col.nullable,
                });
                clauses.push(clause);
            }

            prefix.push(if value.is_null() {
                Condition::IsNull { column }
            } else {
                Condition::Equals {
                    column,
                    value: value.clone(),
                }
            });
        }

        Self { key, clauses }
    }

    /// Resolved sort key of the cursor row.
    pub fn key(&self) -> &[SortValue] {
        &self.key
    }

    pub fn clauses(&self) -> &[Vec<Condition>] {
        &self.clauses
    }

    /// Evaluate the predicate against a row key in process.
    pub fn admits(&self, key: &[SortValue]) -> bool {
        self.clauses
            .iter()
            .any(|clause| clause.iter().all(|c| c.matches(key)))
    }

    /// Push the predicate over the `sort_kN` aliases.
    pub fn push_to(&self, qb: &mut QueryBuilder<'_, Postgres>) {
        if self.clauses.is_empty() {
            qb.push("FALSE");
            return;
        }

        qb.push("(");
        for (i, clause) in self.clauses.iter().enumerate() {
            if i > 0 {
                qb.push(" OR ");
            }
            qb.push("(");
            for (j, condition) in clause.iter().enumerate() {
                if j > 0 {
                    qb.push(" AND ");
                }
                condition.push_to(qb);
            }
            qb.push(")");
        }
        qb.push(")");
    }
}

/// Resolves cursors to boundaries with a point lookup on the pool.
pub struct CursorResolver<'a> {
    pool: &'a PgPool,
}

impl<'a> CursorResolver<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Sort key of the row named `id` under `plan`, or `None` if it is gone.
    pub async fn resolve_key<R: Resource>(
        &self,
        id: &PublicId,
        plan: &OrderPlan,
    ) -> Result<Option<Vec<SortValue>>, sqlx::Error> {
        let mut qb = render::resolve_query::<R>(id, plan);
        let row = qb.build().fetch_optional(self.pool).await?;

        row.map(|row| {
            plan.columns()
                .iter()
                .enumerate()
                .map(|(i, col)| SortValue::decode(&row, i, col.kind))
                .collect::<Result<Vec<_>, _>>()
        })
        .transpose()
    }

    /// Resolve `cursor` to a boundary. A vanished cursor row is reported as
    /// [`PageError::StaleCursor`].
    pub async fn resolve<R: Resource>(
        &self,
        cursor: &Cursor,
        plan: &OrderPlan,
    ) -> Result<Boundary, PageError> {
        let key = self
            .resolve_key::<R>(cursor.id(), plan)
            .await
            .map_err(|e| PageError::from_statement(R::NAME, "cursor lookup", e))?;
        match key {
            Some(key) => Ok(Boundary::after(plan, key)),
            None => {
                tracing::warn!(resource = R::NAME, id = %cursor.id(), "stale cursor");
                Err(PageError::StaleCursor {
                    resource: R::NAME,
                    id: cursor.id().to_string(),
                })
            }
        }
    }
}
