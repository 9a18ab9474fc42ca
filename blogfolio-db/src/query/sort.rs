//! Sort strategies and the key columns they order by
//!
//! A [`SortStrategy`] is the caller's intent; an [`OrderPlan`] is the concrete,
//! totally ordered list of key columns it expands to for one resource. Every
//! plan ends with the public identifier ascending, so no two rows ever compare
//! equal.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::fragment::Fragment;
use super::resource::{FilterSpec, Resource};
use super::value::{SortValue, ValueKind};
use crate::error::QueryError;
use crate::models::{SearchTerm, ValidationError};

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Asc,
    Desc,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }

    fn keyword(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

impl FromStr for Direction {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "asc" => Ok(Self::Asc),
            "desc" => Ok(Self::Desc),
            _ => Err(ValidationError::UnknownDirection(s.to_owned())),
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fixed SQL expression behind a whitelisted sort field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldColumn {
    pub sql: &'static str,
    pub kind: ValueKind,
    pub nullable: bool,
}

/// Whitelist of fields a resource may be sorted by in a composite sort.
///
/// Implemented by per-resource enums; the public name to SQL mapping is a
/// fixed table, so caller-supplied names never reach the query text.
pub trait SortField: Copy + Eq + fmt::Debug + Send + Sync + 'static {
    /// Resource name used in error messages
    const RESOURCE: &'static str;

    /// Every sortable field
    const ALL: &'static [Self];

    /// Public (camelCase) field name
    fn name(self) -> &'static str;

    /// Expression this field sorts by
    fn column(self) -> FieldColumn;

    /// Look up a field by public name.
    fn parse(name: &str) -> Result<Self, QueryError> {
        Self::ALL
            .iter()
            .copied()
            .find(|f| f.name() == name)
            .ok_or_else(|| QueryError::UnknownSortField {
                resource: Self::RESOURCE,
                field: name.to_owned(),
            })
    }
}

/// One (field, direction) pair of a composite sort
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortTerm<F> {
    pub field: F,
    pub direction: Direction,
}

impl<F: SortField> SortTerm<F> {
    pub fn new(field: F, direction: Direction) -> Self {
        Self { field, direction }
    }

    /// Parse `field` or `field.asc` / `field.desc`. A bare field sorts ascending.
    pub fn parse(s: &str) -> Result<Self, QueryError> {
        let (name, direction) = match s.rsplit_once('.') {
            Some((name, dir)) => (name, dir.parse::<Direction>()?),
            None => (s, Direction::Asc),
        };
        Ok(Self::new(F::parse(name.trim())?, direction))
    }
}

impl<F: SortField> fmt::Display for SortTerm<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.field.name(), self.direction)
    }
}

/// Ordering requested by the caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SortStrategy<F> {
    /// Most recently edited (or created) first
    Recency,
    /// Highest engagement count first, then most recent
    Popularity,
    /// Best search match first; needs a search term
    Relevance,
    /// Caller-chosen whitelisted fields, in order
    Composite(Vec<SortTerm<F>>),
}

impl<F: SortField> SortStrategy<F> {
    /// Build a composite sort from (field name, direction) pairs.
    ///
    /// Rejects unknown fields, repeated fields and an empty list.
    pub fn composite<'s, I>(pairs: I) -> Result<Self, QueryError>
    where
        I: IntoIterator<Item = (&'s str, &'s str)>,
    {
        let terms = pairs
            .into_iter()
            .map(|(field, dir)| Ok(SortTerm::new(F::parse(field)?, dir.parse()?)))
            .collect::<Result<Vec<_>, QueryError>>()?;
        Self::from_terms(terms)
    }

    /// Validate already-typed composite terms.
    pub fn from_terms(terms: Vec<SortTerm<F>>) -> Result<Self, QueryError> {
        if terms.is_empty() {
            return Err(QueryError::EmptyComposite);
        }
        for (i, term) in terms.iter().enumerate() {
            if terms[..i].iter().any(|t| t.field == term.field) {
                return Err(QueryError::DuplicateSortField {
                    field: term.field.name(),
                });
            }
        }
        Ok(Self::Composite(terms))
    }

    /// Parse `recency`, `popularity`, `relevance` or
    /// `composite:field.dir,field.dir`.
    pub fn parse(s: &str) -> Result<Self, QueryError> {
        match s.trim() {
            "recency" => Ok(Self::Recency),
            "popularity" => Ok(Self::Popularity),
            "relevance" => Ok(Self::Relevance),
            other => match other.strip_prefix("composite:") {
                Some(list) => {
                    let terms = list
                        .split(',')
                        .filter(|t| !t.trim().is_empty())
                        .map(|t| SortTerm::parse(t.trim()))
                        .collect::<Result<Vec<_>, _>>()?;
                    Self::from_terms(terms)
                }
                None => Err(QueryError::UnknownStrategy {
                    value: other.to_owned(),
                }),
            },
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Recency => "recency",
            Self::Popularity => "popularity",
            Self::Relevance => "relevance",
            Self::Composite(_) => "composite",
        }
    }

    /// Identity of the ordering, stored in cursors so a cursor issued under
    /// one ordering is never replayed under another.
    pub fn fingerprint(&self, search: Option<&SearchTerm>) -> String {
        match self {
            Self::Recency | Self::Popularity => self.name().to_owned(),
            Self::Relevance => match search {
                Some(term) => format!("relevance:{}", term.as_str().to_lowercase()),
                None => "relevance".to_owned(),
            },
            Self::Composite(terms) => {
                let list: Vec<String> = terms.iter().map(ToString::to_string).collect();
                format!("composite:{}", list.join(","))
            }
        }
    }
}

impl<F: SortField> FromStr for SortStrategy<F> {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// One column of a resolved ordering
#[derive(Debug, Clone, PartialEq)]
pub struct KeyColumn {
    pub expr: Fragment,
    pub kind: ValueKind,
    pub direction: Direction,
    pub nullable: bool,
}

impl KeyColumn {
    fn fixed(sql: &'static str, kind: ValueKind, direction: Direction, nullable: bool) -> Self {
        Self {
            expr: Fragment::new(sql),
            kind,
            direction,
            nullable,
        }
    }

    /// `ORDER BY` item for the key alias at `index`.
    pub(crate) fn order_item(&self, index: usize) -> String {
        format!(
            "{} {} NULLS LAST",
            key_alias(index),
            self.direction.keyword()
        )
    }
}

/// Alias the page query gives key column `index`.
pub(crate) fn key_alias(index: usize) -> String {
    format!("sort_k{index}")
}

/// Concrete total ordering for one request
#[derive(Debug, Clone, PartialEq)]
pub struct OrderPlan {
    columns: Vec<KeyColumn>,
    fingerprint: String,
}

impl OrderPlan {
    /// Expand `strategy` into key columns for resource `R`.
    ///
    /// - recency: `(recency DESC, id)`
    /// - popularity: `(count DESC, recency DESC, id)`
    /// - relevance: `(score DESC, recency DESC, id)`
    /// - composite: `(terms..., id)`
    ///
    /// The recency tie-break is skipped for resources without a timestamp.
    pub fn build<R: Resource>(
        strategy: &SortStrategy<R::Field>,
        filter: &R::Filter,
    ) -> Result<Self, QueryError> {
        let recency = R::RECENCY
            .map(|sql| KeyColumn::fixed(sql, ValueKind::Time, Direction::Desc, false));

        let mut columns = match strategy {
            SortStrategy::Recency => {
                let recency = recency.ok_or(QueryError::UnsupportedSort {
                    resource: R::NAME,
                    strategy: "recency",
                })?;
                vec![recency]
            }
            SortStrategy::Popularity => {
                let mut cols = vec![KeyColumn::fixed(
                    R::POPULARITY,
                    ValueKind::Int,
                    Direction::Desc,
                    false,
                )];
                cols.extend(recency);
                cols
            }
            SortStrategy::Relevance => {
                if filter.search().is_none() {
                    return Err(QueryError::RelevanceWithoutSearch { resource: R::NAME });
                }
                let score = R::relevance(filter).ok_or(QueryError::UnsupportedSort {
                    resource: R::NAME,
                    strategy: "relevance",
                })?;
                let mut cols = vec![KeyColumn {
                    expr: score,
                    kind: ValueKind::Float,
                    direction: Direction::Desc,
                    nullable: false,
                }];
                cols.extend(recency);
                cols
            }
            SortStrategy::Composite(terms) => terms
                .iter()
                .map(|term| {
                    let column = term.field.column();
                    KeyColumn::fixed(column.sql, column.kind, term.direction, column.nullable)
                })
                .collect(),
        };

        columns.push(KeyColumn::fixed(
            R::PUBLIC_ID,
            ValueKind::Text,
            Direction::Asc,
            false,
        ));

        Ok(Self {
            columns,
            fingerprint: strategy.fingerprint(filter.search()),
        })
    }

    pub fn columns(&self) -> &[KeyColumn] {
        &self.columns
    }

    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// Lexicographic comparison of two sort keys under this plan.
    pub fn compare(&self, a: &[SortValue], b: &[SortValue]) -> Ordering {
        self.columns
            .iter()
            .zip(a.iter().zip(b))
            .map(|(col, (x, y))| x.compare(y, col.direction))
            .find(|ord| ord.is_ne())
            .unwrap_or(Ordering::Equal)
    }

    /// `ORDER BY` clause body over the key aliases.
    pub(crate) fn order_by(&self) -> String {
        self.columns
            .iter()
            .enumerate()
            .map(|(i, col)| col.order_item(i))
            .collect::<Vec<_>>()
            .join(", ")
    }
}
