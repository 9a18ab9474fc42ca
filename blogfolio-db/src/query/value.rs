//! Sort key values and their ordering
//!
//! The in-process comparison here is the reference the SQL side is rendered
//! to agree with: NULLs sort last in both directions, text compares bytewise
//! (the SQL side pins `COLLATE "C"`).

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::Row;

use super::sort::Direction;

/// SQL type of a sort key column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Int,
    Float,
    Time,
    Text,
}

/// One component of a row's sort key
#[derive(Debug, Clone, PartialEq)]
pub enum SortValue {
    Int(i64),
    Float(f64),
    Time(DateTime<Utc>),
    Text(String),
    Null,
}

impl SortValue {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Decode column `index` of `row` as `kind`.
    pub fn decode(row: &PgRow, index: usize, kind: ValueKind) -> Result<Self, sqlx::Error> {
        let value = match kind {
            ValueKind::Int => row.try_get::<Option<i64>, _>(index)?.map(Self::Int),
            ValueKind::Float => row.try_get::<Option<f64>, _>(index)?.map(Self::Float),
            ValueKind::Time => row
                .try_get::<Option<DateTime<Utc>>, _>(index)?
                .map(Self::Time),
            ValueKind::Text => row.try_get::<Option<String>, _>(index)?.map(Self::Text),
        };
        Ok(value.unwrap_or(Self::Null))
    }

    /// Compare two values under `direction`, NULLs last either way.
    pub fn compare(&self, other: &Self, direction: Direction) -> Ordering {
        match (self.is_null(), other.is_null()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Greater,
            (false, true) => Ordering::Less,
            (false, false) => {
                let ord = self.compare_present(other);
                match direction {
                    Direction::Asc => ord,
                    Direction::Desc => ord.reverse(),
                }
            }
        }
    }

    fn compare_present(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Int(a), Self::Int(b)) => a.cmp(b),
            (Self::Float(a), Self::Float(b)) => a.total_cmp(b),
            (Self::Time(a), Self::Time(b)) => a.cmp(b),
            (Self::Text(a), Self::Text(b)) => a.as_bytes().cmp(b.as_bytes()),
            // Keys of one plan share kinds per position; mixed kinds only
            // arise from hand-built keys and get a fixed arbitrary order.
            (a, b) => a.rank().cmp(&b.rank()),
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Self::Int(_) => 0,
            Self::Float(_) => 1,
            Self::Time(_) => 2,
            Self::Text(_) => 3,
            Self::Null => 4,
        }
    }
}

impl From<i64> for SortValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for SortValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<DateTime<Utc>> for SortValue {
    fn from(v: DateTime<Utc>) -> Self {
        Self::Time(v)
    }
}

impl From<&str> for SortValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_owned())
    }
}

impl<T: Into<SortValue>> From<Option<T>> for SortValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Self::Null)
    }
}
