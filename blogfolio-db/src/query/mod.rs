//! Keyset pagination engine
//!
//! - [`sort`]: strategies and the total orderings they expand to
//! - [`cursor`]: resume tokens and the "strictly after" boundary
//! - [`render`]: SQL text for the page and cursor lookup statements
//! - [`executor`]: runs a [`PageRequest`] against a pool
//!
//! Resources plug in through the [`Resource`] trait.

pub mod cursor;
pub mod executor;
pub mod fragment;
pub mod render;
pub mod resource;
pub mod sort;
pub mod value;

pub use cursor::{Boundary, Condition, Cursor, CursorResolver};
pub use executor::{ListParams, PageExecutor, PageRequest};
pub use fragment::{Arg, Fragment};
pub use resource::{FilterSpec, Identified, Resource};
pub use sort::{Direction, FieldColumn, KeyColumn, OrderPlan, SortField, SortStrategy, SortTerm};
pub use value::{SortValue, ValueKind};
