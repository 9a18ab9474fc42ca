//! Domain models with validation at construction
//!
//! All caller input is validated when creating these types.
//! Invalid input returns ValidationError, not panic.

pub mod validation;
pub mod ids;
pub mod pagination;

pub use validation::ValidationError;
pub use ids::{PublicId, SearchTerm};
pub use pagination::{Page, PageLimit};
