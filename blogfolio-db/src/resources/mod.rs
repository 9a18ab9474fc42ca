//! Paginated resource families
//!
//! Each module pairs a row type, a filter, a sort-field whitelist and a
//! [`Resource`](crate::query::Resource) impl with a thin repository.

pub mod comments;
pub mod posts;
pub mod users;

use serde::{Deserialize, Serialize};

use crate::error::QueryError;
use crate::models::PublicId;
use crate::query::Fragment;

pub use comments::{CommentFilter, CommentRepo, CommentRow, CommentScope, Comments};
pub use posts::{PostFilter, PostRepo, PostRow, Posts};
pub use users::{UserField, UserFilter, UserQueryMode, UserRepo, UserRow, Users};

/// Author constraint, by public id or by username.
///
/// Both post and comment queries alias the author's `users` row as `u`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AuthorRef {
    Id(PublicId),
    Username(String),
}

impl AuthorRef {
    /// Normalize the loose `userId` / `username` pair; setting both is a
    /// conflict.
    pub fn from_parts(
        user_id: Option<&str>,
        username: Option<&str>,
    ) -> Result<Option<Self>, QueryError> {
        match (user_id, username) {
            (Some(_), Some(_)) => Err(QueryError::ConflictingFilters {
                fields: vec!["userId", "username"],
            }),
            (Some(id), None) => Ok(Some(Self::Id(PublicId::new(id)?))),
            (None, Some(name)) => Ok(Some(Self::Username(name.to_owned()))),
            (None, None) => Ok(None),
        }
    }

    pub(crate) fn predicate(&self) -> Fragment {
        match self {
            Self::Id(id) => Fragment::new("u.user_uid = ").bind(id.as_str(), ""),
            Self::Username(name) => Fragment::new("u.username = ").bind(name.as_str(), ""),
        }
    }
}

/// Names of the `Some` entries, for conflict reporting.
pub(crate) fn set_fields(fields: &[(&'static str, bool)]) -> Vec<&'static str> {
    fields
        .iter()
        .filter(|(_, set)| *set)
        .map(|(name, _)| *name)
        .collect()
}
