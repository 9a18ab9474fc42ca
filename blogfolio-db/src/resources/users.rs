//! Users
//!
//! A user query runs in exactly one [`UserQueryMode`]. Output fields beyond id
//! and username are opt-in through the [`UserField`] whitelist.

use std::borrow::Cow;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};

use super::set_fields;
use crate::config::PageConfig;
use crate::error::{PageError, QueryError};
use crate::models::{Page, PublicId, SearchTerm, ValidationError};
use crate::query::{
    Direction, FieldColumn, FilterSpec, Fragment, Identified, PageExecutor, PageRequest,
    Resource, SortField, SortStrategy, SortTerm, ValueKind,
};

/// User row; unrequested optional fields are `None`
#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRow {
    pub id: String,
    pub username: String,
    pub bio: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub photo_small: Option<String>,
    pub photo_full: Option<String>,
    pub follower_count: Option<i64>,
    pub following_count: Option<i64>,
}

impl Identified for UserRow {
    fn public_id(&self) -> &str {
        &self.id
    }
}

const FOLLOWER_COUNT: &str = "(SELECT count(*) FROM user_follows f WHERE f.user_id = u.user_id)";
const FOLLOWING_COUNT: &str =
    "(SELECT count(*) FROM user_follows f WHERE f.follower_id = u.user_id)";

/// Optional output fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum UserField {
    Bio,
    FirstName,
    LastName,
    PhotoSmall,
    PhotoFull,
    FollowerCount,
    FollowingCount,
}

impl UserField {
    pub const ALL: &'static [Self] = &[
        Self::Bio,
        Self::FirstName,
        Self::LastName,
        Self::PhotoSmall,
        Self::PhotoFull,
        Self::FollowerCount,
        Self::FollowingCount,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Bio => "bio",
            Self::FirstName => "firstName",
            Self::LastName => "lastName",
            Self::PhotoSmall => "photoSmall",
            Self::PhotoFull => "photoFull",
            Self::FollowerCount => "followerCount",
            Self::FollowingCount => "followingCount",
        }
    }

    /// Select-list item when requested, and its typed NULL stand-in.
    fn projection(self) -> (&'static str, &'static str) {
        match self {
            Self::Bio => ("u.bio AS bio", "NULL::text AS bio"),
            Self::FirstName => ("u.first_name AS first_name", "NULL::text AS first_name"),
            Self::LastName => ("u.last_name AS last_name", "NULL::text AS last_name"),
            Self::PhotoSmall => ("u.photo_small AS photo_small", "NULL::text AS photo_small"),
            Self::PhotoFull => ("u.photo_full AS photo_full", "NULL::text AS photo_full"),
            Self::FollowerCount => (
                "(SELECT count(*) FROM user_follows f WHERE f.user_id = u.user_id) AS follower_count",
                "NULL::int8 AS follower_count",
            ),
            Self::FollowingCount => (
                "(SELECT count(*) FROM user_follows f WHERE f.follower_id = u.user_id) AS following_count",
                "NULL::int8 AS following_count",
            ),
        }
    }

    /// Parse a comma separated field list.
    pub fn parse_list(s: &str) -> Result<Vec<Self>, ValidationError> {
        let mut fields = Vec::new();
        for name in s.split(',').map(str::trim).filter(|n| !n.is_empty()) {
            let field: Self = name.parse()?;
            if !fields.contains(&field) {
                fields.push(field);
            }
        }
        Ok(fields)
    }
}

impl FromStr for UserField {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|f| f.name() == s)
            .ok_or_else(|| ValidationError::UnknownUserField(s.to_owned()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UserSortField {
    FirstName,
    LastName,
    Username,
    FollowerCount,
    FollowingCount,
}

impl SortField for UserSortField {
    const RESOURCE: &'static str = "user";
    const ALL: &'static [Self] = &[
        Self::FirstName,
        Self::LastName,
        Self::Username,
        Self::FollowerCount,
        Self::FollowingCount,
    ];

    fn name(self) -> &'static str {
        match self {
            Self::FirstName => "firstName",
            Self::LastName => "lastName",
            Self::Username => "username",
            Self::FollowerCount => "followerCount",
            Self::FollowingCount => "followingCount",
        }
    }

    fn column(self) -> FieldColumn {
        let (sql, kind, nullable) = match self {
            Self::FirstName => ("lower(u.first_name)", ValueKind::Text, true),
            Self::LastName => ("lower(u.last_name)", ValueKind::Text, true),
            Self::Username => ("lower(u.username)", ValueKind::Text, false),
            Self::FollowerCount => (FOLLOWER_COUNT, ValueKind::Int, false),
            Self::FollowingCount => (FOLLOWING_COUNT, ValueKind::Int, false),
        };
        FieldColumn { sql, kind, nullable }
    }
}

/// The single identity-style constraint of a user query
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum UserQueryMode {
    #[default]
    All,
    ById(PublicId),
    /// Users who follow the given user
    FollowersOf(PublicId),
    /// Users the given user follows
    FollowedBy(PublicId),
    SearchUsername(SearchTerm),
    /// Username, first name or last name
    SearchAny(SearchTerm),
}

#[derive(Debug, Clone, PartialEq)]
pub struct UserFilter {
    pub mode: UserQueryMode,
    pub fields: Vec<UserField>,
}

impl Default for UserFilter {
    fn default() -> Self {
        Self::new(UserQueryMode::All)
    }
}

impl UserFilter {
    /// Filter in `mode`, projecting every optional field.
    pub fn new(mode: UserQueryMode) -> Self {
        Self {
            mode,
            fields: UserField::ALL.to_vec(),
        }
    }

    pub fn with_fields(mut self, fields: Vec<UserField>) -> Self {
        self.fields = fields;
        self
    }
}

impl FilterSpec for UserFilter {
    fn predicates(&self, config: &PageConfig) -> Vec<Fragment> {
        let threshold = config.similarity_threshold;
        let predicate = match &self.mode {
            UserQueryMode::All => return Vec::new(),
            UserQueryMode::ById(id) => Fragment::new("u.user_uid = ").bind(id.as_str(), ""),
            UserQueryMode::FollowersOf(id) => Fragment::new(
                "u.user_id IN (SELECT f.follower_id FROM user_follows f \
                 JOIN users t ON t.user_id = f.user_id WHERE t.user_uid = ",
            )
            .bind(id.as_str(), ")"),
            UserQueryMode::FollowedBy(id) => Fragment::new(
                "u.user_id IN (SELECT f.user_id FROM user_follows f \
                 JOIN users s ON s.user_id = f.follower_id WHERE s.user_uid = ",
            )
            .bind(id.as_str(), ")"),
            UserQueryMode::SearchUsername(term) => Fragment::new("u.username ILIKE ")
                .bind(term.contains_pattern(), " OR similarity(u.username, ")
                .bind(term.as_str(), ") > ")
                .bind(threshold, ""),
            UserQueryMode::SearchAny(term) => {
                let pattern = term.contains_pattern();
                Fragment::new("u.username ILIKE ")
                    .bind(pattern.clone(), " OR u.first_name ILIKE ")
                    .bind(pattern.clone(), " OR u.last_name ILIKE ")
                    .bind(pattern, " OR similarity(u.username, ")
                    .bind(term.as_str(), ") > ")
                    .bind(threshold, "")
            }
        };
        vec![predicate]
    }

    fn search(&self) -> Option<&SearchTerm> {
        match &self.mode {
            UserQueryMode::SearchUsername(term) | UserQueryMode::SearchAny(term) => Some(term),
            _ => None,
        }
    }
}

/// Loose user query parameters
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserQueryParams {
    pub id: Option<String>,
    pub follower_id: Option<String>,
    pub follows_id: Option<String>,
    pub search_username: Option<String>,
    pub search_any: Option<String>,
    /// Comma separated [`UserField`] names; all fields when absent
    pub fields: Option<String>,
}

impl TryFrom<UserQueryParams> for UserFilter {
    type Error = QueryError;

    fn try_from(params: UserQueryParams) -> Result<Self, Self::Error> {
        let set = set_fields(&[
            ("id", params.id.is_some()),
            ("followerId", params.follower_id.is_some()),
            ("followsId", params.follows_id.is_some()),
            ("searchUsername", params.search_username.is_some()),
            ("searchAny", params.search_any.is_some()),
        ]);
        if set.len() > 1 {
            return Err(QueryError::ConflictingFilters { fields: set });
        }

        let mode = if let Some(id) = params.id {
            UserQueryMode::ById(PublicId::new(&id)?)
        } else if let Some(id) = params.follower_id {
            UserQueryMode::FollowersOf(PublicId::new(&id)?)
        } else if let Some(id) = params.follows_id {
            UserQueryMode::FollowedBy(PublicId::new(&id)?)
        } else if let Some(term) = params.search_username {
            UserQueryMode::SearchUsername(SearchTerm::new(&term)?)
        } else if let Some(term) = params.search_any {
            UserQueryMode::SearchAny(SearchTerm::new(&term)?)
        } else {
            UserQueryMode::All
        };

        let filter = Self::new(mode);
        Ok(match params.fields.as_deref() {
            Some(list) => filter.with_fields(UserField::parse_list(list)?),
            None => filter,
        })
    }
}

/// User resource marker
pub struct Users;

impl Resource for Users {
    const NAME: &'static str = "user";
    const FROM: &'static str = "users u";
    const PUBLIC_ID: &'static str = "u.user_uid";
    const RECENCY: Option<&'static str> = None;
    const POPULARITY: &'static str = FOLLOWER_COUNT;

    type Row = UserRow;
    type Filter = UserFilter;
    type Field = UserSortField;

    fn select_list(filter: &UserFilter) -> Cow<'static, str> {
        let mut items = vec!["u.user_uid AS id", "u.username AS username"];
        items.extend(UserField::ALL.iter().map(|field| {
            let (requested, absent) = field.projection();
            if filter.fields.contains(field) {
                requested
            } else {
                absent
            }
        }));
        Cow::Owned(items.join(", "))
    }

    fn relevance(filter: &UserFilter) -> Option<Fragment> {
        let term = filter.search()?;
        Some(Fragment::new("similarity(u.username, ").bind(term.as_str(), ")::float8"))
    }

    fn default_sort() -> SortStrategy<UserSortField> {
        SortStrategy::Composite(vec![SortTerm::new(UserSortField::Username, Direction::Asc)])
    }
}

/// User repository
pub struct UserRepo<'a> {
    executor: PageExecutor<'a>,
}

impl<'a> UserRepo<'a> {
    pub fn new(pool: &'a PgPool, config: PageConfig) -> Self {
        Self {
            executor: PageExecutor::new(pool, config),
        }
    }

    pub async fn page(&self, request: &PageRequest<Users>) -> Result<Page<UserRow>, PageError> {
        self.executor.fetch(request).await
    }

    /// Get a single user by public id with every optional field.
    pub async fn get(&self, id: PublicId) -> Result<Option<UserRow>, PageError> {
        let filter = UserFilter::new(UserQueryMode::ById(id));
        let page = self
            .executor
            .fetch(&PageRequest::<Users>::first(filter).with_limit(1))
            .await?;
        Ok(page.items.into_iter().next())
    }
}
