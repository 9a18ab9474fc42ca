//! Comments
//!
//! Comments hang off the `nodes` tree: a top-level comment's parent node is
//! its post's node, a reply's parent node is the comment it answers.

use std::borrow::Cow;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};

use super::AuthorRef;
use crate::config::PageConfig;
use crate::error::{PageError, QueryError};
use crate::models::{Page, PublicId, SearchTerm};
use crate::query::{
    FieldColumn, FilterSpec, Fragment, Identified, PageExecutor, PageRequest, Resource,
    SortField, SortStrategy, ValueKind,
};

#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentRow {
    pub id: String,
    pub author_id: String,
    pub body: String,
    pub parent_node: Option<i64>,
    pub replies: i64,
    pub reactions: i64,
    pub created_at: DateTime<Utc>,
    pub edited_at: Option<DateTime<Utc>>,
}

impl Identified for CommentRow {
    fn public_id(&self) -> &str {
        &self.id
    }
}

const REACTIONS: &str =
    "(SELECT count(*) FROM comment_emotes ce WHERE ce.comment_id = c.comment_id)";
const REPLIES: &str = "(SELECT count(*) FROM nodes r WHERE r.parent_node_id = c.node_id)";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommentSortField {
    Reactions,
    Replies,
    CreatedAt,
    EditedAt,
}

impl SortField for CommentSortField {
    const RESOURCE: &'static str = "comment";
    const ALL: &'static [Self] = &[
        Self::Reactions,
        Self::Replies,
        Self::CreatedAt,
        Self::EditedAt,
    ];

    fn name(self) -> &'static str {
        match self {
            Self::Reactions => "reactions",
            Self::Replies => "replies",
            Self::CreatedAt => "createdAt",
            Self::EditedAt => "editedAt",
        }
    }

    fn column(self) -> FieldColumn {
        let (sql, kind, nullable) = match self {
            Self::Reactions => (REACTIONS, ValueKind::Int, false),
            Self::Replies => (REPLIES, ValueKind::Int, false),
            Self::CreatedAt => ("c.created_at", ValueKind::Time, false),
            Self::EditedAt => ("c.edited_at", ValueKind::Time, true),
        };
        FieldColumn { sql, kind, nullable }
    }
}

/// Which part of the comment tree to list
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum CommentScope {
    #[default]
    All,
    /// Top-level comments on a post
    OnPost(PublicId),
    /// Direct replies to a comment
    RepliesTo(PublicId),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommentFilter {
    pub scope: CommentScope,
    pub id: Option<PublicId>,
    pub author: Option<AuthorRef>,
    pub search: Option<SearchTerm>,
}

impl FilterSpec for CommentFilter {
    fn predicates(&self, config: &PageConfig) -> Vec<Fragment> {
        let mut out = Vec::new();

        match &self.scope {
            CommentScope::All => {}
            CommentScope::OnPost(post) => out.push(
                Fragment::new(
                    "n.parent_node_id = (SELECT pp.node_id FROM posts pp WHERE pp.post_uid = ",
                )
                .bind(post.as_str(), ")"),
            ),
            CommentScope::RepliesTo(parent) => out.push(
                Fragment::new(
                    "n.parent_node_id = (SELECT pc.node_id FROM comments pc WHERE pc.comment_uid = ",
                )
                .bind(parent.as_str(), ")"),
            ),
        }
        if let Some(id) = &self.id {
            out.push(Fragment::new("c.comment_uid = ").bind(id.as_str(), ""));
        }
        if let Some(author) = &self.author {
            out.push(author.predicate());
        }
        if let Some(term) = &self.search {
            out.push(
                Fragment::new("c.body ILIKE ")
                    .bind(term.contains_pattern(), " OR similarity(c.body, ")
                    .bind(term.as_str(), ") > ")
                    .bind(config.similarity_threshold, ""),
            );
        }

        out
    }

    fn search(&self) -> Option<&SearchTerm> {
        self.search.as_ref()
    }
}

/// Loose comment query parameters
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentQueryParams {
    pub id: Option<String>,
    pub post_id: Option<String>,
    pub parent_id: Option<String>,
    pub user_id: Option<String>,
    pub username: Option<String>,
    pub search: Option<String>,
}

impl TryFrom<CommentQueryParams> for CommentFilter {
    type Error = QueryError;

    fn try_from(params: CommentQueryParams) -> Result<Self, Self::Error> {
        let scope = match (params.post_id.as_deref(), params.parent_id.as_deref()) {
            (Some(_), Some(_)) => {
                return Err(QueryError::ConflictingFilters {
                    fields: vec!["postId", "parentId"],
                })
            }
            (Some(post), None) => CommentScope::OnPost(PublicId::new(post)?),
            (None, Some(parent)) => CommentScope::RepliesTo(PublicId::new(parent)?),
            (None, None) => CommentScope::All,
        };

        Ok(Self {
            scope,
            id: params.id.as_deref().map(PublicId::new).transpose()?,
            author: AuthorRef::from_parts(params.user_id.as_deref(), params.username.as_deref())?,
            search: params.search.as_deref().map(SearchTerm::new).transpose()?,
        })
    }
}

/// Comment resource marker
pub struct Comments;

impl Resource for Comments {
    const NAME: &'static str = "comment";
    const FROM: &'static str = "comments c \
        JOIN users u ON u.user_id = c.user_id \
        JOIN nodes n ON n.node_id = c.node_id";
    const PUBLIC_ID: &'static str = "c.comment_uid";
    const RECENCY: Option<&'static str> = Some("COALESCE(c.edited_at, c.created_at)");
    const POPULARITY: &'static str = REACTIONS;

    type Row = CommentRow;
    type Filter = CommentFilter;
    type Field = CommentSortField;

    fn select_list(_filter: &CommentFilter) -> Cow<'static, str> {
        Cow::Borrowed(
            "c.comment_uid AS id, u.user_uid AS author_id, c.body, \
             n.parent_node_id::int8 AS parent_node, \
             (SELECT count(*) FROM nodes r WHERE r.parent_node_id = c.node_id) AS replies, \
             (SELECT count(*) FROM comment_emotes ce WHERE ce.comment_id = c.comment_id) AS reactions, \
             c.created_at, c.edited_at",
        )
    }

    fn relevance(filter: &CommentFilter) -> Option<Fragment> {
        let term = filter.search.as_ref()?;
        Some(Fragment::new("similarity(c.body, ").bind(term.as_str(), ")::float8"))
    }

    fn default_sort() -> SortStrategy<CommentSortField> {
        SortStrategy::Recency
    }
}

/// Comment repository
pub struct CommentRepo<'a> {
    executor: PageExecutor<'a>,
}

impl<'a> CommentRepo<'a> {
    pub fn new(pool: &'a PgPool, config: PageConfig) -> Self {
        Self {
            executor: PageExecutor::new(pool, config),
        }
    }

    pub async fn page(
        &self,
        request: &PageRequest<Comments>,
    ) -> Result<Page<CommentRow>, PageError> {
        self.executor.fetch(request).await
    }

    /// Get a single comment by public id.
    pub async fn get(&self, id: PublicId) -> Result<Option<CommentRow>, PageError> {
        let filter = CommentFilter {
            id: Some(id),
            ..CommentFilter::default()
        };
        let page = self
            .executor
            .fetch(&PageRequest::<Comments>::first(filter).with_limit(1))
            .await?;
        Ok(page.items.into_iter().next())
    }
}
