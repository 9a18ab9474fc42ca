//! Posts
//!
//! - Filters: id, slug, author, visibility, free-text search
//! - Popularity: view count
//! - Relevance: best of full-text prefix rank and title trigram similarity

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

/// Post row as returned by a page
#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostRow {
    pub id: String,
    pub slug: String,
    pub author_id: String,
    pub title: String,
    pub summary: Option<String>,
    pub body: String,
    pub visible: bool,
    pub views: i64,
    pub reactions: i64,
    pub created_at: DateTime<Utc>,
    pub edited_at: Option<DateTime<Utc>>,
}

impl Identified for PostRow {
    fn public_id(&self) -> &str {
        &self.id
    }
}

const VIEWS: &str = "p.num_views::int8";
const REACTIONS: &str = "(SELECT count(*) FROM post_emotes pe WHERE pe.post_id = p.post_id)";

/// Whitelisted composite sort fields for posts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PostSortField {
    Views,
    Reactions,
    CreatedAt,
    EditedAt,
    Title,
}

impl SortField for PostSortField {
    const RESOURCE: &'static str = "post";
    const ALL: &'static [Self] = &[
        Self::Views,
        Self::Reactions,
        Self::CreatedAt,
        Self::EditedAt,
        Self::Title,
    ];

    fn name(self) -> &'static str {
        match self {
            Self::Views => "views",
            Self::Reactions => "reactions",
            Self::CreatedAt => "createdAt",
            Self::EditedAt => "editedAt",
            Self::Title => "title",
        }
    }

    fn column(self) -> FieldColumn {
        let (sql, kind, nullable) = match self {
            Self::Views => (VIEWS, ValueKind::Int, false),
            Self::Reactions => (REACTIONS, ValueKind::Int, false),
            Self::CreatedAt => ("p.created_at", ValueKind::Time, false),
            Self::EditedAt => ("p.edited_at", ValueKind::Time, true),
            Self::Title => ("lower(p.title)", ValueKind::Text, false),
        };
        FieldColumn { sql, kind, nullable }
    }
}

/// Normalized post filters
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PostFilter {
    pub id: Option<PublicId>,
    pub slug: Option<String>,
    pub author: Option<AuthorRef>,
    pub visible: Option<bool>,
    pub search: Option<SearchTerm>,
}

impl FilterSpec for PostFilter {
    fn predicates(&self, config: &PageConfig) -> Vec<Fragment> {
        let mut out = Vec::new();

        if let Some(id) = &self.id {
            out.push(Fragment::new("p.post_uid = ").bind(id.as_str(), ""));
        }
        if let Some(slug) = &self.slug {
            out.push(Fragment::new("p.slug = ").bind(slug.as_str(), ""));
        }
        if let Some(author) = &self.author {
            out.push(author.predicate());
        }
        if let Some(visible) = self.visible {
            out.push(Fragment::new("p.visible = ").bind(visible, ""));
        }
        if let Some(term) = &self.search {
            let threshold = config.similarity_threshold;
            out.push(match term.prefix_tsquery() {
                Some(tsquery) => Fragment::new("p.text_search @@ to_tsquery('english', ")
                    .bind(tsquery, ") OR similarity(p.title, ")
                    .bind(term.as_str(), ") > ")
                    .bind(threshold, ""),
                None => Fragment::new("similarity(p.title, ")
                    .bind(term.as_str(), ") > ")
                    .bind(threshold, ""),
            });
        }

        out
    }

    fn search(&self) -> Option<&SearchTerm> {
        self.search.as_ref()
    }
}

/// Loose post query parameters
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostQueryParams {
    pub id: Option<String>,
    pub slug: Option<String>,
    pub user_id: Option<String>,
    pub username: Option<String>,
    pub visible: Option<bool>,
    pub search: Option<String>,
}

impl TryFrom<PostQueryParams> for PostFilter {
    type Error = QueryError;

    fn try_from(params: PostQueryParams) -> Result<Self, Self::Error> {
        Ok(Self {
            id: params.id.as_deref().map(PublicId::new).transpose()?,
            slug: params.slug,
            author: AuthorRef::from_parts(params.user_id.as_deref(), params.username.as_deref())?,
            visible: params.visible,
            search: params.search.as_deref().map(SearchTerm::new).transpose()?,
        })
    }
}

/// Post resource marker
pub struct Posts;

impl Resource for Posts {
    const NAME: &'static str = "post";
    const FROM: &'static str = "posts p JOIN users u ON u.user_id = p.user_id";
    const PUBLIC_ID: &'static str = "p.post_uid";
    const RECENCY: Option<&'static str> = Some("COALESCE(p.edited_at, p.created_at)");
    const POPULARITY: &'static str = VIEWS;

    type Row = PostRow;
    type Filter = PostFilter;
    type Field = PostSortField;

    fn select_list(_filter: &PostFilter) -> Cow<'static, str> {
        Cow::Borrowed(
            "p.post_uid AS id, p.slug, u.user_uid AS author_id, p.title, p.summary, p.body, \
             p.visible, p.num_views::int8 AS views, \
             (SELECT count(*) FROM post_emotes pe WHERE pe.post_id = p.post_id) AS reactions, \
             p.created_at, p.edited_at",
        )
    }

    fn relevance(filter: &PostFilter) -> Option<Fragment> {
        let term = filter.search.as_ref()?;
        Some(match term.prefix_tsquery() {
            Some(tsquery) => Fragment::new("GREATEST(ts_rank(p.text_search, to_tsquery('english', ")
                .bind(tsquery, ")), similarity(p.title, ")
                .bind(term.as_str(), "))::float8"),
            None => Fragment::new("similarity(p.title, ").bind(term.as_str(), ")::float8"),
        })
    }

    fn default_sort() -> SortStrategy<PostSortField> {
        SortStrategy::Recency
    }
}

/// Post repository
pub struct PostRepo<'a> {
    executor: PageExecutor<'a>,
}

impl<'a> PostRepo<'a> {
    pub fn new(pool: &'a PgPool, config: PageConfig) -> Self {
        Self {
            executor: PageExecutor::new(pool, config),
        }
    }

    /// Fetch one page of posts.
    pub async fn page(&self, request: &PageRequest<Posts>) -> Result<Page<PostRow>, PageError> {
        self.executor.fetch(request).await
    }

    /// Get a single post by public id.
    pub async fn get(&self, id: PublicId) -> Result<Option<PostRow>, PageError> {
        let filter = PostFilter {
            id: Some(id),
            ..PostFilter::default()
        };
        let page = self
            .executor
            .fetch(&PageRequest::<Posts>::first(filter).with_limit(1))
            .await?;
        Ok(page.items.into_iter().next())
    }
}
