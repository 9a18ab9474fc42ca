//! Page requests and their execution

use serde::Deserialize;
use sqlx::PgPool;
use tracing::debug;

use super::cursor::{Cursor, CursorResolver};
use super::render;
use super::resource::{FilterSpec, Identified, Resource};
use super::sort::{OrderPlan, SortStrategy};
use crate::config::PageConfig;
use crate::error::{PageError, QueryError};
use crate::models::{Page, PageLimit, PublicId};

/// Loose paging parameters as they arrive from a caller (query string, CLI).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListParams {
    /// `recency`, `popularity`, `relevance` or `composite:field.dir,...`
    pub sort: Option<String>,
    pub limit: Option<u32>,
    /// Cursor token from a previous page
    pub next_cursor: Option<String>,
}

/// Fully normalized request for one page of resource `R`
pub struct PageRequest<R: Resource> {
    pub filter: R::Filter,
    pub sort: SortStrategy<R::Field>,
    pub limit: Option<u32>,
    pub cursor: Option<Cursor>,
}

impl<R: Resource> PageRequest<R> {
    pub fn new(filter: R::Filter, sort: SortStrategy<R::Field>) -> Self {
        Self {
            filter,
            sort,
            limit: None,
            cursor: None,
        }
    }

    /// First page with the resource's default ordering.
    pub fn first(filter: R::Filter) -> Self {
        Self::new(filter, R::default_sort())
    }

    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_cursor(mut self, cursor: Option<Cursor>) -> Self {
        self.cursor = cursor;
        self
    }

    /// Continue after the row `id`, under this request's ordering.
    pub fn after(self, id: PublicId) -> Self {
        let cursor = Cursor::new(id, self.fingerprint());
        self.with_cursor(Some(cursor))
    }

    /// Fingerprint of the ordering this request uses.
    pub fn fingerprint(&self) -> String {
        self.sort.fingerprint(self.filter.search())
    }

    /// Normalize loose paging parameters around an already-built filter.
    ///
    /// A missing sort falls back to [`Resource::default_sort`].
    pub fn from_params(filter: R::Filter, params: &ListParams) -> Result<Self, QueryError> {
        let sort = match params.sort.as_deref() {
            Some(s) if !s.trim().is_empty() => SortStrategy::parse(s)?,
            _ => R::default_sort(),
        };
        let cursor = params
            .next_cursor
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .map(Cursor::decode)
            .transpose()?;

        Ok(Self {
            filter,
            sort,
            limit: params.limit,
            cursor,
        })
    }
}

/// Runs page requests against an injected pool.
pub struct PageExecutor<'a> {
    pool: &'a PgPool,
    config: PageConfig,
}

impl<'a> PageExecutor<'a> {
    pub fn new(pool: &'a PgPool, config: PageConfig) -> Self {
        Self { pool, config }
    }

    pub fn config(&self) -> &PageConfig {
        &self.config
    }

    /// Fetch one page.
    ///
    /// Composition errors are raised before any SQL runs. With a cursor, the
    /// cursor row is resolved in its own lookup; the page is then read by a
    /// single statement. `next_cursor` is set only when the page is full.
    pub async fn fetch<R: Resource>(
        &self,
        request: &PageRequest<R>,
    ) -> Result<Page<R::Row>, PageError> {
        let plan = OrderPlan::build::<R>(&request.sort, &request.filter)?;
        if let Some(cursor) = &request.cursor {
            cursor.check(plan.fingerprint())?;
        }
        let limit = PageLimit::new(request.limit, &self.config);

        let boundary = match &request.cursor {
            Some(cursor) => Some(
                CursorResolver::new(self.pool)
                    .resolve::<R>(cursor, &plan)
                    .await?,
            ),
            None => None,
        };

        debug!(
            resource = R::NAME,
            sort = plan.fingerprint(),
            limit = limit.get(),
            boundary = boundary.is_some(),
            "fetching page"
        );

        let mut qb =
            render::page_query::<R>(&request.filter, &plan, boundary.as_ref(), limit, &self.config);
        let items = qb
            .build_query_as::<R::Row>()
            .fetch_all(self.pool)
            .await
            .map_err(|e| PageError::from_statement(R::NAME, "page query", e))?;

        let next_cursor = if items.len() == limit.get() as usize {
            items
                .last()
                .map(|row| PublicId::new(row.public_id()))
                .transpose()?
                .map(|id| Cursor::new(id, plan.fingerprint()))
        } else {
            None
        };

        Ok(Page { items, next_cursor })
    }
}
