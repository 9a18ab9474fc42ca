//! blogfolio-db: keyset pagination for posts, comments and users on PostgreSQL
//!
//! A page request combines optional filters, one of four sort strategies
//! (recency, popularity, relevance, composite) and an opaque cursor into a
//! single statement. Every ordering is total, so walking pages with the
//! returned cursor never repeats or skips a row of a static dataset.
//!
//! ```ignore
//! let pool = blogfolio_db::db::create_pool(&url).await?;
//! let posts = PostRepo::new(&pool, PageConfig::default());
//! let page = posts.page(&PageRequest::new(filter, SortStrategy::Popularity)).await?;
//! ```

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod query;
pub mod resources;
pub mod schema;

pub use config::{AppConfig, ConfigError, DbConfig, PageConfig};
pub use error::{PageError, QueryError};
pub use models::{Page, PageLimit, PublicId, SearchTerm, ValidationError};
pub use query::{Cursor, Direction, ListParams, PageExecutor, PageRequest, SortStrategy};
pub use resources::{
    AuthorRef, CommentFilter, CommentRepo, CommentScope, Comments, PostFilter, PostRepo, Posts,
    UserField, UserFilter, UserQueryMode, UserRepo, Users,
};
