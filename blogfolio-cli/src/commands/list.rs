//! Listing commands: posts, comments, users
//!
//! Each prints one page and the cursor for the next one. Filter flags map
//! onto the loose query parameters, so conflicting flags are rejected by the
//! same normalization the library applies to any caller.

use anyhow::{Context, Result};
use blogfolio_db::query::{Identified, ListParams, PageRequest};
use blogfolio_db::resources::comments::{CommentFilter, CommentQueryParams, CommentRepo, Comments};
use blogfolio_db::resources::posts::{PostFilter, PostQueryParams, PostRepo, Posts};
use blogfolio_db::resources::users::{UserFilter, UserQueryParams, UserRepo, Users};
use blogfolio_db::{Page, PageError};
use clap::{Args, Parser, ValueEnum};
use serde::Serialize;
use tracing::debug;

use super::Runtime;

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Paging flags shared by every listing
#[derive(Args, Debug, Clone)]
pub struct PageArgs {
    /// Sort: recency, popularity, relevance or composite:field.dir,...
    #[arg(long, short = 's')]
    pub sort: Option<String>,

    /// Rows per page (clamped to the configured maximum)
    #[arg(long, short = 'n')]
    pub limit: Option<u32>,

    /// Cursor printed by the previous page
    #[arg(long)]
    pub next: Option<String>,

    /// Output format
    #[arg(long, value_enum, default_value = "text")]
    pub format: OutputFormat,
}

impl PageArgs {
    fn params(&self) -> ListParams {
        ListParams {
            sort: self.sort.clone(),
            limit: self.limit,
            next_cursor: self.next.clone(),
        }
    }
}

#[derive(Parser, Debug)]
pub struct PostsArgs {
    /// Post public id
    #[arg(long)]
    pub id: Option<String>,

    #[arg(long)]
    pub slug: Option<String>,

    /// Author public id
    #[arg(long)]
    pub user_id: Option<String>,

    /// Author username
    #[arg(long)]
    pub username: Option<String>,

    /// Only visible (true) or hidden (false) posts
    #[arg(long)]
    pub visible: Option<bool>,

    /// Free-text search over title and body
    #[arg(long, short = 'q')]
    pub search: Option<String>,

    #[command(flatten)]
    pub page: PageArgs,
}

#[derive(Parser, Debug)]
pub struct CommentsArgs {
    /// Comment public id
    #[arg(long)]
    pub id: Option<String>,

    /// Top-level comments on this post
    #[arg(long)]
    pub post_id: Option<String>,

    /// Replies to this comment
    #[arg(long)]
    pub parent_id: Option<String>,

    /// Author public id
    #[arg(long)]
    pub user_id: Option<String>,

    /// Author username
    #[arg(long)]
    pub username: Option<String>,

    /// Substring or fuzzy match on the body
    #[arg(long, short = 'q')]
    pub search: Option<String>,

    #[command(flatten)]
    pub page: PageArgs,
}

#[derive(Parser, Debug)]
pub struct UsersArgs {
    /// User public id
    #[arg(long)]
    pub id: Option<String>,

    /// Users following this user
    #[arg(long)]
    pub follower_id: Option<String>,

    /// Users this user follows
    #[arg(long)]
    pub follows_id: Option<String>,

    /// Search usernames
    #[arg(long)]
    pub search_username: Option<String>,

    /// Search usernames, first and last names
    #[arg(long)]
    pub search_any: Option<String>,

    /// Optional fields to include, comma separated (e.g. bio,lastName,followerCount)
    #[arg(long)]
    pub fields: Option<String>,

    #[command(flatten)]
    pub page: PageArgs,
}

pub async fn run_posts(args: PostsArgs, runtime: &Runtime) -> Result<()> {
    let filter: PostFilter = PostQueryParams {
        id: args.id,
        slug: args.slug,
        user_id: args.user_id,
        username: args.username,
        visible: args.visible,
        search: args.search,
    }
    .try_into()
    .context("Invalid post query")?;
    let request = PageRequest::<Posts>::from_params(filter, &args.page.params())
        .context("Invalid paging options")?;

    let pool = runtime.pool().await?;
    let page = PostRepo::new(&pool, runtime.config.page.clone())
        .page(&request)
        .await
        .map_err(explain)?;

    print_page(&page, args.page.format, |row| {
        format!("{}  views={}  {}", row.id, row.views, row.title)
    })
}

pub async fn run_comments(args: CommentsArgs, runtime: &Runtime) -> Result<()> {
    let filter: CommentFilter = CommentQueryParams {
        id: args.id,
        post_id: args.post_id,
        parent_id: args.parent_id,
        user_id: args.user_id,
        username: args.username,
        search: args.search,
    }
    .try_into()
    .context("Invalid comment query")?;
    let request = PageRequest::<Comments>::from_params(filter, &args.page.params())
        .context("Invalid paging options")?;

    let pool = runtime.pool().await?;
    let page = CommentRepo::new(&pool, runtime.config.page.clone())
        .page(&request)
        .await
        .map_err(explain)?;

    print_page(&page, args.page.format, |row| {
        format!(
            "{}  replies={} reactions={}  {}",
            row.id,
            row.replies,
            row.reactions,
            truncate(&row.body, 60)
        )
    })
}

pub async fn run_users(args: UsersArgs, runtime: &Runtime) -> Result<()> {
    let filter: UserFilter = UserQueryParams {
        id: args.id,
        follower_id: args.follower_id,
        follows_id: args.follows_id,
        search_username: args.search_username,
        search_any: args.search_any,
        fields: args.fields,
    }
    .try_into()
    .context("Invalid user query")?;
    let request = PageRequest::<Users>::from_params(filter, &args.page.params())
        .context("Invalid paging options")?;

    let pool = runtime.pool().await?;
    let page = UserRepo::new(&pool, runtime.config.page.clone())
        .page(&request)
        .await
        .map_err(explain)?;

    print_page(&page, args.page.format, |row| {
        let followers = row
            .follower_count
            .map(|n| format!("  followers={n}"))
            .unwrap_or_default();
        format!("{}  @{}{}", row.id, row.username, followers)
    })
}

/// Attach a hint for the failure classes a user can act on.
fn explain(err: PageError) -> anyhow::Error {
    let hint = match &err {
        PageError::StaleCursor { .. } => Some("Start again without --next"),
        e if e.is_retryable() => Some("Temporary failure; try again"),
        _ => None,
    };
    let err = anyhow::Error::new(err);
    match hint {
        Some(hint) => err.context(hint),
        None => err,
    }
}

fn print_page<T, F>(page: &Page<T>, format: OutputFormat, line: F) -> Result<()>
where
    T: Serialize + Identified,
    F: Fn(&T) -> String,
{
    debug!(rows = page.len(), has_next = page.has_next(), "page fetched");

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(page)?),
        OutputFormat::Text => {
            if page.is_empty() {
                println!("(no rows)");
            }
            for row in &page.items {
                println!("{}", line(row));
            }
            if let Some(token) = page.next_token() {
                println!("\nnext: {token}");
            }
        }
    }
    Ok(())
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max).collect();
        format!("{cut}…")
    }
}
