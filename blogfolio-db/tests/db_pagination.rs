//! Database-backed pagination tests.
//!
//! Run with: DATABASE_URL=postgres://... cargo test -p blogfolio-db -- --ignored
//!
//! Each test bootstraps the schema into its own throwaway schema and drops it
//! afterwards.

use blogfolio_db::config::PageConfig;
use blogfolio_db::db::create_pool;
use blogfolio_db::error::{PageError, QueryError};
use blogfolio_db::models::{PublicId, SearchTerm};
use blogfolio_db::query::{Cursor, PageRequest, SortStrategy};
use blogfolio_db::resources::comments::{CommentFilter, CommentRepo, CommentScope, Comments};
use blogfolio_db::resources::posts::{PostFilter, PostRepo, PostRow, Posts};
use blogfolio_db::resources::users::{
    UserField, UserFilter, UserQueryMode, UserRepo, UserSortField, Users,
};
use blogfolio_db::schema;
use chrono::{DateTime, Duration, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::{Executor, PgPool};
use std::sync::{Arc, Mutex};

struct TestDb {
    pool: PgPool,
    admin: PgPool,
    schema: String,
}

impl TestDb {
    async fn new(name: &str) -> Self {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL required");
        let admin = create_pool(&url).await.expect("pool creation failed");
        let schema = format!("blogfolio_test_{name}_{}", std::process::id());

        sqlx::query("CREATE EXTENSION IF NOT EXISTS pg_trgm")
            .execute(&admin)
            .await
            .unwrap();
        admin
            .execute(format!("DROP SCHEMA IF EXISTS {schema} CASCADE").as_str())
            .await
            .unwrap();
        admin
            .execute(format!("CREATE SCHEMA {schema}").as_str())
            .await
            .unwrap();

        let search_path = format!("SET search_path TO {schema}, public");
        let pool = PgPoolOptions::new()
            .max_connections(2)
            .after_connect(move |conn, _meta| {
                let search_path = search_path.clone();
                Box::pin(async move {
                    conn.execute(search_path.as_str()).await?;
                    Ok(())
                })
            })
            .connect(&url)
            .await
            .expect("pool creation failed");

        schema::bootstrap(&pool).await.expect("bootstrap failed");
        Self {
            pool,
            admin,
            schema,
        }
    }

    async fn teardown(self) {
        self.pool.close().await;
        self.admin
            .execute(format!("DROP SCHEMA IF EXISTS {} CASCADE", self.schema).as_str())
            .await
            .unwrap();
    }

    async fn user(&self, uid: &str, username: &str, last_name: Option<&str>) {
        sqlx::query(
            "INSERT INTO users (user_uid, username, email, password, last_name) \
             VALUES ($1, $2, $3, 'x', $4)",
        )
        .bind(uid)
        .bind(username)
        .bind(format!("{username}@example.com"))
        .bind(last_name)
        .execute(&self.pool)
        .await
        .unwrap();
    }

    async fn follow(&self, uid: &str, follower_uid: &str) {
        sqlx::query(
            "INSERT INTO user_follows (user_id, follower_id) VALUES (\
             (SELECT user_id FROM users WHERE user_uid = $1), \
             (SELECT user_id FROM users WHERE user_uid = $2))",
        )
        .bind(uid)
        .bind(follower_uid)
        .execute(&self.pool)
        .await
        .unwrap();
    }

    async fn post(&self, uid: &str, author: &str, title: &str, views: i32, created_at: DateTime<Utc>) {
        self.post_with(uid, author, title, views, created_at, true).await;
    }

    async fn post_with(
        &self,
        uid: &str,
        author: &str,
        title: &str,
        views: i32,
        created_at: DateTime<Utc>,
        visible: bool,
    ) {
        sqlx::query(
            "WITH n AS (INSERT INTO nodes DEFAULT VALUES RETURNING node_id) \
             INSERT INTO posts (post_uid, user_id, node_id, slug, title, body, visible, num_views, created_at) \
             SELECT $1, (SELECT user_id FROM users WHERE user_uid = $2), n.node_id, $1, $3, $3, $4, $5, $6 FROM n",
        )
        .bind(uid)
        .bind(author)
        .bind(title)
        .bind(visible)
        .bind(views)
        .bind(created_at)
        .execute(&self.pool)
        .await
        .unwrap();
    }

    /// Comment under a post or another comment, named by public id.
    async fn comment(&self, uid: &str, author: &str, parent: &str, body: &str, created_at: DateTime<Utc>) {
        sqlx::query(
            "WITH n AS (INSERT INTO nodes (parent_node_id) VALUES (COALESCE(\
                (SELECT node_id FROM posts WHERE post_uid = $3), \
                (SELECT node_id FROM comments WHERE comment_uid = $3))) RETURNING node_id) \
             INSERT INTO comments (comment_uid, user_id, node_id, body, created_at) \
             SELECT $1, (SELECT user_id FROM users WHERE user_uid = $2), n.node_id, $4, $5 FROM n",
        )
        .bind(uid)
        .bind(author)
        .bind(parent)
        .bind(body)
        .bind(created_at)
        .execute(&self.pool)
        .await
        .unwrap();
    }
}

fn at(minutes: i64) -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap() + Duration::minutes(minutes)
}

/// Log sink for checking what the pager reports.
#[derive(Clone, Default)]
struct Logs(Arc<Mutex<Vec<u8>>>);

impl Logs {
    /// Route this thread's events here until the guard drops.
    fn capture(&self) -> tracing::subscriber::DefaultGuard {
        let writer = self.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();
        tracing::subscriber::set_default(subscriber)
    }

    fn text(&self) -> String {
        String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
    }
}

impl std::io::Write for Logs {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

fn ids(rows: &[PostRow]) -> Vec<&str> {
    rows.iter().map(|r| r.id.as_str()).collect()
}

#[tokio::test]
#[ignore = "requires database"]
async fn popularity_ties_break_by_recency_then_resume() {
    let db = TestDb::new("popularity").await;
    db.user("u1", "ada", None).await;
    for (i, views) in [10, 10, 10, 7, 7, 3, 1].into_iter().enumerate() {
        db.post(&format!("p{i}"), "u1", &format!("Post {i}"), views, at(i as i64))
            .await;
    }

    let repo = PostRepo::new(&db.pool, PageConfig::default());
    let request = PageRequest::<Posts>::new(PostFilter::default(), SortStrategy::Popularity)
        .with_limit(3);
    let first = repo.page(&request).await.unwrap();
    assert_eq!(ids(&first.items), vec!["p2", "p1", "p0"]);

    let next = first.next_cursor.clone().expect("full page has a cursor");
    assert_eq!(next.id().as_str(), "p0");

    let second = repo.page(&request.with_cursor(Some(next))).await.unwrap();
    assert_eq!(ids(&second.items), vec!["p4", "p3", "p5"]);
    assert_eq!(
        second.items.iter().map(|r| r.views).collect::<Vec<_>>(),
        vec![7, 7, 3]
    );

    db.teardown().await;
}

#[tokio::test]
#[ignore = "requires database"]
async fn pages_concatenate_to_unbounded_result() {
    let db = TestDb::new("continuity").await;
    db.user("u1", "ada", None).await;
    for i in 0..11 {
        // Colliding views and timestamps
        db.post(&format!("p{i:02}"), "u1", "Same", i % 3, at(i64::from(i % 2)))
            .await;
    }

    let repo = PostRepo::new(&db.pool, PageConfig::default());
    let sort = SortStrategy::parse("composite:views.asc,createdAt.desc").unwrap();
    let all = repo
        .page(&PageRequest::<Posts>::new(PostFilter::default(), sort.clone()).with_limit(100))
        .await
        .unwrap();
    assert!(all.next_cursor.is_none());

    let mut walked = Vec::new();
    let mut cursor: Option<Cursor> = None;
    loop {
        let request = PageRequest::<Posts>::new(PostFilter::default(), sort.clone())
            .with_limit(4)
            .with_cursor(cursor.take());
        let page = repo.page(&request).await.unwrap();
        walked.extend(page.items.iter().map(|r| r.id.clone()));
        match page.next_cursor {
            Some(next) => cursor = Some(next),
            None => break,
        }
    }

    assert_eq!(walked, all.items.iter().map(|r| r.id.clone()).collect::<Vec<_>>());
    db.teardown().await;
}

#[tokio::test]
#[ignore = "requires database"]
async fn deleted_cursor_row_is_stale() {
    let db = TestDb::new("stale").await;
    db.user("u1", "ada", None).await;
    for i in 0..4 {
        db.post(&format!("p{i}"), "u1", "Post", 1, at(i)).await;
    }

    let repo = PostRepo::new(&db.pool, PageConfig::default());
    let request = PageRequest::<Posts>::first(PostFilter::default()).with_limit(2);
    let first = repo.page(&request).await.unwrap();
    let next = first.next_cursor.unwrap();

    sqlx::query("DELETE FROM posts WHERE post_uid = $1")
        .bind(next.id().as_str())
        .execute(&db.pool)
        .await
        .unwrap();

    let err = repo
        .page(&request.with_cursor(Some(next)))
        .await
        .unwrap_err();
    assert!(matches!(err, PageError::StaleCursor { resource: "post", .. }));
    assert!(!err.is_retryable());

    db.teardown().await;
}

#[tokio::test]
#[ignore = "requires database"]
async fn deleted_user_cursor_row_is_stale() {
    let db = TestDb::new("stale_users").await;
    for (uid, name) in [("u1", "ada"), ("u2", "bob"), ("u3", "cy"), ("u4", "dee")] {
        db.user(uid, name, None).await;
    }

    let repo = UserRepo::new(&db.pool, PageConfig::default());
    let request = PageRequest::<Users>::first(UserFilter::default()).with_limit(2);
    let first = repo.page(&request).await.unwrap();
    let next = first.next_cursor.unwrap();
    assert_eq!(next.id().as_str(), "u2");

    sqlx::query("DELETE FROM users WHERE user_uid = $1")
        .bind(next.id().as_str())
        .execute(&db.pool)
        .await
        .unwrap();

    let err = repo
        .page(&request.with_cursor(Some(next)))
        .await
        .unwrap_err();
    assert!(matches!(err, PageError::StaleCursor { resource: "user", .. }));

    db.teardown().await;
}

#[tokio::test]
#[ignore = "requires database"]
async fn cursor_lookup_failure_is_logged() {
    let db = TestDb::new("lookup_fail").await;
    db.user("u1", "ada", None).await;
    for i in 0..3 {
        db.post(&format!("p{i}"), "u1", "Post", 0, at(i)).await;
    }

    let repo = PostRepo::new(&db.pool, PageConfig::default());
    let sort = SortStrategy::parse("composite:reactions.desc").unwrap();
    let request = PageRequest::<Posts>::new(PostFilter::default(), sort).with_limit(2);
    let first = repo.page(&request).await.unwrap();
    let next = first.next_cursor.unwrap();

    // The reaction count subquery in the lookup can no longer resolve
    sqlx::query("DROP TABLE post_emotes")
        .execute(&db.pool)
        .await
        .unwrap();

    let logs = Logs::default();
    let err = {
        let _guard = logs.capture();
        repo.page(&request.with_cursor(Some(next)))
            .await
            .unwrap_err()
    };

    assert!(matches!(err, PageError::Database(_)));
    assert!(!err.is_retryable());
    let text = logs.text();
    assert!(text.contains("ERROR"), "no error logged: {text}");
    assert!(text.contains("statement=\"cursor lookup\""), "{text}");

    db.teardown().await;
}

#[tokio::test]
#[ignore = "requires database"]
async fn post_titles_sort_case_insensitively() {
    let db = TestDb::new("titles").await;
    db.user("u1", "ada", None).await;
    db.post("p0", "u1", "Zebra", 0, at(0)).await;
    db.post("p1", "u1", "apple", 0, at(1)).await;
    db.post("p2", "u1", "Mango", 0, at(2)).await;

    let repo = PostRepo::new(&db.pool, PageConfig::default());
    let sort = SortStrategy::parse("composite:title.asc").unwrap();
    let first = repo
        .page(&PageRequest::<Posts>::new(PostFilter::default(), sort.clone()).with_limit(2))
        .await
        .unwrap();
    assert_eq!(ids(&first.items), vec!["p1", "p2"]);

    let second = repo
        .page(
            &PageRequest::<Posts>::new(PostFilter::default(), sort)
                .with_limit(2)
                .with_cursor(first.next_cursor.clone()),
        )
        .await
        .unwrap();
    assert_eq!(ids(&second.items), vec!["p0"]);

    db.teardown().await;
}

#[tokio::test]
#[ignore = "requires database"]
async fn changed_sort_rejects_cursor() {
    let db = TestDb::new("mismatch").await;
    db.user("u1", "ada", None).await;

    let repo = PostRepo::new(&db.pool, PageConfig::default());
    let cursor = Cursor::new(PublicId::new("p0").unwrap(), "recency");
    let request = PageRequest::<Posts>::new(PostFilter::default(), SortStrategy::Popularity)
        .with_cursor(Some(cursor));

    let err = repo.page(&request).await.unwrap_err();
    assert!(matches!(
        err,
        PageError::Query(QueryError::CursorMismatch { .. })
    ));

    db.teardown().await;
}

#[tokio::test]
#[ignore = "requires database"]
async fn absent_filter_never_narrows() {
    let db = TestDb::new("noop").await;
    db.user("u1", "ada", None).await;
    db.post_with("p0", "u1", "Shown", 1, at(0), true).await;
    db.post_with("p1", "u1", "Hidden", 1, at(1), false).await;

    let repo = PostRepo::new(&db.pool, PageConfig::default());
    let all = repo
        .page(&PageRequest::<Posts>::first(PostFilter::default()))
        .await
        .unwrap();
    let visible = repo
        .page(&PageRequest::<Posts>::first(PostFilter {
            visible: Some(true),
            ..PostFilter::default()
        }))
        .await
        .unwrap();

    assert_eq!(all.len(), 2);
    assert_eq!(ids(&visible.items), vec!["p0"]);
    db.teardown().await;
}

#[tokio::test]
#[ignore = "requires database"]
async fn relevance_ranks_title_matches() {
    let db = TestDb::new("relevance").await;
    db.user("u1", "ada", None).await;
    db.post("p0", "u1", "Gardening for beginners", 0, at(0)).await;
    db.post("p1", "u1", "Async Rust in practice", 0, at(1)).await;
    db.post("p2", "u1", "Rust", 0, at(2)).await;

    let repo = PostRepo::new(&db.pool, PageConfig::default());
    let filter = PostFilter {
        search: Some(SearchTerm::new("rust").unwrap()),
        ..PostFilter::default()
    };
    let page = repo
        .page(&PageRequest::<Posts>::new(filter, SortStrategy::Relevance))
        .await
        .unwrap();

    assert_eq!(ids(&page.items), vec!["p2", "p1"]);
    db.teardown().await;
}

#[tokio::test]
#[ignore = "requires database"]
async fn user_last_names_sort_nulls_last() {
    let db = TestDb::new("users").await;
    db.user("u1", "one", Some("Smith")).await;
    db.user("u2", "two", None).await;
    db.user("u3", "three", Some("adams")).await;
    db.user("u4", "four", None).await;
    db.user("u5", "five", Some("Baker")).await;

    let repo = UserRepo::new(&db.pool, PageConfig::default());
    let sort = SortStrategy::<UserSortField>::parse("composite:lastName.asc").unwrap();

    let mut walked = Vec::new();
    let mut cursor = None;
    loop {
        let request = PageRequest::<Users>::new(UserFilter::default(), sort.clone())
            .with_limit(2)
            .with_cursor(cursor.take());
        let page = repo.page(&request).await.unwrap();
        walked.extend(page.items.iter().map(|u| u.id.clone()));
        match page.next_cursor {
            Some(next) => cursor = Some(next),
            None => break,
        }
    }
    assert_eq!(walked, vec!["u3", "u5", "u1", "u2", "u4"]);

    let desc = SortStrategy::<UserSortField>::parse("composite:lastName.desc").unwrap();
    let page = repo
        .page(&PageRequest::<Users>::new(UserFilter::default(), desc))
        .await
        .unwrap();
    let order: Vec<_> = page.items.iter().map(|u| u.id.as_str()).collect();
    assert_eq!(order, vec!["u1", "u5", "u3", "u2", "u4"]);

    db.teardown().await;
}

#[tokio::test]
#[ignore = "requires database"]
async fn followers_and_field_selection() {
    let db = TestDb::new("follows").await;
    db.user("u1", "ada", Some("Lovelace")).await;
    db.user("u2", "bob", None).await;
    db.user("u3", "cy", None).await;
    db.follow("u1", "u2").await;
    db.follow("u1", "u3").await;
    db.follow("u2", "u3").await;

    let repo = UserRepo::new(&db.pool, PageConfig::default());

    let followers = UserFilter::new(UserQueryMode::FollowersOf(PublicId::new("u1").unwrap()));
    let page = repo
        .page(&PageRequest::<Users>::first(followers))
        .await
        .unwrap();
    let order: Vec<_> = page.items.iter().map(|u| u.id.as_str()).collect();
    assert_eq!(order, vec!["u2", "u3"]);

    let followed = UserFilter::new(UserQueryMode::FollowedBy(PublicId::new("u3").unwrap()))
        .with_fields(vec![UserField::FollowerCount]);
    let page = repo
        .page(&PageRequest::<Users>::new(followed, SortStrategy::Popularity))
        .await
        .unwrap();
    assert_eq!(page.items[0].id, "u1");
    assert_eq!(page.items[0].follower_count, Some(2));
    assert_eq!(page.items[0].last_name, None);

    let user = repo.get(PublicId::new("u1").unwrap()).await.unwrap().unwrap();
    assert_eq!(user.last_name.as_deref(), Some("Lovelace"));

    db.teardown().await;
}

#[tokio::test]
#[ignore = "requires database"]
async fn comment_scopes() {
    let db = TestDb::new("comments").await;
    db.user("u1", "ada", None).await;
    db.post("p0", "u1", "Post", 0, at(0)).await;
    db.comment("c0", "u1", "p0", "first", at(1)).await;
    db.comment("c1", "u1", "p0", "second", at(2)).await;
    db.comment("c2", "u1", "c0", "reply", at(3)).await;

    let repo = CommentRepo::new(&db.pool, PageConfig::default());

    let on_post = CommentFilter {
        scope: CommentScope::OnPost(PublicId::new("p0").unwrap()),
        ..CommentFilter::default()
    };
    let page = repo
        .page(&PageRequest::<Comments>::first(on_post))
        .await
        .unwrap();
    let order: Vec<_> = page.items.iter().map(|c| c.id.as_str()).collect();
    assert_eq!(order, vec!["c1", "c0"]);

    let by_replies = SortStrategy::parse("composite:replies.desc").unwrap();
    let page = repo
        .page(&PageRequest::<Comments>::new(CommentFilter::default(), by_replies))
        .await
        .unwrap();
    assert_eq!(page.items[0].id, "c0");
    assert_eq!(page.items[0].replies, 1);

    let replies = CommentFilter {
        scope: CommentScope::RepliesTo(PublicId::new("c0").unwrap()),
        ..CommentFilter::default()
    };
    let page = repo
        .page(&PageRequest::<Comments>::first(replies))
        .await
        .unwrap();
    assert_eq!(page.items.len(), 1);
    assert_eq!(page.items[0].body, "reply");

    db.teardown().await;
}

#[tokio::test]
#[ignore = "requires database"]
async fn comment_pages_concatenate() {
    let db = TestDb::new("comment_walk").await;
    db.user("u1", "ada", None).await;
    db.post("p0", "u1", "Post", 0, at(0)).await;
    for i in 0..7 {
        // Pairs share a timestamp so the id tie-break decides
        db.comment(&format!("c{i}"), "u1", "p0", "body", at(1 + i / 2))
            .await;
    }

    let repo = CommentRepo::new(&db.pool, PageConfig::default());
    let scope = || CommentFilter {
        scope: CommentScope::OnPost(PublicId::new("p0").unwrap()),
        ..CommentFilter::default()
    };

    for sort in [SortStrategy::Recency, SortStrategy::Popularity] {
        let all = repo
            .page(&PageRequest::<Comments>::new(scope(), sort.clone()).with_limit(100))
            .await
            .unwrap();
        assert_eq!(all.len(), 7);

        let mut walked = Vec::new();
        let mut cursor = None;
        loop {
            let request = PageRequest::<Comments>::new(scope(), sort.clone())
                .with_limit(3)
                .with_cursor(cursor.take());
            let page = repo.page(&request).await.unwrap();
            walked.extend(page.items.iter().map(|c| c.id.clone()));
            match page.next_cursor {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        let expected: Vec<_> = all.items.iter().map(|c| c.id.clone()).collect();
        assert_eq!(walked, expected);
    }

    db.teardown().await;
}
