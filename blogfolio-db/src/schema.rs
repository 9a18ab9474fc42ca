//! Schema bootstrap for the tables the pager reads
//!
//! Idempotent; every statement is `IF NOT EXISTS`. Tables land in the first
//! schema on the connection's `search_path`.

use sqlx::PgPool;

const TABLES: &[(&str, &str)] = &[
    (
        "users",
        r#"
        CREATE TABLE IF NOT EXISTS users (
            user_id BIGSERIAL PRIMARY KEY,
            user_uid TEXT NOT NULL UNIQUE,
            username TEXT NOT NULL UNIQUE,
            email TEXT NOT NULL UNIQUE,
            password TEXT NOT NULL,
            bio TEXT,
            first_name TEXT,
            last_name TEXT,
            photo_small TEXT,
            photo_full TEXT,
            active BOOLEAN NOT NULL DEFAULT FALSE
        )
        "#,
    ),
    (
        "user_follows",
        r#"
        CREATE TABLE IF NOT EXISTS user_follows (
            user_id BIGINT NOT NULL REFERENCES users(user_id) ON DELETE CASCADE,
            follower_id BIGINT NOT NULL REFERENCES users(user_id) ON DELETE CASCADE,
            PRIMARY KEY (user_id, follower_id),
            CHECK (user_id <> follower_id)
        )
        "#,
    ),
    (
        "nodes",
        r#"
        CREATE TABLE IF NOT EXISTS nodes (
            node_id BIGSERIAL PRIMARY KEY,
            parent_node_id BIGINT REFERENCES nodes(node_id) ON DELETE CASCADE
        )
        "#,
    ),
    (
        "posts",
        r#"
        CREATE TABLE IF NOT EXISTS posts (
            post_id BIGSERIAL PRIMARY KEY,
            post_uid TEXT NOT NULL UNIQUE,
            user_id BIGINT NOT NULL REFERENCES users(user_id) ON DELETE CASCADE,
            node_id BIGINT NOT NULL UNIQUE REFERENCES nodes(node_id),
            slug TEXT NOT NULL,
            title TEXT NOT NULL,
            summary TEXT,
            body TEXT NOT NULL,
            visible BOOLEAN NOT NULL DEFAULT TRUE,
            num_views INTEGER NOT NULL DEFAULT 0,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            edited_at TIMESTAMPTZ,
            text_search TSVECTOR GENERATED ALWAYS AS (
                to_tsvector('english', title || ' ' || coalesce(summary, '') || ' ' || body)
            ) STORED,
            UNIQUE (user_id, slug)
        )
        "#,
    ),
    (
        "comments",
        r#"
        CREATE TABLE IF NOT EXISTS comments (
            comment_id BIGSERIAL PRIMARY KEY,
            comment_uid TEXT NOT NULL UNIQUE,
            user_id BIGINT NOT NULL REFERENCES users(user_id) ON DELETE CASCADE,
            node_id BIGINT NOT NULL UNIQUE REFERENCES nodes(node_id) ON DELETE CASCADE,
            body TEXT NOT NULL,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            edited_at TIMESTAMPTZ
        )
        "#,
    ),
    (
        "emotes",
        r#"
        CREATE TABLE IF NOT EXISTS emotes (
            emote_id SERIAL PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            body TEXT NOT NULL
        )
        "#,
    ),
    (
        "post_emotes",
        r#"
        CREATE TABLE IF NOT EXISTS post_emotes (
            post_id BIGINT NOT NULL REFERENCES posts(post_id) ON DELETE CASCADE,
            user_id BIGINT NOT NULL REFERENCES users(user_id) ON DELETE CASCADE,
            emote_id INTEGER NOT NULL REFERENCES emotes(emote_id),
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            PRIMARY KEY (post_id, user_id, emote_id)
        )
        "#,
    ),
    (
        "comment_emotes",
        r#"
        CREATE TABLE IF NOT EXISTS comment_emotes (
            comment_id BIGINT NOT NULL REFERENCES comments(comment_id) ON DELETE CASCADE,
            user_id BIGINT NOT NULL REFERENCES users(user_id) ON DELETE CASCADE,
            emote_id INTEGER NOT NULL REFERENCES emotes(emote_id),
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            PRIMARY KEY (comment_id, user_id, emote_id)
        )
        "#,
    ),
];

const INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_posts_recency ON posts ((COALESCE(edited_at, created_at)) DESC, post_uid)",
    "CREATE INDEX IF NOT EXISTS idx_posts_views ON posts (num_views DESC)",
    "CREATE INDEX IF NOT EXISTS idx_posts_text_search ON posts USING GIN (text_search)",
    "CREATE INDEX IF NOT EXISTS idx_posts_title_trgm ON posts USING GIN (title gin_trgm_ops)",
    "CREATE INDEX IF NOT EXISTS idx_comments_recency ON comments ((COALESCE(edited_at, created_at)) DESC, comment_uid)",
    "CREATE INDEX IF NOT EXISTS idx_comments_body_trgm ON comments USING GIN (body gin_trgm_ops)",
    "CREATE INDEX IF NOT EXISTS idx_nodes_parent ON nodes (parent_node_id)",
    "CREATE INDEX IF NOT EXISTS idx_users_username_trgm ON users USING GIN (username gin_trgm_ops)",
    "CREATE INDEX IF NOT EXISTS idx_user_follows_follower ON user_follows (follower_id)",
];

/// Create the extension, tables and indexes the pager depends on.
pub async fn bootstrap(pool: &PgPool) -> Result<(), sqlx::Error> {
    tracing::info!("Bootstrapping blogfolio schema...");

    sqlx::query("CREATE EXTENSION IF NOT EXISTS pg_trgm")
        .execute(pool)
        .await?;

    for (name, ddl) in TABLES {
        tracing::debug!(table = *name, "creating table");
        sqlx::query(ddl).execute(pool).await?;
    }

    for ddl in INDEXES {
        sqlx::query(ddl).execute(pool).await?;
    }

    tracing::info!("Schema bootstrap complete");
    Ok(())
}

/// Tables in creation order.
pub fn table_names() -> impl Iterator<Item = &'static str> {
    TABLES.iter().map(|(name, _)| *name)
}
