use diesel::prelude::*;
use diesel_async::pooled_connection::AsyncDieselConnectionManager;
use diesel_async::pooled_connection::deadpool::Pool;
use diesel_async::{AsyncConnection, AsyncPgConnection, RunQueryDsl};
use diesel_async::scoped_futures::ScopedFutureExt;

use crate::error::AppError;
use crate::models::category::NewCategory;
use crate::models::post::{NewPost, PostTag};
use crate::models::tag::NewTag;

pub type Db = Pool<AsyncPgConnection>;

pub fn connect(database_url: &str) -> Db {
    let manager = AsyncDieselConnectionManager::<AsyncPgConnection>::new(database_url);
    Pool::builder(manager)
        .max_size(10)
        .build()
        .expect("couldn't build the database pool")
}

/// Idempotently creates the tables the server needs. Slug and name
/// uniqueness is enforced here as well, as a storage-level backstop for
/// the application-level probe in [`crate::slugs`].
pub async fn ensure_schema(db: &Db) -> Result<(), AppError> {
    const STATEMENTS: &[&str] = &[
        "CREATE TABLE IF NOT EXISTS categories (
            id SERIAL PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            slug TEXT NOT NULL UNIQUE,
            description TEXT NOT NULL DEFAULT '',
            created_at TIMESTAMP NOT NULL DEFAULT now()
        );",
        "CREATE TABLE IF NOT EXISTS tags (
            id SERIAL PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            slug TEXT NOT NULL UNIQUE,
            created_at TIMESTAMP NOT NULL DEFAULT now()
        );",
        "CREATE TABLE IF NOT EXISTS posts (
            id SERIAL PRIMARY KEY,
            title TEXT NOT NULL,
            slug TEXT NOT NULL UNIQUE,
            content_md TEXT NOT NULL DEFAULT '',
            excerpt TEXT NOT NULL DEFAULT '',
            published BOOLEAN NOT NULL DEFAULT false,
            view_count INTEGER NOT NULL DEFAULT 0,
            category_id INTEGER REFERENCES categories (id),
            created_at TIMESTAMP NOT NULL DEFAULT now(),
            updated_at TIMESTAMP NOT NULL DEFAULT now()
        );",
        "CREATE TABLE IF NOT EXISTS post_tags (
            post_id INTEGER NOT NULL REFERENCES posts (id) ON DELETE CASCADE,
            tag_id INTEGER NOT NULL REFERENCES tags (id) ON DELETE CASCADE,
            PRIMARY KEY (post_id, tag_id)
        );",
        "CREATE TABLE IF NOT EXISTS admin_sessions (
            id SERIAL PRIMARY KEY,
            token TEXT NOT NULL UNIQUE,
            active BOOLEAN NOT NULL DEFAULT true,
            issued_at TIMESTAMP NOT NULL DEFAULT now(),
            expires_at TIMESTAMP NOT NULL,
            created_at TIMESTAMP NOT NULL DEFAULT now()
        );",
        "CREATE INDEX IF NOT EXISTS posts_slug_idx ON posts (slug);",
        "CREATE INDEX IF NOT EXISTS categories_slug_idx ON categories (slug);",
        "CREATE INDEX IF NOT EXISTS tags_slug_idx ON tags (slug);",
    ];

    let mut conn = db.get().await?;
    for statement in STATEMENTS {
        diesel::sql_query(*statement).execute(&mut conn).await?;
    }

    Ok(())
}

/// Populates a fresh store with a demonstration category/tag/post set.
/// Runs only when the posts table is empty, so restarting the server
/// never duplicates the sample content.
pub async fn seed_if_empty(db: &Db) -> Result<(), AppError> {
    use crate::schema::{categories, post_tags, posts, tags};

    let mut conn = db.get().await?;

    let post_count: i64 = posts::table.count().get_result(&mut conn).await?;
    if post_count > 0 {
        return Ok(());
    }

    tracing::info!("empty posts table, seeding demonstration content");

    conn.transaction::<_, AppError, _>(|conn| {
        async move {
            diesel::insert_into(categories::table)
                .values(&NewCategory::new(
                    "Technology".to_owned(),
                    "technology".to_owned(),
                    "Tech related posts".to_owned(),
                ))
                .execute(conn)
                .await?;

            let general_id: i32 = diesel::insert_into(categories::table)
                .values(&NewCategory::new(
                    "General".to_owned(),
                    "general".to_owned(),
                    "General posts".to_owned(),
                ))
                .returning(categories::id)
                .get_result(conn)
                .await?;

            let blog_tag_id: i32 = diesel::insert_into(tags::table)
                .values(&NewTag::new("Blog".to_owned(), "blog".to_owned()))
                .returning(tags::id)
                .get_result(conn)
                .await?;

            let welcome_tag_id: i32 = diesel::insert_into(tags::table)
                .values(&NewTag::new("Welcome".to_owned(), "welcome".to_owned()))
                .returning(tags::id)
                .get_result(conn)
                .await?;

            let sample = NewPost::new(
                "Welcome to your blog".to_owned(),
                "welcome".to_owned(),
                "# Hello!\n\n\
                 This is your new blog. Edit or delete this post in the Admin area.\n\n\
                 - Write posts in Markdown.\n\
                 - Use categories and tags to organize your content.\n"
                    .to_owned(),
                "Welcome to your new blog! Learn how to use the features.".to_owned(),
                true,
                Some(general_id),
            );

            let post_id: i32 = diesel::insert_into(posts::table)
                .values(&sample)
                .returning(posts::id)
                .get_result(conn)
                .await?;

            diesel::insert_into(post_tags::table)
                .values(&[
                    PostTag {
                        post_id,
                        tag_id: blog_tag_id,
                    },
                    PostTag {
                        post_id,
                        tag_id: welcome_tag_id,
                    },
                ])
                .execute(conn)
                .await?;

            Ok(())
        }
        .scope_boxed()
    })
    .await
}
