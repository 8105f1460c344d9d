use axum::{
    Router,
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::get,
};
use axum_extra::extract::SignedCookieJar;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use gtmpl::Value;
use serde::Deserialize;

use crate::{
    App, content, flash,
    error::AppError,
    models::{category::Category, post::Post, tag::Tag},
    templates::{self, categories_value, category_value, page, post_value, posts_value, tags_value},
};

pub fn route() -> Router<App> {
    Router::<App>::new()
        .route("/", get(index))
        .route("/post/{slug}", get(post_detail))
        .route("/category/{slug}", get(category_posts))
        .route("/tag/{slug}", get(tag_posts))
        .route("/search", get(search))
}

async fn index(
    State(ctx): State<App>,
    jar: SignedCookieJar,
) -> Result<impl IntoResponse, AppError> {
    use crate::schema::{categories, posts};

    let mut conn = ctx.db.get().await?;

    let published: Vec<Post> = posts::table
        .filter(posts::published.eq(true))
        .order(posts::created_at.desc())
        .select(Post::as_select())
        .load(&mut conn)
        .await?;

    let all_categories: Vec<Category> = categories::table
        .order(categories::name.asc())
        .select(Category::as_select())
        .load(&mut conn)
        .await?;

    let popular: Vec<Post> = posts::table
        .filter(posts::published.eq(true))
        .order(posts::view_count.desc())
        .limit(5)
        .select(Post::as_select())
        .load(&mut conn)
        .await?;

    let (jar, flash) = flash::take(jar);
    let value = page(
        "Blog",
        flash,
        vec![
            ("posts", posts_value(&published)),
            ("categories", categories_value(&all_categories)),
            ("popular", posts_value(&popular)),
        ],
    );

    Ok((jar, templates::render(&ctx.templates.index, value)?))
}

async fn post_detail(
    State(ctx): State<App>,
    Path(slug): Path<String>,
    jar: SignedCookieJar,
) -> Result<impl IntoResponse, AppError> {
    use crate::schema::{categories, post_tags, posts, tags};

    let mut conn = ctx.db.get().await?;

    // The increment and the fetch are a single statement, committed
    // before anything is rendered. A miss here is also how unpublished
    // posts turn into a 404.
    let post: Post = diesel::update(posts::table)
        .filter(posts::slug.eq(&slug))
        .filter(posts::published.eq(true))
        .set(posts::view_count.eq(posts::view_count + 1))
        .returning(Post::as_returning())
        .get_result(&mut conn)
        .await
        .optional()?
        .ok_or(AppError::NotFound)?;

    let post_tags_list: Vec<Tag> = post_tags::table
        .inner_join(tags::table)
        .filter(post_tags::post_id.eq(post.id))
        .order(tags::name.asc())
        .select(Tag::as_select())
        .load(&mut conn)
        .await?;

    let category: Option<Category> = match post.category_id {
        Some(id) => categories::table
            .find(id)
            .select(Category::as_select())
            .first(&mut conn)
            .await
            .optional()?,
        None => None,
    };

    let body_html = content::render_markdown(&post.content_md);

    let (jar, flash) = flash::take(jar);
    let value = page(
        &post.title,
        flash,
        vec![
            ("post", post_value(&post)),
            ("body_html", Value::String(body_html)),
            ("tags", tags_value(&post_tags_list)),
            (
                "category",
                category.as_ref().map(category_value).unwrap_or(Value::Nil),
            ),
        ],
    );

    Ok((jar, templates::render(&ctx.templates.post, value)?))
}

async fn category_posts(
    State(ctx): State<App>,
    Path(slug): Path<String>,
    jar: SignedCookieJar,
) -> Result<impl IntoResponse, AppError> {
    use crate::schema::{categories, posts};

    let mut conn = ctx.db.get().await?;

    let category: Category = categories::table
        .filter(categories::slug.eq(&slug))
        .select(Category::as_select())
        .first(&mut conn)
        .await
        .optional()?
        .ok_or(AppError::NotFound)?;

    let published: Vec<Post> = posts::table
        .filter(posts::category_id.eq(category.id))
        .filter(posts::published.eq(true))
        .order(posts::created_at.desc())
        .select(Post::as_select())
        .load(&mut conn)
        .await?;

    let (jar, flash) = flash::take(jar);
    let value = page(
        &category.name,
        flash,
        vec![
            ("category", category_value(&category)),
            ("posts", posts_value(&published)),
        ],
    );

    Ok((jar, templates::render(&ctx.templates.category, value)?))
}

async fn tag_posts(
    State(ctx): State<App>,
    Path(slug): Path<String>,
    jar: SignedCookieJar,
) -> Result<impl IntoResponse, AppError> {
    use crate::schema::{post_tags, posts, tags};

    let mut conn = ctx.db.get().await?;

    let tag: Tag = tags::table
        .filter(tags::slug.eq(&slug))
        .select(Tag::as_select())
        .first(&mut conn)
        .await
        .optional()?
        .ok_or(AppError::NotFound)?;

    let published: Vec<Post> = posts::table
        .inner_join(post_tags::table)
        .filter(post_tags::tag_id.eq(tag.id))
        .filter(posts::published.eq(true))
        .order(posts::created_at.desc())
        .select(Post::as_select())
        .load(&mut conn)
        .await?;

    let (jar, flash) = flash::take(jar);
    let value = page(
        &tag.name,
        flash,
        vec![
            ("tag", templates::tag_value(&tag)),
            ("posts", posts_value(&published)),
        ],
    );

    Ok((jar, templates::render(&ctx.templates.tag, value)?))
}

#[derive(Deserialize)]
struct SearchQuery {
    #[serde(default)]
    q: String,
}

async fn search(
    State(ctx): State<App>,
    Query(query): Query<SearchQuery>,
    jar: SignedCookieJar,
) -> Result<impl IntoResponse, AppError> {
    use crate::schema::posts;

    let needle = query.q.trim().to_owned();

    // A blank query is an empty result set, not the whole blog.
    let results: Vec<Post> = if needle.is_empty() {
        vec![]
    } else {
        let pattern = format!("%{needle}%");
        let mut conn = ctx.db.get().await?;
        posts::table
            .filter(posts::published.eq(true))
            .filter(
                posts::title
                    .like(pattern.clone())
                    .or(posts::content_md.like(pattern.clone()))
                    .or(posts::excerpt.like(pattern)),
            )
            .order(posts::created_at.desc())
            .select(Post::as_select())
            .load(&mut conn)
            .await?
    };

    let (jar, flash) = flash::take(jar);
    let value = page(
        "Search",
        flash,
        vec![
            ("query", Value::String(templates::h(&needle))),
            ("posts", posts_value(&results)),
        ],
    );

    Ok((jar, templates::render(&ctx.templates.search, value)?))
}
