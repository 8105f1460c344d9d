use axum::{
    Extension, Form, Router,
    extract::{Path, State},
    middleware,
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
};
use axum_extra::extract::SignedCookieJar;
use axum_extra::extract::cookie::Cookie;
use diesel::prelude::*;
use diesel_async::scoped_futures::ScopedFutureExt;
use diesel_async::{AsyncConnection, RunQueryDsl};
use gtmpl::Value;
use serde::Deserialize;

use crate::{
    App, flash,
    config::Env,
    error::AppError,
    flash::Flash,
    models::{
        category::{Category, NewCategory},
        post::Post,
        session::{AdminSession, SESSION_TTL_DAYS},
        tag::Tag,
    },
    slugs,
    templates::{self, categories_value, category_options, h, page, posts_value, tags_value},
};

use super::{AdminContext, COOKIE_NAME, require_admin};
use super::posts::{PostForm, create_post, update_post};

pub fn route(ctx: App) -> Router<App> {
    let guarded = Router::<App>::new()
        .route("/admin", get(dashboard))
        .route("/admin/new", get(new_post_form).post(new_post_submit))
        .route("/admin/edit/{id}", get(edit_post_form).post(edit_post_submit))
        .route("/admin/categories", get(categories_page).post(create_category))
        .route("/admin/category/delete/{id}", post(delete_category))
        .route("/admin/delete/{id}", post(delete_post))
        .layer(middleware::from_fn_with_state(ctx, require_admin));

    Router::<App>::new()
        .route("/admin/login", get(login_form).post(login_submit))
        .route("/admin/logout", get(logout))
        .merge(guarded)
}

#[derive(Deserialize)]
struct LoginForm {
    #[serde(default)]
    password: String,
}

async fn login_form(
    State(ctx): State<App>,
    jar: SignedCookieJar,
) -> Result<impl IntoResponse, AppError> {
    let (jar, flash) = flash::take(jar);
    let value = page("Admin login", flash, vec![]);
    Ok((jar, templates::render(&ctx.templates.admin_login, value)?))
}

async fn login_submit(
    State(ctx): State<App>,
    jar: SignedCookieJar,
    Form(form): Form<LoginForm>,
) -> Result<Response, AppError> {
    use crate::schema::admin_sessions;

    if form.password != ctx.config.admin_password {
        // Same answer for a wrong password as for an empty one.
        let value = page(
            "Admin login",
            Some(Flash {
                level: "error".to_owned(),
                message: "Invalid password".to_owned(),
            }),
            vec![],
        );
        return Ok(templates::render(&ctx.templates.admin_login, value)?.into_response());
    }

    let session = AdminSession::mint();
    let token = session.token.clone();

    let mut conn = ctx.db.get().await?;
    diesel::insert_into(admin_sessions::table)
        .values(&session)
        .execute(&mut conn)
        .await?;

    let cookie = Cookie::build((COOKIE_NAME, token))
        .http_only(true)
        .secure(matches!(ctx.config.env, Env::Production))
        .path("/")
        .expires(time::OffsetDateTime::now_utc() + time::Duration::days(SESSION_TTL_DAYS));

    let jar = flash::set(jar.add(cookie), "success", "Logged in as admin");
    Ok((jar, Redirect::to("/admin")).into_response())
}

async fn logout(
    State(ctx): State<App>,
    jar: SignedCookieJar,
) -> Result<impl IntoResponse, AppError> {
    use crate::schema::admin_sessions;

    if let Some(cookie) = jar.get(COOKIE_NAME) {
        let token = cookie.value().to_owned();
        let mut conn = ctx.db.get().await?;
        diesel::update(admin_sessions::table.filter(admin_sessions::token.eq(token)))
            .set(admin_sessions::active.eq(false))
            .execute(&mut conn)
            .await?;
    }

    let jar = jar.remove(Cookie::build(COOKIE_NAME).path("/"));
    let jar = flash::set(jar, "info", "Logged out");
    Ok((jar, Redirect::to("/")))
}

async fn dashboard(
    State(ctx): State<App>,
    Extension(admin): Extension<AdminContext>,
    jar: SignedCookieJar,
) -> Result<impl IntoResponse, AppError> {
    use crate::schema::{categories, posts, tags};

    tracing::debug!(session_id = admin.session_id, "rendering the dashboard");

    let mut conn = ctx.db.get().await?;

    let all_posts: Vec<Post> = posts::table
        .order(posts::created_at.desc())
        .select(Post::as_select())
        .load(&mut conn)
        .await?;

    let all_categories: Vec<Category> = categories::table
        .order(categories::name.asc())
        .select(Category::as_select())
        .load(&mut conn)
        .await?;

    let all_tags: Vec<Tag> = tags::table
        .order(tags::name.asc())
        .select(Tag::as_select())
        .load(&mut conn)
        .await?;

    let (jar, flash) = flash::take(jar);
    let value = page(
        "Dashboard",
        flash,
        vec![
            ("posts", posts_value(&all_posts)),
            ("categories", categories_value(&all_categories)),
            ("tags", tags_value(&all_tags)),
        ],
    );

    Ok((jar, templates::render(&ctx.templates.admin_dashboard, value)?))
}

/// Context for the shared new/edit form template.
struct EditForm<'a> {
    heading: &'a str,
    action: String,
    title: &'a str,
    excerpt: &'a str,
    content_md: &'a str,
    tags_text: &'a str,
    published: bool,
    selected_category: Option<i32>,
}

fn edit_form_value(form: EditForm, flash: Option<Flash>, categories: &[Category]) -> Value {
    page(
        form.heading,
        flash,
        vec![
            ("heading", Value::String(h(form.heading))),
            ("action", Value::String(form.action)),
            ("title_value", Value::String(h(form.title))),
            ("excerpt_value", Value::String(h(form.excerpt))),
            ("content_value", Value::String(h(form.content_md))),
            ("tags_value", Value::String(h(form.tags_text))),
            (
                "published_checked",
                Value::String(if form.published { "checked" } else { "" }.to_owned()),
            ),
            (
                "categories",
                category_options(categories, form.selected_category),
            ),
        ],
    )
}

async fn load_categories(ctx: &App) -> Result<Vec<Category>, AppError> {
    use crate::schema::categories;

    let mut conn = ctx.db.get().await?;
    Ok(categories::table
        .order(categories::name.asc())
        .select(Category::as_select())
        .load(&mut conn)
        .await?)
}

async fn new_post_form(
    State(ctx): State<App>,
    jar: SignedCookieJar,
) -> Result<impl IntoResponse, AppError> {
    let all_categories = load_categories(&ctx).await?;
    let (jar, flash) = flash::take(jar);
    let value = edit_form_value(
        EditForm {
            heading: "New post",
            action: "/admin/new".to_owned(),
            title: "",
            excerpt: "",
            content_md: "",
            tags_text: "",
            published: false,
            selected_category: None,
        },
        flash,
        &all_categories,
    );
    Ok((jar, templates::render(&ctx.templates.admin_edit, value)?))
}

async fn new_post_submit(
    State(ctx): State<App>,
    jar: SignedCookieJar,
    Form(form): Form<PostForm>,
) -> Result<Response, AppError> {
    let parsed = form.parse();

    if parsed.title.is_empty() {
        let all_categories = load_categories(&ctx).await?;
        let value = edit_form_value(
            EditForm {
                heading: "New post",
                action: "/admin/new".to_owned(),
                title: "",
                excerpt: "",
                content_md: "",
                tags_text: "",
                published: false,
                selected_category: None,
            },
            Some(Flash {
                level: "error".to_owned(),
                message: "Title is required".to_owned(),
            }),
            &all_categories,
        );
        return Ok(templates::render(&ctx.templates.admin_edit, value)?.into_response());
    }

    let mut conn = ctx.db.get().await?;
    create_post(&mut conn, parsed).await?;

    let jar = flash::set(jar, "success", "Post created");
    Ok((jar, Redirect::to("/admin")).into_response())
}

async fn edit_post_form(
    State(ctx): State<App>,
    Path(id): Path<i32>,
    jar: SignedCookieJar,
) -> Result<impl IntoResponse, AppError> {
    use crate::schema::{post_tags, posts, tags};

    let mut conn = ctx.db.get().await?;

    let post: Post = posts::table
        .find(id)
        .select(Post::as_select())
        .first(&mut conn)
        .await
        .optional()?
        .ok_or(AppError::NotFound)?;

    let tag_names: Vec<String> = post_tags::table
        .inner_join(tags::table)
        .filter(post_tags::post_id.eq(post.id))
        .order(tags::name.asc())
        .select(tags::name)
        .load(&mut conn)
        .await?;

    let all_categories = load_categories(&ctx).await?;
    let (jar, flash) = flash::take(jar);
    let value = edit_form_value(
        EditForm {
            heading: "Edit post",
            action: format!("/admin/edit/{}", post.id),
            title: &post.title,
            excerpt: &post.excerpt,
            content_md: &post.content_md,
            tags_text: &tag_names.join(", "),
            published: post.published,
            selected_category: post.category_id,
        },
        flash,
        &all_categories,
    );
    Ok((jar, templates::render(&ctx.templates.admin_edit, value)?))
}

async fn edit_post_submit(
    State(ctx): State<App>,
    Path(id): Path<i32>,
    jar: SignedCookieJar,
    Form(form): Form<PostForm>,
) -> Result<Response, AppError> {
    use crate::schema::{post_tags, posts, tags};

    let mut conn = ctx.db.get().await?;

    let post: Post = posts::table
        .find(id)
        .select(Post::as_select())
        .first(&mut conn)
        .await
        .optional()?
        .ok_or(AppError::NotFound)?;

    let parsed = form.parse();

    if parsed.title.is_empty() {
        // Re-render from the stored post, dropping the rest of the
        // submission along with the missing title.
        let tag_names: Vec<String> = post_tags::table
            .inner_join(tags::table)
            .filter(post_tags::post_id.eq(post.id))
            .order(tags::name.asc())
            .select(tags::name)
            .load(&mut conn)
            .await?;

        let all_categories = load_categories(&ctx).await?;
        let value = edit_form_value(
            EditForm {
                heading: "Edit post",
                action: format!("/admin/edit/{}", post.id),
                title: &post.title,
                excerpt: &post.excerpt,
                content_md: &post.content_md,
                tags_text: &tag_names.join(", "),
                published: post.published,
                selected_category: post.category_id,
            },
            Some(Flash {
                level: "error".to_owned(),
                message: "Title is required".to_owned(),
            }),
            &all_categories,
        );
        return Ok(templates::render(&ctx.templates.admin_edit, value)?.into_response());
    }

    update_post(&mut conn, post, parsed).await?;

    let jar = flash::set(jar, "success", "Post updated");
    Ok((jar, Redirect::to("/admin")).into_response())
}

#[derive(Deserialize)]
struct CategoryForm {
    #[serde(default)]
    name: String,
    #[serde(default)]
    description: String,
}

async fn categories_page(
    State(ctx): State<App>,
    jar: SignedCookieJar,
) -> Result<impl IntoResponse, AppError> {
    let all_categories = load_categories(&ctx).await?;
    let (jar, flash) = flash::take(jar);
    let value = page(
        "Categories",
        flash,
        vec![("categories", categories_value(&all_categories))],
    );
    Ok((jar, templates::render(&ctx.templates.admin_categories, value)?))
}

async fn create_category(
    State(ctx): State<App>,
    Form(form): Form<CategoryForm>,
) -> Result<Response, AppError> {
    use crate::schema::categories;

    let name = form.name.trim().to_owned();
    let description = form.description.trim().to_owned();

    let flash = if name.is_empty() {
        Flash {
            level: "error".to_owned(),
            message: "Category name is required".to_owned(),
        }
    } else {
        let mut conn = ctx.db.get().await?;
        let slug = slugs::unique_category_slug(&mut conn, &name).await?;
        diesel::insert_into(categories::table)
            .values(&NewCategory::new(name, slug, description))
            .execute(&mut conn)
            .await?;
        Flash {
            level: "success".to_owned(),
            message: "Category created".to_owned(),
        }
    };

    let all_categories = load_categories(&ctx).await?;
    let value = page(
        "Categories",
        Some(flash),
        vec![("categories", categories_value(&all_categories))],
    );
    Ok(templates::render(&ctx.templates.admin_categories, value)?.into_response())
}

async fn delete_category(
    State(ctx): State<App>,
    Path(id): Path<i32>,
    jar: SignedCookieJar,
) -> Result<impl IntoResponse, AppError> {
    use crate::schema::{categories, posts};

    let mut conn = ctx.db.get().await?;

    conn.transaction::<_, AppError, _>(|conn| {
        async move {
            let existing: Option<i32> = categories::table
                .find(id)
                .select(categories::id)
                .first(conn)
                .await
                .optional()?;
            if existing.is_none() {
                return Err(AppError::NotFound);
            }

            // Posts survive their category; only the reference goes.
            diesel::update(posts::table.filter(posts::category_id.eq(id)))
                .set(posts::category_id.eq(None::<i32>))
                .execute(conn)
                .await?;

            diesel::delete(categories::table.find(id)).execute(conn).await?;

            Ok(())
        }
        .scope_boxed()
    })
    .await?;

    let jar = flash::set(jar, "info", "Category deleted");
    Ok((jar, Redirect::to("/admin/categories")))
}

async fn delete_post(
    State(ctx): State<App>,
    Path(id): Path<i32>,
    jar: SignedCookieJar,
) -> Result<impl IntoResponse, AppError> {
    use crate::schema::posts;

    let mut conn = ctx.db.get().await?;

    let deleted = diesel::delete(posts::table.find(id))
        .execute(&mut conn)
        .await?;
    if deleted == 0 {
        return Err(AppError::NotFound);
    }

    let jar = flash::set(jar, "info", "Post deleted");
    Ok((jar, Redirect::to("/admin")))
}
