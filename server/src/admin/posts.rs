//! Create/edit plumbing for posts: form decoding, slug handling and the
//! replace-tag-set operation, all committed inside one transaction per
//! request.

use diesel::prelude::*;
use diesel_async::scoped_futures::ScopedFutureExt;
use diesel_async::{AsyncConnection, AsyncPgConnection, RunQueryDsl};
use serde::Deserialize;

use crate::error::AppError;
use crate::models::post::{NewPost, Post, PostChanges, PostTag};
use crate::models::tag::{NewTag, parse_tag_names};
use crate::slugs;

#[derive(Deserialize, Debug)]
pub struct PostForm {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content_md: String,
    #[serde(default)]
    pub excerpt: String,
    #[serde(default)]
    pub category_id: String,
    #[serde(default)]
    pub tags: String,
    // Checkboxes are simply absent when unchecked.
    #[serde(default)]
    pub published: Option<String>,
}

pub struct ParsedPostForm {
    pub title: String,
    pub content_md: String,
    pub excerpt: String,
    pub published: bool,
    pub category_id: Option<i32>,
    pub tag_names: Vec<String>,
}

impl PostForm {
    pub fn parse(self) -> ParsedPostForm {
        ParsedPostForm {
            title: self.title.trim().to_owned(),
            content_md: self.content_md,
            excerpt: self.excerpt.trim().to_owned(),
            published: self.published.is_some(),
            category_id: self.category_id.trim().parse().ok(),
            tag_names: parse_tag_names(&self.tags),
        }
    }
}

/// Inserts the post and attaches its tags. Returns the new post id.
pub async fn create_post(
    conn: &mut AsyncPgConnection,
    form: ParsedPostForm,
) -> Result<i32, AppError> {
    use crate::schema::posts;

    conn.transaction::<_, AppError, _>(|conn| {
        async move {
            let slug = slugs::unique_post_slug(conn, &form.title).await?;

            let post_id: i32 = diesel::insert_into(posts::table)
                .values(&NewPost::new(
                    form.title,
                    slug,
                    form.content_md,
                    form.excerpt,
                    form.published,
                    form.category_id,
                ))
                .returning(posts::id)
                .get_result(conn)
                .await?;

            replace_tag_set(conn, post_id, &form.tag_names).await?;

            Ok(post_id)
        }
        .scope_boxed()
    })
    .await
}

/// Overwrites the post's fields and replaces its tag set. The slug is
/// regenerated only when the title actually changed.
pub async fn update_post(
    conn: &mut AsyncPgConnection,
    post: Post,
    form: ParsedPostForm,
) -> Result<(), AppError> {
    use crate::schema::posts;

    conn.transaction::<_, AppError, _>(|conn| {
        async move {
            let slug = if form.title != post.title {
                slugs::unique_post_slug(conn, &form.title).await?
            } else {
                post.slug.clone()
            };

            diesel::update(posts::table.find(post.id))
                .set(&PostChanges {
                    title: form.title,
                    slug,
                    content_md: form.content_md,
                    excerpt: form.excerpt,
                    published: form.published,
                    category_id: Some(form.category_id),
                    updated_at: chrono::Utc::now().naive_utc(),
                })
                .execute(conn)
                .await?;

            replace_tag_set(conn, post.id, &form.tag_names).await?;

            Ok(())
        }
        .scope_boxed()
    })
    .await
}

/// Makes the post's tag memberships exactly `names`, diffing against the
/// current set: joins to tags that dropped out are removed, missing ones
/// are added, and tags themselves are reused by exact name or created.
/// Unreferenced tags are left in the store.
pub async fn replace_tag_set(
    conn: &mut AsyncPgConnection,
    post_id: i32,
    names: &[String],
) -> Result<(), AppError> {
    use crate::schema::{post_tags, tags};

    let mut desired: Vec<i32> = Vec::with_capacity(names.len());
    for name in names {
        let existing: Option<i32> = tags::table
            .filter(tags::name.eq(name))
            .select(tags::id)
            .first(conn)
            .await
            .optional()?;

        let tag_id = match existing {
            Some(id) => id,
            None => {
                let slug = slugs::unique_tag_slug(conn, name).await?;
                diesel::insert_into(tags::table)
                    .values(&NewTag::new(name.clone(), slug))
                    .returning(tags::id)
                    .get_result(conn)
                    .await?
            }
        };
        desired.push(tag_id);
    }

    let current: Vec<i32> = post_tags::table
        .filter(post_tags::post_id.eq(post_id))
        .select(post_tags::tag_id)
        .load(conn)
        .await?;

    let stale: Vec<i32> = current
        .iter()
        .copied()
        .filter(|id| !desired.contains(id))
        .collect();
    if !stale.is_empty() {
        diesel::delete(
            post_tags::table
                .filter(post_tags::post_id.eq(post_id))
                .filter(post_tags::tag_id.eq_any(&stale)),
        )
        .execute(conn)
        .await?;
    }

    let missing: Vec<PostTag> = desired
        .iter()
        .copied()
        .filter(|id| !current.contains(id))
        .map(|tag_id| PostTag { post_id, tag_id })
        .collect();
    if !missing.is_empty() {
        diesel::insert_into(post_tags::table)
            .values(&missing)
            .execute(conn)
            .await?;
    }

    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    fn form(title: &str, category_id: &str, published: Option<&str>, tags: &str) -> PostForm {
        PostForm {
            title: title.to_owned(),
            content_md: "body".to_owned(),
            excerpt: " summary ".to_owned(),
            category_id: category_id.to_owned(),
            tags: tags.to_owned(),
            published: published.map(|v| v.to_owned()),
        }
    }

    #[test]
    fn test_parse_trims_title_and_excerpt() {
        let parsed = form("  Hello  ", "", None, "").parse();
        assert_eq!(parsed.title, "Hello");
        assert_eq!(parsed.excerpt, "summary");
    }

    #[test]
    fn test_parse_checkbox_presence_means_published() {
        assert!(form("t", "", Some("on"), "").parse().published);
        assert!(!form("t", "", None, "").parse().published);
    }

    #[test]
    fn test_parse_category_id_must_be_numeric() {
        assert_eq!(form("t", "3", None, "").parse().category_id, Some(3));
        assert_eq!(form("t", "", None, "").parse().category_id, None);
        assert_eq!(
            form("t", "abc", None, "").parse().category_id,
            None,
            "a non-numeric id clears the category"
        );
    }

    #[test]
    fn test_parse_splits_tag_field() {
        let parsed = form("t", "", None, "a, b ,a").parse();
        assert_eq!(parsed.tag_names, vec!["a", "b"]);
    }
}
