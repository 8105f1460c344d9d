//! The page template set, parsed once at startup, plus the glue that
//! turns model rows into template values. gtmpl does not escape
//! anything on its own, so every author- or visitor-controlled string is
//! entity-escaped here, at value-construction time; the only raw HTML a
//! template ever receives is the sanitized output of
//! [`crate::content::render_markdown`].

use std::collections::HashMap;

use axum::response::Html;
use gtmpl::Value;

use crate::error::AppError;
use crate::flash::Flash;
use crate::models::category::Category;
use crate::models::post::Post;
use crate::models::tag::Tag;

pub struct Templates {
    pub index: gtmpl::Template,
    pub post: gtmpl::Template,
    pub category: gtmpl::Template,
    pub tag: gtmpl::Template,
    pub search: gtmpl::Template,
    pub admin_login: gtmpl::Template,
    pub admin_dashboard: gtmpl::Template,
    pub admin_edit: gtmpl::Template,
    pub admin_categories: gtmpl::Template,
}

impl Templates {
    pub fn load() -> Result<Self, String> {
        Ok(Templates {
            index: parse("index", include_str!("../templates/index.html"))?,
            post: parse("post", include_str!("../templates/post.html"))?,
            category: parse("category", include_str!("../templates/category.html"))?,
            tag: parse("tag", include_str!("../templates/tag.html"))?,
            search: parse("search", include_str!("../templates/search.html"))?,
            admin_login: parse("admin_login", include_str!("../templates/admin_login.html"))?,
            admin_dashboard: parse(
                "admin_dashboard",
                include_str!("../templates/admin_dashboard.html"),
            )?,
            admin_edit: parse("admin_edit", include_str!("../templates/admin_edit.html"))?,
            admin_categories: parse(
                "admin_categories",
                include_str!("../templates/admin_categories.html"),
            )?,
        })
    }
}

fn parse(name: &str, source: &str) -> Result<gtmpl::Template, String> {
    let mut template = gtmpl::Template::default();
    template
        .parse(source)
        .map_err(|e| format!("parsing template `{name}`: {e}"))?;
    Ok(template)
}

pub fn render(template: &gtmpl::Template, value: Value) -> Result<Html<String>, AppError> {
    let context =
        gtmpl::Context::from(value).map_err(|e| AppError::Template(format!("{e:?}")))?;

    let mut rendered: Vec<u8> = Vec::new();
    template
        .execute(&mut rendered, &context)
        .map_err(AppError::Template)?;

    String::from_utf8(rendered)
        .map(Html)
        .map_err(|e| AppError::Template(e.to_string()))
}

/// Entity-escapes a string for use in both element and attribute
/// positions.
pub fn h(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    pulldown_cmark::escape::escape_html(&mut escaped, text)
        .expect("writing into a String cannot fail");
    escaped
}

pub fn obj(entries: Vec<(&str, Value)>) -> Value {
    let mut m: HashMap<String, Value> = HashMap::new();
    for (key, value) in entries {
        m.insert(key.to_owned(), value);
    }
    Value::Object(m)
}

/// The common page envelope: a title and the pending flash message.
pub fn page(title: &str, flash: Option<Flash>, mut entries: Vec<(&str, Value)>) -> Value {
    let mut all = vec![("title", Value::String(h(title))), ("flash", flash_value(flash))];
    all.append(&mut entries);
    obj(all)
}

fn flash_value(flash: Option<Flash>) -> Value {
    match flash {
        Some(flash) => obj(vec![
            ("level", Value::String(h(&flash.level))),
            ("message", Value::String(h(&flash.message))),
        ]),
        None => Value::Nil,
    }
}

pub fn post_value(post: &Post) -> Value {
    obj(vec![
        ("id", Value::from(post.id as i64)),
        ("title", Value::String(h(&post.title))),
        ("slug", Value::String(h(&post.slug))),
        ("excerpt", Value::String(h(&post.excerpt))),
        ("view_count", Value::from(post.view_count as i64)),
        (
            "status",
            Value::String(if post.published { "published" } else { "draft" }.to_owned()),
        ),
        (
            "created_at",
            Value::String(post.created_at.format("%Y-%m-%d").to_string()),
        ),
        (
            "updated_at",
            Value::String(post.updated_at.format("%Y-%m-%d").to_string()),
        ),
    ])
}

pub fn posts_value(posts: &[Post]) -> Value {
    Value::Array(posts.iter().map(post_value).collect())
}

pub fn category_value(category: &Category) -> Value {
    obj(vec![
        ("id", Value::from(category.id as i64)),
        ("name", Value::String(h(&category.name))),
        ("slug", Value::String(h(&category.slug))),
        ("description", Value::String(h(&category.description))),
    ])
}

pub fn categories_value(categories: &[Category]) -> Value {
    Value::Array(categories.iter().map(category_value).collect())
}

/// Category options for the post form, with the `selected` attribute
/// precomputed so the template stays a dumb renderer.
pub fn category_options(categories: &[Category], selected: Option<i32>) -> Value {
    Value::Array(
        categories
            .iter()
            .map(|category| {
                obj(vec![
                    ("id", Value::from(category.id as i64)),
                    ("name", Value::String(h(&category.name))),
                    (
                        "selected",
                        Value::String(if selected == Some(category.id) {
                            "selected".to_owned()
                        } else {
                            String::new()
                        }),
                    ),
                ])
            })
            .collect(),
    )
}

pub fn tag_value(tag: &Tag) -> Value {
    obj(vec![
        ("id", Value::from(tag.id as i64)),
        ("name", Value::String(h(&tag.name))),
        ("slug", Value::String(h(&tag.slug))),
    ])
}

pub fn tags_value(tags: &[Tag]) -> Value {
    Value::Array(tags.iter().map(tag_value).collect())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_template_set_parses() {
        assert!(
            Templates::load().is_ok(),
            "every bundled template should parse"
        );
    }

    #[test]
    fn test_escape_covers_markup_characters() {
        assert_eq!(h("<b>&\"quote\"</b>"), "&lt;b&gt;&amp;&quot;quote&quot;&lt;/b&gt;");
    }

    #[test]
    fn test_index_template_renders_posts() {
        let templates = Templates::load().unwrap();
        let value = page(
            "Blog",
            None,
            vec![
                (
                    "posts",
                    Value::Array(vec![obj(vec![
                        ("title", Value::String("Hello".to_owned())),
                        ("slug", Value::String("hello".to_owned())),
                        ("excerpt", Value::String("An excerpt".to_owned())),
                        ("created_at", Value::String("2026-01-01".to_owned())),
                    ])]),
                ),
                ("categories", Value::Array(vec![])),
                ("popular", Value::Array(vec![])),
            ],
        );
        let html = render(&templates.index, value).expect("index should render").0;
        assert!(html.contains("Hello"), "post title should appear: {html}");
        assert!(
            html.contains("/post/hello"),
            "post link should point at the slug route: {html}"
        );
    }

    #[test]
    fn test_login_template_renders_flash() {
        let templates = Templates::load().unwrap();
        let value = page(
            "Admin login",
            Some(Flash {
                level: "error".to_owned(),
                message: "Invalid password".to_owned(),
            }),
            vec![],
        );
        let html = render(&templates.admin_login, value)
            .expect("login should render")
            .0;
        assert!(
            html.contains("Invalid password"),
            "flash message should appear: {html}"
        );
    }
}
