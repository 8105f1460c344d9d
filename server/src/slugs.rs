//! Derives URL-safe identifiers from titles and keeps them unique per
//! entity type. The probe-then-insert sequence assumes a single writer;
//! the UNIQUE constraints created in [`crate::db::ensure_schema`] are the
//! storage-level backstop should that assumption ever break.

use diesel::dsl::exists;
use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};

use crate::error::AppError;

pub const POST_FALLBACK: &str = "post";
pub const CATEGORY_FALLBACK: &str = "category";
pub const TAG_FALLBACK: &str = "tag";

/// Lowercase, hyphenated base identifier for a title. Titles that
/// slugify to nothing (punctuation, emoji) get the literal fallback.
pub fn base_slug(title: &str, fallback: &str) -> String {
    let base = slug::slugify(title);
    if base.is_empty() {
        fallback.to_owned()
    } else {
        base
    }
}

/// The probe sequence for a base: `base`, `base-2`, `base-3`, ...
pub fn candidates(base: &str) -> impl Iterator<Item = String> + '_ {
    (1u32..).map(move |i| {
        if i == 1 {
            base.to_owned()
        } else {
            format!("{base}-{i}")
        }
    })
}

pub async fn unique_post_slug(
    conn: &mut AsyncPgConnection,
    title: &str,
) -> Result<String, AppError> {
    use crate::schema::posts;

    let base = base_slug(title, POST_FALLBACK);
    for candidate in candidates(&base) {
        let taken: bool = diesel::select(exists(
            posts::table.filter(posts::slug.eq(&candidate)),
        ))
        .get_result(conn)
        .await?;

        if !taken {
            return Ok(candidate);
        }
    }
    unreachable!("the candidate sequence is infinite")
}

pub async fn unique_tag_slug(
    conn: &mut AsyncPgConnection,
    name: &str,
) -> Result<String, AppError> {
    use crate::schema::tags;

    let base = base_slug(name, TAG_FALLBACK);
    for candidate in candidates(&base) {
        let taken: bool = diesel::select(exists(
            tags::table.filter(tags::slug.eq(&candidate)),
        ))
        .get_result(conn)
        .await?;

        if !taken {
            return Ok(candidate);
        }
    }
    unreachable!("the candidate sequence is infinite")
}

pub async fn unique_category_slug(
    conn: &mut AsyncPgConnection,
    name: &str,
) -> Result<String, AppError> {
    use crate::schema::categories;

    let base = base_slug(name, CATEGORY_FALLBACK);
    for candidate in candidates(&base) {
        let taken: bool = diesel::select(exists(
            categories::table.filter(categories::slug.eq(&candidate)),
        ))
        .get_result(conn)
        .await?;

        if !taken {
            return Ok(candidate);
        }
    }
    unreachable!("the candidate sequence is infinite")
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_base_slug_lowercases_and_hyphenates() {
        assert_eq!(base_slug("Hello World!", POST_FALLBACK), "hello-world");
    }

    #[test]
    fn test_base_slug_degenerate_title_uses_fallback() {
        assert_eq!(base_slug("!!!", POST_FALLBACK), "post");
        assert_eq!(base_slug("", CATEGORY_FALLBACK), "category");
    }

    #[test]
    fn test_candidates_sequence() {
        let first: Vec<String> = candidates("hello-world").take(3).collect();
        assert_eq!(
            first,
            vec!["hello-world", "hello-world-2", "hello-world-3"],
            "suffixes must start at -2 and increment"
        );
    }
}
