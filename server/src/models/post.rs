use chrono::NaiveDateTime;
use diesel::prelude::*;

use super::category::Category;

#[derive(Queryable, Selectable, Identifiable, Associations, Debug, Clone)]
#[diesel(table_name = crate::schema::posts)]
#[diesel(belongs_to(Category))]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Post {
    pub id: i32,
    pub title: String,
    pub slug: String,
    pub content_md: String,
    pub excerpt: String,
    pub published: bool,
    pub view_count: i32,
    pub category_id: Option<i32>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::posts)]
pub struct NewPost {
    pub title: String,
    pub slug: String,
    pub content_md: String,
    pub excerpt: String,
    pub published: bool,
    pub view_count: i32,
    pub category_id: Option<i32>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl NewPost {
    pub fn new(
        title: String,
        slug: String,
        content_md: String,
        excerpt: String,
        published: bool,
        category_id: Option<i32>,
    ) -> Self {
        let now = chrono::Utc::now().naive_utc();
        NewPost {
            title,
            slug,
            content_md,
            excerpt,
            published,
            view_count: 0,
            category_id,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Field set overwritten when the admin saves an edit. The slug is
/// included because it is regenerated when the title changed.
#[derive(AsChangeset, Debug)]
#[diesel(table_name = crate::schema::posts)]
pub struct PostChanges {
    pub title: String,
    pub slug: String,
    pub content_md: String,
    pub excerpt: String,
    pub published: bool,
    pub category_id: Option<Option<i32>>,
    pub updated_at: NaiveDateTime,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::post_tags)]
pub struct PostTag {
    pub post_id: i32,
    pub tag_id: i32,
}
