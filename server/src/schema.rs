#[allow(unused_imports)]
use diesel::sql_types::*;

diesel::table! {
    categories (id) {
        id -> Int4,
        name -> Text,
        slug -> Text,
        description -> Text,
        created_at -> Timestamp,
    }
}

diesel::table! {
    tags (id) {
        id -> Int4,
        name -> Text,
        slug -> Text,
        created_at -> Timestamp,
    }
}

diesel::table! {
    posts (id) {
        id -> Int4,
        title -> Text,
        slug -> Text,
        content_md -> Text,
        excerpt -> Text,
        published -> Bool,
        view_count -> Int4,
        category_id -> Nullable<Int4>,
        created_at -> Timestamp,
        updated_at -> Timestamp,
    }
}

diesel::table! {
    post_tags (post_id, tag_id) {
        post_id -> Int4,
        tag_id -> Int4,
    }
}

diesel::table! {
    admin_sessions (id) {
        id -> Int4,
        token -> Text,
        active -> Bool,
        issued_at -> Timestamp,
        expires_at -> Timestamp,
        created_at -> Timestamp,
    }
}

diesel::joinable!(posts -> categories (category_id));
diesel::joinable!(post_tags -> posts (post_id));
diesel::joinable!(post_tags -> tags (tag_id));

diesel::allow_tables_to_appear_in_same_query!(categories, tags, posts, post_tags, admin_sessions,);
