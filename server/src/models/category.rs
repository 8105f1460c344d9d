use chrono::NaiveDateTime;
use diesel::prelude::*;

#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = crate::schema::categories)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Category {
    pub id: i32,
    pub name: String,
    pub slug: String,
    pub description: String,
    pub created_at: NaiveDateTime,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::categories)]
pub struct NewCategory {
    pub name: String,
    pub slug: String,
    pub description: String,
    pub created_at: NaiveDateTime,
}

impl NewCategory {
    pub fn new(name: String, slug: String, description: String) -> Self {
        NewCategory {
            name,
            slug,
            description,
            created_at: chrono::Utc::now().naive_utc(),
        }
    }
}
