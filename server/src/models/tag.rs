use chrono::NaiveDateTime;
use diesel::prelude::*;

#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = crate::schema::tags)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Tag {
    pub id: i32,
    pub name: String,
    pub slug: String,
    pub created_at: NaiveDateTime,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::tags)]
pub struct NewTag {
    pub name: String,
    pub slug: String,
    pub created_at: NaiveDateTime,
}

impl NewTag {
    pub fn new(name: String, slug: String) -> Self {
        NewTag {
            name,
            slug,
            created_at: chrono::Utc::now().naive_utc(),
        }
    }
}

/// Splits the free-text tag field of the post form into individual tag
/// names. Names are trimmed, empty entries dropped and duplicates
/// collapsed while keeping the order they were typed in.
pub fn parse_tag_names(input: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for name in input.split(',') {
        let name = name.trim();
        if name.is_empty() || names.iter().any(|n| n == name) {
            continue;
        }
        names.push(name.to_owned());
    }
    names
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_parse_tag_names_trims_and_drops_empty() {
        assert_eq!(
            parse_tag_names(" a, b ,,  c"),
            vec!["a", "b", "c"],
            "names should be trimmed and empty entries dropped"
        );
    }

    #[test]
    fn test_parse_tag_names_collapses_duplicates() {
        assert_eq!(
            parse_tag_names("rust, web, rust"),
            vec!["rust", "web"],
            "a name typed twice should only appear once"
        );
    }

    #[test]
    fn test_parse_tag_names_empty_input() {
        assert!(
            parse_tag_names("").is_empty(),
            "an empty field should produce no tags"
        );
        assert!(
            parse_tag_names(" , ,").is_empty(),
            "a field of separators should produce no tags"
        );
    }
}
