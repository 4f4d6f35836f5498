use serde::Deserialize;
use sqlx::{Pool, Postgres};

use crate::{
    constants::{DEFAULT_TAG_COLOR, MAX_NAME_LENGTH},
    error::ServiceError,
    schema::{Id, Tag},
};

#[derive(Deserialize, Debug, Clone)]
pub struct TagInput {
    pub name: String,
    #[serde(default)]
    pub color: Option<String>,
    pub slug: String,
}

fn is_hex_color(color: &str) -> bool {
    color.len() == 7
        && color.starts_with('#')
        && color.chars().skip(1).all(|c| c.is_ascii_hexdigit())
}

fn is_slug(slug: &str) -> bool {
    !slug.is_empty()
        && slug
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

impl TagInput {
    pub fn validate(self) -> Result<Tag, ServiceError> {
        let name = self.name.trim().to_string();
        if name.is_empty() || name.chars().count() > MAX_NAME_LENGTH {
            return Err(ServiceError::validation("Tag name must be 1-200 characters"));
        }

        let color = self.color.unwrap_or_else(|| DEFAULT_TAG_COLOR.to_string());
        if !is_hex_color(&color) {
            return Err(ServiceError::validation("Tag color must look like #RRGGBB"));
        }

        if !is_slug(&self.slug) || self.slug.len() > MAX_NAME_LENGTH {
            return Err(ServiceError::validation(
                "Tag slug may only contain letters, digits, '-' and '_'",
            ));
        }

        Ok(Tag {
            id: 0,
            name,
            color: color.to_uppercase(),
            slug: self.slug,
        })
    }
}

pub async fn create_tag(input: TagInput, pool: &Pool<Postgres>) -> Result<Tag, ServiceError> {
    let tag = input.validate()?;

    let row: Option<Tag> = sqlx::query_as(
        "INSERT INTO tags (name, color, slug) VALUES ($1, $2, $3) ON CONFLICT DO NOTHING RETURNING *",
    )
    .bind(&tag.name)
    .bind(&tag.color)
    .bind(&tag.slug)
    .fetch_optional(pool)
    .await?;

    match row {
        Some(tag) => {
            log::info!("Created tag {} ({})", tag.id, tag.slug);
            Ok(tag)
        }
        None => Err(ServiceError::Conflict(String::from(
            "Tag with this name, color or slug already exists",
        ))),
    }
}

pub async fn get_tag(id: Id, pool: &Pool<Postgres>) -> Result<Option<Tag>, ServiceError> {
    let tag: Option<Tag> = sqlx::query_as("SELECT * FROM tags WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?;

    Ok(tag)
}

pub async fn list_tags(pool: &Pool<Postgres>) -> Result<Vec<Tag>, ServiceError> {
    let list: Vec<Tag> = sqlx::query_as("SELECT * FROM tags ORDER BY id")
        .fetch_all(pool)
        .await?;

    Ok(list)
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn input(color: Option<&str>, slug: &str) -> TagInput {
        TagInput {
            name: String::from("Breakfast"),
            color: color.map(str::to_string),
            slug: slug.to_string(),
        }
    }

    #[test]
    fn default_color_is_applied() {
        let tag = input(None, "breakfast").validate().expect("valid tag");
        assert_eq!(tag.color, DEFAULT_TAG_COLOR);
    }

    #[test]
    fn color_is_normalized() {
        let tag = input(Some("#e26c2d"), "breakfast")
            .validate()
            .expect("valid tag");
        assert_eq!(tag.color, "#E26C2D");
    }

    #[rstest]
    #[case(Some("E26C2D"), "breakfast")]
    #[case(Some("#E26C2"), "breakfast")]
    #[case(Some("#GGGGGG"), "breakfast")]
    #[case(None, "")]
    #[case(None, "early breakfast")]
    fn malformed_tags_are_rejected(#[case] color: Option<&str>, #[case] slug: &str) {
        let result = input(color, slug).validate();
        assert!(matches!(result, Err(ServiceError::Validation(_))));
    }
}
